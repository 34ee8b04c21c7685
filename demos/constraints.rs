//! Enumerates small programs of an arithmetic grammar, with and without
//! context-sensitive constraints, by repeatedly expanding the leftmost hole.
//!
//! ```bash
//! cargo run --example constraints -- 7
//! ```

use clap::Parser;
use log::debug;

use grammar_rs::constraint::Constraint;
use grammar_rs::expr::Expr;
use grammar_rs::grammar::Grammar;
use grammar_rs::node::Node;
use grammar_rs::types::{rule_ids, RuleId};

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Maximum program size (number of nodes).
    #[arg(value_name = "INT", default_value = "5")]
    size: usize,

    /// Print every program found.
    #[clap(long)]
    verbose: bool,
}

/// 1: Real = 0, 2: Real = 1, 3: Real = x, 4: Real = Real + Real, 5: Real = Real * Real, 6: Real = -Real
fn build() -> color_eyre::Result<Grammar> {
    let real = || Expr::sym("Real");
    let mut g = Grammar::new();
    g.add_rules(
        "Real",
        [
            Expr::int(0),
            Expr::int(1),
            Expr::sym("x"),
            Expr::call("+", [real(), real()]),
            Expr::call("*", [real(), real()]),
            Expr::call("neg", [real()]),
        ],
    )?;
    Ok(g)
}

fn enumerate(g: &Grammar, tree: Node, max_size: usize, out: &mut Vec<Node>) -> color_eyre::Result<()> {
    if tree.size() > max_size {
        return Ok(());
    }
    let Some(path) = tree.hole_paths().next() else {
        out.push(tree);
        return Ok(());
    };
    let legal = g.legal_domain(&tree, &path)?;
    debug!("hole at {:?}: {}", path, legal);
    for rule in legal.rules() {
        let mut next = tree.clone();
        g.expand(&mut next, &path, rule)?;
        enumerate(g, next, max_size, out)?;
    }
    Ok(())
}

fn run(g: &Grammar, max_size: usize, verbose: bool) -> color_eyre::Result<usize> {
    let mut programs = Vec::new();
    enumerate(g, Node::hole(g.domain("Real")?.clone()), max_size, &mut programs)?;
    if verbose {
        for tree in &programs {
            println!("  {}", g.to_expression(tree));
        }
    }
    Ok(programs.len())
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let args = Cli::parse();
    println!("args = {:?}", args);

    let mut g = build()?;
    let time = std::time::Instant::now();
    let total = run(&g, args.size, args.verbose)?;
    println!("{} programs without constraints in {:?}", total, time.elapsed());

    // neg(neg(_))
    g.add_constraint(Constraint::forbidden(rule_ids([6, 6])))?;
    // Literal 0 directly below `*`.
    g.add_constraint(Constraint::forbidden(rule_ids([5, 1])))?;
    // `*` only somewhere below a `+`.
    g.add_constraint(Constraint::comes_after(RuleId::new(5), rule_ids([4])))?;
    print!("{}", g);

    let time = std::time::Instant::now();
    let constrained = run(&g, args.size, args.verbose)?;
    println!("{} programs with constraints in {:?}", constrained, time.elapsed());
    assert!(constrained <= total);

    Ok(())
}
