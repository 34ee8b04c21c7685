//! Builds a small arithmetic grammar and explores its derivations.
//!
//! ```bash
//! cargo run --example arith -- 4
//! cargo run --example arith -- 4 --probabilistic --dot tree.dot
//! ```

use clap::Parser;

use grammar_rs::expr::Expr;
use grammar_rs::grammar::Grammar;

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Maximum derivation depth.
    #[arg(value_name = "INT", default_value = "3")]
    depth: usize,

    /// Give `+` and `*` a lower probability than the leaves.
    #[clap(long)]
    probabilistic: bool,

    /// Write the parsed example tree to this DOT file.
    #[clap(long, value_name = "PATH")]
    dot: Option<std::path::PathBuf>,
}

fn binop(op: &str) -> Expr {
    Expr::call(op, [Expr::sym("Real"), Expr::sym("Real")])
}

fn build(probabilistic: bool) -> color_eyre::Result<Grammar> {
    let leaves = [Expr::int(1), Expr::int(2), Expr::sym("x")];
    let nodes = [binop("+"), binop("*")];

    let mut g = Grammar::new();
    if probabilistic {
        for body in leaves {
            g.add_rule_with_probability(2.0, "Real", body)?;
        }
        for body in nodes {
            g.add_rule_with_probability(1.0, "Real", body)?;
        }
        g.normalize();
    } else {
        g.add_rules("Real", leaves)?;
        g.add_rules("Real", nodes)?;
    }
    Ok(g)
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

    let g = build(args.probabilistic)?;
    println!("g = {:?}", g);
    print!("{}", g);

    for depth in 1..=args.depth {
        println!("depth {}: {} programs", depth, g.count_derivations("Real", depth)?);
    }
    if let Some(tree) = g.one_derivation("Real", args.depth)? {
        println!("first program: {} = {}", tree, g.to_expression(&tree));
    }

    let expr = Expr::call("+", [Expr::int(1), Expr::call("*", [Expr::sym("x"), Expr::int(2)])]);
    let tree = g.from_expression(&expr, "Real")?;
    let lp = g.tree_log_probability(&tree)?;
    println!(
        "{} parses as {} (size {}, depth {}), log p = {:.3}{}",
        expr,
        tree,
        tree.size(),
        tree.depth(),
        lp.value(),
        if lp.is_exact() { "" } else { " (uniform estimate)" }
    );
    assert_eq!(g.to_expression(&tree), expr);

    if let Some(path) = args.dot {
        std::fs::write(&path, g.to_dot(&tree)?)?;
        println!("Wrote {}", path.display());
    }

    Ok(())
}
