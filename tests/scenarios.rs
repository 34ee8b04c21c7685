use test_log::test;

use grammar_rs::bitset::BitSet;
use grammar_rs::constraint::{Constraint, Context, Propagate};
use grammar_rs::expr::Expr;
use grammar_rs::grammar::Grammar;
use grammar_rs::node::Node;
use grammar_rs::types::{rule_ids, RuleId};

fn r(id: u32) -> RuleId {
    RuleId::new(id)
}

/// Rules 1..=9 are the literals 1..=9, rule 10 is `Real + Real`.
fn nine_literals() -> Grammar {
    let mut g = Grammar::new();
    g.add_rules("Real", (1..=9).map(Expr::int)).unwrap();
    g.add_rule("Real", Expr::call("+", [Expr::sym("Real"), Expr::sym("Real")])).unwrap();
    g
}

/// Checks the structural invariants that must hold after any mutation.
fn assert_invariants(g: &Grammar) {
    for rule in g.rule_ids() {
        assert_eq!(g.is_terminal(rule), g.child_types(rule).is_empty());
        if !g.is_eval(rule) {
            let placeholders: Vec<&str> = g.rule(rule).symbols().into_iter().filter(|s| g.has_type(s)).collect();
            let child_types: Vec<&str> = g.child_types(rule).iter().map(|t| t.name()).collect();
            assert_eq!(child_types, placeholders);
        }
    }
    for ty in g.nonterminals() {
        let domain = g.domain(ty.name()).unwrap();
        for rule in g.rule_ids() {
            let in_index = g.rules_of_type(ty.name()).unwrap().contains(&rule);
            assert_eq!(in_index, domain.contains_rule(rule), "type {} rule {}", ty, rule);
        }
    }
}

#[test]
fn dedup() {
    let mut g = Grammar::new();
    let body = Expr::call("+", [Expr::sym("Real"), Expr::int(1)]);
    g.add_rule("Real", body.clone()).unwrap();
    let len = g.len();
    assert_eq!(g.add_rule("Real", body.clone()).unwrap(), None);
    assert_eq!(g.len(), len);
    assert_eq!(g.rule_ids().filter(|&r| g.rule(r) == &body).count(), 1);
}

#[test]
fn invariants_survive_mutation() {
    let mut g = nine_literals();
    assert_invariants(&g);

    g.add_rule("Bool", Expr::call("<", [Expr::sym("Real"), Expr::sym("Real")])).unwrap();
    g.add_rule("Real", Expr::call("ite", [Expr::sym("Bool"), Expr::sym("Real"), Expr::sym("Real")]))
        .unwrap();
    assert_invariants(&g);

    g.remove_rule(r(11)).unwrap();
    assert!(!g.has_type("Bool"));
    assert_invariants(&g);

    let mut other = Grammar::new();
    other.add_rule("Bool", Expr::lit(true)).unwrap();
    g.merge(&other).unwrap();
    assert!(!g.is_terminal(r(12)));
    assert_invariants(&g);

    g.compact();
    assert_invariants(&g);
}

#[test]
fn probability_normalization() {
    let mut g = Grammar::probabilistic();
    for (i, p) in [3.0, 1.0, 0.5, 7.25].into_iter().enumerate() {
        g.add_rule_with_probability(p, "Real", Expr::int(i as i64)).unwrap();
    }
    g.add_rule_with_probability(10.0, "Bool", Expr::lit(true)).unwrap();
    g.add_rule_with_probability(0.1, "Bool", Expr::lit(false)).unwrap();
    g.normalize();

    for ty in g.nonterminals() {
        let total: f64 = g.rules_of_type(ty.name()).unwrap().iter().map(|&r| g.probability(r)).sum();
        assert!((total - 1.0).abs() < 1e-9, "{} sums to {}", ty, total);
    }
}

#[test]
fn round_trip() {
    let g = nine_literals();
    let plus = |a, b| Expr::call("+", [a, b]);
    for expr in [
        Expr::int(4),
        plus(Expr::int(1), Expr::int(2)),
        plus(plus(Expr::int(9), Expr::int(8)), plus(Expr::int(7), plus(Expr::int(6), Expr::int(5)))),
    ] {
        let tree = g.from_expression(&expr, "Real").unwrap();
        assert!(g.is_complete(&tree));
        assert_eq!(g.to_expression(&tree), expr);
    }
}

#[test]
fn scenario_comes_after() {
    let mut g = nine_literals();
    g.add_constraint(Constraint::comes_after(r(1), rule_ids([9]))).unwrap();

    let tree = Node::new(r(10), vec![Node::constrained_hole(BitSet::from_range(1, 9)), Node::leaf(2)]);
    assert_eq!(g.legal_domain(&tree, &[1]).unwrap(), BitSet::from_range(2, 9));
}

#[test]
fn scenario_ordered() {
    let mut g = nine_literals();
    g.add_constraint(Constraint::ordered(rule_ids([2, 1]))).unwrap();

    let tree = Node::new(r(10), vec![Node::leaf(3), Node::constrained_hole(BitSet::from_range(1, 9))]);
    assert_eq!(g.legal_domain(&tree, &[2]).unwrap(), BitSet::from_range(2, 9));
}

#[test]
fn scenario_forbidden() {
    let mut g = nine_literals();
    g.add_constraint(Constraint::forbidden(rule_ids([10, 1]))).unwrap();

    let tree = Node::new(r(10), vec![Node::constrained_hole(BitSet::from_range(1, 9)), Node::leaf(2)]);
    assert_eq!(g.legal_domain(&tree, &[1]).unwrap(), BitSet::from_range(2, 9));
}

#[test]
fn all_constraints_apply() {
    let mut g = nine_literals();
    g.add_constraint(Constraint::comes_after(r(1), rule_ids([9]))).unwrap();
    g.add_constraint(Constraint::forbidden(rule_ids([10, 5]))).unwrap();
    g.add_constraint(Constraint::forbidden(rule_ids([10, 10]))).unwrap();

    let tree = Node::new(r(10), vec![Node::hole(BitSet::from_range(1, 10)), Node::leaf(2)]);
    assert_eq!(
        g.legal_domain(&tree, &[1]).unwrap(),
        BitSet::from_rules(rule_ids([2, 3, 4, 6, 7, 8, 9]))
    );
}

#[test]
fn propagation_is_monotone() {
    let constraints = [
        Constraint::comes_after(r(1), rule_ids([9])),
        Constraint::comes_after(r(4), rule_ids([10, 10])),
        Constraint::ordered(rule_ids([2, 1])),
        Constraint::ordered(rule_ids([3, 5, 7])),
        Constraint::forbidden(rule_ids([10, 1])),
        Constraint::forbidden(rule_ids([10, 10, 4])),
    ];
    let trees = [
        Node::hole(BitSet::from_range(1, 10)),
        Node::new(r(10), vec![Node::leaf(3), Node::hole(BitSet::from_range(1, 10))]),
        Node::new(
            r(10),
            vec![Node::new(r(10), vec![Node::leaf(5), Node::hole(BitSet::from_range(1, 10))]), Node::leaf(3)],
        ),
    ];
    let domains = [
        BitSet::from_range(1, 10),
        BitSet::from_rules(rule_ids([1, 4, 7])),
        BitSet::empty(),
    ];

    for tree in &trees {
        for path in tree.hole_paths() {
            let context = Context::new(tree, &path);
            for c in &constraints {
                for domain in &domains {
                    let narrowed = c.propagate(&context, domain);
                    assert!(narrowed.is_subset(domain), "{} at {:?} grew {}", c, path, domain);
                }
            }
        }
    }
}

#[test]
fn completeness() {
    let g = nine_literals();
    let complete = Node::new(r(10), vec![Node::leaf(1), Node::new(r(10), vec![Node::leaf(2), Node::leaf(3)])]);
    assert!(g.is_complete(&complete));

    let partial = Node::new(
        r(10),
        vec![Node::leaf(1), Node::new(r(10), vec![Node::leaf(2), Node::hole(BitSet::from_range(1, 9))])],
    );
    assert!(!g.is_complete(&partial));
    assert!(!g.is_complete(&Node::hole(BitSet::from_range(1, 1))));
}

#[test]
fn tombstone_and_compact() {
    let mut g = nine_literals();
    g.remove_rule(r(3)).unwrap();
    g.remove_rule(r(7)).unwrap();
    assert_eq!(g.len(), 10);
    assert_eq!(g.num_rules(), 8);

    let mapping = g.compact();
    assert_eq!(mapping[2], None);
    assert_eq!(mapping[9], Some(r(8)));
    assert_eq!(g.len(), 8);
    assert_eq!(g.num_rules(), 8);
    assert_eq!(g.rule_ids().collect::<Vec<_>>(), rule_ids(1..=8));
    assert!(g.rule_ids().all(|r| !g.is_removed(r)));
    assert_eq!(g.rule(r(8)), &Expr::call("+", [Expr::sym("Real"), Expr::sym("Real")]));
    assert_eq!(g.domain("Real").unwrap(), &BitSet::from_range(1, 8));
    assert_invariants(&g);
}
