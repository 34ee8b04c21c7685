//! Counting and sampling complete derivations of bounded depth.

use std::collections::{HashMap, HashSet};

use log::debug;
use num_bigint::BigUint;

use crate::error::{GrammarError, Result};
use crate::grammar::Grammar;
use crate::node::Node;
use crate::types::Nonterminal;

type Memo = HashMap<(Nonterminal, usize), BigUint>;

impl Grammar {
    /// Number of complete trees deriving `ty` whose depth is at most `max_depth`.
    ///
    /// An evaluate-immediately rule counts once, whatever literal it yields.
    /// A type whose count stays zero for every depth is unproductive.
    pub fn count_derivations(&self, ty: &str, max_depth: usize) -> Result<BigUint> {
        if !self.has_type(ty) {
            return Err(GrammarError::UnknownType(Nonterminal::new(ty)));
        }
        let mut memo = HashMap::new();
        let count = self._count_derivations(&Nonterminal::new(ty), max_depth, &mut memo);
        debug!("count_derivations({}, {}) = {} ({} memo entries)", ty, max_depth, count, memo.len());
        Ok(count)
    }

    fn _count_derivations(&self, ty: &Nonterminal, depth: usize, memo: &mut Memo) -> BigUint {
        if depth == 0 {
            return BigUint::ZERO;
        }
        if let Some(count) = memo.get(&(ty.clone(), depth)) {
            return count.clone();
        }

        let mut count = BigUint::ZERO;
        for &rule in self.rules_of_type(ty.name()).unwrap_or(&[]) {
            let mut product = BigUint::from(1u32);
            for child in self.child_types(rule) {
                product *= self._count_derivations(child, depth - 1, memo);
                if product == BigUint::ZERO {
                    break;
                }
            }
            count += product;
        }

        memo.insert((ty.clone(), depth), count.clone());
        count
    }

    /// Returns one complete tree deriving `ty` of depth at most `max_depth`,
    /// preferring lower rule ids, or `None` if there is none.
    ///
    /// Evaluate-immediately rules are never chosen, since they need a value.
    pub fn one_derivation(&self, ty: &str, max_depth: usize) -> Result<Option<Node>> {
        if !self.has_type(ty) {
            return Err(GrammarError::UnknownType(Nonterminal::new(ty)));
        }
        let mut dead = HashSet::new();
        Ok(self._one_derivation(&Nonterminal::new(ty), max_depth, &mut dead))
    }

    fn _one_derivation(&self, ty: &Nonterminal, depth: usize, dead: &mut HashSet<(Nonterminal, usize)>) -> Option<Node> {
        if depth == 0 || dead.contains(&(ty.clone(), depth)) {
            return None;
        }
        for &rule in self.rules_of_type(ty.name()).unwrap_or(&[]) {
            if self.is_eval(rule) {
                continue;
            }
            let children: Option<Vec<Node>> = self
                .child_types(rule)
                .iter()
                .map(|child| self._one_derivation(child, depth - 1, dead))
                .collect();
            if let Some(children) = children {
                return Some(Node::new(rule, children));
            }
        }
        dead.insert((ty.clone(), depth));
        None
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::expr::Expr;
    use crate::types::RuleId;

    fn binop(op: &str) -> Expr {
        Expr::call(op, [Expr::sym("Real"), Expr::sym("Real")])
    }

    /// Real = 1 | x | Real + Real
    fn small() -> Grammar {
        let mut g = Grammar::new();
        g.add_rules("Real", [Expr::int(1), Expr::sym("x"), binop("+")]).unwrap();
        g
    }

    #[test]
    fn test_count_terminals_only() {
        let g = small();
        assert_eq!(g.count_derivations("Real", 0).unwrap(), BigUint::ZERO);
        assert_eq!(g.count_derivations("Real", 1).unwrap(), BigUint::from(2u32));
    }

    #[test]
    fn test_count_grows_with_depth() {
        let g = small();
        // c(d) = 2 + c(d-1)^2
        assert_eq!(g.count_derivations("Real", 2).unwrap(), BigUint::from(6u32));
        assert_eq!(g.count_derivations("Real", 3).unwrap(), BigUint::from(38u32));
        assert_eq!(g.count_derivations("Real", 4).unwrap(), BigUint::from(1446u32));
        // Far past u64.
        assert!(g.count_derivations("Real", 12).unwrap() > BigUint::from(u64::MAX));
    }

    #[test]
    fn test_count_unknown_type() {
        let g = small();
        assert!(matches!(g.count_derivations("Bool", 3), Err(GrammarError::UnknownType(_))));
    }

    #[test]
    fn test_unproductive_type() {
        let mut g = Grammar::new();
        g.add_rule("Loop", Expr::call("f", [Expr::sym("Loop")])).unwrap();
        g.add_rule("Real", Expr::call("g", [Expr::sym("Loop")])).unwrap();
        g.add_rule("Real", Expr::int(0)).unwrap();

        assert_eq!(g.count_derivations("Loop", 10).unwrap(), BigUint::ZERO);
        assert_eq!(g.count_derivations("Real", 10).unwrap(), BigUint::from(1u32));
        assert_eq!(g.one_derivation("Loop", 10).unwrap(), None);
        assert_eq!(g.one_derivation("Real", 10).unwrap(), Some(Node::leaf(3)));
    }

    #[test]
    fn test_one_derivation() {
        let mut g = Grammar::new();
        g.add_rule("Real", Expr::call("neg", [Expr::sym("Int")])).unwrap();
        g.add_rule("Int", Expr::int(0)).unwrap();

        assert_eq!(g.one_derivation("Real", 1).unwrap(), None);
        let tree = g.one_derivation("Real", 2).unwrap().unwrap();
        assert_eq!(tree, Node::new(RuleId::new(1), vec![Node::leaf(2)]));
        assert!(g.is_complete(&tree));
    }
}
