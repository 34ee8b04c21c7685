//! Context-sensitive constraints.
//!
//! A constraint narrows the domain of a hole given where the hole sits in a
//! partial derivation. Propagation is a pure filter: the result is always a
//! subset of the input domain.
//!
//! # Example
//!
//! ```
//! use grammar_rs::bitset::BitSet;
//! use grammar_rs::constraint::{Constraint, Context, Propagate};
//! use grammar_rs::node::Node;
//! use grammar_rs::types::{rule_ids, RuleId};
//!
//! // Rule 1 may not be used directly below rule 10.
//! let forbidden = Constraint::forbidden(rule_ids([10, 1]));
//!
//! let tree = Node::new(RuleId::new(10), vec![Node::hole(BitSet::from_range(1, 9))]);
//! let context = Context::new(&tree, &[1]);
//!
//! let narrowed = forbidden.propagate(&context, &BitSet::from_range(1, 9));
//! assert_eq!(narrowed, BitSet::from_range(2, 9));
//! ```

use std::fmt;

use log::debug;

use crate::bitset::BitSet;
use crate::node::Node;
use crate::types::RuleId;
use crate::utils::{contains_run, is_subsequence};

/// Where the hole being filled sits: the whole tree plus the hole's path.
#[derive(Debug, Copy, Clone)]
pub struct Context<'a> {
    pub tree: &'a Node,
    pub path: &'a [usize],
}

impl<'a> Context<'a> {
    pub fn new(tree: &'a Node, path: &'a [usize]) -> Self {
        Self { tree, path }
    }

    /// Rule ids from the root down to the hole's parent.
    pub fn ancestors(&self) -> Vec<RuleId> {
        match self.path.split_last() {
            Some((_, parent)) => self.tree.rule_sequence(parent),
            None => Vec::new(),
        }
    }
}

pub trait Propagate {
    /// Narrows `domain` for the hole described by `context`.
    ///
    /// The returned set is always a subset of `domain`.
    fn propagate(&self, context: &Context<'_>, domain: &BitSet) -> BitSet;
}

/// `rule` is only allowed below ancestors that contain `predecessors` in
/// order (gaps allowed).
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct ComesAfter {
    pub rule: RuleId,
    pub predecessors: Vec<RuleId>,
}

impl Propagate for ComesAfter {
    fn propagate(&self, context: &Context<'_>, domain: &BitSet) -> BitSet {
        let mut result = domain.clone();
        if !domain.contains_rule(self.rule) {
            return result;
        }
        let ancestors = context.ancestors();
        if !is_subsequence(&self.predecessors, &ancestors) {
            debug!("{}: {:?} not among ancestors {:?}", self, self.predecessors, ancestors);
            result.remove_rule(self.rule);
        }
        result
    }
}

/// Rules of `order` must appear left to right in that order: `order[k]` is
/// only allowed once `order[..k]` already occurs to the left of the hole.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Ordered {
    pub order: Vec<RuleId>,
}

impl Propagate for Ordered {
    fn propagate(&self, context: &Context<'_>, domain: &BitSet) -> BitSet {
        let mut result = domain.clone();
        let left = context.tree.rules_on_left(context.path);
        // Length of the run of `order` already present, from the start.
        let satisfied = self.order.iter().take_while(|&&rule| left.contains(&rule)).count();
        // The next rule in the order stays eligible; everything after it goes.
        for &rule in self.order.iter().skip(satisfied + 1) {
            result.remove_rule(rule);
        }
        result
    }
}

/// The last rule of `sequence` may not directly follow the contiguous chain
/// of ancestors `sequence[..n-1]`.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Forbidden {
    pub sequence: Vec<RuleId>,
}

impl Propagate for Forbidden {
    fn propagate(&self, context: &Context<'_>, domain: &BitSet) -> BitSet {
        let mut result = domain.clone();
        let Some((&last, prefix)) = self.sequence.split_last() else {
            return result;
        };
        if !domain.contains_rule(last) {
            return result;
        }
        let ancestors = context.ancestors();
        if contains_run(prefix, &ancestors) {
            debug!("{}: matched ancestors {:?}", self, ancestors);
            result.remove_rule(last);
        }
        result
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum Constraint {
    ComesAfter(ComesAfter),
    Ordered(Ordered),
    Forbidden(Forbidden),
}

impl Constraint {
    pub fn comes_after(rule: RuleId, predecessors: Vec<RuleId>) -> Self {
        Constraint::ComesAfter(ComesAfter { rule, predecessors })
    }

    pub fn ordered(order: Vec<RuleId>) -> Self {
        Constraint::Ordered(Ordered { order })
    }

    pub fn forbidden(sequence: Vec<RuleId>) -> Self {
        Constraint::Forbidden(Forbidden { sequence })
    }

    /// Every rule id this constraint mentions.
    pub fn rules(&self) -> Vec<RuleId> {
        match self {
            Constraint::ComesAfter(c) => std::iter::once(c.rule).chain(c.predecessors.iter().copied()).collect(),
            Constraint::Ordered(c) => c.order.clone(),
            Constraint::Forbidden(c) => c.sequence.clone(),
        }
    }

    /// Returns a copy with every rule id passed through `f`.
    pub fn map_rules(&self, mut f: impl FnMut(RuleId) -> RuleId) -> Self {
        let mut map = |rules: &[RuleId]| rules.iter().map(|&r| f(r)).collect::<Vec<_>>();
        match self {
            Constraint::ComesAfter(c) => {
                let predecessors = map(&c.predecessors);
                let rule = map(&[c.rule])[0];
                Constraint::comes_after(rule, predecessors)
            }
            Constraint::Ordered(c) => Constraint::ordered(map(&c.order)),
            Constraint::Forbidden(c) => Constraint::forbidden(map(&c.sequence)),
        }
    }

    /// Shape check independent of any grammar.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Constraint::Forbidden(c) if c.sequence.is_empty() => Err(format!("{} has an empty sequence", self)),
            Constraint::Ordered(c) if c.order.is_empty() => Err(format!("{} has an empty order", self)),
            _ => Ok(()),
        }
    }
}

impl Propagate for Constraint {
    fn propagate(&self, context: &Context<'_>, domain: &BitSet) -> BitSet {
        match self {
            Constraint::ComesAfter(c) => c.propagate(context, domain),
            Constraint::Ordered(c) => c.propagate(context, domain),
            Constraint::Forbidden(c) => c.propagate(context, domain),
        }
    }
}

/// Applies every constraint in turn; the result is the intersection of all
/// individual narrowings.
pub fn propagate_all<'c>(
    constraints: impl IntoIterator<Item = &'c Constraint>,
    context: &Context<'_>,
    domain: &BitSet,
) -> BitSet {
    constraints
        .into_iter()
        .fold(domain.clone(), |acc, c| c.propagate(context, &acc))
}

fn fmt_rules(f: &mut fmt::Formatter<'_>, rules: &[RuleId]) -> fmt::Result {
    write!(f, "[")?;
    for (i, rule) in rules.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", rule)?;
    }
    write!(f, "]")
}

impl fmt::Display for ComesAfter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComesAfter({}, ", self.rule)?;
        fmt_rules(f, &self.predecessors)?;
        write!(f, ")")
    }
}

impl fmt::Display for Ordered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ordered(")?;
        fmt_rules(f, &self.order)?;
        write!(f, ")")
    }
}

impl fmt::Display for Forbidden {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Forbidden(")?;
        fmt_rules(f, &self.sequence)?;
        write!(f, ")")
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::ComesAfter(c) => fmt::Display::fmt(c, f),
            Constraint::Ordered(c) => fmt::Display::fmt(c, f),
            Constraint::Forbidden(c) => fmt::Display::fmt(c, f),
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::types::rule_ids;

    fn r(id: u32) -> RuleId {
        RuleId::new(id)
    }

    fn full() -> BitSet {
        BitSet::from_range(1, 9)
    }

    /// 10{?} with the hole at [1].
    fn under_ten() -> Node {
        Node::new(r(10), vec![Node::hole(full())])
    }

    #[test]
    fn test_comes_after_removes_rule_without_predecessor() {
        let c = Constraint::comes_after(r(1), rule_ids([9]));
        let tree = under_ten();
        let ctx = Context::new(&tree, &[1]);
        assert_eq!(c.propagate(&ctx, &full()), BitSet::from_range(2, 9));
    }

    #[test]
    fn test_comes_after_keeps_rule_with_predecessors() {
        // 9{5{?}}: ancestors of [1, 1] are [9, 5]
        let tree = Node::new(r(9), vec![Node::new(r(5), vec![Node::hole(full())])]);
        let ctx = Context::new(&tree, &[1, 1]);

        let c = Constraint::comes_after(r(1), rule_ids([9]));
        assert_eq!(c.propagate(&ctx, &full()), full());

        // Gapped predecessors are fine, out-of-order ones are not.
        let c = Constraint::comes_after(r(1), rule_ids([9, 5]));
        assert_eq!(c.propagate(&ctx, &full()), full());
        let c = Constraint::comes_after(r(1), rule_ids([5, 9]));
        assert_eq!(c.propagate(&ctx, &full()), BitSet::from_range(2, 9));
    }

    #[test]
    fn test_comes_after_ignores_domain_without_rule() {
        let c = Constraint::comes_after(r(1), rule_ids([9]));
        let tree = under_ten();
        let ctx = Context::new(&tree, &[1]);
        let domain = BitSet::from_range(2, 4);
        assert_eq!(c.propagate(&ctx, &domain), domain);
    }

    #[test]
    fn test_ordered() {
        let c = Constraint::ordered(rule_ids([2, 1]));
        let tree = Node::new(r(10), vec![Node::leaf(3)]);
        let ctx = Context::new(&tree, &[2]);
        assert_eq!(c.propagate(&ctx, &full()), BitSet::from_range(2, 9));
    }

    #[test]
    fn test_ordered_releases_next_rule() {
        let c = Constraint::ordered(rule_ids([2, 1, 3]));
        // 10{2, ?}: prefix [2] is satisfied, so 1 is allowed and 3 is not.
        let tree = Node::new(r(10), vec![Node::leaf(2), Node::hole(full())]);
        let ctx = Context::new(&tree, &[2]);
        let expected: BitSet = [1, 2, 4, 5, 6, 7, 8, 9].into_iter().collect();
        assert_eq!(c.propagate(&ctx, &full()), expected);
    }

    #[test]
    fn test_ordered_prefix_is_a_run() {
        let c = Constraint::ordered(rule_ids([2, 1, 3]));
        // 10{1, ?}: rule 1 is present but 2 is not, so nothing is satisfied.
        let tree = Node::new(r(10), vec![Node::leaf(1), Node::hole(full())]);
        let ctx = Context::new(&tree, &[2]);
        let expected: BitSet = [2, 4, 5, 6, 7, 8, 9].into_iter().collect();
        assert_eq!(c.propagate(&ctx, &full()), expected);
    }

    #[test]
    fn test_forbidden() {
        let c = Constraint::forbidden(rule_ids([10, 1]));
        let tree = under_ten();
        let ctx = Context::new(&tree, &[1]);
        assert_eq!(c.propagate(&ctx, &full()), BitSet::from_range(2, 9));
    }

    #[test]
    fn test_forbidden_requires_contiguous_match() {
        // 10{5{?}}: ancestors [10, 5] do not contain the run [10, 6].
        let tree = Node::new(r(10), vec![Node::new(r(5), vec![Node::hole(full())])]);
        let ctx = Context::new(&tree, &[1, 1]);
        let c = Constraint::forbidden(rule_ids([10, 6, 1]));
        assert_eq!(c.propagate(&ctx, &full()), full());

        let c = Constraint::forbidden(rule_ids([10, 5, 1]));
        assert_eq!(c.propagate(&ctx, &full()), BitSet::from_range(2, 9));
    }

    #[test]
    fn test_root_hole_has_no_ancestors() {
        let tree = Node::hole(full());
        let ctx = Context::new(&tree, &[]);
        assert!(ctx.ancestors().is_empty());

        let c = Constraint::comes_after(r(1), rule_ids([9]));
        assert_eq!(c.propagate(&ctx, &full()), BitSet::from_range(2, 9));
        let c = Constraint::forbidden(rule_ids([1]));
        assert_eq!(c.propagate(&ctx, &full()), BitSet::from_range(2, 9));
    }

    #[test]
    fn test_propagation_is_monotone() {
        let tree = Node::new(
            r(10),
            vec![Node::leaf(2), Node::new(r(9), vec![Node::hole(full()), Node::leaf(4)])],
        );
        let constraints = [
            Constraint::comes_after(r(1), rule_ids([9])),
            Constraint::comes_after(r(3), rule_ids([7])),
            Constraint::ordered(rule_ids([2, 1, 3, 4])),
            Constraint::ordered(rule_ids([5, 6])),
            Constraint::forbidden(rule_ids([10, 9, 2])),
            Constraint::forbidden(rule_ids([8])),
        ];
        let domains = [full(), BitSet::from_range(3, 5), BitSet::empty(), [1, 6, 8].into_iter().collect()];
        for path in [&[2, 1][..], &[2][..], &[1][..]] {
            let ctx = Context::new(&tree, path);
            for domain in &domains {
                for c in &constraints {
                    assert!(c.propagate(&ctx, domain).is_subset(domain), "{} on {:?}", c, path);
                }
                assert!(propagate_all(&constraints, &ctx, domain).is_subset(domain));
            }
        }
    }

    #[test]
    fn test_propagate_all_intersects() {
        let tree = under_ten();
        let ctx = Context::new(&tree, &[1]);
        let constraints = [
            Constraint::forbidden(rule_ids([10, 1])),
            Constraint::comes_after(r(2), rule_ids([7])),
        ];
        assert_eq!(propagate_all(&constraints, &ctx, &full()), BitSet::from_range(3, 9));
    }

    #[test]
    fn test_map_rules_and_validate() {
        let c = Constraint::comes_after(r(1), rule_ids([2, 3]));
        let shifted = c.map_rules(|rule| RuleId::new(rule.id() + 10));
        assert_eq!(shifted, Constraint::comes_after(r(11), rule_ids([12, 13])));
        assert_eq!(shifted.to_string(), "ComesAfter(11, [12, 13])");

        assert!(Constraint::forbidden(vec![]).validate().is_err());
        assert!(Constraint::ordered(vec![]).validate().is_err());
        assert!(c.validate().is_ok());
    }
}
