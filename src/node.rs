//! Derivation trees.
//!
//! A [`Node`] is a (possibly partial) derivation: rule applications with
//! ordered children, terminal rules carrying a pre-evaluated literal, and
//! [`Hole`]s that still have to be filled. Trees are plain owned values:
//! cloning a tree forks a search branch.

use std::fmt;

use crate::bitset::BitSet;
use crate::expr::Value;
use crate::types::RuleId;

/// Why a hole is open, which decides its contribution to a tree's probability.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum HoleKind {
    /// A placeholder nobody has looked at yet. Its domain is the full domain
    /// of the slot's type and it contributes nothing (log-probability 0) unless
    /// the domain is a single rule.
    Unexpanded,
    /// A choice narrowed to a real set of candidates. With more than one
    /// candidate the probability of the tree is undetermined.
    Constrained,
}

#[derive(Debug, Clone)]
pub struct Hole {
    pub domain: BitSet,
    pub kind: HoleKind,
}

impl Hole {
    pub fn new(domain: BitSet, kind: HoleKind) -> Self {
        Self { domain, kind }
    }

    pub fn unexpanded(domain: BitSet) -> Self {
        Self::new(domain, HoleKind::Unexpanded)
    }

    pub fn constrained(domain: BitSet) -> Self {
        Self::new(domain, HoleKind::Constrained)
    }

    /// The single admissible rule, if the choice is already determined.
    pub fn determined(&self) -> Option<RuleId> {
        if self.domain.is_singleton() {
            self.domain.first_rule()
        } else {
            None
        }
    }

    /// Returns true if no rule can fill this hole.
    pub fn is_unsatisfiable(&self) -> bool {
        self.domain.is_empty()
    }

    /// Restricts the domain to `allowed`. A narrowed hole is `Constrained`.
    pub fn narrow(&mut self, allowed: &BitSet) {
        self.domain.intersect_with(allowed);
        self.kind = HoleKind::Constrained;
    }
}

#[derive(Debug, Clone)]
pub enum Node {
    /// A rule application; `children.len()` equals the rule's arity.
    Rule { rule: RuleId, children: Vec<Node> },
    /// An evaluate-immediately terminal together with its literal.
    Immediate { rule: RuleId, value: Value },
    /// An open choice.
    Hole(Hole),
}

impl Node {
    pub fn new(rule: RuleId, children: Vec<Node>) -> Self {
        Node::Rule { rule, children }
    }

    /// A rule application without children, from a raw rule id.
    pub fn leaf(id: u32) -> Self {
        Node::Rule {
            rule: RuleId::new(id),
            children: Vec::new(),
        }
    }

    pub fn immediate(rule: RuleId, value: impl Into<Value>) -> Self {
        Node::Immediate {
            rule,
            value: value.into(),
        }
    }

    pub fn hole(domain: BitSet) -> Self {
        Node::Hole(Hole::unexpanded(domain))
    }

    pub fn constrained_hole(domain: BitSet) -> Self {
        Node::Hole(Hole::constrained(domain))
    }

    /// The rule id of a filled node.
    pub fn rule(&self) -> Option<RuleId> {
        match self {
            Node::Rule { rule, .. } | Node::Immediate { rule, .. } => Some(*rule),
            Node::Hole(_) => None,
        }
    }

    pub fn children(&self) -> &[Node] {
        match self {
            Node::Rule { children, .. } => children,
            _ => &[],
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<Node>> {
        match self {
            Node::Rule { children, .. } => Some(children),
            _ => None,
        }
    }

    pub fn as_hole(&self) -> Option<&Hole> {
        match self {
            Node::Hole(hole) => Some(hole),
            _ => None,
        }
    }

    pub fn as_hole_mut(&mut self) -> Option<&mut Hole> {
        match self {
            Node::Hole(hole) => Some(hole),
            _ => None,
        }
    }

    pub fn is_hole(&self) -> bool {
        matches!(self, Node::Hole(_))
    }

    /// Returns true if any reachable node is a hole.
    pub fn contains_hole(&self) -> bool {
        match self {
            Node::Hole(_) => true,
            Node::Immediate { .. } => false,
            Node::Rule { children, .. } => children.iter().any(Node::contains_hole),
        }
    }

    /// Number of nodes in the tree, holes included.
    pub fn size(&self) -> usize {
        1 + self.children().iter().map(Node::size).sum::<usize>()
    }

    /// Length of the longest root-to-leaf chain (a single node has depth 1).
    pub fn depth(&self) -> usize {
        1 + self.children().iter().map(Node::depth).max().unwrap_or(0)
    }
}

/// Structural equality.
///
/// Two filled nodes are equal when they apply the same rule to equal
/// children. A hole is never equal to anything, itself included: its eventual
/// filling is unknown. As a consequence `Node` is `PartialEq` but not `Eq`.
impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Node::Rule { rule: r1, children: c1 }, Node::Rule { rule: r2, children: c2 }) => r1 == r2 && c1 == c2,
            (Node::Immediate { rule: r1, value: v1 }, Node::Immediate { rule: r2, value: v2 }) => r1 == r2 && v1 == v2,
            _ => false,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Rule { rule, children } => {
                write!(f, "{}", rule)?;
                if !children.is_empty() {
                    write!(f, "{{")?;
                    for (i, child) in children.iter().enumerate() {
                        if i > 0 {
                            write!(f, ",")?;
                        }
                        write!(f, "{}", child)?;
                    }
                    write!(f, "}}")?;
                }
                Ok(())
            }
            Node::Immediate { rule, value } => write!(f, "{}={}", rule, value),
            Node::Hole(hole) => write!(f, "?{}", hole.domain),
        }
    }
}
