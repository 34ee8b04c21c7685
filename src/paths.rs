//! Path-addressed navigation and rewriting of derivation trees.
//!
//! A path is a sequence of 1-based child indices from the root: `[]` is the
//! root, `[2, 1]` is the first child of the root's second child. Paths are the
//! only way constraints and rewrites address nodes, since node references do
//! not survive a rewrite.
//!
//! # Example
//!
//! ```
//! use grammar_rs::bitset::BitSet;
//! use grammar_rs::node::Node;
//! use grammar_rs::types::RuleId;
//!
//! // 10{3, ?{1, 2}}
//! let tree = Node::new(RuleId::new(10), vec![Node::leaf(3), Node::hole(BitSet::from_range(1, 2))]);
//!
//! assert_eq!(tree.node_at(&[1]), Some(&Node::leaf(3)));
//! assert_eq!(tree.hole_paths().collect::<Vec<_>>(), vec![vec![2]]);
//! assert_eq!(tree.rule_sequence(&[1]), vec![RuleId::new(10), RuleId::new(3)]);
//! ```

use std::collections::HashSet;

use crate::error::{GrammarError, Result};
use crate::node::Node;
use crate::types::RuleId;

impl Node {
    fn child_at(&self, index: usize, path: &[usize]) -> &Node {
        let children = self.children();
        assert!(
            index >= 1 && index <= children.len(),
            "Child index {} out of bounds (node has {} children) in path {:?}",
            index,
            children.len(),
            path
        );
        &children[index - 1]
    }

    /// Returns the node at `path`, or `None` if the descent reaches a hole
    /// before the end of the path.
    ///
    /// # Panics
    ///
    /// Panics if a child index is 0 or past the children of a filled node.
    pub fn node_at(&self, path: &[usize]) -> Option<&Node> {
        let mut node = self;
        for &index in path {
            if node.is_hole() {
                return None;
            }
            node = node.child_at(index, path);
        }
        Some(node)
    }

    /// Mutable counterpart of [`node_at`][Node::node_at].
    pub fn node_at_mut(&mut self, path: &[usize]) -> Option<&mut Node> {
        let mut node = self;
        for &index in path {
            let len = node.children().len();
            node = match node {
                Node::Hole(_) => return None,
                Node::Rule { children, .. } if index >= 1 && index <= len => &mut children[index - 1],
                _ => panic!(
                    "Child index {} out of bounds (node has {} children) in path {:?}",
                    index, len, path
                ),
            };
        }
        Some(node)
    }

    /// Checks that every index of `path` addresses an existing child of a
    /// filled node.
    pub fn check_path(&self, path: &[usize]) -> Result<()> {
        let mut node = self;
        for &index in path {
            if node.is_hole() {
                return Err(GrammarError::InvalidPath {
                    path: path.to_vec(),
                    reason: "descends through a hole",
                });
            }
            node = match index.checked_sub(1).and_then(|i| node.children().get(i)) {
                Some(child) => child,
                None => {
                    return Err(GrammarError::InvalidPath {
                        path: path.to_vec(),
                        reason: "child index out of bounds",
                    })
                }
            };
        }
        Ok(())
    }

    /// Replaces the node at `path` with `subtree` and returns the old node.
    ///
    /// The root cannot be swapped: an empty path is rejected, the caller
    /// replaces the whole value instead. On error the tree is unchanged.
    pub fn swap(&mut self, path: &[usize], subtree: Node) -> Result<Node> {
        if path.is_empty() {
            return Err(GrammarError::EmptyPath);
        }
        self.check_path(path)?;
        match self.node_at_mut(path) {
            Some(slot) => Ok(std::mem::replace(slot, subtree)),
            None => Err(GrammarError::InvalidPath {
                path: path.to_vec(),
                reason: "descends through a hole",
            }),
        }
    }

    /// Rule ids met walking from the root along `path`, the root included.
    ///
    /// The walk stops early, returning what it has so far, when it meets a
    /// hole, a node without children, or a child that is not built yet. A
    /// hole at the root yields an empty sequence.
    pub fn rule_sequence(&self, path: &[usize]) -> Vec<RuleId> {
        let mut sequence = Vec::with_capacity(path.len() + 1);
        let mut node = self;
        let mut rest = path;
        loop {
            match node.rule() {
                Some(rule) => sequence.push(rule),
                None => break,
            }
            let Some((&index, tail)) = rest.split_first() else {
                break;
            };
            match index.checked_sub(1).and_then(|i| node.children().get(i)) {
                Some(child) => node = child,
                None => break,
            }
            rest = tail;
        }
        sequence
    }

    /// Rule ids of every filled node in the tree.
    pub fn rules(&self) -> HashSet<RuleId> {
        self.rules_on_left(&[])
    }

    /// Rules to the left of `path`: at every level of the descent, the rule
    /// of the node itself plus all rules in the subtrees of its earlier
    /// siblings. An empty path collects the whole subtree.
    pub fn rules_on_left(&self, path: &[usize]) -> HashSet<RuleId> {
        let mut out = HashSet::new();
        self.collect_rules_on_left(path, &mut out);
        out
    }

    fn collect_rules_on_left(&self, path: &[usize], out: &mut HashSet<RuleId>) {
        let children = match self {
            Node::Hole(_) => return,
            Node::Immediate { rule, .. } => {
                out.insert(*rule);
                return;
            }
            Node::Rule { rule, children } => {
                out.insert(*rule);
                children
            }
        };
        match path.split_first() {
            None => {
                for child in children {
                    child.collect_rules_on_left(&[], out);
                }
            }
            Some((&index, rest)) => {
                let before = index.saturating_sub(1).min(children.len());
                for child in &children[..before] {
                    child.collect_rules_on_left(&[], out);
                }
                if let Some(child) = index.checked_sub(1).and_then(|i| children.get(i)) {
                    child.collect_rules_on_left(rest, out);
                }
            }
        }
    }

    /// Returns the path of `target`, compared by identity, within this tree.
    ///
    /// `target` must be a reference into this very tree; an equal subtree
    /// elsewhere is not found.
    pub fn path_of(&self, target: &Node) -> Option<Vec<usize>> {
        if std::ptr::eq(self, target) {
            return Some(Vec::new());
        }
        for (i, child) in self.children().iter().enumerate() {
            if let Some(mut path) = child.path_of(target) {
                path.insert(0, i + 1);
                return Some(path);
            }
        }
        None
    }

    /// Returns an iterator over the paths of all holes, left to right.
    pub fn hole_paths(&self) -> HolePaths<'_> {
        HolePaths::new(self)
    }
}

/// Frame on the exploration stack.
#[derive(Debug)]
struct StackFrame<'a> {
    node: &'a Node,
    /// Index of the next child to explore.
    next_child: usize,
}

/// An iterator over the paths of the holes in a tree.
///
/// Created by [`Node::hole_paths()`]. Uses depth-first traversal with
/// backtracking; the current path is kept in a single vector that grows and
/// shrinks as we go, and is only cloned when a hole is yielded.
pub struct HolePaths<'a> {
    stack: Vec<StackFrame<'a>>,
    current_path: Vec<usize>,
}

impl<'a> HolePaths<'a> {
    pub fn new(root: &'a Node) -> Self {
        HolePaths {
            stack: vec![StackFrame { node: root, next_child: 0 }],
            current_path: Vec::new(),
        }
    }

    fn backtrack(&mut self) {
        self.stack.pop();
        // Pop the index that led us here (unless we're at root)
        if !self.stack.is_empty() {
            self.current_path.pop();
        }
    }
}

impl Iterator for HolePaths<'_> {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let frame = self.stack.last_mut()?;
            let node = frame.node;

            if node.is_hole() {
                let result = self.current_path.clone();
                self.backtrack();
                return Some(result);
            }

            let children = node.children();
            if frame.next_child < children.len() {
                let i = frame.next_child;
                frame.next_child += 1;
                self.current_path.push(i + 1);
                self.stack.push(StackFrame {
                    node: &children[i],
                    next_child: 0,
                });
            } else {
                self.backtrack();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::bitset::BitSet;

    fn r(id: u32) -> RuleId {
        RuleId::new(id)
    }

    fn set(ids: &[u32]) -> HashSet<RuleId> {
        ids.iter().map(|&i| r(i)).collect()
    }

    /// 1{2{4,?}, 3{5}, ?}
    fn sample() -> Node {
        Node::new(
            r(1),
            vec![
                Node::new(r(2), vec![Node::leaf(4), Node::hole(BitSet::from_range(1, 3))]),
                Node::new(r(3), vec![Node::leaf(5)]),
                Node::hole(BitSet::from_range(4, 5)),
            ],
        )
    }

    #[test]
    fn test_node_at() {
        let t = sample();
        assert_eq!(t.node_at(&[]).and_then(Node::rule), Some(r(1)));
        assert_eq!(t.node_at(&[1, 1]), Some(&Node::leaf(4)));
        assert!(t.node_at(&[1, 2]).unwrap().is_hole());
        // Descending past a hole is absent, not a failure.
        assert_eq!(t.node_at(&[3, 1]), None);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_node_at_out_of_bounds_panics() {
        sample().node_at(&[4]);
    }

    #[test]
    fn test_swap() {
        let mut t = sample();
        let old = t.swap(&[1, 2], Node::leaf(6)).unwrap();
        assert!(old.is_hole());
        assert_eq!(t.node_at(&[1, 2]), Some(&Node::leaf(6)));
    }

    #[test]
    fn test_swap_errors_leave_tree_unchanged() {
        let mut t = sample();
        let before = t.to_string();

        assert_eq!(t.swap(&[], Node::leaf(6)), Err(GrammarError::EmptyPath));
        assert!(matches!(t.swap(&[3, 1], Node::leaf(6)), Err(GrammarError::InvalidPath { .. })));
        assert!(matches!(t.swap(&[2, 7], Node::leaf(6)), Err(GrammarError::InvalidPath { .. })));
        assert!(matches!(t.swap(&[0], Node::leaf(6)), Err(GrammarError::InvalidPath { .. })));

        assert_eq!(t.to_string(), before);
    }

    #[test]
    fn test_rule_sequence() {
        let t = sample();
        assert_eq!(t.rule_sequence(&[]), vec![r(1)]);
        assert_eq!(t.rule_sequence(&[2, 1]), vec![r(1), r(3), r(5)]);
        // Stops at a hole.
        assert_eq!(t.rule_sequence(&[1, 2]), vec![r(1), r(2)]);
        // Stops at a child that is not built yet.
        assert_eq!(t.rule_sequence(&[2, 4]), vec![r(1), r(3)]);
        // A path running past a leaf still returns what was found.
        assert_eq!(t.rule_sequence(&[1, 1, 1, 1]), vec![r(1), r(2), r(4)]);
        // Hole at the root.
        assert!(Node::hole(BitSet::from_range(1, 3)).rule_sequence(&[1]).is_empty());
    }

    #[test]
    fn test_rules_on_left() {
        let t = sample();
        assert_eq!(t.rules_on_left(&[3]), set(&[1, 2, 4, 3, 5]));
        assert_eq!(t.rules_on_left(&[2, 1]), set(&[1, 2, 4, 3, 5]));
        assert_eq!(t.rules_on_left(&[1, 2]), set(&[1, 2, 4]));
        assert_eq!(t.rules_on_left(&[1]), set(&[1, 2, 4]));
        assert_eq!(t.rules(), set(&[1, 2, 3, 4, 5]));
    }

    #[test]
    fn test_rules_on_left_past_children() {
        // 10{3} at path [2]: the second child is not built yet.
        let t = Node::new(r(10), vec![Node::leaf(3)]);
        assert_eq!(t.rules_on_left(&[2]), set(&[10, 3]));
    }

    #[test]
    fn test_hole_paths() {
        let t = sample();
        let paths: Vec<_> = t.hole_paths().collect();
        assert_eq!(paths, vec![vec![1, 2], vec![3]]);

        let root_hole = Node::hole(BitSet::from_range(1, 2));
        assert_eq!(root_hole.hole_paths().collect::<Vec<_>>(), vec![Vec::<usize>::new()]);

        assert_eq!(Node::leaf(1).hole_paths().count(), 0);
    }

    #[test]
    fn test_path_of_is_identity_based() {
        let t = Node::new(r(1), vec![Node::leaf(2), Node::leaf(2)]);
        let second = t.node_at(&[2]).unwrap();
        assert_eq!(t.path_of(second), Some(vec![2]));

        let detached = Node::leaf(2);
        assert_eq!(t.path_of(&detached), None);
    }
}
