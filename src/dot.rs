//! Derivation tree to DOT (Graphviz) conversion.
//!
//! The generated DOT output follows these conventions:
//! - **Rule nodes** are boxes labeled with the rule id, or with the full
//!   `id: Type = body` production when [`DotConfig::show_bodies`] is set
//! - **Immediate nodes** carry their literal (`id = value`)
//! - **Holes** are ellipses labeled with their domain, dashed while
//!   unexpanded and dotted once constrained
//! - **Edges** go from parent to child, optionally labeled with the 1-based
//!   child index (the path component)
//!
//! # Examples
//!
//! ```
//! use grammar_rs::expr::Expr;
//! use grammar_rs::grammar::Grammar;
//! use grammar_rs::node::Node;
//! use grammar_rs::types::RuleId;
//!
//! let mut g = Grammar::new();
//! g.add_rule("Real", Expr::int(1)).unwrap();
//! g.add_rule("Real", Expr::call("+", [Expr::sym("Real"), Expr::sym("Real")])).unwrap();
//!
//! let tree = Node::new(RuleId::new(2), vec![Node::leaf(1), Node::hole(g.domain("Real").unwrap().clone())]);
//! let dot = g.to_dot(&tree).unwrap();
//! // Write to file and render with: dot -Tpng output.dot -o output.png
//! assert!(dot.starts_with("graph {"));
//! ```

use std::fmt::Write as _;

use crate::grammar::Grammar;
use crate::node::{HoleKind, Node};

/// Configuration options for DOT output generation.
///
/// Use `DotConfig::default()` for standard settings.
///
/// # Examples
///
/// ```
/// use grammar_rs::dot::DotConfig;
///
/// let config = DotConfig {
///     show_bodies: false,
///     ..DotConfig::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct DotConfig {
    /// Shape for rule and immediate nodes (default: "box")
    pub node_shape: &'static str,
    /// Shape for holes (default: "ellipse")
    pub hole_shape: &'static str,
    /// Style for unexpanded holes (default: "dashed")
    pub unexpanded_style: &'static str,
    /// Style for constrained holes (default: "dotted")
    pub constrained_style: &'static str,
    /// Label rule nodes with their production instead of the bare id (default: true)
    pub show_bodies: bool,
    /// Label edges with the child index (default: false)
    pub edge_labels: bool,
}

impl Default for DotConfig {
    fn default() -> Self {
        Self {
            node_shape: "box",
            hole_shape: "ellipse",
            unexpanded_style: "dashed",
            constrained_style: "dotted",
            show_bodies: true,
            edge_labels: false,
        }
    }
}

fn escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}

impl Grammar {
    /// Converts a (possibly partial) derivation tree to DOT format.
    pub fn to_dot(&self, tree: &Node) -> Result<String, std::fmt::Error> {
        self.to_dot_with_config(tree, &DotConfig::default())
    }

    /// Converts a derivation tree to DOT format with custom configuration.
    ///
    /// Nodes are numbered in pre-order, so the root is always `n0`.
    pub fn to_dot_with_config(&self, tree: &Node, config: &DotConfig) -> Result<String, std::fmt::Error> {
        let mut dot = String::new();
        writeln!(dot, "graph {{")?;
        writeln!(dot, "node [shape={}];", config.node_shape)?;

        let mut next_id = 0usize;
        // (node, (parent id, child index))
        let mut stack = vec![(tree, None::<(usize, usize)>)];
        while let Some((node, parent)) = stack.pop() {
            let id = next_id;
            next_id += 1;

            match node {
                Node::Rule { rule, .. } => {
                    let label = if config.show_bodies {
                        format!("{}: {} = {}", rule, self.return_type(*rule), self.rule(*rule))
                    } else {
                        rule.to_string()
                    };
                    writeln!(dot, "n{} [label=\"{}\"];", id, escape(&label))?;
                }
                Node::Immediate { rule, value } => {
                    writeln!(dot, "n{} [label=\"{}\"];", id, escape(&format!("{} = {}", rule, value)))?;
                }
                Node::Hole(hole) => {
                    let style = match hole.kind {
                        HoleKind::Unexpanded => config.unexpanded_style,
                        HoleKind::Constrained => config.constrained_style,
                    };
                    writeln!(
                        dot,
                        "n{} [shape={}, style={}, label=\"?{}\"];",
                        id, config.hole_shape, style, hole.domain
                    )?;
                }
            }

            if let Some((parent, index)) = parent {
                if config.edge_labels {
                    writeln!(dot, "n{} -- n{} [label=\"{}\"];", parent, id, index)?;
                } else {
                    writeln!(dot, "n{} -- n{};", parent, id)?;
                }
            }

            // Reversed, so that the leftmost child is numbered first.
            for (i, child) in node.children().iter().enumerate().rev() {
                stack.push((child, Some((id, i + 1))));
            }
        }

        writeln!(dot, "}}")?;
        Ok(dot)
    }
}
