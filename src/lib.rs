//! # grammar-rs: Typed grammars and derivation trees for program synthesis
//!
//! **`grammar-rs`** is a manager-centric library for describing a space of programs with a typed,
//! optionally probabilistic, context-free grammar, and for building and constraining (partial)
//! derivation trees over it. It is the representation layer a program synthesizer searches over.
//!
//! ## What is in a grammar?
//!
//! A grammar is a table of production rules `Type = body`. A rule body is an expression in a small
//! embedded language; every symbol in it that names a type is a placeholder for a child. A derivation
//! tree picks one rule per node and one child per placeholder; a **hole** is a node whose rule is not
//! chosen yet and which carries the set of rules (its *domain*) still allowed there.
//!
//! ## Key Features
//!
//! - **Manager-Centric Architecture**: All rule data lives in the [`Grammar`][crate::grammar::Grammar].
//!   Trees refer to rules through lightweight [`RuleId`][crate::types::RuleId] handles.
//! - **1-Based Indexing**: Rule ids start at 1 (reserving 0 for internal use), and so do path
//!   components.
//! - **Bit Set Domains**: Domains are [`BitSet`][crate::bitset::BitSet]s, so narrowing a hole is a
//!   handful of word operations.
//! - **Context-Sensitive Constraints**: [`Constraint`][crate::constraint::Constraint]s narrow a hole's
//!   domain depending on where it sits in the tree.
//! - **Probabilities**: Rules may carry log-probabilities; trees can be scored, and grammars without
//!   probabilities fall back to a uniform distribution that is reported as an estimate.
//!
//! ## Basic Usage
//!
//! ```rust
//! use grammar_rs::constraint::Constraint;
//! use grammar_rs::expr::Expr;
//! use grammar_rs::grammar::Grammar;
//! use grammar_rs::types::{rule_ids, RuleId};
//!
//! // 1. Build the grammar: Real = 1 | x | Real + Real
//! let mut g = Grammar::new();
//! g.add_rule("Real", Expr::int(1)).unwrap();
//! g.add_rule("Real", Expr::sym("x")).unwrap();
//! g.add_rule("Real", Expr::call("+", [Expr::sym("Real"), Expr::sym("Real")])).unwrap();
//!
//! // 2. Forbid `1` directly below `+`
//! g.add_constraint(Constraint::forbidden(rule_ids([3, 1]))).unwrap();
//!
//! // 3. Start from a hole and expand it
//! let mut tree = grammar_rs::node::Node::hole(g.domain("Real").unwrap().clone());
//! g.expand(&mut tree, &[], RuleId::new(3)).unwrap();
//!
//! // 4. Ask which rules may fill the first child
//! let legal = g.legal_domain(&tree, &[1]).unwrap();
//! assert!(!legal.contains_rule(RuleId::new(1)));
//!
//! // 5. Finish the tree and turn it back into an expression
//! g.expand(&mut tree, &[1], RuleId::new(2)).unwrap();
//! g.expand(&mut tree, &[2], RuleId::new(2)).unwrap();
//! assert!(g.is_complete(&tree));
//! assert_eq!(g.to_expression(&tree).to_string(), "x + x");
//! ```
//!
//! ## Core Components
//!
//! - **[`grammar`]**: The heart of the library. Contains the [`Grammar`][crate::grammar::Grammar] manager.
//! - **[`node`]** and **[`paths`]**: Derivation trees and path-addressed navigation.
//! - **[`tree`]**: Grammar-aware tree operations (expansion, typing, scoring, conversion).
//! - **[`constraint`]**: Context-sensitive domain narrowing.
//! - **[`count`]**: Counting derivations up to a depth.
//! - **[`dot`]**: Utilities for visualizing derivation trees using Graphviz.

pub mod bitset;
pub mod constraint;
pub mod count;
pub mod dot;
pub mod error;
pub mod expr;
pub mod grammar;
pub mod node;
pub mod paths;
pub mod symbol;
pub mod tree;
pub mod types;
pub mod utils;
