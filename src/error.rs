//! Errors reported by grammar and tree operations.
//!
//! Only recoverable conditions are reported here. Caller invariant violations
//! (rule id 0, rule ids past the end of the table, descending into a hole's
//! children) panic instead.

use crate::bitset::BitSet;
use crate::expr::Expr;
use crate::types::{Nonterminal, RuleId};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GrammarError {
    #[error("Unknown type: {0}")]
    UnknownType(Nonterminal),

    #[error("Unknown rule: {0}")]
    UnknownRule(RuleId),

    #[error("Rule {0} has been removed")]
    RemovedRule(RuleId),

    #[error("Malformed rule {lhs} = {body}: {reason}")]
    MalformedRule { lhs: String, body: Expr, reason: &'static str },

    #[error("Invalid constraint: {0}")]
    InvalidConstraint(String),

    #[error("Probability of a hole with domain {0} is ambiguous")]
    AmbiguousProbability(BitSet),

    #[error("Type mismatch at {path:?}: expected {expected}, found {found}")]
    TypeCheck {
        path: Vec<usize>,
        expected: Nonterminal,
        found: Nonterminal,
    },

    #[error("Path is empty")]
    EmptyPath,

    #[error("Invalid path {path:?}: {reason}")]
    InvalidPath { path: Vec<usize>, reason: &'static str },

    #[error("No rule of type {ty} derives {expr}")]
    NoMatchingRule { ty: Nonterminal, expr: Expr },

    #[error("Rule {rule} is not in the domain {domain} of the hole")]
    RuleNotInDomain { rule: RuleId, domain: BitSet },

    #[error("Rule {0} evaluates immediately and needs a value")]
    NeedsValue(RuleId),

    #[error("Rule {0} does not evaluate immediately")]
    NotImmediate(RuleId),

    #[error("Probabilistic and non-probabilistic grammars cannot be mixed")]
    ProbabilityMismatch,
}

pub type Result<T> = std::result::Result<T, GrammarError>;
