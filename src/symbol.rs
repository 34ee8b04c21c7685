//! Symbol resolution for rule bodies.
//!
//! A bare symbol inside a rule body is exactly one of: a nonterminal
//! placeholder, a named constant, or a host-language variable (something the
//! external evaluator binds). The classification is decided against the
//! grammar's registered types and a caller-provided [`SymbolTable`]; nothing
//! is looked up in an ambient namespace.

use std::collections::HashMap;

use crate::expr::Value;
use crate::types::Nonterminal;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolKind {
    /// A child placeholder to be filled with a rule of this type.
    Nonterminal(Nonterminal),
    /// A named constant with a known value.
    Constant(Value),
    /// A free name bound by the host (function argument, input variable, ...).
    Variable,
}

/// Named constants known at grammar-construction time.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    constants: HashMap<String, Value>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a named constant, returning the previous value if any.
    pub fn define(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.constants.insert(name.into(), value.into())
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.define(name, value);
        self
    }

    pub fn constant(&self, name: &str) -> Option<&Value> {
        self.constants.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.constants.iter()
    }

    /// Classifies `name` given a predicate telling whether it is a nonterminal.
    ///
    /// Nonterminals shadow constants of the same name.
    pub fn classify(&self, name: &str, is_type: impl Fn(&str) -> bool) -> SymbolKind {
        if is_type(name) {
            SymbolKind::Nonterminal(Nonterminal::new(name))
        } else if let Some(value) = self.constants.get(name) {
            SymbolKind::Constant(value.clone())
        } else {
            SymbolKind::Variable
        }
    }
}
