//! Type-safe wrappers for rule identifiers and nonterminal names.
//!
//! Rule ids index the grammar's rule table; nonterminals name the
//! left-hand sides of productions. Keeping them as distinct newtypes prevents
//! mixing a rule id with a child index or a raw bit position.
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// A rule identifier (1-indexed).
///
/// Rule ids are indices into the rule table owned by a
/// [`Grammar`][crate::grammar::Grammar]. They are stable under
/// [`add_rule`][crate::grammar::Grammar::add_rule] and
/// [`remove_rule`][crate::grammar::Grammar::remove_rule], and are invalidated
/// by [`compact`][crate::grammar::Grammar::compact].
///
/// # Invariants
///
/// - Rule ids must be >= 1 (0 is reserved for "not yet materialized")
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct RuleId(u32);

impl RuleId {
    /// Creates a new rule id.
    ///
    /// # Panics
    ///
    /// Panics if `id == 0`. Rule ids must be 1-indexed.
    pub fn new(id: u32) -> Self {
        assert_ne!(id, 0, "Rule id must be >= 1");
        RuleId(id)
    }

    /// Creates the rule id stored at the given 0-based table position.
    pub fn from_index(index: usize) -> Self {
        RuleId::new(index as u32 + 1)
    }

    /// Returns the raw rule id as a `u32`.
    pub fn id(self) -> u32 {
        self.0
    }

    /// Returns the 0-based position of this rule in the rule table.
    pub fn index(self) -> usize {
        self.0 as usize - 1
    }

    /// Returns the bit position of this rule in a domain [`BitSet`][crate::bitset::BitSet].
    pub fn bit(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<RuleId> for u32 {
    fn from(rule: RuleId) -> Self {
        rule.0
    }
}

impl From<u32> for RuleId {
    fn from(id: u32) -> Self {
        RuleId::new(id)
    }
}

/// A nonterminal symbol (the left-hand side of a production).
///
/// Cheap to clone and safe to share across threads, so a grammar built once
/// can be read from many search workers.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Nonterminal(Arc<str>);

impl Nonterminal {
    pub fn new(name: impl AsRef<str>) -> Self {
        Nonterminal(Arc::from(name.as_ref()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Nonterminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Nonterminal {
    fn from(name: &str) -> Self {
        Nonterminal::new(name)
    }
}

impl From<String> for Nonterminal {
    fn from(name: String) -> Self {
        Nonterminal(Arc::from(name))
    }
}

impl Borrow<str> for Nonterminal {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Collects raw ids into rule ids.
pub fn rule_ids(ids: impl IntoIterator<Item = u32>) -> Vec<RuleId> {
    ids.into_iter().map(RuleId::new).collect()
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_rule_id_creation() {
        let r1 = RuleId::new(1);
        let r2 = RuleId::new(2);
        assert_eq!(r1.id(), 1);
        assert_eq!(r2.id(), 2);
        assert!(r1 < r2);
    }

    #[test]
    #[should_panic(expected = "Rule id must be >= 1")]
    fn test_rule_id_zero_panics() {
        RuleId::new(0);
    }

    #[test]
    fn test_rule_id_index_and_bit() {
        let r = RuleId::new(5);
        assert_eq!(r.index(), 4);
        assert_eq!(r.bit(), 5);
        assert_eq!(RuleId::from_index(4), r);
    }

    #[test]
    fn test_nonterminal_lookup_by_str() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(Nonterminal::new("Real"), 1);
        assert_eq!(map.get("Real"), Some(&1));
        assert_eq!(Nonterminal::from("Real").to_string(), "Real");
    }
}
