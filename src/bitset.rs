//! Bit sets over rule ids.
//!
//! Every domain in the crate (the rules of a nonterminal, the admissible
//! fillings of a hole, the result of constraint propagation) is a [`BitSet`]
//! where bit `i` stands for rule id `i`. Bit 0 is never set, since rule ids
//! are 1-based.

use std::fmt;

use crate::types::RuleId;

/// A simple bit set backed by a vector of u64 words.
///
/// The bit set automatically grows as needed when setting bits beyond the
/// current capacity. Equality is logical: two sets with the same members are
/// equal regardless of how many words each has allocated.
#[derive(Debug, Clone, Default)]
pub struct BitSet {
    /// Storage: each u64 holds 64 bits
    words: Vec<u64>,
    /// Number of set bits (cached for O(1) len())
    count: usize,
}

impl BitSet {
    /// Number of bits per word.
    const BITS_PER_WORD: usize = 64;

    /// Creates a new empty bit set with the given capacity (in bits).
    pub fn new(capacity: usize) -> Self {
        let num_words = capacity.div_ceil(Self::BITS_PER_WORD);
        Self {
            words: vec![0; num_words],
            count: 0,
        }
    }

    /// Creates an empty bit set with no pre-allocated capacity.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a bit set containing exactly the given rules.
    pub fn from_rules(rules: impl IntoIterator<Item = RuleId>) -> Self {
        rules.into_iter().map(RuleId::bit).collect()
    }

    /// Creates a bit set with every bit in `lo..=hi` set.
    pub fn from_range(lo: usize, hi: usize) -> Self {
        (lo..=hi).collect()
    }

    /// Returns the number of set bits.
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns true if no bits are set.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns true if exactly one bit is set.
    #[inline]
    pub fn is_singleton(&self) -> bool {
        self.count == 1
    }

    /// Returns the capacity in bits.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.words.len() * Self::BITS_PER_WORD
    }

    #[inline]
    fn word_and_bit(index: usize) -> (usize, usize) {
        (index / Self::BITS_PER_WORD, index % Self::BITS_PER_WORD)
    }

    /// Returns true if the bit at the given index is set.
    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        let (word_idx, bit_idx) = Self::word_and_bit(index);
        match self.words.get(word_idx) {
            Some(word) => word & (1u64 << bit_idx) != 0,
            None => false,
        }
    }

    /// Returns true if the given rule is a member of this domain.
    #[inline]
    pub fn contains_rule(&self, rule: RuleId) -> bool {
        self.contains(rule.bit())
    }

    /// Sets the bit at the given index. Returns true if the bit was not previously set.
    pub fn insert(&mut self, index: usize) -> bool {
        let (word_idx, bit_idx) = Self::word_and_bit(index);

        // Grow if necessary
        if word_idx >= self.words.len() {
            self.words.resize(word_idx + 1, 0);
        }

        let mask = 1u64 << bit_idx;
        let was_clear = self.words[word_idx] & mask == 0;
        if was_clear {
            self.words[word_idx] |= mask;
            self.count += 1;
        }
        was_clear
    }

    /// Clears the bit at the given index. Returns true if the bit was previously set.
    pub fn remove(&mut self, index: usize) -> bool {
        let (word_idx, bit_idx) = Self::word_and_bit(index);
        if word_idx >= self.words.len() {
            return false;
        }

        let mask = 1u64 << bit_idx;
        let was_set = self.words[word_idx] & mask != 0;
        if was_set {
            self.words[word_idx] &= !mask;
            self.count -= 1;
        }
        was_set
    }

    /// Removes a rule from this domain. Returns true if it was present.
    pub fn remove_rule(&mut self, rule: RuleId) -> bool {
        self.remove(rule.bit())
    }

    /// Clears all bits.
    pub fn clear(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
        self.count = 0;
    }

    /// Extends the bit set by setting all bits from an iterator.
    pub fn extend(&mut self, iter: impl IntoIterator<Item = usize>) {
        for index in iter {
            self.insert(index);
        }
    }

    /// Returns the smallest set bit, if any.
    pub fn first(&self) -> Option<usize> {
        self.iter().next()
    }

    /// Returns the smallest member as a rule id, if any.
    pub fn first_rule(&self) -> Option<RuleId> {
        self.rules().next()
    }

    /// Returns an iterator over all set bit indices.
    pub fn iter(&self) -> BitSetIter<'_> {
        BitSetIter {
            bitset: self,
            word_idx: 0,
            current_word: self.words.first().copied().unwrap_or(0),
        }
    }

    /// Returns an iterator over the members as rule ids.
    pub fn rules(&self) -> impl Iterator<Item = RuleId> + '_ {
        // Bit 0 is reserved and never denotes a rule.
        self.iter().filter(|&i| i != 0).map(|i| RuleId::new(i as u32))
    }

    /// Keeps only the bits also set in `other`.
    pub fn intersect_with(&mut self, other: &BitSet) {
        for (i, word) in self.words.iter_mut().enumerate() {
            *word &= other.words.get(i).copied().unwrap_or(0);
        }
        self.recount();
    }

    /// Sets every bit set in `other`.
    pub fn union_with(&mut self, other: &BitSet) {
        if other.words.len() > self.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        for (word, &o) in self.words.iter_mut().zip(other.words.iter()) {
            *word |= o;
        }
        self.recount();
    }

    /// Clears every bit set in `other`.
    pub fn difference_with(&mut self, other: &BitSet) {
        for (word, &o) in self.words.iter_mut().zip(other.words.iter()) {
            *word &= !o;
        }
        self.recount();
    }

    /// Returns the intersection of two sets.
    pub fn intersection(&self, other: &BitSet) -> BitSet {
        let mut result = self.clone();
        result.intersect_with(other);
        result
    }

    /// Returns true if every bit of `self` is also set in `other`.
    pub fn is_subset(&self, other: &BitSet) -> bool {
        self.words
            .iter()
            .enumerate()
            .all(|(i, &w)| w & !other.words.get(i).copied().unwrap_or(0) == 0)
    }

    fn recount(&mut self) {
        self.count = self.words.iter().map(|w| w.count_ones() as usize).sum();
    }
}

impl PartialEq for BitSet {
    fn eq(&self, other: &Self) -> bool {
        let n = self.words.len().max(other.words.len());
        self.count == other.count
            && (0..n).all(|i| self.words.get(i).copied().unwrap_or(0) == other.words.get(i).copied().unwrap_or(0))
    }
}

impl Eq for BitSet {}

impl FromIterator<usize> for BitSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut bs = BitSet::empty();
        bs.extend(iter);
        bs
    }
}

impl FromIterator<RuleId> for BitSet {
    fn from_iter<I: IntoIterator<Item = RuleId>>(iter: I) -> Self {
        BitSet::from_rules(iter)
    }
}

impl fmt::Display for BitSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, index) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", index)?;
        }
        write!(f, "}}")
    }
}

/// Iterator over set bits in a BitSet.
pub struct BitSetIter<'a> {
    bitset: &'a BitSet,
    word_idx: usize,
    current_word: u64,
}

impl Iterator for BitSetIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current_word != 0 {
                let bit_idx = self.current_word.trailing_zeros() as usize;
                self.current_word &= self.current_word - 1; // Clear lowest set bit
                return Some(self.word_idx * BitSet::BITS_PER_WORD + bit_idx);
            }

            self.word_idx += 1;
            if self.word_idx >= self.bitset.words.len() {
                return None;
            }
            self.current_word = self.bitset.words[self.word_idx];
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_empty() {
        let bs = BitSet::empty();
        assert!(bs.is_empty());
        assert_eq!(bs.len(), 0);
        assert!(!bs.contains(0));
        assert!(!bs.contains(100));
        assert_eq!(bs.first(), None);
    }

    #[test]
    fn test_insert_remove() {
        let mut bs = BitSet::new(100);
        assert!(bs.insert(42));
        assert!(!bs.insert(42));
        assert!(bs.contains(42));
        assert_eq!(bs.len(), 1);
        assert!(bs.is_singleton());
        assert!(bs.remove(42));
        assert!(!bs.remove(42));
        assert!(bs.is_empty());
    }

    #[test]
    fn test_auto_grow() {
        let mut bs = BitSet::empty();
        bs.insert(1000);
        assert!(bs.contains(1000));
        assert_eq!(bs.len(), 1);
        assert!(bs.capacity() > 1000);
    }

    #[test]
    fn test_iter_across_words() {
        let bs: BitSet = [5, 10, 3, 64, 65].into_iter().collect();
        let indices: Vec<_> = bs.iter().collect();
        assert_eq!(indices, vec![3, 5, 10, 64, 65]);
    }

    #[test]
    fn test_rules_skip_reserved_zero() {
        let bs: BitSet = [0, 2, 7].into_iter().collect();
        let rules: Vec<_> = bs.rules().map(RuleId::id).collect();
        assert_eq!(rules, vec![2, 7]);
    }

    #[test]
    fn test_logical_equality_ignores_capacity() {
        let mut a = BitSet::new(1000);
        a.insert(3);
        let b: BitSet = [3].into_iter().collect();
        assert_eq!(a, b);
        a.insert(700);
        assert_ne!(a, b);
    }

    #[test]
    fn test_set_algebra() {
        let a = BitSet::from_range(1, 9);
        let b: BitSet = [2, 4, 100].into_iter().collect();

        let i = a.intersection(&b);
        assert_eq!(i.iter().collect::<Vec<_>>(), vec![2, 4]);
        assert!(i.is_subset(&a));
        assert!(i.is_subset(&b));
        assert!(!b.is_subset(&a));

        let mut u = a.clone();
        u.union_with(&b);
        assert_eq!(u.len(), 10);

        let mut d = a.clone();
        d.difference_with(&b);
        assert_eq!(d.iter().collect::<Vec<_>>(), vec![1, 3, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn test_display() {
        let bs = BitSet::from_range(1, 3);
        assert_eq!(bs.to_string(), "{1, 2, 3}");
    }
}
