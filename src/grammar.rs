//! The production-rule table.
//!
//! A [`Grammar`] owns every rule; everything else (trees, constraints,
//! domains) refers to rules by [`RuleId`]. Rules are only ever appended, so
//! ids stay valid while the grammar grows. Removal leaves a tombstone in place
//! and [`compact`][Grammar::compact] renumbers the survivors, which
//! invalidates every id held outside the grammar.
//!
//! All mutating operations take `&mut self`, so a grammar that is shared
//! between search threads (`&Grammar` is `Sync`) cannot change under them.
//!
//! # Example
//!
//! ```
//! use grammar_rs::expr::Expr;
//! use grammar_rs::grammar::Grammar;
//! use grammar_rs::types::RuleId;
//!
//! let mut g = Grammar::new();
//! g.add_rule("Real", Expr::int(1)).unwrap();
//! g.add_rule("Real", Expr::sym("x")).unwrap();
//! g.add_rule("Real", Expr::call("+", [Expr::sym("Real"), Expr::sym("Real")])).unwrap();
//!
//! assert_eq!(g.num_rules(), 3);
//! assert_eq!(g.domain("Real").unwrap().len(), 3);
//! assert_eq!(g.child_types(RuleId::new(3)).len(), 2);
//! assert!(g.is_terminal(RuleId::new(2)));
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Add;

use log::{debug, warn};

use crate::bitset::BitSet;
use crate::constraint::Constraint;
use crate::error::{GrammarError, Result};
use crate::expr::Expr;
use crate::symbol::{SymbolKind, SymbolTable};
use crate::types::{Nonterminal, RuleId};
use crate::utils::log_sum_exp;

/// A log-probability, tagged with whether it was actually stored in the
/// grammar or assumed uniform because the grammar is not probabilistic.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum LogProbability {
    Exact(f64),
    Estimated(f64),
}

impl LogProbability {
    pub fn value(self) -> f64 {
        match self {
            LogProbability::Exact(x) | LogProbability::Estimated(x) => x,
        }
    }

    pub fn is_exact(self) -> bool {
        matches!(self, LogProbability::Exact(_))
    }
}

impl Add for LogProbability {
    type Output = LogProbability;

    /// Sums the values; the sum is exact only if both terms are.
    fn add(self, rhs: Self) -> Self::Output {
        let value = self.value() + rhs.value();
        if self.is_exact() && rhs.is_exact() {
            LogProbability::Exact(value)
        } else {
            LogProbability::Estimated(value)
        }
    }
}

#[derive(Clone)]
pub struct Grammar {
    /// Rule bodies; `None` marks a removed rule.
    rules: Vec<Option<Expr>>,
    /// Left-hand side of each rule; `None` marks a removed rule.
    types: Vec<Option<Nonterminal>>,
    is_terminal: Vec<bool>,
    is_eval: Vec<bool>,
    child_types: Vec<Vec<Nonterminal>>,
    /// Resolution of every bare symbol of each body, in `Expr::symbols` order.
    symbol_kinds: Vec<Vec<SymbolKind>>,
    bytype: BTreeMap<Nonterminal, Vec<RuleId>>,
    domains: BTreeMap<Nonterminal, BitSet>,
    log_probabilities: Option<Vec<f64>>,
    constraints: Vec<Constraint>,
    symbols: SymbolTable,
}

impl Grammar {
    /// Creates an empty, non-probabilistic grammar.
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            types: Vec::new(),
            is_terminal: Vec::new(),
            is_eval: Vec::new(),
            child_types: Vec::new(),
            symbol_kinds: Vec::new(),
            bytype: BTreeMap::new(),
            domains: BTreeMap::new(),
            log_probabilities: None,
            constraints: Vec::new(),
            symbols: SymbolTable::new(),
        }
    }

    /// Creates an empty probabilistic grammar.
    pub fn probabilistic() -> Self {
        Self {
            log_probabilities: Some(Vec::new()),
            ..Self::new()
        }
    }

    /// Uses `symbols` to classify the bare symbols of rule bodies.
    pub fn with_symbols(mut self, symbols: SymbolTable) -> Self {
        self.symbols = symbols;
        self.update_indices();
        self
    }
}

impl Default for Grammar {
    fn default() -> Self {
        Grammar::new()
    }
}

impl fmt::Debug for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grammar")
            .field("size", &self.len())
            .field("num_rules", &self.num_rules())
            .field("types", &self.bytype.len())
            .field("probabilistic", &self.is_probabilistic())
            .field("constraints", &self.constraints.len())
            .finish()
    }
}

impl Grammar {
    /// Size of the rule table, removed rules included.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Number of live (not removed) rules.
    pub fn num_rules(&self) -> usize {
        self.rules.iter().filter(|r| r.is_some()).count()
    }

    /// Ids of all live rules, in order.
    pub fn rule_ids(&self) -> impl Iterator<Item = RuleId> + '_ {
        self.rules
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_some())
            .map(|(i, _)| RuleId::from_index(i))
    }

    fn check_bounds(&self, rule: RuleId) -> usize {
        let index = rule.index();
        assert!(
            index < self.rules.len(),
            "Rule {} out of bounds (grammar has {} rules)",
            rule,
            self.rules.len()
        );
        index
    }

    /// Returns true if the rule has been removed and not yet compacted away.
    pub fn is_removed(&self, rule: RuleId) -> bool {
        self.rules[self.check_bounds(rule)].is_none()
    }

    /// The body of a live rule.
    ///
    /// # Panics
    ///
    /// Panics if the rule is out of bounds or has been removed.
    pub fn rule(&self, rule: RuleId) -> &Expr {
        match &self.rules[self.check_bounds(rule)] {
            Some(body) => body,
            None => panic!("Rule {} has been removed", rule),
        }
    }

    /// The nonterminal a live rule derives.
    pub fn return_type(&self, rule: RuleId) -> &Nonterminal {
        match &self.types[self.check_bounds(rule)] {
            Some(ty) => ty,
            None => panic!("Rule {} has been removed", rule),
        }
    }

    pub fn is_terminal(&self, rule: RuleId) -> bool {
        self.is_terminal[self.check_bounds(rule)]
    }

    /// Returns true for an evaluate-immediately rule.
    pub fn is_eval(&self, rule: RuleId) -> bool {
        self.is_eval[self.check_bounds(rule)]
    }

    pub fn child_types(&self, rule: RuleId) -> &[Nonterminal] {
        &self.child_types[self.check_bounds(rule)]
    }

    pub fn arity(&self, rule: RuleId) -> usize {
        self.child_types(rule).len()
    }

    pub fn max_arity(&self) -> usize {
        self.child_types.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn nonterminals(&self) -> impl Iterator<Item = &Nonterminal> {
        self.bytype.keys()
    }

    pub fn has_type(&self, name: &str) -> bool {
        self.bytype.contains_key(name)
    }

    /// All rules deriving `ty`, as a bit set.
    pub fn domain(&self, ty: &str) -> Result<&BitSet> {
        self.domains
            .get(ty)
            .ok_or_else(|| GrammarError::UnknownType(Nonterminal::new(ty)))
    }

    /// All rules deriving `ty`, in id order.
    pub fn rules_of_type(&self, ty: &str) -> Result<&[RuleId]> {
        self.bytype
            .get(ty)
            .map(Vec::as_slice)
            .ok_or_else(|| GrammarError::UnknownType(Nonterminal::new(ty)))
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn is_context_sensitive(&self) -> bool {
        !self.constraints.is_empty()
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Classifies a bare symbol against the registered types and the symbol table.
    pub fn classify(&self, name: &str) -> SymbolKind {
        self.symbols.classify(name, |s| self.has_type(s))
    }

    /// How each bare symbol of the rule's body was resolved, in
    /// [`Expr::symbols`] order. Resolved whenever the rule set or the symbol
    /// table changes, never while trees are traversed. Empty for
    /// evaluate-immediately rules.
    pub fn symbol_kinds(&self, rule: RuleId) -> &[SymbolKind] {
        &self.symbol_kinds[self.check_bounds(rule)]
    }

    /// Returns true if the rule's body is a single host variable.
    pub fn is_variable(&self, rule: RuleId) -> bool {
        matches!(self.rule(rule), Expr::Sym(_)) && matches!(self.symbol_kinds(rule), [SymbolKind::Variable])
    }

    /// Looks up a live rule by left-hand side and body.
    pub fn find_rule(&self, ty: &str, body: &Expr) -> Option<RuleId> {
        self.bytype
            .get(ty)?
            .iter()
            .copied()
            .find(|r| self.rules[r.index()].as_ref() == Some(body))
    }

    /// Returns true if every rule of `self` exists in `other` with the same type.
    pub fn contained_in(&self, other: &Grammar) -> bool {
        self.rule_ids()
            .all(|r| other.find_rule(self.return_type(r).name(), self.rule(r)).is_some())
    }
}

fn malformed(lhs: &str, body: &Expr, reason: &'static str) -> GrammarError {
    GrammarError::MalformedRule {
        lhs: lhs.to_string(),
        body: body.clone(),
        reason,
    }
}

fn check_body(expr: &Expr) -> Option<&'static str> {
    match expr {
        Expr::Lit(_) => None,
        Expr::Sym(name) if name.is_empty() => Some("empty symbol"),
        Expr::Sym(_) => None,
        Expr::Call(op, _) if op.is_empty() => Some("empty operator"),
        Expr::Call(_, args) => args.iter().find_map(check_body),
    }
}

impl Grammar {
    fn validate_rule(&self, lhs: &str, body: &Expr) -> Result<()> {
        if lhs.trim().is_empty() {
            return Err(malformed(lhs, body, "empty type name"));
        }
        if let Some(reason) = check_body(body) {
            return Err(malformed(lhs, body, reason));
        }
        Ok(())
    }

    fn contains_body(&self, body: &Expr) -> bool {
        self.rules.iter().flatten().any(|r| r == body)
    }

    /// Appends a rule without deduplication. Indices are not updated.
    fn push_rule(&mut self, lhs: Nonterminal, body: Expr, is_eval: bool, log_probability: Option<f64>) -> RuleId {
        let rule = RuleId::from_index(self.rules.len());
        self.rules.push(Some(body));
        self.types.push(Some(lhs.clone()));
        self.is_eval.push(is_eval);
        self.is_terminal.push(true);
        self.child_types.push(Vec::new());
        self.symbol_kinds.push(Vec::new());
        if let Some(lps) = &mut self.log_probabilities {
            lps.push(log_probability.unwrap_or(0.0));
        }
        self.bytype.entry(lhs).or_default().push(rule);
        rule
    }

    fn add_rule_impl(&mut self, lhs: &str, body: Expr, is_eval: bool, log_probability: Option<f64>) -> Result<Option<RuleId>> {
        self.validate_rule(lhs, &body)?;
        if self.contains_body(&body) {
            debug!("add_rule: {} = {} already present", lhs, body);
            return Ok(None);
        }
        let rule = self.push_rule(Nonterminal::new(lhs), body, is_eval, log_probability);
        self.update_indices();
        debug!("add_rule: {} = {} -> {}", lhs, self.rule(rule), rule);
        Ok(Some(rule))
    }

    /// Adds the rule `lhs = body` and returns its id.
    ///
    /// A body already present in the grammar is ignored and `None` is
    /// returned. Terminal classification of every rule is recomputed, since a
    /// new type turns earlier occurrences of its name into placeholders.
    pub fn add_rule(&mut self, lhs: &str, body: Expr) -> Result<Option<RuleId>> {
        if self.is_probabilistic() {
            return Err(GrammarError::ProbabilityMismatch);
        }
        self.add_rule_impl(lhs, body, false, None)
    }

    /// Adds one rule per body, returning the ids of the rules actually added.
    pub fn add_rules(&mut self, lhs: &str, bodies: impl IntoIterator<Item = Expr>) -> Result<Vec<RuleId>> {
        let mut added = Vec::new();
        for body in bodies {
            added.extend(self.add_rule(lhs, body)?);
        }
        Ok(added)
    }

    /// Adds an evaluate-immediately rule. `body` describes how the literal
    /// is produced; trees hold the produced literal in a
    /// [`Node::Immediate`][crate::node::Node::Immediate]. The rule is always
    /// terminal.
    pub fn add_immediate_rule(&mut self, lhs: &str, body: Expr) -> Result<Option<RuleId>> {
        if self.is_probabilistic() {
            return Err(GrammarError::ProbabilityMismatch);
        }
        self.add_rule_impl(lhs, body, true, None)
    }

    /// Adds a rule with probability `p` to a probabilistic grammar.
    ///
    /// An empty non-probabilistic grammar becomes probabilistic. Call
    /// [`normalize`][Grammar::normalize] once all rules are in.
    pub fn add_rule_with_probability(&mut self, p: f64, lhs: &str, body: Expr) -> Result<Option<RuleId>> {
        if !self.is_probabilistic() {
            if !self.is_empty() {
                return Err(GrammarError::ProbabilityMismatch);
            }
            self.log_probabilities = Some(Vec::new());
        }
        if !(p >= 0.0 && p.is_finite()) {
            return Err(malformed(lhs, &body, "probability must be finite and non-negative"));
        }
        self.add_rule_impl(lhs, body, false, Some(p.ln()))
    }

    /// Recomputes symbol resolution, terminal flags, child types and domains from scratch.
    fn update_indices(&mut self) {
        for i in 0..self.rules.len() {
            let kinds: Vec<SymbolKind> = match &self.rules[i] {
                Some(body) if !self.is_eval[i] => body
                    .symbols()
                    .into_iter()
                    .map(|s| self.symbols.classify(s, |t| self.bytype.contains_key(t)))
                    .collect(),
                _ => Vec::new(),
            };
            let child_types: Vec<Nonterminal> = kinds
                .iter()
                .filter_map(|kind| match kind {
                    SymbolKind::Nonterminal(ty) => Some(ty.clone()),
                    _ => None,
                })
                .collect();
            self.is_terminal[i] = child_types.is_empty();
            self.child_types[i] = child_types;
            self.symbol_kinds[i] = kinds;
        }
        self.domains = self
            .bytype
            .iter()
            .map(|(ty, rules)| (ty.clone(), BitSet::from_rules(rules.iter().copied())))
            .collect();
    }

    /// Removes a rule, leaving a tombstone so that other ids stay valid.
    ///
    /// If it was the last rule of its type, the type disappears as well and
    /// rules that used the type's name are reclassified.
    pub fn remove_rule(&mut self, rule: RuleId) -> Result<()> {
        let index = self.check_bounds(rule);
        let Some(ty) = self.types[index].take() else {
            return Err(GrammarError::RemovedRule(rule));
        };
        debug!("remove_rule({}): {} = {:?}", rule, ty, self.rules[index]);

        self.rules[index] = None;
        self.is_eval[index] = false;
        self.is_terminal[index] = true;
        self.child_types[index].clear();
        self.symbol_kinds[index].clear();
        if let Some(lps) = &mut self.log_probabilities {
            lps[index] = f64::NEG_INFINITY;
        }
        if self.constraints.iter().any(|c| c.rules().contains(&rule)) {
            warn!("Removed rule {} is still referenced by a constraint", rule);
        }

        let last = match self.bytype.get_mut(&ty) {
            Some(rules) => {
                rules.retain(|&r| r != rule);
                rules.is_empty()
            }
            None => false,
        };
        if last {
            debug!("remove_rule: type {} has no rules left", ty);
            self.bytype.remove(&ty);
            self.update_indices();
        } else if let Some(domain) = self.domains.get_mut(&ty) {
            domain.remove_rule(rule);
        }
        Ok(())
    }

    /// Physically drops removed rules and renumbers the rest densely from 1.
    ///
    /// Returns the old-to-new mapping, indexed by old 0-based position. Trees
    /// and constraints holding old ids are NOT rewritten: call this between
    /// search episodes only, when nothing refers to the old ids.
    pub fn compact(&mut self) -> Vec<Option<RuleId>> {
        let mut mapping = Vec::with_capacity(self.rules.len());
        let mut next = 0;
        for rule in &self.rules {
            if rule.is_some() {
                mapping.push(Some(RuleId::from_index(next)));
                next += 1;
            } else {
                mapping.push(None);
            }
        }
        debug!("compact: {} -> {} rules", self.rules.len(), next);

        let keep = |i: usize| mapping[i].is_some();
        fn retain<T>(v: Vec<T>, keep: impl Fn(usize) -> bool) -> Vec<T> {
            v.into_iter().enumerate().filter(|(i, _)| keep(*i)).map(|(_, x)| x).collect()
        }
        self.rules = retain(std::mem::take(&mut self.rules), keep);
        self.types = retain(std::mem::take(&mut self.types), keep);
        self.is_eval = retain(std::mem::take(&mut self.is_eval), keep);
        self.is_terminal = vec![true; next];
        self.child_types = vec![Vec::new(); next];
        self.symbol_kinds = vec![Vec::new(); next];
        if let Some(lps) = self.log_probabilities.take() {
            self.log_probabilities = Some(retain(lps, keep));
        }

        self.bytype.clear();
        for (i, ty) in self.types.iter().enumerate() {
            if let Some(ty) = ty {
                self.bytype.entry(ty.clone()).or_default().push(RuleId::from_index(i));
            }
        }
        self.update_indices();
        mapping
    }

    /// Appends the rules of `other` that `self` lacks, then its constraints.
    ///
    /// A rule of `other` whose type and body already exist in `self` is
    /// mapped onto the existing rule. Returns the mapping from `other`'s
    /// 0-based positions to ids in `self` (`None` for removed rules).
    /// Fails without modifying `self` if the grammars disagree on being
    /// probabilistic or if one of `other`'s constraints is invalid. An empty
    /// probabilistic grammar that takes the rules of a plain one gets
    /// uniform probabilities per type.
    pub fn merge(&mut self, other: &Grammar) -> Result<Vec<Option<RuleId>>> {
        if self.is_probabilistic() != other.is_probabilistic() && !other.is_empty() && !self.is_empty() {
            return Err(GrammarError::ProbabilityMismatch);
        }
        for c in &other.constraints {
            other.check_constraint(c)?;
        }
        if self.is_empty() && other.is_probabilistic() && self.log_probabilities.is_none() {
            self.log_probabilities = Some(Vec::new());
        }
        let uniform = self.is_empty() && self.is_probabilistic() && !other.is_probabilistic();

        let mut mapping = Vec::with_capacity(other.len());
        for i in 0..other.len() {
            let (Some(ty), Some(body)) = (&other.types[i], &other.rules[i]) else {
                mapping.push(None);
                continue;
            };
            let rule = match self.find_rule(ty.name(), body) {
                Some(existing) => existing,
                None => {
                    let log_p = other.log_probabilities.as_ref().map(|lps| lps[i]);
                    self.push_rule(ty.clone(), body.clone(), other.is_eval[i], log_p)
                }
            };
            mapping.push(Some(rule));
        }
        for (name, value) in other.symbols.iter() {
            if self.symbols.constant(name).is_none() {
                self.symbols.define(name.clone(), value.clone());
            }
        }
        self.update_indices();
        if uniform {
            debug!("merge: plain rules into a probabilistic grammar, assuming uniform probabilities");
            self.init_uniform_probabilities();
        }

        for c in &other.constraints {
            // Every id was checked against `other` above, so the mapping is defined.
            let c = c.map_rules(|r| mapping[r.index()].unwrap_or(r));
            if !self.constraints.contains(&c) {
                self.constraints.push(c);
            }
        }
        debug!("merge: {} rules mapped, {} constraints", mapping.len(), other.constraints.len());
        Ok(mapping)
    }

    fn check_constraint(&self, constraint: &Constraint) -> Result<()> {
        constraint.validate().map_err(GrammarError::InvalidConstraint)?;
        for rule in constraint.rules() {
            if rule.index() >= self.rules.len() {
                return Err(GrammarError::UnknownRule(rule));
            }
            if self.rules[rule.index()].is_none() {
                return Err(GrammarError::RemovedRule(rule));
            }
        }
        Ok(())
    }

    /// Registers a constraint after checking that every rule it mentions exists.
    pub fn add_constraint(&mut self, constraint: Constraint) -> Result<()> {
        self.check_constraint(&constraint)?;
        debug!("add_constraint: {}", constraint);
        self.constraints.push(constraint);
        Ok(())
    }

    pub fn clear_constraints(&mut self) {
        self.constraints.clear();
    }
}

impl Grammar {
    pub fn is_probabilistic(&self) -> bool {
        self.log_probabilities.is_some()
    }

    /// The log-probability of choosing `rule` among the rules of its type.
    ///
    /// A non-probabilistic grammar does not fail: it assumes a uniform
    /// distribution, logs a warning and tags the value as
    /// [`LogProbability::Estimated`].
    pub fn log_probability(&self, rule: RuleId) -> LogProbability {
        let ty = self.return_type(rule);
        match &self.log_probabilities {
            Some(lps) => LogProbability::Exact(lps[rule.index()]),
            None => {
                let n = self.bytype.get(ty).map_or(1, Vec::len);
                warn!("Grammar is not probabilistic, assuming uniform probability for rule {}", rule);
                LogProbability::Estimated(-(n as f64).ln())
            }
        }
    }

    pub fn probability(&self, rule: RuleId) -> f64 {
        self.log_probability(rule).value().exp()
    }

    /// The cost of a rule, `-log p`.
    pub fn rule_cost(&self, rule: RuleId) -> f64 {
        -self.log_probability(rule).value()
    }

    /// Rescales probabilities so that the rules of every type sum to one.
    ///
    /// Does nothing for a non-probabilistic grammar.
    pub fn normalize(&mut self) {
        let Some(lps) = &mut self.log_probabilities else {
            debug!("normalize: grammar is not probabilistic");
            return;
        };
        for (ty, rules) in &self.bytype {
            let values: Vec<f64> = rules.iter().map(|r| lps[r.index()]).collect();
            let z = log_sum_exp(values.iter().copied());
            if !z.is_finite() {
                warn!("normalize: rules of {} have zero total probability", ty);
                continue;
            }
            for r in rules {
                lps[r.index()] -= z;
            }
        }
    }

    /// Makes the grammar probabilistic with a uniform distribution per type.
    pub fn init_uniform_probabilities(&mut self) {
        let mut lps = vec![f64::NEG_INFINITY; self.rules.len()];
        for rules in self.bytype.values() {
            let log_p = -(rules.len() as f64).ln();
            for r in rules {
                lps[r.index()] = log_p;
            }
        }
        self.log_probabilities = Some(lps);
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rule in self.rule_ids() {
            write!(f, "{}: ", rule)?;
            if let Some(lps) = &self.log_probabilities {
                write!(f, "{:.3} : ", lps[rule.index()].exp())?;
            }
            write!(f, "{} = ", self.return_type(rule))?;
            if self.is_eval(rule) {
                writeln!(f, "_({})", self.rule(rule))?;
            } else {
                writeln!(f, "{}", self.rule(rule))?;
            }
        }
        for c in &self.constraints {
            writeln!(f, "{}", c)?;
        }
        Ok(())
    }
}
