//! Grammar-aware operations on derivation trees.
//!
//! [`Node`] knows nothing about rule bodies or types; everything that needs
//! the rule table lives here, as methods on [`Grammar`].

use std::collections::HashSet;
use std::convert::Infallible;

use log::debug;

use crate::bitset::BitSet;
use crate::constraint::{propagate_all, Context};
use crate::error::{GrammarError, Result};
use crate::expr::{Expr, Value};
use crate::grammar::{Grammar, LogProbability};
use crate::node::{Hole, HoleKind, Node};
use crate::symbol::SymbolKind;
use crate::types::{Nonterminal, RuleId};

fn not_a_hole(path: &[usize]) -> GrammarError {
    GrammarError::InvalidPath {
        path: path.to_vec(),
        reason: "does not address a hole",
    }
}

impl Grammar {
    /// The type a node derives. For a hole this is the type of the first rule
    /// in its domain, `None` if the domain is empty.
    pub fn node_type(&self, node: &Node) -> Option<&Nonterminal> {
        match node {
            Node::Rule { rule, .. } | Node::Immediate { rule, .. } => Some(self.return_type(*rule)),
            Node::Hole(hole) => hole.domain.first_rule().map(|r| self.return_type(r)),
        }
    }

    /// The type the parent of `path` expects in that slot. The root has no
    /// expectation.
    pub fn expected_type(&self, tree: &Node, path: &[usize]) -> Result<Option<&Nonterminal>> {
        let Some((&index, parent_path)) = path.split_last() else {
            return Ok(None);
        };
        tree.check_path(path)?;
        let rule = tree.node_at(parent_path).and_then(Node::rule).ok_or_else(|| GrammarError::InvalidPath {
            path: path.to_vec(),
            reason: "descends through a hole",
        })?;
        match self.child_types(rule).get(index - 1) {
            Some(ty) => Ok(Some(ty)),
            None => Err(GrammarError::InvalidPath {
                path: path.to_vec(),
                reason: "child index past the arity of the rule",
            }),
        }
    }

    /// Type-checked [`swap`][Node::swap]: replaces the node at `path` and
    /// returns the old one.
    ///
    /// Fails with [`GrammarError::TypeCheck`] if `subtree` derives a different
    /// type than the slot expects. Nothing is modified on failure.
    pub fn replace(&self, tree: &mut Node, path: &[usize], subtree: Node) -> Result<Node> {
        if path.is_empty() {
            return Err(GrammarError::EmptyPath);
        }
        if let (Some(expected), Some(found)) = (self.expected_type(tree, path)?, self.node_type(&subtree)) {
            if expected != found {
                return Err(GrammarError::TypeCheck {
                    path: path.to_vec(),
                    expected: expected.clone(),
                    found: found.clone(),
                });
            }
        }
        tree.swap(path, subtree)
    }

    /// Replaces the whole tree, checking that the new root derives the same
    /// type as the old one.
    pub fn replace_root(&self, tree: &mut Node, root: Node) -> Result<Node> {
        if let (Some(expected), Some(found)) = (self.node_type(tree), self.node_type(&root)) {
            if expected != found {
                return Err(GrammarError::TypeCheck {
                    path: Vec::new(),
                    expected: expected.clone(),
                    found: found.clone(),
                });
            }
        }
        Ok(std::mem::replace(tree, root))
    }

    fn check_commit(&self, tree: &Node, path: &[usize], rule: RuleId) -> Result<()> {
        tree.check_path(path)?;
        let hole = tree.node_at(path).and_then(Node::as_hole).ok_or_else(|| not_a_hole(path))?;
        if self.is_removed(rule) {
            return Err(GrammarError::RemovedRule(rule));
        }
        if !hole.domain.contains_rule(rule) {
            return Err(GrammarError::RuleNotInDomain {
                rule,
                domain: hole.domain.clone(),
            });
        }
        Ok(())
    }

    fn commit(tree: &mut Node, path: &[usize], node: Node) {
        if let Some(slot) = tree.node_at_mut(path) {
            *slot = node;
        }
    }

    /// Commits `rule` into the hole at `path`.
    ///
    /// The hole becomes a rule node whose children are unexpanded holes, one
    /// per child type, each with the full domain of its type.
    pub fn expand(&self, tree: &mut Node, path: &[usize], rule: RuleId) -> Result<()> {
        self.check_commit(tree, path, rule)?;
        if self.is_eval(rule) {
            return Err(GrammarError::NeedsValue(rule));
        }
        let children = self
            .child_types(rule)
            .iter()
            .map(|ty| self.domain(ty.name()).map(|d| Node::hole(d.clone())))
            .collect::<Result<Vec<_>>>()?;
        debug!("expand({:?}, {}) with {} children", path, rule, children.len());
        Self::commit(tree, path, Node::new(rule, children));
        Ok(())
    }

    /// Commits an evaluate-immediately `rule` together with its literal.
    pub fn fill_immediate(&self, tree: &mut Node, path: &[usize], rule: RuleId, value: impl Into<Value>) -> Result<()> {
        self.check_commit(tree, path, rule)?;
        if !self.is_eval(rule) {
            return Err(GrammarError::NotImmediate(rule));
        }
        let node = Node::immediate(rule, value);
        debug!("fill_immediate({:?}) with {}", path, node);
        Self::commit(tree, path, node);
        Ok(())
    }

    /// The rules that may fill the hole at `path`: its domain narrowed by
    /// every registered constraint.
    pub fn legal_domain(&self, tree: &Node, path: &[usize]) -> Result<BitSet> {
        tree.check_path(path)?;
        let hole = tree.node_at(path).and_then(Node::as_hole).ok_or_else(|| not_a_hole(path))?;
        let context = Context::new(tree, path);
        Ok(propagate_all(self.constraints(), &context, &hole.domain))
    }

    /// Builds the expression a tree stands for by splicing the children into
    /// the placeholder positions of each rule body.
    ///
    /// Named constants are replaced by their values. A hole becomes the name
    /// of its type (`nothing` for an empty domain), so partial trees can be
    /// printed.
    pub fn to_expression(&self, tree: &Node) -> Expr {
        match tree {
            Node::Immediate { value, .. } => Expr::Lit(value.clone()),
            Node::Hole(_) => Expr::sym(self.node_type(tree).map_or("nothing", Nonterminal::name)),
            Node::Rule { rule, children } => {
                let mut kinds = self.symbol_kinds(*rule).iter();
                let mut children = children.iter();
                let filled = self.rule(*rule).fill_placeholders(&|_: &str| true, &mut |name: &str| {
                    Ok::<_, Infallible>(match kinds.next() {
                        Some(SymbolKind::Nonterminal(_)) => match children.next() {
                            Some(child) => self.to_expression(child),
                            None => Expr::sym(name),
                        },
                        Some(SymbolKind::Constant(value)) => Expr::Lit(value.clone()),
                        Some(SymbolKind::Variable) | None => Expr::sym(name),
                    })
                });
                match filled {
                    Ok(expr) => expr,
                    Err(never) => match never {},
                }
            }
        }
    }

    /// Parses `expr` back into a complete tree deriving `ty`.
    ///
    /// Rules are tried in id order with backtracking; evaluate-immediately
    /// rules match any literal and are tried last.
    pub fn from_expression(&self, expr: &Expr, ty: &str) -> Result<Node> {
        if !self.has_type(ty) {
            return Err(GrammarError::UnknownType(Nonterminal::new(ty)));
        }
        self.match_type(expr, ty, &mut Vec::new())
            .ok_or_else(|| GrammarError::NoMatchingRule {
                ty: Nonterminal::new(ty),
                expr: expr.clone(),
            })
    }

    /// `visiting` holds the types already tried against this very `expr`,
    /// which cuts cycles of unit rules such as `A = B`, `B = A`.
    fn match_type(&self, expr: &Expr, ty: &str, visiting: &mut Vec<Nonterminal>) -> Option<Node> {
        if visiting.iter().any(|t| t.name() == ty) {
            return None;
        }
        let rules = self.rules_of_type(ty).ok()?;
        visiting.push(Nonterminal::new(ty));

        let mut found = None;
        for &rule in rules.iter().filter(|&&r| !self.is_eval(r)) {
            let mut children = Vec::new();
            if self.match_body(self.rule(rule), expr, &mut children, visiting) {
                found = Some(Node::new(rule, children));
                break;
            }
        }
        if found.is_none() {
            if let Expr::Lit(value) = expr {
                found = rules
                    .iter()
                    .find(|&&r| self.is_eval(r))
                    .map(|&r| Node::immediate(r, value.clone()));
            }
        }

        visiting.pop();
        found
    }

    /// A placeholder that is the whole body keeps matching the same
    /// expression and shares `visiting`; arguments of a call start afresh.
    fn match_body(&self, pattern: &Expr, expr: &Expr, children: &mut Vec<Node>, visiting: &mut Vec<Nonterminal>) -> bool {
        match (pattern, expr) {
            (Expr::Sym(name), _) if self.has_type(name) => match self.match_type(expr, name, visiting) {
                Some(child) => {
                    children.push(child);
                    true
                }
                None => false,
            },
            (Expr::Call(op, args), Expr::Call(op2, args2)) => {
                op == op2
                    && args.len() == args2.len()
                    && args
                        .iter()
                        .zip(args2)
                        .all(|(p, e)| self.match_body(p, e, children, &mut Vec::new()))
            }
            (Expr::Sym(name), Expr::Lit(value)) => self.symbols().constant(name) == Some(value),
            _ => pattern == expr,
        }
    }

    /// Returns true if the tree has no hole and every rule node has one
    /// complete child per child type.
    pub fn is_complete(&self, tree: &Node) -> bool {
        match tree {
            Node::Hole(_) => false,
            Node::Immediate { .. } => true,
            Node::Rule { rule, children } => {
                children.len() == self.arity(*rule) && children.iter().all(|c| self.is_complete(c))
            }
        }
    }

    /// Sum of the log-probabilities of every rule in the tree.
    ///
    /// A hole whose domain is a single rule counts as that rule. Any other
    /// unexpanded hole contributes nothing. A constrained hole with several
    /// candidates makes the sum undefined and is reported as
    /// [`GrammarError::AmbiguousProbability`].
    pub fn tree_log_probability(&self, tree: &Node) -> Result<LogProbability> {
        match tree {
            Node::Hole(hole) => self.hole_log_probability(hole),
            Node::Immediate { rule, .. } => Ok(self.log_probability(*rule)),
            Node::Rule { rule, children } => children
                .iter()
                .try_fold(self.log_probability(*rule), |acc, child| -> Result<LogProbability> {
                    Ok(acc + self.tree_log_probability(child)?)
                }),
        }
    }

    fn hole_log_probability(&self, hole: &Hole) -> Result<LogProbability> {
        match (hole.determined(), hole.kind) {
            (Some(rule), _) => Ok(self.log_probability(rule)),
            (None, HoleKind::Unexpanded) => Ok(LogProbability::Exact(0.0)),
            (None, HoleKind::Constrained) => Err(GrammarError::AmbiguousProbability(hole.domain.clone())),
        }
    }

    /// Rules of type `ty` used anywhere in the tree.
    pub fn used_rules_of_type(&self, tree: &Node, ty: &str) -> HashSet<RuleId> {
        tree.rules()
            .into_iter()
            .filter(|&r| self.return_type(r).name() == ty)
            .collect()
    }

    /// Like [`used_rules_of_type`][Grammar::used_rules_of_type], skipping the
    /// subtree `ignored`. `ignored` is compared by identity and must be a
    /// reference into `tree` itself.
    pub fn used_rules_of_type_ignoring(&self, tree: &Node, ty: &str, ignored: &Node) -> HashSet<RuleId> {
        let mut out = HashSet::new();
        let mut stack = vec![tree];
        while let Some(node) = stack.pop() {
            if std::ptr::eq(node, ignored) {
                continue;
            }
            if let Some(rule) = node.rule() {
                if self.return_type(rule).name() == ty {
                    out.insert(rule);
                }
            }
            stack.extend(node.children());
        }
        out
    }
}
