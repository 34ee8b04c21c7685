//! The embedded expression language.
//!
//! Rule bodies are [`Expr`] templates: literals, bare symbols and operator
//! applications. A bare symbol that names a nonterminal of the grammar is a
//! child placeholder; any other symbol is resolved through the
//! [`SymbolTable`][crate::symbol::SymbolTable]. Materialized derivation trees
//! are also returned as [`Expr`] values.

use std::fmt;
use std::hash::{Hash, Hasher};

/// A literal constant.
///
/// Equality is strict: `Int(1)`, `Float(1.0)` and `Bool(true)` are all
/// distinct, so a grammar may contain each of them as a separate rule.
#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Int(x) => x.hash(state),
            Value::Float(x) => x.to_bits().hash(state),
            Value::Bool(x) => x.hash(state),
            Value::Str(x) => x.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(x) => write!(f, "{}", x),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Bool(x) => write!(f, "{}", x),
            Value::Str(x) => write!(f, "{:?}", x),
        }
    }
}

impl From<i64> for Value {
    fn from(x: i64) -> Self {
        Value::Int(x)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(x: bool) -> Self {
        Value::Bool(x)
    }
}

impl From<&str> for Value {
    fn from(x: &str) -> Self {
        Value::Str(x.to_string())
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum Expr {
    /// A literal constant.
    Lit(Value),
    /// A bare symbol: a nonterminal placeholder, a named constant, or a host variable.
    Sym(String),
    /// An operator applied to ordered arguments.
    Call(String, Vec<Expr>),
}

const INFIX: &[&str] = &["+", "-", "*", "/", "%", "^", "==", "!=", "<", ">", "<=", ">=", "&&", "||"];

impl Expr {
    pub fn lit(value: impl Into<Value>) -> Self {
        Expr::Lit(value.into())
    }

    pub fn int(value: i64) -> Self {
        Expr::Lit(Value::Int(value))
    }

    pub fn sym(name: impl Into<String>) -> Self {
        Expr::Sym(name.into())
    }

    pub fn call(op: impl Into<String>, args: impl IntoIterator<Item = Expr>) -> Self {
        Expr::Call(op.into(), args.into_iter().collect())
    }

    pub fn as_sym(&self) -> Option<&str> {
        match self {
            Expr::Sym(name) => Some(name),
            _ => None,
        }
    }

    /// Symbols in argument positions, depth-first and left to right.
    ///
    /// Operator names are not visited: they never act as placeholders.
    pub fn symbols(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_symbols(&mut out);
        out
    }

    fn collect_symbols<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Lit(_) => {}
            Expr::Sym(name) => out.push(name),
            Expr::Call(_, args) => {
                for arg in args {
                    arg.collect_symbols(out);
                }
            }
        }
    }

    /// Rebuilds the expression, replacing each placeholder symbol (in the same
    /// order as [`symbols`][Expr::symbols]) with the result of `fill`.
    pub fn fill_placeholders<E, P, F>(&self, is_placeholder: &P, fill: &mut F) -> Result<Expr, E>
    where
        P: Fn(&str) -> bool,
        F: FnMut(&str) -> Result<Expr, E>,
    {
        Ok(match self {
            Expr::Lit(_) => self.clone(),
            Expr::Sym(name) if is_placeholder(name) => fill(name)?,
            Expr::Sym(_) => self.clone(),
            Expr::Call(op, args) => {
                let args = args
                    .iter()
                    .map(|arg| arg.fill_placeholders(is_placeholder, fill))
                    .collect::<Result<Vec<_>, E>>()?;
                Expr::Call(op.clone(), args)
            }
        })
    }

    fn is_infix(&self) -> bool {
        matches!(self, Expr::Call(op, args) if args.len() == 2 && INFIX.contains(&op.as_str()))
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Expr::Lit(value)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Lit(value) => write!(f, "{}", value),
            Expr::Sym(name) => f.write_str(name),
            Expr::Call(op, args) if self.is_infix() => {
                let wrap = |e: &Expr, f: &mut fmt::Formatter<'_>| {
                    if e.is_infix() {
                        write!(f, "({})", e)
                    } else {
                        write!(f, "{}", e)
                    }
                };
                wrap(&args[0], f)?;
                write!(f, " {} ", op)?;
                wrap(&args[1], f)
            }
            Expr::Call(op, args) => {
                write!(f, "{}(", op)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}
