//! Generic imperative form a graph lowers into
//!
//! A lowered program is an ordered [`Block`] of statements over named
//! bindings. Rendering it to concrete source text is left to a separate
//! renderer; the IR serialises with serde so such a renderer can live out of
//! process.

mod eval;

pub use eval::Evaluator;

use crate::Value;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    /// True division, always producing a float.
    Div,
    /// Remainder whose sign follows the divisor.
    Rem,
}

/// Pure functions available to expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Builtin {
    Sum,
    Product,
    Abs,
    All,
    Any,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Expr {
    Literal { value: Value },
    Ref { name: String },
    List { items: Vec<Expr> },
    Binary { op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr> },
    Call { func: Builtin, args: Vec<Expr> },
}

impl Expr {
    pub fn literal(value: impl Into<Value>) -> Self {
        Expr::Literal { value: value.into() }
    }

    pub fn reference(name: impl Into<String>) -> Self {
        Expr::Ref { name: name.into() }
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn call(func: Builtin, args: Vec<Expr>) -> Self {
        Expr::Call { func, args }
    }
}

/// Side-effecting calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "effect")]
pub enum Effect {
    /// Append `value` to the list bound to `target`. A null value is not
    /// appended: it marks a pass on which nothing fed the accumulator.
    Append { target: String, value: Expr },
    /// Write `label: value` to the console.
    Print { label: String, value: Expr },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stmt")]
pub enum Stmt {
    Assign { target: String, value: Expr },
    For { target: String, iter: Expr, body: Block },
    If { test: Expr, then: Block, orelse: Block },
    Effect(Effect),
}

impl Stmt {
    pub fn assign(target: impl Into<String>, value: Expr) -> Self {
        Stmt::Assign {
            target: target.into(),
            value,
        }
    }
}

/// Ordered statement sequence
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Block(pub Vec<Stmt>);

impl Block {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, stmt: Stmt) {
        self.0.push(stmt);
    }

    pub fn extend(&mut self, other: Block) {
        self.0.extend(other.0);
    }

    pub fn statements(&self) -> &[Stmt] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl From<Vec<Stmt>> for Block {
    fn from(stmts: Vec<Stmt>) -> Self {
        Self(stmts)
    }
}

impl IntoIterator for Block {
    type Item = Stmt;
    type IntoIter = std::vec::IntoIter<Stmt>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
