//! Syntax tree for parsed snippets

use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

impl BinOp {
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::FloorDiv => "//",
            BinOp::Mod => "%",
            BinOp::Pow => "**",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    Is,
    IsNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Name(String),
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    /// Chained comparison: `a < b <= c`
    Compare(Box<Expr>, Vec<(CmpOp, Expr)>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    IfElse {
        cond: Box<Expr>,
        then: Box<Expr>,
        orelse: Box<Expr>,
    },
    Call(Box<Expr>, Vec<Expr>),
    Index(Box<Expr>, Box<Expr>),
    Slice {
        target: Box<Expr>,
        start: Option<Box<Expr>>,
        stop: Option<Box<Expr>>,
    },
    Lambda(Arc<FunctionDef>),
}

impl Expr {
    /// Whether the expression stays inside the restricted grammar used for
    /// expected outputs: literals, containers, names, sign, `not`,
    /// comparisons and boolean operators. No calls, subscripts or lambdas.
    #[must_use]
    pub fn is_restricted(&self) -> bool {
        match self {
            Expr::None
            | Expr::Bool(_)
            | Expr::Int(_)
            | Expr::Float(_)
            | Expr::Str(_)
            | Expr::Name(_) => true,
            Expr::List(items) | Expr::Tuple(items) => items.iter().all(Expr::is_restricted),
            Expr::Unary(_, inner) => inner.is_restricted(),
            Expr::Compare(first, rest) => {
                first.is_restricted() && rest.iter().all(|(_, e)| e.is_restricted())
            }
            Expr::And(a, b) | Expr::Or(a, b) => a.is_restricted() && b.is_restricted(),
            Expr::Binary(..)
            | Expr::IfElse { .. }
            | Expr::Call(..)
            | Expr::Index(..)
            | Expr::Slice { .. }
            | Expr::Lambda(_) => false,
        }
    }
}

/// Assignment target
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Name(String),
    Tuple(Vec<Target>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr(Expr),
    Assign(Target, Expr),
    AugAssign(String, BinOp, Expr),
    If {
        branches: Vec<(Expr, Vec<Stmt>)>,
        orelse: Vec<Stmt>,
    },
    While(Expr, Vec<Stmt>),
    For(Target, Expr, Vec<Stmt>),
    Def(Arc<FunctionDef>),
    Return(Option<Expr>),
    Assert(Expr, Option<Expr>),
    /// `from module import *` when `names` is `None`
    Import {
        module: String,
        names: Option<Vec<String>>,
    },
    Pass,
    Break,
    Continue,
}

/// A parsed statement block
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub body: Vec<Stmt>,
}

impl Program {
    /// The trailing expression when the program is exactly one expression statement
    #[must_use]
    pub fn as_single_expr(&self) -> Option<&Expr> {
        match self.body.as_slice() {
            [Stmt::Expr(e)] => Some(e),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}
