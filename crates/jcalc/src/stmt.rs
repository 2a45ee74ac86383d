//! The statement tree and its execution result.
//!
//! A script is a block of statements executed in order. Control flow is
//! a closed enum: the handful of built-in forms (`if`/`while`/`for`/
//! `break`/`continue`/`return`/blocks/declarations) are common enough,
//! and few enough, to model directly rather than through an open-ended
//! hook (the `CommandDescriptor` registry still exists, for statement
//! forms a plugin wants to add at runtime — see `crate::commands`).

use crate::expr::Expr;
use jvalue::{Span, Value};

#[derive(Debug, Clone)]
pub enum StmtKind {
    Block(Vec<Stmt>),
    ExprStmt(Expr),
    VarDecl { is_const: bool, name: String, init: Option<Expr> },
    If { cond: Expr, then_branch: Box<Stmt>, else_branch: Option<Box<Stmt>> },
    While { cond: Expr, body: Box<Stmt> },
    For { init: Option<Box<Stmt>>, cond: Option<Expr>, step: Option<Expr>, body: Box<Stmt> },
    Break,
    Continue,
    Return(Option<Expr>),
    FunctionDecl { name: String, params: Vec<String>, body: Box<Stmt> },
    /// A plugin-registered command: `arg` is whatever text
    /// followed the command name, already handed to the registry's
    /// `argparser` at parse time and re-parsed into an `Expr`/`Stmt` by
    /// the specific command, so this node only needs the name to find
    /// the runner again at execution time.
    Command { name: String, arg: String },
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

/// What happened after running a statement: an explicit result type
/// that propagates up through block execution, rather than a sentinel
/// value threaded through return codes.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Ran to completion; continue with the next statement.
    Next,
    Break,
    Continue,
    Return(Value),
    /// A runtime failure with no sensible in-band error-null to attach
    /// to — e.g. a command argument that didn't parse.
    Error { where_: Option<Span>, text: String },
}

impl Outcome {
    pub fn is_unwinding(&self) -> bool {
        !matches!(self, Outcome::Next)
    }
}
