//! The expression tree, produced by [`crate::parser`] and consumed by
//! [`crate::eval`].

use jvalue::{Span, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    StrictEq,
    Ne,
    StrictNe,
    Lt,
    Le,
    Ge,
    Gt,
    CiEq,
    CiNe,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Like,
    In,
    NotIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    /// `=`
    Set,
    /// `?=`: assign only if the RHS is not null.
    SetIfNotNull,
}

/// One member of an `{ ... }` constructor. `skip_if_null` marks the `?:`
/// member form that omits the member entirely when its value evaluates
/// to null.
#[derive(Debug, Clone)]
pub struct ObjectMember {
    pub key: Box<Expr>,
    pub value: Box<Expr>,
    pub skip_if_null: bool,
}

/// A fully lowered `SELECT` pipeline, built by the parser out of
/// ordinary expression nodes.
#[derive(Debug, Clone)]
pub struct SelectSpec {
    pub columns: Vec<(Box<Expr>, Option<String>)>,
    pub from: Option<Box<Expr>>,
    pub where_: Option<Box<Expr>>,
    pub group_by: Vec<Box<Expr>>,
    pub having: Option<Box<Expr>>,
    /// Each key paired with its descending-ness (`true` for a leading
    /// `true` marker or a trailing `DESCENDING`).
    pub order_by: Vec<(Box<Expr>, bool)>,
    pub limit: Option<Box<Expr>>,
    pub distinct: bool,
}

#[derive(Debug, Clone)]
pub enum JoinKind {
    Natural,
    Left,
    Right,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Value),
    Name(String),
    This,
    EnvVar { name: String, suffix: Option<Box<Expr>> },
    Array(Vec<Expr>),
    Object(Vec<ObjectMember>),
    Unary { op: UnOp, operand: Box<Expr>, span: Span },
    Binary { op: BinOp, lhs: Box<Expr>, rhs: Box<Expr>, span: Span },
    Ternary { cond: Box<Expr>, then: Box<Expr>, else_: Box<Expr> },
    Coalesce { lhs: Box<Expr>, rhs: Box<Expr> },
    Member { object: Box<Expr>, name: String },
    DeepMember { object: Box<Expr>, name: String },
    Index { object: Box<Expr>, index: Box<Expr> },
    KeyValueIndex { object: Box<Expr>, key: String, value: Box<Expr> },
    Between { value: Box<Expr>, low: Box<Expr>, high: Box<Expr> },
    IsNull { value: Box<Expr>, negate: bool },
    /// `ag_offset` is `Some(slot)` when the parser determined this call is
    /// an aggregate fed by an enclosing [`Expr::AggWrap`]'s storage (the
    /// "aggregate accumulated by parent `AG`" case); `None` for an
    /// ordinary builtin/user call, or for an aggregate called directly
    /// with an array argument (the "aggregate with array first arg" case,
    /// detected at eval time instead).
    Call { name: String, args: Vec<Expr>, span: Span, ag_offset: Option<usize> },
    Regex { pattern: String, global: bool, ignore_case: bool },
    Assign { op: AssignOp, target: Box<Expr>, value: Box<Expr> },
    Append { target: Box<Expr>, value: Box<Expr> },
    /// The `@`/`@@` "each"/"group" SELECT primitives, used both directly
    /// and as the lowering target of a full `SELECT` statement.
    Each { source: Box<Expr>, body: Box<Expr>, group: bool },
    Join { kind: JoinKind, left: Box<Expr>, right: Box<Expr> },
    Select(Box<SelectSpec>),
    Values { keys: Box<Expr>, values: Box<Expr> },
    /// Wraps an expression containing aggregate calls; `offsets` gives
    /// each aggregate callsite's slot in the evaluation's `AgStorage`.
    AggWrap { inner: Box<Expr>, offsets: Vec<usize> },
}

impl Expr {
    pub fn literal_null() -> Expr {
        Expr::Literal(Value::null())
    }
}
