//! Parse-time errors for the expression/statement grammar.
//!
//! Mirrors `jvalue::JError`'s split: most runtime failures are in-band
//! error-null `Value`s, but a tree that failed to parse has no tree to
//! attach an error-null to, so parsing returns `Result`.

use jvalue::Span;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("{0}")]
    Lex(#[from] jvalue::JError),

    #[error("unexpected token {found:?}, expected {expected}")]
    UnexpectedToken { found: String, expected: &'static str, span: Span },

    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEof { expected: &'static str },

    #[error("SELECT requires a FROM clause or a default table in context")]
    NoDefaultTable,

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ParseError>;
