//! Structured errors for the parts of `jvalue` that return `Result`.
//!
//! Most runtime failures in this system surface as in-band error-null
//! `Value`s, not `Result::Err` — an error null is a first class value
//! that flows through operators like any other. `JError`
//! exists for the smaller set of failures that have no "current value"
//! to attach an error to: parsing malformed JSON, or I/O errors opening
//! a deferred file-backed array.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum JError {
    #[error("{0}: unexpected end of input")]
    UnexpectedEof(&'static str),

    #[error("unexpected character {found:?} at byte {at}")]
    UnexpectedChar { found: char, at: usize },

    #[error("invalid number literal {0:?}")]
    InvalidNumber(String),

    #[error("invalid escape sequence {0:?}")]
    InvalidEscape(String),

    #[error("i/o error opening deferred array: {0}")]
    Io(#[from] std::io::Error),

    #[error("deferred array driver error: {0}")]
    Driver(String),
}

pub type Result<T> = std::result::Result<T, JError>;

/// A compact `code:message` diagnostic, as stored in an error-null `Value`.
///
/// This is the in-band counterpart to [`JError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorCode(pub String);

impl ErrorCode {
    pub fn new(code: &str, message: impl std::fmt::Display) -> Self {
        ErrorCode(format!("{code}:{message}"))
    }

    pub fn code(&self) -> &str {
        self.0.split(':').next().unwrap_or(&self.0)
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
