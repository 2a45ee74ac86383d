//! `jvalue` is the typed JSON-shaped value model used throughout `jcalc`.
//!
//! It's a small, dependency-light crate for the *value* (this crate)
//! that a larger expression/statement engine (`jcalc`) builds on top
//! of.

pub mod defer;
pub mod error;
pub mod io;
pub mod mbstr;
pub mod number;
pub mod span;
pub mod value;

pub use error::JError;
pub use number::Number;
pub use span::Span;
pub use value::{ArrayRepr, ArrayValue, Key, NullPayload, ObjectValue, TableHint, Value};
