//! Value ingress/egress: JSON parsing (eager or deferred), serialization,
//! and the grid/`name=value` table printers.

pub mod format;
pub mod grid;
pub mod nameval;
pub mod parse;
pub mod serialize;

pub use format::{EmptyPolicy, Format, TableStyle};
pub use parse::{parse_file, parse_str, ParseOptions};
pub use serialize::serialize;
