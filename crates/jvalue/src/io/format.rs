//! The serialization "format record", and the parser's empty-object
//! policy.

/// How an empty `{}` literal should be interpreted by the parser.
/// Defaults to `Object`; `String` exists to support XML-converted
/// inputs (XML itself is out of this crate's scope — only the policy
/// switch is implemented).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyPolicy {
    #[default]
    Object,
    Array,
    String,
}

/// Which table rendering style [`crate::io::serialize`]/[`crate::io::grid`]
/// should use for array-of-object values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableStyle {
    Json,
    Grid,
    Sh,
    Csv,
}

/// Controls every knob the serializer and table printers read.
#[derive(Debug, Clone)]
pub struct Format {
    pub indent: usize,
    /// Values shorter than this many characters serialize on one line.
    pub oneline: usize,
    pub float_digits: usize,
    pub table: TableStyle,
    /// Emit each array/object member on its own line even if it would
    /// fit within `oneline`.
    pub elem: bool,
    pub pretty: bool,
    /// Quote the top-level value as a shell string literal as well.
    pub shell: bool,
    /// Serialize error-null values instead of suppressing them.
    pub emit_errors: bool,
    pub ascii_only: bool,
    pub color: bool,
    /// Infer grid headers from the first row's keys rather than unioning
    /// every row (faster, but may truncate ragged tables).
    pub quick: bool,
    /// Use box-drawing characters rather than ASCII `+`/`-`/`|` in grids.
    pub graphic: bool,
    /// Prefix prepended to each `name=value` line in `sh` table style.
    pub prefix: String,
    /// Spelling used for a `null` cell in grid/`sh` rendering.
    pub null_spelling: String,
    /// Number of rows a deferred table's column-width pass scans before
    /// giving up and using what it's seen.
    pub defer_explain_rows: usize,
}

impl Default for Format {
    fn default() -> Self {
        Format {
            indent: 2,
            oneline: 70,
            float_digits: 12,
            table: TableStyle::Json,
            elem: false,
            pretty: true,
            shell: false,
            emit_errors: true,
            ascii_only: false,
            color: true,
            quick: false,
            graphic: true,
            prefix: String::new(),
            null_spelling: String::new(),
            defer_explain_rows: 100,
        }
    }
}

impl Format {
    /// The non-interactive/batch preset: compact, no color, JSON tables.
    pub fn batch() -> Self {
        Format {
            oneline: 0,
            pretty: false,
            color: false,
            table: TableStyle::Json,
            ..Format::default()
        }
    }
}
