//! `Number` holds the possible numeric representations of the value model.
//!
//! A number carries either a textual form copied verbatim from source
//! (so re-serializing it round-trips exactly, including things like
//! trailing zeros or `1e10` notation) or a binary form tagged int or
//! double. Equality and ordering always compare by binary value,
//! regardless of which representation either side holds.

use std::cmp::Ordering;
use std::fmt;

/// The binary representation of a number, used for comparison and arithmetic
/// once a textual literal has been parsed.
#[derive(Debug, Clone, Copy)]
pub enum NumBin {
    Int(i64),
    Double(f64),
}

#[derive(Debug, Clone)]
pub struct Number {
    /// The literal text as it appeared in source, if this number was parsed
    /// rather than computed. Preserved so serialization round-trips exactly.
    text: Option<String>,
    bin: NumBin,
}

impl Number {
    pub fn from_int(n: i64) -> Self {
        Number { text: None, bin: NumBin::Int(n) }
    }

    pub fn from_f64(n: f64) -> Self {
        Number { text: None, bin: NumBin::Double(n) }
    }

    /// Parses a JSON numeric literal, retaining its source text.
    pub fn parse(text: &str) -> Option<Self> {
        let bin = if text.contains(['.', 'e', 'E']) {
            NumBin::Double(text.parse().ok()?)
        } else {
            match text.parse::<i64>() {
                Ok(n) => NumBin::Int(n),
                // Overflows an i64 (e.g. a huge literal) fall back to double,
                // same as the original's JX_DOUBLE fallback.
                Err(_) => NumBin::Double(text.parse().ok()?),
            }
        };
        Some(Number { text: Some(text.to_string()), bin })
    }

    pub fn bin(&self) -> NumBin {
        self.bin
    }

    pub fn as_f64(&self) -> f64 {
        match self.bin {
            NumBin::Int(n) => n as f64,
            NumBin::Double(n) => n,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self.bin {
            NumBin::Int(n) => Some(n),
            NumBin::Double(n) if n.fract() == 0.0 => Some(n as i64),
            _ => None,
        }
    }

    pub fn is_double(&self) -> bool {
        matches!(self.bin, NumBin::Double(_))
    }

    pub fn is_zero(&self) -> bool {
        match self.bin {
            NumBin::Int(n) => n == 0,
            NumBin::Double(n) => n == 0.0,
        }
    }

    /// Source text, if this number wasn't synthesized at runtime.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Renders the binary value using the given float-digit precision,
    /// matching a `config.digits`-style setting.
    pub fn render(&self, float_digits: usize) -> String {
        if let Some(text) = &self.text {
            return text.clone();
        }
        match self.bin {
            NumBin::Int(n) => n.to_string(),
            NumBin::Double(n) => format!("{:.*}", float_digits, n)
                .trim_end_matches('0')
                .trim_end_matches('.')
                .to_string(),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.text {
            Some(t) => f.write_str(t),
            None => match self.bin {
                NumBin::Int(n) => write!(f, "{n}"),
                NumBin::Double(n) => write!(f, "{n}"),
            },
        }
    }
}

fn f64_cmp(lhs: f64, rhs: f64) -> Ordering {
    lhs.partial_cmp(&rhs).unwrap_or_else(|| {
        if lhs.is_nan() && rhs.is_nan() {
            Ordering::Equal
        } else if lhs.is_nan() {
            Ordering::Less
        } else {
            Ordering::Greater
        }
    })
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for Number {}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Number {
    fn cmp(&self, other: &Self) -> Ordering {
        use NumBin::*;
        match (self.bin, other.bin) {
            (Int(l), Int(r)) => l.cmp(&r),
            (Int(l), Double(r)) => f64_cmp(l as f64, r),
            (Double(l), Int(r)) => f64_cmp(l, r as f64),
            (Double(l), Double(r)) => f64_cmp(l, r),
        }
    }
}

impl From<i64> for Number {
    fn from(n: i64) -> Self {
        Number::from_int(n)
    }
}

impl From<f64> for Number {
    fn from(n: f64) -> Self {
        Number::from_f64(n)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_int_and_float_text() {
        let n = Number::parse("1234").unwrap();
        assert!(matches!(n.bin(), NumBin::Int(1234)));
        let n = Number::parse("12.34").unwrap();
        assert!(matches!(n.bin(), NumBin::Double(f) if (f - 12.34).abs() < 1e-9));
    }

    #[test]
    fn equality_is_by_binary_value() {
        assert_eq!(Number::from_int(20), Number::from_f64(20.0));
        assert_eq!(Number::parse("20").unwrap(), Number::from_f64(20.0));
    }

    #[test]
    fn ordering_mixes_repr() {
        assert!(Number::from_int(-1) < Number::from_int(1));
        assert!(Number::from_f64(1.5) > Number::from_int(1));
    }

    #[test]
    fn render_preserves_source_text() {
        let n = Number::parse("1.500").unwrap();
        assert_eq!(n.render(12), "1.500");
    }
}
