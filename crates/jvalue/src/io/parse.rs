//! Recursive-descent JSON parsing.
//!
//! [`parse_str`] always parses eagerly. [`parse_file`] additionally
//! supports deferring: when the file holds a top-level array at least
//! [`ParseOptions::defer_threshold`] bytes long, the array is left
//! unparsed and wrapped in a [`crate::defer::FileBackedArray`] instead,
//! controlled by a `defersize`-style config knob.

use crate::defer::{DeferredArray, FileBackedArray};
use crate::error::{JError, Result};
use crate::io::format::EmptyPolicy;
use crate::mbstr;
use crate::number::Number;
use crate::value::{ArrayValue, Key, ObjectValue, Value};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ParseOptions {
    pub empty_policy: EmptyPolicy,
    /// Minimum file size (bytes) at which a top-level array is deferred
    /// instead of parsed eagerly. `None` disables deferring.
    pub defer_threshold: Option<u64>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions { empty_policy: EmptyPolicy::default(), defer_threshold: Some(1 << 20) }
    }
}

/// Parses a complete JSON text with the default parse options.
pub fn parse_str(text: &str) -> Result<Value> {
    parse_str_with(text, &ParseOptions::default())
}

pub fn parse_str_with(text: &str, opts: &ParseOptions) -> Result<Value> {
    let mut p = Parser { bytes: text.as_bytes(), pos: 0, opts };
    p.skip_ws();
    let v = p.parse_value()?;
    p.skip_ws();
    if p.pos != p.bytes.len() {
        return Err(JError::UnexpectedChar { found: text[p.pos..].chars().next().unwrap_or('\0'), at: p.pos });
    }
    Ok(v)
}

/// Parses a file, deferring a large top-level array per `opts` rather
/// than reading it into memory.
pub fn parse_file(path: impl AsRef<Path>, opts: &ParseOptions) -> Result<Value> {
    let path = path.as_ref();
    let should_defer = opts
        .defer_threshold
        .map(|threshold| {
            std::fs::metadata(path).map(|m| m.len() >= threshold).unwrap_or(false)
                && looks_like_top_level_array(path)
        })
        .unwrap_or(false);

    if should_defer {
        let driver = FileBackedArray::open(path)?;
        return Ok(Value::Array(ArrayValue::deferred(DeferredArray::new(Arc::new(driver)))));
    }

    let text = std::fs::read_to_string(path)?;
    parse_str_with(&text, opts)
}

fn looks_like_top_level_array(path: &Path) -> bool {
    let Ok(mut f) = std::fs::File::open(path) else { return false };
    use std::io::Read;
    let mut buf = [0u8; 64];
    let Ok(n) = f.read(&mut buf) else { return false };
    buf[..n].iter().find(|b| !b.is_ascii_whitespace()) == Some(&b'[')
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
    opts: &'a ParseOptions,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, b: u8, what: &'static str) -> Result<()> {
        if self.peek() == Some(b) {
            self.pos += 1;
            Ok(())
        } else {
            Err(JError::UnexpectedEof(what))
        }
    }

    fn parse_value(&mut self) -> Result<Value> {
        self.skip_ws();
        match self.peek() {
            Some(b'{') => self.parse_object(),
            Some(b'[') => self.parse_array(),
            Some(b'"') => Ok(Value::String(self.parse_string()?)),
            Some(b't') => self.parse_literal("true", Value::Bool(true)),
            Some(b'f') => self.parse_literal("false", Value::Bool(false)),
            Some(b'n') => self.parse_literal("null", Value::null()),
            Some(c) if c == b'-' || c.is_ascii_digit() => self.parse_number(),
            Some(c) => Err(JError::UnexpectedChar { found: c as char, at: self.pos }),
            None => Err(JError::UnexpectedEof("value")),
        }
    }

    fn parse_literal(&mut self, lit: &'static str, value: Value) -> Result<Value> {
        if self.bytes[self.pos..].starts_with(lit.as_bytes()) {
            self.pos += lit.len();
            Ok(value)
        } else {
            Err(JError::UnexpectedChar { found: self.peek().unwrap_or(b'\0') as char, at: self.pos })
        }
    }

    fn parse_number(&mut self) -> Result<Value> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.peek() == Some(b'.') {
            self.pos += 1;
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            self.pos += 1;
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.pos += 1;
            }
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        let text = std::str::from_utf8(&self.bytes[start..self.pos]).unwrap();
        Number::parse(text).map(Value::Number).ok_or_else(|| JError::InvalidNumber(text.to_string()))
    }

    fn parse_string(&mut self) -> Result<String> {
        self.expect(b'"', "string")?;
        let start = self.pos;
        let mut has_escape = false;
        loop {
            match self.peek() {
                None => return Err(JError::UnexpectedEof("string")),
                Some(b'"') => break,
                Some(b'\\') => {
                    has_escape = true;
                    self.pos += 2;
                }
                Some(_) => self.pos += 1,
            }
        }
        let raw = std::str::from_utf8(&self.bytes[start..self.pos])
            .map_err(|_| JError::InvalidEscape("invalid utf-8 in string literal".into()))?;
        self.pos += 1; // closing quote
        Ok(if has_escape { mbstr::unescape(raw) } else { raw.to_string() })
    }

    fn parse_array(&mut self) -> Result<Value> {
        self.expect(b'[', "array")?;
        let mut items = Vec::new();
        self.skip_ws();
        if self.peek() == Some(b']') {
            self.pos += 1;
            return Ok(self.empty_array_value(items));
        }
        loop {
            items.push(self.parse_value()?);
            self.skip_ws();
            match self.peek() {
                Some(b',') => {
                    self.pos += 1;
                    self.skip_ws();
                }
                Some(b']') => {
                    self.pos += 1;
                    break;
                }
                _ => return Err(JError::UnexpectedEof("array")),
            }
        }
        Ok(Value::Array(ArrayValue::eager(std::mem::take(&mut items))))
    }

    fn empty_array_value(&self, items: Vec<Value>) -> Value {
        debug_assert!(items.is_empty());
        Value::Array(ArrayValue::eager(items))
    }

    fn parse_object(&mut self) -> Result<Value> {
        self.expect(b'{', "object")?;
        self.skip_ws();
        if self.peek() == Some(b'}') {
            self.pos += 1;
            return Ok(self.empty_object_value());
        }
        let mut obj = ObjectValue::new();
        loop {
            self.skip_ws();
            let name = self.parse_string()?;
            self.skip_ws();
            self.expect(b':', "object member")?;
            let value = self.parse_value()?;
            obj.push_key(Key::new(name, value));
            self.skip_ws();
            match self.peek() {
                Some(b',') => {
                    self.pos += 1;
                }
                Some(b'}') => {
                    self.pos += 1;
                    break;
                }
                _ => return Err(JError::UnexpectedEof("object")),
            }
        }
        Ok(Value::Object(obj))
    }

    /// An empty `{}` literal's interpretation depends on
    /// [`ParseOptions::empty_policy`].
    fn empty_object_value(&self) -> Value {
        match self.opts.empty_policy {
            EmptyPolicy::Object => Value::Object(ObjectValue::new()),
            EmptyPolicy::Array => Value::Array(ArrayValue::eager(Vec::new())),
            EmptyPolicy::String => Value::String(String::new()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_scalars() {
        assert!(matches!(parse_str("true").unwrap(), Value::Bool(true)));
        assert!(matches!(parse_str("null").unwrap(), Value::Null(_)));
        assert_eq!(parse_str("\"hi\"").unwrap().to_string(), "hi");
    }

    #[test]
    fn parses_nested_structure() {
        let v = parse_str(r#"{"a": [1, 2, {"b": true}], "c": null}"#).unwrap();
        let Value::Object(obj) = v else { panic!("expected object") };
        let Some(Value::Array(arr)) = obj.get("a").cloned() else { panic!() };
        assert_eq!(arr.len(), 3);
    }

    #[test]
    fn parses_escaped_strings() {
        let v = parse_str(r#""line1\nline2""#).unwrap();
        assert_eq!(v.to_string(), "line1\nline2");
    }

    #[test]
    fn empty_object_defaults_to_object() {
        assert!(matches!(parse_str("{}").unwrap(), Value::Object(_)));
    }

    #[test]
    fn empty_object_honors_array_policy() {
        let opts = ParseOptions { empty_policy: EmptyPolicy::Array, defer_threshold: None };
        assert!(matches!(parse_str_with("{}", &opts).unwrap(), Value::Array(_)));
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert!(parse_str("1 2").is_err());
    }
}
