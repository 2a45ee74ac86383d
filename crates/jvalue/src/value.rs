//! The value model: a typed, JSON-shaped
//! tree with deferred (lazily produced) arrays.

use crate::defer::DeferredArray;
use crate::error::ErrorCode;
use crate::mbstr;
use crate::number::Number;
use crate::span::Span;
use std::cell::{Cell, OnceCell};
use std::cmp::Ordering;
use std::fmt;

/// A JSON-shaped value. `Null` carries an optional error payload so that
/// error conditions can propagate as ordinary values.
#[derive(Debug, Clone)]
pub enum Value {
    Null(NullPayload),
    Bool(bool),
    Number(Number),
    String(String),
    Array(ArrayValue),
    Object(ObjectValue),
}

#[derive(Debug, Clone, Default)]
pub struct NullPayload {
    pub error: Option<ErrorCode>,
    pub where_: Option<Span>,
}

/// Cached hint on whether an array is a "table" (non-empty array of
/// non-empty objects). Not a contract — just a hint
/// set opportunistically by code that has already scanned the array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableHint {
    Unknown,
    Yes,
    No,
}

#[derive(Debug, Clone)]
pub enum ArrayRepr {
    Eager(Vec<Value>),
    Deferred(DeferredArray),
}

#[derive(Debug, Clone)]
pub struct ArrayValue {
    repr: ArrayRepr,
    is_table: Cell<TableHint>,
}

/// An object member. Appears only as a child of [`ObjectValue`]. The
/// "loose" (case/diacritic/punctuation-folded) form of the key is
/// computed lazily and cached here.
#[derive(Debug, Clone)]
pub struct Key {
    pub name: String,
    pub value: Value,
    loose: OnceCell<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ObjectValue {
    members: Vec<Key>,
}

impl Key {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Key { name: name.into(), value, loose: OnceCell::new() }
    }

    pub fn loose(&self) -> &str {
        self.loose.get_or_init(|| mbstr::loose_key(&self.name))
    }
}

impl ObjectValue {
    pub fn new() -> Self {
        ObjectValue::default()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn members(&self) -> &[Key] {
        &self.members
    }

    pub fn members_mut(&mut self) -> &mut [Key] {
        &mut self.members
    }

    /// Appends a member, replacing any existing same-named key's value
    /// (appending to an Object replaces an existing
    /// same-named Key's value"). There's no "append a non-Key" failure
    /// mode to model here: `Key` being a distinct type from `Value`
    /// makes that contract a compile-time guarantee rather than a
    /// runtime check.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        if let Some(existing) = self.members.iter_mut().find(|k| k.name == name) {
            existing.value = value;
            existing.loose = OnceCell::new();
        } else {
            self.members.push(Key::new(name, value));
        }
    }

    pub fn push_key(&mut self, key: Key) {
        self.insert(key.name, key.value);
    }

    /// Case-sensitive lookup first, falling back to a "loose" match.
    pub fn get(&self, name: &str) -> Option<&Value> {
        if let Some(k) = self.members.iter().find(|k| k.name == name) {
            return Some(&k.value);
        }
        let loose_target = mbstr::loose_key(name);
        self.members.iter().find(|k| k.loose() == loose_target).map(|k| &k.value)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let idx = self.members.iter().position(|k| k.name == name)?;
        Some(self.members.remove(idx).value)
    }
}

impl ArrayValue {
    pub fn eager(values: Vec<Value>) -> Self {
        ArrayValue { repr: ArrayRepr::Eager(values), is_table: Cell::new(TableHint::Unknown) }
    }

    pub fn deferred(deferred: DeferredArray) -> Self {
        ArrayValue { repr: ArrayRepr::Deferred(deferred), is_table: Cell::new(TableHint::Unknown) }
    }

    pub fn repr(&self) -> &ArrayRepr {
        &self.repr
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self.repr, ArrayRepr::Deferred(_))
    }

    pub fn len(&self) -> usize {
        match &self.repr {
            ArrayRepr::Eager(v) => v.len(),
            ArrayRepr::Deferred(d) => d.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match &self.repr {
            ArrayRepr::Eager(v) => v.is_empty(),
            ArrayRepr::Deferred(d) => d.is_empty(),
        }
    }

    /// Materializes into an owned `Vec<Value>`, scanning a deferred
    /// array to completion if necessary.
    pub fn to_vec(&self) -> Vec<Value> {
        match &self.repr {
            ArrayRepr::Eager(v) => v.clone(),
            ArrayRepr::Deferred(d) => d.materialize(),
        }
    }

    /// Negative indices wrap from the end.
    pub fn get(&self, idx: i64) -> Option<Value> {
        let len = self.len() as i64;
        let idx = if idx < 0 { idx + len } else { idx };
        if idx < 0 {
            return None;
        }
        let idx = idx as usize;
        match &self.repr {
            ArrayRepr::Eager(v) => v.get(idx).cloned(),
            ArrayRepr::Deferred(d) => d.by_index(idx),
        }
    }

    pub fn get_by_key_value(&self, key: &str, value: &Value) -> Option<Value> {
        match &self.repr {
            ArrayRepr::Eager(v) => v.iter().find(|row| {
                matches!(row, Value::Object(obj) if obj.get(key).map(|v| v.loose_eq(value)).unwrap_or(false))
            }).cloned(),
            ArrayRepr::Deferred(d) => d.by_key_value(key, value),
        }
    }

    /// Non-empty array of non-empty objects.
    /// Cached after the first scan.
    pub fn is_table(&self) -> bool {
        match self.is_table.get() {
            TableHint::Yes => return true,
            TableHint::No => return false,
            TableHint::Unknown => {}
        }
        let mut any_data = false;
        let mut all_objects = true;
        for v in self.iter_values() {
            match &v {
                Value::Object(o) if !o.is_empty() => any_data = true,
                Value::Object(_) => {}
                _ => {
                    all_objects = false;
                    break;
                }
            }
        }
        let result = all_objects && any_data;
        self.is_table.set(if result { TableHint::Yes } else { TableHint::No });
        result
    }

    fn iter_values(&self) -> Vec<Value> {
        // Only called from is_table(), which needs one full pass; for
        // eager arrays this avoids a clone of the whole backing Vec.
        match &self.repr {
            ArrayRepr::Eager(v) => v.clone(),
            ArrayRepr::Deferred(d) => d.materialize(),
        }
    }
}

impl Value {
    pub fn null() -> Self {
        Value::Null(NullPayload::default())
    }

    pub fn error(code: &str, message: impl fmt::Display) -> Self {
        Value::Null(NullPayload { error: Some(ErrorCode::new(code, message)), where_: None })
    }

    pub fn error_at(code: &str, message: impl fmt::Display, span: Span) -> Self {
        Value::Null(NullPayload { error: Some(ErrorCode::new(code, message)), where_: Some(span) })
    }

    pub fn array(values: Vec<Value>) -> Self {
        Value::Array(ArrayValue::eager(values))
    }

    pub fn object(obj: ObjectValue) -> Self {
        Value::Object(obj)
    }

    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Null(NullPayload { error: Some(_), .. }))
    }

    pub fn error_code(&self) -> Option<&ErrorCode> {
        match self {
            Value::Null(NullPayload { error: Some(e), .. }) => Some(e),
            _ => None,
        }
    }

    /// Truthiness:
    /// everything is true except `false`, `null`, the number `0`, an
    /// empty string, or an empty array/object.
    pub fn is_true(&self) -> bool {
        match self {
            Value::Null(_) => false,
            Value::Bool(b) => *b,
            Value::String(s) => !s.is_empty(),
            Value::Number(n) => !n.is_zero(),
            Value::Array(a) => !a.is_empty(),
            Value::Object(o) => !o.is_empty(),
        }
    }

    pub fn is_table(&self) -> bool {
        matches!(self, Value::Array(a) if a.is_table())
    }

    /// The `.length` computed-attribute fallback used when a `.` member
    /// lookup misses: Array -> element count, String ->
    /// character count, null -> 0, anything else (including Object,
    /// since Objects don't expose member count this way) -> 1.
    pub fn length_attr(&self) -> usize {
        match self {
            Value::Null(_) => 0,
            Value::String(s) => mbstr::char_len(s),
            Value::Array(a) => a.len(),
            _ => 1,
        }
    }

    pub fn typeof_basic(&self) -> &'static str {
        match self {
            Value::Null(_) => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    /// The extended `typeof`, layering date/time/datetime/period/table/
    /// empty-variant detection on top of the basic type.
    pub fn typeof_extended(&self) -> &'static str {
        match self {
            Value::Array(a) => {
                if a.is_empty() {
                    "empty array"
                } else if a.is_table() {
                    "table"
                } else {
                    "array"
                }
            }
            Value::Object(o) => {
                if o.is_empty() {
                    "empty object"
                } else {
                    "object"
                }
            }
            Value::String(s) => {
                if is_iso_date(s) {
                    "date"
                } else if is_iso_time(s) {
                    "time"
                } else if is_iso_datetime(s) {
                    "datetime"
                } else if is_iso_period(s) {
                    "period"
                } else {
                    "string"
                }
            }
            other => other.typeof_basic(),
        }
    }

    /// A rough byte-size estimate.
    /// `examples/original_source/src/lib/memory.c`'s `json_memsize`.
    pub fn byte_size_estimate(&self) -> usize {
        let base = std::mem::size_of::<Value>();
        base + match self {
            Value::String(s) => s.len(),
            Value::Array(a) => match a.repr() {
                ArrayRepr::Eager(v) => v.iter().map(Value::byte_size_estimate).sum(),
                ArrayRepr::Deferred(_) => 0, // not materialized; no cost yet
            },
            Value::Object(o) => o.members().iter().map(|k| k.name.len() + k.value.byte_size_estimate()).sum(),
            _ => 0,
        }
    }

    /// Deep copy, with an optional predicate that, when it returns
    /// `false` for an object member, omits that member from the copy
    /// (deep-copy with an optional filter predicate).
    pub fn deep_copy_filtered(&self, filter: &dyn Fn(&str, &Value) -> bool) -> Value {
        match self {
            Value::Array(a) => Value::Array(ArrayValue::eager(
                a.to_vec().iter().map(|v| v.deep_copy_filtered(filter)).collect(),
            )),
            Value::Object(o) => {
                let mut out = ObjectValue::new();
                for k in o.members() {
                    if filter(&k.name, &k.value) {
                        out.insert(k.name.clone(), k.value.deep_copy_filtered(filter));
                    }
                }
                Value::Object(out)
            }
            other => other.clone(),
        }
    }

    pub fn deep_copy(&self) -> Value {
        self.deep_copy_filtered(&|_, _| true)
    }

    /// Strict, type-aware equality (`===`): numbers by
    /// binary value, strings byte-for-byte, arrays/objects recursively,
    /// objects order-independent by member name.
    pub fn deep_equal(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null(_), Value::Null(_)) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                if a.len() != b.len() {
                    return false;
                }
                a.to_vec().iter().zip(b.to_vec().iter()).all(|(x, y)| x.deep_equal(y))
            }
            (Value::Object(a), Value::Object(b)) => {
                if a.len() != b.len() {
                    return false;
                }
                a.members().iter().all(|k| b.get(&k.name).map(|v| k.value.deep_equal(v)).unwrap_or(false))
            }
            _ => false,
        }
    }

    /// Loose equality (`==`): null only matches null,
    /// booleans only match booleans, a Number and a String compare
    /// equal if the string parses cleanly to the same number, and two
    /// strings compare case-sensitively byte-equal. Arrays/Objects are
    /// never loosely equal to anything (the `==` operator on containers
    /// is an evaluator-level error, not handled here).
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null(_), Value::Null(_)) => true,
            (Value::Null(_), _) | (_, Value::Null(_)) => false,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Bool(_), _) | (_, Value::Bool(_)) => false,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
                Number::parse(s.trim()).map(|parsed| &parsed == n).unwrap_or(false)
            }
            _ => false,
        }
    }

    /// An order-independent, type-aware hash.
    pub fn value_hash(&self) -> u64 {
        use std::hash::{Hash, Hasher};
        let mut h = fxhash::FxHasher::default();
        match self {
            Value::Null(_) => 0u8.hash(&mut h),
            Value::Bool(b) => {
                1u8.hash(&mut h);
                b.hash(&mut h);
            }
            Value::Number(n) => {
                2u8.hash(&mut h);
                n.as_f64().to_bits().hash(&mut h);
            }
            Value::String(s) => {
                3u8.hash(&mut h);
                s.hash(&mut h);
            }
            Value::Array(a) => {
                4u8.hash(&mut h);
                for v in a.to_vec() {
                    v.value_hash().hash(&mut h);
                }
            }
            Value::Object(o) => {
                5u8.hash(&mut h);
                // Combine per-member hashes commutatively so member
                // order doesn't affect the object's hash.
                let combined: u64 = o
                    .members()
                    .iter()
                    .map(|k| {
                        let mut kh = fxhash::FxHasher::default();
                        k.name.hash(&mut kh);
                        k.value.value_hash().hash(&mut kh);
                        kh.finish()
                    })
                    .fold(0u64, |acc, x| acc.wrapping_add(x));
                combined.hash(&mut h);
            }
        }
        h.finish()
    }

    /// An arbitrary but total ordering over values of any type, used by
    /// `===`/`!==` and as the tie-breaker comparator elsewhere.
    pub fn total_cmp(&self, other: &Value) -> Ordering {
        fn rank(v: &Value) -> u8 {
            match v {
                Value::Null(_) => 0,
                Value::Bool(_) => 1,
                Value::Number(_) => 2,
                Value::String(_) => 3,
                Value::Array(_) => 4,
                Value::Object(_) => 5,
            }
        }
        match (self, other) {
            (Value::Null(_), Value::Null(_)) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Number(a), Value::Number(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Array(a), Value::Array(b)) => {
                let (av, bv) = (a.to_vec(), b.to_vec());
                av.iter()
                    .zip(bv.iter())
                    .map(|(x, y)| x.total_cmp(y))
                    .find(|o| *o != Ordering::Equal)
                    .unwrap_or_else(|| av.len().cmp(&bv.len()))
            }
            (Value::Object(a), Value::Object(b)) => {
                let mut am: Vec<_> = a.members().iter().collect();
                let mut bm: Vec<_> = b.members().iter().collect();
                am.sort_by(|x, y| x.name.cmp(&y.name));
                bm.sort_by(|x, y| x.name.cmp(&y.name));
                am.iter()
                    .zip(bm.iter())
                    .map(|(x, y)| match x.name.cmp(&y.name) {
                        Ordering::Equal => x.value.total_cmp(&y.value),
                        other => other,
                    })
                    .find(|o| *o != Ordering::Equal)
                    .unwrap_or_else(|| am.len().cmp(&bm.len()))
            }
            (a, b) => rank(a).cmp(&rank(b)),
        }
    }
}

fn is_iso_date(s: &str) -> bool {
    time::Date::parse(s, &time::format_description::well_known::Iso8601::DATE).is_ok()
}

fn is_iso_time(s: &str) -> bool {
    time::Time::parse(s, &time::format_description::well_known::Iso8601::TIME).is_ok()
}

fn is_iso_datetime(s: &str) -> bool {
    time::OffsetDateTime::parse(s, &time::format_description::well_known::Iso8601::DATE_TIME)
        .is_ok()
        || time::PrimitiveDateTime::parse(
            s,
            &time::format_description::well_known::Iso8601::DATE_TIME,
        )
        .is_ok()
}

/// A crude ISO-8601 duration test (`P1D`, `PT1H30M`, ...). The `time`
/// crate has no public period parser, so this is a small hand-rolled
/// recognizer, used only for `typeof` classification — arithmetic on
/// periods parses them itself in `jcalc::eval::arith`.
fn is_iso_period(s: &str) -> bool {
    let Some(rest) = s.strip_prefix('P') else { return false };
    if rest.is_empty() {
        return false;
    }
    let (date_part, time_part) = match rest.split_once('T') {
        Some((d, t)) => (d, Some(t)),
        None => (rest, None),
    };
    let valid_run = |s: &str, units: &str| -> bool {
        let mut digits_seen = false;
        let mut chars = s.chars().peekable();
        while let Some(c) = chars.peek().copied() {
            if c.is_ascii_digit() {
                digits_seen = true;
                chars.next();
            } else if units.contains(c) {
                chars.next();
            } else {
                return false;
            }
        }
        digits_seen || s.is_empty()
    };
    let date_ok = valid_run(date_part, "YMWD");
    let time_ok = time_part.map(|t| valid_run(t, "HMS")).unwrap_or(true);
    date_ok && time_ok && (!date_part.is_empty() || time_part.map(|t| !t.is_empty()).unwrap_or(false))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null(NullPayload { error: Some(e), .. }) => write!(f, "{e}"),
            Value::Null(_) => write!(f, ""),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s}"),
            Value::Array(_) | Value::Object(_) => {
                write!(f, "{}", crate::io::serialize(self, &crate::io::Format::default()))
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn object_append_replaces_existing_key() {
        let mut o = ObjectValue::new();
        o.insert("a", Value::Number(Number::from_int(1)));
        o.insert("a", Value::Number(Number::from_int(2)));
        assert_eq!(o.len(), 1);
        assert_eq!(o.get("a").unwrap().to_string(), "2");
    }

    #[test]
    fn loose_key_lookup() {
        let mut o = ObjectValue::new();
        o.insert("foo-bar", Value::Bool(true));
        assert!(o.get("FooBar").is_some());
    }

    #[test]
    fn truthiness_matches_spec_rules() {
        assert!(!Value::null().is_true());
        assert!(!Value::Number(Number::from_int(0)).is_true());
        assert!(Value::Number(Number::from_int(1)).is_true());
        assert!(!Value::String(String::new()).is_true());
        assert!(!Value::array(vec![]).is_true());
    }

    #[test]
    fn length_attr_matches_boundary_cases() {
        assert_eq!(Value::null().length_attr(), 0);
        assert_eq!(Value::String("abc".into()).length_attr(), 3);
        assert_eq!(Value::array(vec![Value::null(), Value::null()]).length_attr(), 2);
        let mut o = ObjectValue::new();
        o.insert("x", Value::Number(Number::from_int(1)));
        assert_eq!(Value::Object(o).length_attr(), 1);
    }

    #[test]
    fn number_equals_string_loosely_but_not_strictly() {
        let n = Value::Number(Number::from_int(0));
        let s = Value::String("0".into());
        assert!(n.loose_eq(&s));
        assert!(!n.deep_equal(&s));
    }

    #[test]
    fn deep_copy_is_disjoint() {
        let mut o = ObjectValue::new();
        o.insert("a", Value::array(vec![Value::Number(Number::from_int(1))]));
        let original = Value::Object(o);
        let mut copy = original.deep_copy();
        if let Value::Object(obj) = &mut copy {
            obj.insert("a", Value::array(vec![Value::Number(Number::from_int(99))]));
        }
        assert!(!original.deep_equal(&copy));
    }

    #[test]
    fn object_hash_is_order_independent() {
        let mut a = ObjectValue::new();
        a.insert("x", Value::Number(Number::from_int(1)));
        a.insert("y", Value::Number(Number::from_int(2)));
        let mut b = ObjectValue::new();
        b.insert("y", Value::Number(Number::from_int(2)));
        b.insert("x", Value::Number(Number::from_int(1)));
        assert_eq!(Value::Object(a).value_hash(), Value::Object(b).value_hash());
    }
}
