//! Universal invariants exercised with `quickcheck` property tests
//! rather than a handful of hand-picked examples.

use jvalue::io::{parse_str, serialize, Format};
use jvalue::{Number, ObjectValue, Value};
use pretty_assertions::assert_eq;
use quickcheck::{Arbitrary, Gen};
use quickcheck_macros::quickcheck;

/// A restriction of `Value` to the JSON-compatible subset: no
/// deferred arrays, and integers only (a `float_digits`-lossy double
/// wouldn't round-trip byte-for-byte, so it's excluded here).
#[derive(Debug, Clone)]
struct JsonValue(Value);

fn arbitrary_string(g: &mut Gen) -> String {
    // Keep to a printable ASCII subset; escaping of control characters
    // and non-ASCII is `mbstr`'s concern and covered separately.
    let len = usize::arbitrary(g) % 6;
    (0..len)
        .map(|_| {
            let choices: Vec<char> = "abcXYZ012 _-.\"\\".chars().collect();
            *g.choose(&choices).unwrap()
        })
        .collect()
}

fn arbitrary_value(g: &mut Gen, depth: u32) -> Value {
    let leaf = depth == 0;
    let tag = u32::arbitrary(g) % if leaf { 4 } else { 6 };
    match tag {
        0 => Value::null(),
        1 => Value::Bool(bool::arbitrary(g)),
        2 => Value::Number(Number::from_int(i64::arbitrary(g) % 1_000_000)),
        3 => Value::string(arbitrary_string(g)),
        4 => {
            let n = usize::arbitrary(g) % 4;
            Value::array((0..n).map(|_| arbitrary_value(g, depth - 1)).collect())
        }
        _ => {
            let n = usize::arbitrary(g) % 4;
            let mut obj = ObjectValue::new();
            for i in 0..n {
                obj.insert(format!("k{i}"), arbitrary_value(g, depth - 1));
            }
            Value::object(obj)
        }
    }
}

impl Arbitrary for JsonValue {
    fn arbitrary(g: &mut Gen) -> Self {
        JsonValue(arbitrary_value(g, 3))
    }
}

#[quickcheck]
fn parse_of_serialize_round_trips(v: JsonValue) -> bool {
    let fmt = Format::default();
    let text = serialize(&v.0, &fmt);
    match parse_str(&text) {
        Ok(parsed) => parsed.deep_equal(&v.0),
        Err(_) => false,
    }
}

#[quickcheck]
fn deep_copy_is_equal_and_disjoint(v: JsonValue) -> bool {
    let mut copy = v.0.deep_copy();
    if !copy.deep_equal(&v.0) {
        return false;
    }
    // Objects expose an in-place mutator (`insert`); containers have no
    // other mutation path (assignment always produces a fresh value), so
    // this is the one place disjointness after a deep copy is observable.
    if let Value::Object(o) = &mut copy {
        o.insert("mutated-marker", Value::Bool(true));
        return !copy.deep_equal(&v.0);
    }
    true
}

#[test]
fn deferred_range_array_matches_eager_equivalent() {
    use jvalue::defer::{DeferredArray, RangeArray};
    use std::sync::Arc;

    let deferred = Value::Array(jvalue::ArrayValue::deferred(DeferredArray::new(Arc::new(RangeArray::new(1, 5)))));
    let eager = Value::array((1..=5).map(|n| Value::Number(Number::from_int(n))).collect());
    assert!(deferred.deep_equal(&eager));

    // Negative indexing must agree too.
    let Value::Array(da) = &deferred else { unreachable!() };
    let Value::Array(ea) = &eager else { unreachable!() };
    assert_eq!(da.get(-1).unwrap().to_string(), ea.get(-1).unwrap().to_string());
}

#[test]
fn deferred_blob_array_matches_eager_equivalent() {
    use jvalue::defer::{BlobArray, DeferredArray};
    use std::sync::Arc;

    let bytes = vec![10u8, 20, 30, 255];
    let deferred = Value::Array(jvalue::ArrayValue::deferred(DeferredArray::new(Arc::new(BlobArray::new(bytes.clone())))));
    let eager = Value::array(bytes.iter().map(|b| Value::Number(Number::from_int(*b as i64))).collect());
    assert!(deferred.deep_equal(&eager));
}
