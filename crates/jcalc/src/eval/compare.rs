//! Comparison operators: loose/strict equality, the relational operators,
//! case-insensitive string comparison, `LIKE`, and `IN`/`NOT IN`.

use crate::expr::BinOp;
use jvalue::{mbstr, Number, Span, Value};
use std::cmp::Ordering;

fn is_container(v: &Value) -> bool {
    matches!(v, Value::Array(_) | Value::Object(_))
}

/// `==`/`!=`: an evaluator-level type error if either side is an
/// Array/Object, since [`Value::loose_eq`] has no sensible container
/// behavior to report.
fn loose(lhs: &Value, rhs: &Value, span: Span, negate: bool) -> Value {
    if is_container(lhs) || is_container(rhs) {
        return Value::error_at("cmpObjArr", "== and != don't support arrays or objects; use === or !==", span);
    }
    Value::Bool(lhs.loose_eq(rhs) != negate)
}

/// Orders `lhs`/`rhs` for the relational operators and `BETWEEN`.
///
/// `None` means "incomparable", which both callers treat as `false`:
/// either operand is null, or the operands are a Number/String pair
/// whose string side doesn't parse cleanly as a number. A Number
/// compared against a String that *does* parse cleanly is compared
/// numerically rather than falling back to type rank.
fn ordered_cmp(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    if lhs.is_null() || rhs.is_null() {
        return None;
    }
    match (lhs, rhs) {
        (Value::Number(n), Value::String(s)) => Number::parse(s.trim()).map(|parsed| n.cmp(&parsed)),
        (Value::String(s), Value::Number(n)) => Number::parse(s.trim()).map(|parsed| parsed.cmp(n)),
        _ => Some(lhs.total_cmp(rhs)),
    }
}

/// `<`/`<=`/`>=`/`>`: rejects Array/Object operands the same way `==`/`!=`
/// do; otherwise `false` whenever [`ordered_cmp`] can't establish an order.
fn ordered(lhs: &Value, rhs: &Value, span: Span, matches: fn(Ordering) -> bool) -> Value {
    if is_container(lhs) || is_container(rhs) {
        return Value::error_at("cmpObjArr", "relational operators don't support arrays or objects", span);
    }
    Value::Bool(ordered_cmp(lhs, rhs).is_some_and(matches))
}

fn case_insensitive(lhs: &Value, rhs: &Value, span: Span, negate: bool) -> Value {
    match (lhs, rhs) {
        (Value::String(a), Value::String(b)) => Value::Bool((mbstr::casecmp_trim(a, b) == Ordering::Equal) != negate),
        _ => Value::error_at("type", "=* and !=* require two strings", span),
    }
}

pub fn eval_compare(op: BinOp, lhs: Value, rhs: Value, span: Span) -> Value {
    match op {
        BinOp::Eq => loose(&lhs, &rhs, span, false),
        BinOp::Ne => loose(&lhs, &rhs, span, true),
        BinOp::StrictEq => Value::Bool(lhs.deep_equal(&rhs)),
        BinOp::StrictNe => Value::Bool(!lhs.deep_equal(&rhs)),
        BinOp::Lt => ordered(&lhs, &rhs, span, |o| o == Ordering::Less),
        BinOp::Le => ordered(&lhs, &rhs, span, |o| o != Ordering::Greater),
        BinOp::Ge => ordered(&lhs, &rhs, span, |o| o != Ordering::Less),
        BinOp::Gt => ordered(&lhs, &rhs, span, |o| o == Ordering::Greater),
        BinOp::CiEq => case_insensitive(&lhs, &rhs, span, false),
        BinOp::CiNe => case_insensitive(&lhs, &rhs, span, true),
        BinOp::Like => match (&lhs, &rhs) {
            (Value::String(a), Value::String(b)) => Value::Bool(mbstr::like(a, b)),
            _ => Value::error_at("type", "LIKE requires two strings", span),
        },
        BinOp::In => match &rhs {
            Value::Array(a) => Value::Bool(a.to_vec().iter().any(|v| v.loose_eq(&lhs))),
            _ => Value::error_at("type", "IN requires an array on the right", span),
        },
        BinOp::NotIn => match &rhs {
            Value::Array(a) => Value::Bool(!a.to_vec().iter().any(|v| v.loose_eq(&lhs))),
            _ => Value::error_at("type", "NOT IN requires an array on the right", span),
        },
        _ => unreachable!("non-comparison op reached eval_compare"),
    }
}

/// Ordering helper for `BETWEEN`, which doesn't reject container operands
/// the way `<`/`<=` do, but still treats null and an unclean Number/String
/// pairing as incomparable rather than falling back to type rank.
pub fn total_le(a: &Value, b: &Value) -> bool {
    matches!(ordered_cmp(a, b), Some(o) if o != Ordering::Greater)
}

#[cfg(test)]
mod test {
    use super::*;

    fn span() -> Span {
        Span::new(0, 0, 0)
    }

    #[test]
    fn loose_eq_rejects_containers() {
        let out = eval_compare(BinOp::Eq, Value::array(vec![]), Value::array(vec![]), span());
        assert_eq!(out.error_code().map(|c| c.code()), Some("cmpObjArr"));
    }

    #[test]
    fn strict_eq_accepts_containers() {
        let out = eval_compare(BinOp::StrictEq, Value::array(vec![]), Value::array(vec![]), span());
        assert!(out.is_true());
    }

    #[test]
    fn case_insensitive_ignores_trailing_spaces() {
        let out = eval_compare(BinOp::CiEq, Value::string("Hello  "), Value::string("hello"), span());
        assert!(out.is_true());
    }

    #[test]
    fn numeric_ordering() {
        let out = eval_compare(BinOp::Lt, Value::Number(Number::from_int(1)), Value::Number(Number::from_int(2)), span());
        assert!(out.is_true());
    }

    #[test]
    fn ordered_comparison_to_null_is_false() {
        let out = eval_compare(BinOp::Gt, Value::Number(Number::from_int(5)), Value::null(), span());
        assert!(!out.is_true());
    }

    #[test]
    fn number_string_ordering_reparses_cleanly() {
        let out = eval_compare(BinOp::Lt, Value::Number(Number::from_int(5)), Value::string("10"), span());
        assert!(out.is_true());
    }

    #[test]
    fn number_string_ordering_false_on_unclean_parse() {
        let out = eval_compare(BinOp::Lt, Value::Number(Number::from_int(5)), Value::string("10abc"), span());
        assert!(!out.is_true());
    }

    #[test]
    fn between_treats_null_as_incomparable() {
        assert!(!total_le(&Value::Number(Number::from_int(5)), &Value::null()));
    }
}
