//! Arithmetic and bitwise-as-set-op evaluation: numeric `+`/`-`/`*`/`/`/`%`,
//! string concatenation and trimmed-join subtraction, date/period
//! arithmetic, and bitwise operators that double as set operations on
//! objects.

use crate::expr::{BinOp, UnOp};
use jvalue::{Number, ObjectValue, Span, Value};

pub fn eval_unary(op: UnOp, v: Value, span: Span) -> Value {
    match op {
        UnOp::Not => Value::Bool(!v.is_true()),
        UnOp::Neg => match v {
            Value::Number(n) => match n.bin() {
                jvalue::number::NumBin::Int(i) => Value::Number(Number::from_int(-i)),
                jvalue::number::NumBin::Double(f) => Value::Number(Number::from_f64(-f)),
            },
            _ => Value::error_at("type", "unary - requires a number", span),
        },
        UnOp::BitNot => match v {
            Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Number(Number::from_int(!i)),
                None => Value::error_at("type", "~ requires an integer", span),
            },
            _ => Value::error_at("type", "~ requires a number", span),
        },
    }
}

/// `+`/`-`/`*`/`/`/`%`: numeric arithmetic, string concatenation when
/// either side of `+` is a String, a trim-and-join convenience for
/// string minus string, and date/period arithmetic when the strings
/// involved parse as ISO-8601 dates/datetimes/periods.
pub fn eval_arith(op: BinOp, lhs: Value, rhs: Value, span: Span) -> Value {
    use BinOp::*;
    match (op, &lhs, &rhs) {
        (Add, Value::String(_), _) | (Add, _, Value::String(_)) => {
            if let Some(v) = date_arith(&lhs, &rhs, 1, span) {
                return v;
            }
            Value::string(format!("{lhs}{rhs}"))
        }
        (Sub, Value::String(a), Value::String(b)) => {
            if let Some(v) = date_arith(&lhs, &rhs, -1, span) {
                return v;
            }
            let left = a.trim_end_matches(' ');
            let right = b.trim_start_matches(' ');
            Value::string(format!("{left} {right}"))
        }
        (Add | Sub, Value::String(_), Value::String(_)) => unreachable!(),
        (_, Value::Number(_), Value::Number(_)) => eval_numeric(op, &lhs, &rhs, span),
        _ => Value::error_at("type", format!("{op:?} requires numbers (or strings for +)"), span),
    }
}

fn eval_numeric(op: BinOp, lhs: &Value, rhs: &Value, span: Span) -> Value {
    let (Value::Number(a), Value::Number(b)) = (lhs, rhs) else { unreachable!() };
    use jvalue::number::NumBin::*;
    let both_int = matches!((a.bin(), b.bin()), (Int(_), Int(_)));
    match op {
        BinOp::Add if both_int => int_result(a, b, i64::checked_add, |x, y| x + y),
        BinOp::Add => Value::Number(Number::from_f64(a.as_f64() + b.as_f64())),
        BinOp::Sub if both_int => int_result(a, b, i64::checked_sub, |x, y| x - y),
        BinOp::Sub => Value::Number(Number::from_f64(a.as_f64() - b.as_f64())),
        BinOp::Mul if both_int => int_result(a, b, i64::checked_mul, |x, y| x * y),
        BinOp::Mul => Value::Number(Number::from_f64(a.as_f64() * b.as_f64())),
        BinOp::Div => {
            if b.as_f64() == 0.0 {
                return Value::error_at("div0", "division by 0", span);
            }
            Value::Number(Number::from_f64(a.as_f64() / b.as_f64()))
        }
        BinOp::Mod => {
            if b.as_f64() == 0.0 {
                return Value::error_at("mod0", "modulo by 0", span);
            }
            if both_int {
                if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
                    return Value::Number(Number::from_int(x % y));
                }
            }
            Value::Number(Number::from_f64(a.as_f64() % b.as_f64()))
        }
        _ => unreachable!("non-arithmetic op reached eval_numeric"),
    }
}

fn int_result(a: &Number, b: &Number, checked: fn(i64, i64) -> Option<i64>, float_fallback: fn(f64, f64) -> f64) -> Value {
    match (a.as_i64(), b.as_i64()) {
        (Some(x), Some(y)) => match checked(x, y) {
            Some(r) => Value::Number(Number::from_int(r)),
            None => Value::Number(Number::from_f64(float_fallback(x as f64, y as f64))),
        },
        _ => Value::Number(Number::from_f64(float_fallback(a.as_f64(), b.as_f64()))),
    }
}

/// Bitwise operators: integer bitwise on Numbers, or a
/// union/intersection/symmetric-difference set operation on Objects
/// (`&` keeps members present on both sides; `|` is a member-wise union
/// where the right side wins on conflicts; `^` keeps members present in
/// exactly one side).
pub fn eval_bitwise(op: BinOp, lhs: Value, rhs: Value, span: Span) -> Value {
    match (op, lhs, rhs) {
        (BinOp::BitAnd, Value::Number(a), Value::Number(b)) => int_bitop(a, b, |x, y| x & y, span),
        (BinOp::BitOr, Value::Number(a), Value::Number(b)) => int_bitop(a, b, |x, y| x | y, span),
        (BinOp::BitXor, Value::Number(a), Value::Number(b)) => int_bitop(a, b, |x, y| x ^ y, span),
        (op, Value::Object(a), Value::Object(b)) => object_set_op(op, a, b),
        (op, lhs, rhs) => Value::error_at("type", format!("{op:?} requires two numbers or two objects, got {lhs:?}/{rhs:?}"), span),
    }
}

fn int_bitop(a: Number, b: Number, f: fn(i64, i64) -> i64, span: Span) -> Value {
    match (a.as_i64(), b.as_i64()) {
        (Some(x), Some(y)) => Value::Number(Number::from_int(f(x, y))),
        _ => Value::error_at("type", "bitwise operators require integers", span),
    }
}

fn object_set_op(op: BinOp, a: ObjectValue, b: ObjectValue) -> Value {
    let mut out = ObjectValue::new();
    match op {
        BinOp::BitOr => {
            for k in a.members() {
                out.insert(k.name.clone(), k.value.clone());
            }
            for k in b.members() {
                out.insert(k.name.clone(), k.value.clone());
            }
        }
        BinOp::BitAnd => {
            for k in a.members() {
                if b.get(&k.name).is_some() {
                    out.insert(k.name.clone(), k.value.clone());
                }
            }
        }
        BinOp::BitXor => {
            for k in a.members() {
                if b.get(&k.name).is_none() {
                    out.insert(k.name.clone(), k.value.clone());
                }
            }
            for k in b.members() {
                if a.get(&k.name).is_none() {
                    out.insert(k.name.clone(), k.value.clone());
                }
            }
        }
        _ => unreachable!("non-bitwise op reached object_set_op"),
    }
    Value::Object(out)
}

/// A parsed ISO-8601 duration, supporting the handful of designators
/// period literals use.
struct Period {
    years: i64,
    months: i64,
    weeks: i64,
    days: i64,
    hours: i64,
    minutes: i64,
    seconds: i64,
}

fn parse_period(s: &str) -> Option<Period> {
    let rest = s.strip_prefix('P')?;
    if rest.is_empty() {
        return None;
    }
    let (date_part, time_part) = match rest.split_once('T') {
        Some((d, t)) => (d, Some(t)),
        None => (rest, None),
    };
    let mut p = Period { years: 0, months: 0, weeks: 0, days: 0, hours: 0, minutes: 0, seconds: 0 };
    for (n, unit) in scan_runs(date_part) {
        match unit {
            'Y' => p.years = n,
            'M' => p.months = n,
            'W' => p.weeks = n,
            'D' => p.days = n,
            _ => return None,
        }
    }
    if let Some(t) = time_part {
        for (n, unit) in scan_runs(t) {
            match unit {
                'H' => p.hours = n,
                'M' => p.minutes = n,
                'S' => p.seconds = n,
                _ => return None,
            }
        }
    }
    Some(p)
}

fn scan_runs(s: &str) -> Vec<(i64, char)> {
    let mut out = Vec::new();
    let mut digits = String::new();
    for c in s.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
        } else {
            let Ok(n) = digits.parse() else { return Vec::new() };
            out.push((n, c));
            digits.clear();
        }
    }
    out
}

fn shift_months(date: time::Date, months: i64) -> Option<time::Date> {
    let month_idx = date.month() as i64 - 1;
    let total = date.year() as i64 * 12 + month_idx + months;
    let year = total.div_euclid(12) as i32;
    let month = time::Month::try_from((total.rem_euclid(12) + 1) as u8).ok()?;
    for d in (1..=date.day()).rev() {
        if let Ok(dt) = time::Date::from_calendar_date(year, month, d) {
            return Some(dt);
        }
    }
    None
}

fn shift_date(date: time::Date, p: &Period, sign: i64) -> Option<time::Date> {
    let date = shift_months(date, sign * (p.years * 12 + p.months))?;
    date.checked_add(time::Duration::days(sign * (p.weeks * 7 + p.days)))
}

fn period_duration(p: &Period) -> time::Duration {
    time::Duration::hours(p.hours) + time::Duration::minutes(p.minutes) + time::Duration::seconds(p.seconds)
}

fn format_period(mut dur: time::Duration) -> String {
    let negative = dur.is_negative();
    if negative {
        dur = -dur;
    }
    let days = dur.whole_days();
    dur -= time::Duration::days(days);
    let hours = dur.whole_hours();
    dur -= time::Duration::hours(hours);
    let minutes = dur.whole_minutes();
    dur -= time::Duration::minutes(minutes);
    let seconds = dur.whole_seconds();
    let mut s = String::from(if negative { "-P" } else { "P" });
    if days != 0 {
        s.push_str(&format!("{days}D"));
    }
    if hours != 0 || minutes != 0 || seconds != 0 {
        s.push('T');
        if hours != 0 {
            s.push_str(&format!("{hours}H"));
        }
        if minutes != 0 {
            s.push_str(&format!("{minutes}M"));
        }
        if seconds != 0 || s.ends_with('T') {
            s.push_str(&format!("{seconds}S"));
        }
    }
    if s == "P" {
        s.push_str("0D");
    }
    s
}

const ISO_DATE: &time::format_description::well_known::Iso8601 = &time::format_description::well_known::Iso8601::DATE;
const ISO_DATE_TIME: &time::format_description::well_known::Iso8601 =
    &time::format_description::well_known::Iso8601::DATE_TIME;

/// Date/period arithmetic: `date + period`, `datetime + period`,
/// `date - date`, `datetime - datetime`. `sign` is `1` for `+` and `-1`
/// for `-`. Returns `None` when neither operand parses as a
/// date/datetime/period, so the caller falls through to plain string
/// concatenation/trim-and-join.
fn date_arith(lhs: &Value, rhs: &Value, sign: i64, span: Span) -> Option<Value> {
    let (Value::String(a), Value::String(b)) = (lhs, rhs) else { return None };

    if sign == -1 {
        if let (Ok(da), Ok(db)) = (time::Date::parse(a, ISO_DATE), time::Date::parse(b, ISO_DATE)) {
            let days = (da - db).whole_days();
            return Some(Value::string(format_period(time::Duration::days(days))));
        }
        if let (Ok(dta), Ok(dtb)) =
            (time::PrimitiveDateTime::parse(a, ISO_DATE_TIME), time::PrimitiveDateTime::parse(b, ISO_DATE_TIME))
        {
            return Some(Value::string(format_period(dta - dtb)));
        }
    }

    // `date +/- period` or `period +/- date` (order-independent for `+`).
    let (date_str, period_str) = if parse_period(b).is_some() {
        (a, b)
    } else if sign == 1 && parse_period(a).is_some() {
        (b, a)
    } else {
        return None;
    };
    let period = parse_period(period_str)?;

    if let Ok(date) = time::Date::parse(date_str, ISO_DATE) {
        let shifted = shift_date(date, &period, sign)?;
        return Some(Value::string(shifted.format(ISO_DATE).ok()?));
    }
    if let Ok(dt) = time::PrimitiveDateTime::parse(date_str, ISO_DATE_TIME) {
        let shifted_date = shift_date(dt.date(), &period, sign)?;
        let shifted = time::PrimitiveDateTime::new(shifted_date, dt.time()) + sign_duration(period_duration(&period), sign);
        return Some(Value::string(shifted.format(ISO_DATE_TIME).ok()?));
    }
    None
}

fn sign_duration(d: time::Duration, sign: i64) -> time::Duration {
    if sign < 0 {
        -d
    } else {
        d
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use jvalue::Span;

    fn span() -> Span {
        Span::new(0, 0, 0)
    }

    #[test]
    fn integer_addition_stays_integral() {
        let out = eval_arith(BinOp::Add, Value::Number(Number::from_int(5)), Value::Number(Number::from_int(3)), span());
        assert_eq!(out.to_string(), "8");
    }

    #[test]
    fn division_by_zero_is_an_error_null() {
        let out = eval_arith(BinOp::Div, Value::Number(Number::from_int(1)), Value::Number(Number::from_int(0)), span());
        assert_eq!(out.error_code().map(|c| c.code()), Some("div0"));
    }

    #[test]
    fn modulo_by_zero_is_an_error_null() {
        let out = eval_arith(BinOp::Mod, Value::Number(Number::from_int(1)), Value::Number(Number::from_int(0)), span());
        assert_eq!(out.error_code().map(|c| c.code()), Some("mod0"));
    }

    #[test]
    fn string_concatenation_on_plus() {
        let out = eval_arith(BinOp::Add, Value::string("foo"), Value::Number(Number::from_int(1)), span());
        assert_eq!(out.to_string(), "foo1");
    }

    #[test]
    fn date_plus_period_advances_the_date() {
        let out = eval_arith(BinOp::Add, Value::string("2024-01-31"), Value::string("P1D"), span());
        assert_eq!(out.to_string(), "2024-02-01");
    }

    #[test]
    fn date_minus_date_is_a_period() {
        let out = eval_arith(BinOp::Sub, Value::string("2024-02-01"), Value::string("2024-01-31"), span());
        assert_eq!(out.to_string(), "P1D");
    }

    #[test]
    fn object_union_merges_with_right_side_winning() {
        let mut a = ObjectValue::new();
        a.insert("x", Value::Number(Number::from_int(1)));
        a.insert("y", Value::Number(Number::from_int(2)));
        let mut b = ObjectValue::new();
        b.insert("y", Value::Number(Number::from_int(20)));
        b.insert("z", Value::Number(Number::from_int(3)));
        let out = eval_bitwise(BinOp::BitOr, Value::Object(a), Value::Object(b), span());
        let Value::Object(o) = out else { panic!() };
        assert_eq!(o.get("y").unwrap().to_string(), "20");
        assert_eq!(o.len(), 3);
    }
}
