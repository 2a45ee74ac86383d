//! Renders a [`Value`] to text according to a [`Format`].
//!
//! JSON-style output is a recursive pretty-printer. Non-JSON table
//! styles (grid/`sh`/csv) apply only to top-level table values and are
//! delegated to [`crate::io::grid`]/[`crate::io::nameval`].

use crate::io::format::{Format, TableStyle};
use crate::io::{grid, nameval};
use crate::mbstr;
use crate::value::{ArrayRepr, Value};

pub fn serialize(value: &Value, fmt: &Format) -> String {
    if value.is_table() && fmt.table != TableStyle::Json {
        let Value::Array(arr) = value else { unreachable!("is_table implies Array") };
        let rows = arr.to_vec();
        let body = match fmt.table {
            TableStyle::Grid => grid::render(&rows, fmt),
            TableStyle::Csv => grid::render_csv(&rows, fmt),
            TableStyle::Sh => nameval::render(&rows, fmt),
            TableStyle::Json => unreachable!(),
        };
        return if fmt.shell { mbstr::escape(&body, '\'', fmt.ascii_only, true) } else { body };
    }

    let mut out = String::new();
    write_value(value, fmt, 0, &mut out);
    if fmt.shell {
        format!("'{}'", mbstr::escape(&out, '\'', fmt.ascii_only, true))
    } else {
        out
    }
}

fn write_value(value: &Value, fmt: &Format, depth: usize, out: &mut String) {
    match value {
        Value::Null(np) if np.error.is_some() => {
            if fmt.emit_errors {
                let e = np.error.as_ref().unwrap();
                out.push_str("{\"error\":\"");
                out.push_str(&mbstr::escape(&e.to_string(), '"', fmt.ascii_only, false));
                out.push_str("\"}");
            } else {
                out.push_str("null");
            }
        }
        Value::Null(_) => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.render(fmt.float_digits)),
        Value::String(s) => {
            out.push('"');
            out.push_str(&mbstr::escape(s, '"', fmt.ascii_only, false));
            out.push('"');
        }
        Value::Array(arr) => {
            let items = arr.to_vec();
            write_sequence(items.iter(), '[', ']', fmt, depth, out, |item, fmt, depth, out| {
                write_value(item, fmt, depth, out)
            });
        }
        Value::Object(obj) => {
            let members = obj.members();
            write_sequence(members.iter(), '{', '}', fmt, depth, out, |key, fmt, depth, out| {
                out.push('"');
                out.push_str(&mbstr::escape(&key.name, '"', fmt.ascii_only, false));
                out.push_str("\":");
                if fmt.pretty {
                    out.push(' ');
                }
                write_value(&key.value, fmt, depth, out);
            });
        }
    }
}

fn write_sequence<T>(
    items: impl ExactSizeIterator<Item = T> + Clone,
    open: char,
    close: char,
    fmt: &Format,
    depth: usize,
    out: &mut String,
    mut write_item: impl FnMut(T, &Format, usize, &mut String),
) {
    if items.len() == 0 {
        out.push(open);
        out.push(close);
        return;
    }

    // Render compactly first to measure against `oneline`; if it's short
    // enough (and the caller didn't force one-member-per-line), use it.
    let mut compact = String::new();
    compact.push(open);
    for (i, item) in items.clone().enumerate() {
        if i > 0 {
            compact.push(',');
        }
        write_item(item, &compact_variant(fmt), 0, &mut compact);
    }
    compact.push(close);

    let fits = !fmt.elem && (!fmt.pretty || compact.len() <= fmt.oneline);
    if fits {
        out.push_str(&compact);
        return;
    }

    out.push(open);
    out.push('\n');
    let inner_indent = " ".repeat(fmt.indent * (depth + 1));
    let n = items.len();
    for (i, item) in items.enumerate() {
        out.push_str(&inner_indent);
        write_item(item, fmt, depth + 1, out);
        if i + 1 < n {
            out.push(',');
        }
        out.push('\n');
    }
    out.push_str(&" ".repeat(fmt.indent * depth));
    out.push(close);
}

fn compact_variant(fmt: &Format) -> Format {
    Format { pretty: false, ..fmt.clone() }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::number::Number;
    use crate::value::{Key, ObjectValue};

    #[test]
    fn short_array_renders_on_one_line() {
        let v = Value::array(vec![Value::Number(Number::from_int(1)), Value::Number(Number::from_int(2))]);
        assert_eq!(serialize(&v, &Format::default()), "[1,2]");
    }

    #[test]
    fn long_object_wraps_per_member() {
        let mut obj = ObjectValue::new();
        for i in 0..10 {
            obj.push_key(Key::new(format!("field_number_{i}"), Value::Number(Number::from_int(i))));
        }
        let out = serialize(&Value::Object(obj), &Format::default());
        assert!(out.contains('\n'));
    }

    #[test]
    fn error_null_serializes_when_emit_errors_true() {
        let v = Value::error("E_TEST", "boom");
        let out = serialize(&v, &Format::default());
        assert!(out.contains("E_TEST:boom"));
    }

    #[test]
    fn error_null_suppressed_when_emit_errors_false() {
        let v = Value::error("E_TEST", "boom");
        let fmt = Format { emit_errors: false, ..Format::default() };
        assert_eq!(serialize(&v, &fmt), "null");
    }
}
