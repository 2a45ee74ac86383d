//! `name=value` rendering for the `sh` table style: output meant to be
//! sourced directly into a shell script.

use crate::io::format::Format;
use crate::mbstr;
use crate::value::Value;

/// Renders each row as a block of `prefix_N_column=value` shell
/// assignments, one block per row, separated by a blank line. A
/// single-row table omits the `_N` row index for readability.
pub fn render(rows: &[Value], fmt: &Format) -> String {
    let mut out = String::new();
    for (i, row) in rows.iter().enumerate() {
        let Value::Object(obj) = row else { continue };
        let row_prefix = if rows.len() == 1 {
            fmt.prefix.clone()
        } else {
            format!("{}{}_", fmt.prefix, i + 1)
        };
        for key in obj.members() {
            out.push_str(&row_prefix);
            out.push_str(&key.name);
            out.push('=');
            let text = if key.value.is_null() { fmt.null_spelling.clone() } else { key.value.to_string() };
            out.push('\'');
            out.push_str(&mbstr::escape(&text, '\'', fmt.ascii_only, true));
            out.push('\'');
            out.push('\n');
        }
        if i + 1 < rows.len() {
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::number::Number;
    use crate::value::{Key, ObjectValue};

    #[test]
    fn single_row_omits_index_prefix() {
        let mut obj = ObjectValue::new();
        obj.push_key(Key::new("count", Value::Number(Number::from_int(3))));
        let out = render(&[Value::Object(obj)], &Format::default());
        assert_eq!(out.trim(), "count='3'");
    }

    #[test]
    fn multi_row_numbers_each_block() {
        let mut a = ObjectValue::new();
        a.push_key(Key::new("x", Value::Number(Number::from_int(1))));
        let mut b = ObjectValue::new();
        b.push_key(Key::new("x", Value::Number(Number::from_int(2))));
        let out = render(&[Value::Object(a), Value::Object(b)], &Format::default());
        assert!(out.contains("1_x='1'"));
        assert!(out.contains("2_x='2'"));
    }
}
