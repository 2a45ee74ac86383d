//! Grid and CSV table rendering for array-of-object values: the
//! grid/box-drawing path and a `csv` mode.

use crate::io::format::Format;
use crate::value::Value;

/// Column headers: the union of every row's member names, in first-seen
/// order, unless `fmt.quick` asks to trust the first row alone.
fn columns(rows: &[Value], fmt: &Format) -> Vec<String> {
    let mut cols = Vec::new();
    let scan_rows: &[Value] = if fmt.quick { &rows[..rows.len().min(1)] } else { rows };
    for row in scan_rows {
        if let Value::Object(obj) = row {
            for key in obj.members() {
                if !cols.iter().any(|c| c == &key.name) {
                    cols.push(key.name.clone());
                }
            }
        }
    }
    cols
}

fn cell_text(row: &Value, col: &str, fmt: &Format) -> String {
    match row {
        Value::Object(obj) => match obj.get(col) {
            Some(v) if v.is_null() => fmt.null_spelling.clone(),
            Some(v) => v.to_string(),
            None => fmt.null_spelling.clone(),
        },
        _ => fmt.null_spelling.clone(),
    }
}

/// Renders `rows` as a bordered grid. Uses box-drawing characters when
/// `fmt.graphic`, plain ASCII `+`/`-`/`|` otherwise.
pub fn render(rows: &[Value], fmt: &Format) -> String {
    let cols = columns(rows, fmt);
    if cols.is_empty() {
        return String::new();
    }

    let mut widths: Vec<usize> = cols.iter().map(|c| crate::mbstr::width(c)).collect();
    let cell_rows: Vec<Vec<String>> = rows
        .iter()
        .take(fmt.defer_explain_rows)
        .map(|row| cols.iter().map(|c| cell_text(row, c, fmt)).collect())
        .collect();
    for row in &cell_rows {
        for (w, cell) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(crate::mbstr::width(cell));
        }
    }

    let (h, v, tl, tm, tr, ml, mm, mr, bl, bm, br) = if fmt.graphic {
        ('\u{2500}', '\u{2502}', '\u{250c}', '\u{252c}', '\u{2510}', '\u{251c}', '\u{253c}', '\u{2524}', '\u{2514}', '\u{2534}', '\u{2518}')
    } else {
        ('-', '|', '+', '+', '+', '+', '+', '+', '+', '+', '+')
    };

    let rule = |left: char, mid: char, right: char, out: &mut String| {
        out.push(left);
        for (i, w) in widths.iter().enumerate() {
            out.push_str(&h.to_string().repeat(w + 2));
            out.push(if i + 1 < widths.len() { mid } else { right });
        }
        out.push('\n');
    };

    let data_row = |cells: &[String], out: &mut String| {
        out.push(v);
        for (cell, w) in cells.iter().zip(widths.iter()) {
            let pad = w - crate::mbstr::width(cell);
            out.push(' ');
            out.push_str(cell);
            out.push_str(&" ".repeat(pad));
            out.push(' ');
            out.push(v);
        }
        out.push('\n');
    };

    let mut out = String::new();
    rule(tl, tm, tr, &mut out);
    data_row(&cols, &mut out);
    rule(ml, mm, mr, &mut out);
    for row in &cell_rows {
        data_row(row, &mut out);
    }
    rule(bl, bm, br, &mut out);
    out
}

/// Renders `rows` as comma-separated values: a header line of column
/// names, then one line per row. Fields containing a comma, quote, or
/// newline are quoted per RFC 4180.
pub fn render_csv(rows: &[Value], fmt: &Format) -> String {
    let cols = columns(rows, fmt);
    let quote = |s: &str| -> String {
        if s.contains([',', '"', '\n']) {
            format!("\"{}\"", s.replace('"', "\"\""))
        } else {
            s.to_string()
        }
    };
    let mut out = String::new();
    out.push_str(&cols.iter().map(|c| quote(c)).collect::<Vec<_>>().join(","));
    out.push('\n');
    for row in rows {
        let line: Vec<String> = cols.iter().map(|c| quote(&cell_text(row, c, fmt))).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::number::Number;
    use crate::value::{Key, ObjectValue};

    fn row(pairs: &[(&str, Value)]) -> Value {
        let mut obj = ObjectValue::new();
        for (k, v) in pairs {
            obj.push_key(Key::new(*k, v.clone()));
        }
        Value::Object(obj)
    }

    #[test]
    fn grid_has_matching_header_and_border_width() {
        let rows = vec![
            row(&[("a", Value::Number(Number::from_int(1))), ("bb", Value::String("x".into()))]),
            row(&[("a", Value::Number(Number::from_int(22))), ("bb", Value::String("yy".into()))]),
        ];
        let fmt = Format { graphic: false, ..Format::default() };
        let out = render(&rows, &fmt);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0].len(), lines[1].len());
    }

    #[test]
    fn csv_quotes_commas() {
        let rows = vec![row(&[("name", Value::String("a,b".into()))])];
        let out = render_csv(&rows, &Format::default());
        assert!(out.contains("\"a,b\""));
    }
}
