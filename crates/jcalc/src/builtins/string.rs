//! String builtins: case conversion, trimming, length/substr/indexOf,
//! split/join, padding, and `sprintf`-style formatting.

use crate::registry::FunctionDescriptor;
use jvalue::{mbstr, Number, Value};
use std::sync::Arc;

fn as_str(v: &Value) -> Option<&str> {
    match v {
        Value::String(s) => Some(s),
        _ => None,
    }
}

fn as_int(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64(),
        _ => None,
    }
}

pub fn register(registry: &mut crate::registry::Registry) {
    registry.register_function(FunctionDescriptor {
        name: "toUpperCase".to_string(),
        min_args: 1,
        max_args: Some(1),
        implementation: Arc::new(|args, _e| match as_str(&args[0]) {
            Some(s) => Value::string(s.to_uppercase()),
            None => Value::error("type", "toUpperCase() requires a string"),
        }),
    });
    registry.register_function(FunctionDescriptor {
        name: "toLowerCase".to_string(),
        min_args: 1,
        max_args: Some(1),
        implementation: Arc::new(|args, _e| match as_str(&args[0]) {
            Some(s) => Value::string(s.to_lowercase()),
            None => Value::error("type", "toLowerCase() requires a string"),
        }),
    });
    registry.register_function(FunctionDescriptor {
        name: "trim".to_string(),
        min_args: 1,
        max_args: Some(1),
        implementation: Arc::new(|args, _e| match as_str(&args[0]) {
            Some(s) => Value::string(s.trim()),
            None => Value::error("type", "trim() requires a string"),
        }),
    });
    registry.register_function(FunctionDescriptor {
        name: "length".to_string(),
        min_args: 1,
        max_args: Some(1),
        implementation: Arc::new(|args, _e| Value::Number(Number::from_int(args[0].length_attr() as i64))),
    });
    registry.register_function(FunctionDescriptor {
        name: "substr".to_string(),
        min_args: 2,
        max_args: Some(3),
        implementation: Arc::new(|args, _e| {
            let (Some(s), Some(start)) = (as_str(&args[0]), as_int(&args[1])) else {
                return Value::error("type", "substr() requires (string, number[, number])");
            };
            let chars: Vec<char> = s.chars().collect();
            let len = chars.len() as i64;
            let start = if start < 0 { (start + len).max(0) } else { start.min(len) };
            let count = args.get(2).and_then(as_int).unwrap_or(len - start).max(0);
            let end = (start + count).min(len);
            Value::string(chars[start as usize..end as usize].iter().collect::<String>())
        }),
    });
    registry.register_function(FunctionDescriptor {
        name: "indexOf".to_string(),
        min_args: 2,
        max_args: Some(2),
        implementation: Arc::new(|args, _e| {
            let (Some(haystack), Some(needle)) = (as_str(&args[0]), as_str(&args[1])) else {
                return Value::error("type", "indexOf() requires two strings");
            };
            match haystack.find(needle) {
                Some(byte_idx) => {
                    let char_idx = haystack[..byte_idx].chars().count();
                    Value::Number(Number::from_int(char_idx as i64))
                }
                None => Value::Number(Number::from_int(-1)),
            }
        }),
    });
    registry.register_function(FunctionDescriptor {
        name: "split".to_string(),
        min_args: 2,
        max_args: Some(2),
        implementation: Arc::new(|args, _e| {
            let (Some(s), Some(sep)) = (as_str(&args[0]), as_str(&args[1])) else {
                return Value::error("type", "split() requires two strings");
            };
            let parts = if sep.is_empty() {
                s.chars().map(|c| Value::string(c.to_string())).collect()
            } else {
                s.split(sep).map(Value::string).collect()
            };
            Value::array(parts)
        }),
    });
    registry.register_function(FunctionDescriptor {
        name: "join".to_string(),
        min_args: 2,
        max_args: Some(2),
        implementation: Arc::new(|args, _e| {
            let (Value::Array(arr), Some(sep)) = (&args[0], as_str(&args[1])) else {
                return Value::error("type", "join() requires (array, string)");
            };
            let parts: Vec<String> = arr.to_vec().iter().map(|v| v.to_string()).collect();
            Value::string(parts.join(sep))
        }),
    });
    registry.register_function(FunctionDescriptor {
        name: "padLeft".to_string(),
        min_args: 2,
        max_args: Some(3),
        implementation: Arc::new(|args, _e| pad(args, true)),
    });
    registry.register_function(FunctionDescriptor {
        name: "padRight".to_string(),
        min_args: 2,
        max_args: Some(3),
        implementation: Arc::new(|args, _e| pad(args, false)),
    });
    registry.register_function(FunctionDescriptor {
        name: "sprintf".to_string(),
        min_args: 1,
        max_args: None,
        implementation: Arc::new(|args, _e| match as_str(&args[0]) {
            Some(fmt) => sprintf(fmt, &args[1..]),
            None => Value::error("type", "sprintf() requires a format string"),
        }),
    });
}

/// A `%s`/`%d`/`%i`/`%f`/`%x`/`%X`/`%%` formatter with an optional
/// zero-padded width and, for `%f`, a `.N` precision — the conversions
/// jsoncalc expressions actually reach for when building a string from
/// mixed values, not the full C `printf` grammar.
fn sprintf(fmt: &str, args: &[Value]) -> Value {
    let mut out = String::new();
    let mut arg_idx = 0;
    let mut chars = fmt.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            out.push('%');
            continue;
        }
        let mut zero_pad = false;
        let mut width = 0usize;
        if chars.peek() == Some(&'0') {
            zero_pad = true;
            chars.next();
        }
        while matches!(chars.peek(), Some(d) if d.is_ascii_digit()) {
            width = width * 10 + chars.next().unwrap().to_digit(10).unwrap() as usize;
        }
        let mut precision = None;
        if chars.peek() == Some(&'.') {
            chars.next();
            let mut p = 0usize;
            while matches!(chars.peek(), Some(d) if d.is_ascii_digit()) {
                p = p * 10 + chars.next().unwrap().to_digit(10).unwrap() as usize;
            }
            precision = Some(p);
        }
        let Some(&conv) = chars.peek() else {
            out.push('%');
            break;
        };
        chars.next();
        let Some(arg) = args.get(arg_idx) else {
            return Value::error("args", "sprintf() ran out of arguments for its format string");
        };
        arg_idx += 1;
        let piece = match conv {
            's' => arg.to_string(),
            'd' | 'i' => match arg {
                Value::Number(n) => n.as_i64().unwrap_or(n.as_f64() as i64).to_string(),
                _ => arg.to_string(),
            },
            'f' => match arg {
                Value::Number(n) => format!("{:.*}", precision.unwrap_or(6), n.as_f64()),
                _ => arg.to_string(),
            },
            'x' => match arg {
                Value::Number(n) => format!("{:x}", n.as_i64().unwrap_or(0)),
                _ => arg.to_string(),
            },
            'X' => match arg {
                Value::Number(n) => format!("{:X}", n.as_i64().unwrap_or(0)),
                _ => arg.to_string(),
            },
            other => {
                return Value::error("args", format!("sprintf() doesn't support conversion %{other}"));
            }
        };
        let padded = if piece.len() < width {
            let fill = if zero_pad { '0' } else { ' ' };
            format!("{}{}", fill.to_string().repeat(width - piece.len()), piece)
        } else {
            piece
        };
        out.push_str(&padded);
    }
    Value::string(out)
}

fn pad(args: &[Value], left: bool) -> Value {
    let (Some(s), Some(width)) = (as_str(&args[0]), args.get(1).and_then(as_int)) else {
        return Value::error("type", "pad() requires (string, number[, string])");
    };
    let fill = args.get(2).and_then(as_str).unwrap_or(" ");
    if fill.is_empty() {
        return Value::string(s);
    }
    let have = mbstr::char_len(s);
    let want = width.max(0) as usize;
    if have >= want {
        return Value::string(s);
    }
    let fill_chars: Vec<char> = fill.chars().collect();
    let padding: String = (0..want - have).map(|i| fill_chars[i % fill_chars.len()]).collect();
    Value::string(if left { format!("{padding}{s}") } else { format!("{s}{padding}") })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::context::Context;
    use crate::registry::{CallExtra, Registry};

    #[test]
    fn substr_and_split_and_pad() {
        let mut reg = Registry::default();
        register(&mut reg);
        let ctx = Context::new();
        let extra = CallExtra { context: &ctx, regex: None };

        let substr = reg.function("substr").unwrap();
        let out = (substr.implementation)(
            &[Value::string("Hello, world"), Value::Number(Number::from_int(7))],
            &extra,
        );
        assert_eq!(out.to_string(), "world");

        let split = reg.function("split").unwrap();
        let out = (split.implementation)(&[Value::string("a,b,c"), Value::string(",")], &extra);
        let Value::Array(a) = out else { panic!() };
        assert_eq!(a.len(), 3);

        let pad_left = reg.function("padLeft").unwrap();
        let out = (pad_left.implementation)(
            &[Value::string("7"), Value::Number(Number::from_int(3)), Value::string("0")],
            &extra,
        );
        assert_eq!(out.to_string(), "007");
    }

    #[test]
    fn sprintf_formats_strings_ints_and_floats() {
        let mut reg = Registry::default();
        register(&mut reg);
        let ctx = Context::new();
        let extra = CallExtra { context: &ctx, regex: None };

        let sprintf = reg.function("sprintf").unwrap();
        let out = (sprintf.implementation)(
            &[
                Value::string("%s is %03d, or %.1f%%"),
                Value::string("count"),
                Value::Number(Number::from_int(7)),
                Value::Number(Number::from_f64(7.5)),
            ],
            &extra,
        );
        assert_eq!(out.to_string(), "count is 007, or 7.5%");
    }
}
