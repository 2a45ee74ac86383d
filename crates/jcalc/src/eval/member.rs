//! Member/subscript access, object/env-var construction, and assignment
//! targets.

use crate::ag::AgStorage;
use crate::context::Context;
use crate::engine::Engine;
use crate::expr::{AssignOp, Expr, ObjectMember};
use jvalue::{Number, ObjectValue, Value};

pub fn get_member(obj: &Value, name: &str) -> Value {
    if let Value::Object(o) = obj {
        if let Some(v) = o.get(name) {
            return v.clone();
        }
    }
    if name == "length" {
        return Value::Number(Number::from_int(obj.length_attr() as i64));
    }
    Value::null()
}

/// `..name`: depth-first search for the first member named `name`
/// anywhere under `obj`.
pub fn deep_member(obj: &Value, name: &str) -> Value {
    search(obj, name).unwrap_or_else(Value::null)
}

fn search(v: &Value, name: &str) -> Option<Value> {
    match v {
        Value::Object(o) => {
            if let Some(found) = o.get(name) {
                return Some(found.clone());
            }
            o.members().iter().find_map(|k| search(&k.value, name))
        }
        Value::Array(a) => a.to_vec().iter().find_map(|item| search(item, name)),
        _ => None,
    }
}

pub fn index(obj: &Value, idx: &Value) -> Value {
    match (obj, idx) {
        (Value::Array(a), Value::Number(n)) => match n.as_i64() {
            Some(i) => a.get(i).unwrap_or_else(Value::null),
            None => Value::error("type", "array index must be an integer"),
        },
        (Value::Object(o), Value::String(s)) => o.get(s).cloned().unwrap_or_else(Value::null),
        (Value::String(s), Value::Number(n)) => match n.as_i64() {
            Some(i) => {
                let chars: Vec<char> = s.chars().collect();
                let len = chars.len() as i64;
                let i = if i < 0 { i + len } else { i };
                if i >= 0 && (i as usize) < chars.len() {
                    Value::string(chars[i as usize].to_string())
                } else {
                    Value::null()
                }
            }
            None => Value::error("type", "string index must be an integer"),
        },
        _ => Value::error("type", "unsupported subscript"),
    }
}

/// `arr[key:value]`: finds the first row of `arr` whose
/// `key` member loosely equals `value`.
pub fn key_value_index(obj: &Value, key: &str, value: &Value) -> Value {
    match obj {
        Value::Array(a) => a.get_by_key_value(key, value).unwrap_or_else(Value::null),
        _ => Value::error("type", "[key:value] subscript requires an array"),
    }
}

pub fn eval_env_var(
    name: &str,
    suffix: Option<&Expr>,
    ctx: &mut Context,
    engine: &Engine,
    ag: Option<&AgStorage>,
) -> Value {
    let base = match std::env::var(name) {
        Ok(v) => Value::string(v),
        Err(_) => Value::null(),
    };
    match suffix {
        Some(expr) => {
            let idx = super::eval_ag(expr, ctx, engine, ag);
            index(&base, &idx)
        }
        None => base,
    }
}

pub fn eval_object(members: &[ObjectMember], ctx: &mut Context, engine: &Engine, ag: Option<&AgStorage>) -> Value {
    let mut out = ObjectValue::new();
    for m in members {
        let name = super::eval_ag(&m.key, ctx, engine, ag).to_string();
        let value = super::eval_ag(&m.value, ctx, engine, ag);
        if m.skip_if_null && value.is_null() {
            continue;
        }
        out.insert(name, value);
    }
    Value::Object(out)
}

/// `VALUES(keys, values)`: zips two same-length arrays
/// into an object, keys taken as member names.
pub fn eval_values(keys: &Expr, values: &Expr, ctx: &mut Context, engine: &Engine, ag: Option<&AgStorage>) -> Value {
    let k = super::eval_ag(keys, ctx, engine, ag);
    let v = super::eval_ag(values, ctx, engine, ag);
    match (&k, &v) {
        (Value::Array(ka), Value::Array(va)) => {
            let mut out = ObjectValue::new();
            for (key, val) in ka.to_vec().into_iter().zip(va.to_vec()) {
                out.insert(key.to_string(), val);
            }
            Value::Object(out)
        }
        _ => Value::error("type", "VALUES(keys, values) requires two arrays"),
    }
}

/// One step of an assignment target's path, innermost last. Assignment
/// statements only ever target a `Name`, possibly followed by
/// member/index accessors — `this`-rooted and key-value-indexed targets
/// aren't assignable.
enum PathStep {
    Member(String),
    Index(i64),
}

fn resolve_path(
    target: &Expr,
    ctx: &mut Context,
    engine: &Engine,
    ag: Option<&AgStorage>,
) -> Option<(String, Vec<PathStep>)> {
    match target {
        Expr::Name(name) => Some((name.clone(), Vec::new())),
        Expr::Member { object, name } => {
            let (root, mut steps) = resolve_path(object, ctx, engine, ag)?;
            steps.push(PathStep::Member(name.clone()));
            Some((root, steps))
        }
        Expr::Index { object, index } => {
            let (root, mut steps) = resolve_path(object, ctx, engine, ag)?;
            let idx = super::eval_ag(index, ctx, engine, ag);
            let Value::Number(n) = idx else { return None };
            steps.push(PathStep::Index(n.as_i64()?));
            Some((root, steps))
        }
        _ => None,
    }
}

fn set_at(value: &mut Value, steps: &[PathStep], new_value: Value) {
    match steps.split_first() {
        None => *value = new_value,
        Some((PathStep::Member(name), rest)) => {
            if !matches!(value, Value::Object(_)) {
                *value = Value::Object(ObjectValue::new());
            }
            if let Value::Object(o) = value {
                let mut child = o.get(name).cloned().unwrap_or_else(Value::null);
                set_at(&mut child, rest, new_value);
                o.insert(name.clone(), child);
            }
        }
        Some((PathStep::Index(i), rest)) => {
            if !matches!(value, Value::Array(_)) {
                *value = Value::array(Vec::new());
            }
            if let Value::Array(a) = value {
                let mut items = a.to_vec();
                let len = items.len() as i64;
                let idx = if *i < 0 { i + len } else { *i };
                if idx >= 0 {
                    let idx = idx as usize;
                    while items.len() <= idx {
                        items.push(Value::null());
                    }
                    set_at(&mut items[idx], rest, new_value);
                }
                *value = Value::array(items);
            }
        }
    }
}

fn append_at(value: &mut Value, steps: &[PathStep], new_item: Value) {
    match steps.split_first() {
        None => match value {
            Value::Array(a) => {
                let mut items = a.to_vec();
                items.push(new_item);
                *value = Value::array(items);
            }
            Value::Null(_) => *value = Value::array(vec![new_item]),
            _ => {}
        },
        Some((PathStep::Member(name), rest)) => {
            if let Value::Object(o) = value {
                let mut child = o.get(name).cloned().unwrap_or_else(Value::null);
                append_at(&mut child, rest, new_item);
                o.insert(name.clone(), child);
            }
        }
        Some((PathStep::Index(i), rest)) => {
            if let Value::Array(a) = value {
                let mut items = a.to_vec();
                let len = items.len() as i64;
                let idx = if *i < 0 { i + len } else { *i };
                if idx >= 0 && (idx as usize) < items.len() {
                    append_at(&mut items[idx as usize], rest, new_item);
                    *value = Value::array(items);
                }
            }
        }
    }
}

/// `target op= value`: `=` and `?=` (assign only if
/// `value` isn't null). Returns the value that was (or would have been)
/// assigned, since assignment is itself an expression.
pub fn assign(
    target: &Expr,
    value: Value,
    op: AssignOp,
    ctx: &mut Context,
    engine: &Engine,
    ag: Option<&AgStorage>,
) -> Value {
    if matches!(op, AssignOp::SetIfNotNull) && value.is_null() {
        return super::eval_ag(target, ctx, engine, ag);
    }
    let Some((root, steps)) = resolve_path(target, ctx, engine, ag) else {
        return Value::error("type", "left side of assignment isn't assignable");
    };
    if steps.is_empty() {
        ctx.assign(&root, value.clone());
        return value;
    }
    let mut root_val = ctx.resolve(&root).unwrap_or_else(Value::null);
    set_at(&mut root_val, &steps, value.clone());
    ctx.assign(&root, root_val);
    value
}

/// `target << value`: appends to the array `target`
/// names, creating it if it was null.
pub fn append(target: &Expr, value: Value, ctx: &mut Context, engine: &Engine, ag: Option<&AgStorage>) -> Value {
    let Some((root, steps)) = resolve_path(target, ctx, engine, ag) else {
        return Value::error("type", "left side of << isn't assignable");
    };
    let mut root_val = ctx.resolve(&root).unwrap_or_else(Value::null);
    append_at(&mut root_val, &steps, value.clone());
    ctx.assign(&root, root_val);
    value
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn get_member_falls_back_to_length() {
        let v = Value::array(vec![Value::null(), Value::null()]);
        assert_eq!(get_member(&v, "length").to_string(), "2");
    }

    #[test]
    fn deep_member_finds_nested_key() {
        let mut inner = ObjectValue::new();
        inner.insert("target", Value::Number(Number::from_int(7)));
        let mut outer = ObjectValue::new();
        outer.insert("nested", Value::Object(inner));
        assert_eq!(deep_member(&Value::Object(outer), "target").to_string(), "7");
    }

    #[test]
    fn key_value_index_finds_matching_row() {
        let mut row = ObjectValue::new();
        row.insert("id", Value::Number(Number::from_int(5)));
        let arr = Value::array(vec![Value::Object(row)]);
        let found = key_value_index(&arr, "id", &Value::Number(Number::from_int(5)));
        assert!(!found.is_null());
    }
}
