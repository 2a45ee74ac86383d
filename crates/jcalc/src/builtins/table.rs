//! Table/object introspection and date builtins: `flatten`, `keys`,
//! `values`, and friends.

use crate::registry::FunctionDescriptor;
use jvalue::{ObjectValue, Value};
use std::sync::Arc;

pub fn register(registry: &mut crate::registry::Registry) {
    registry.register_function(FunctionDescriptor {
        name: "keys".to_string(),
        min_args: 1,
        max_args: Some(1),
        implementation: Arc::new(|args, _e| match &args[0] {
            Value::Object(o) => Value::array(o.members().iter().map(|k| Value::string(k.name.clone())).collect()),
            _ => Value::error("type", "keys() requires an object"),
        }),
    });
    registry.register_function(FunctionDescriptor {
        name: "values".to_string(),
        min_args: 1,
        max_args: Some(1),
        implementation: Arc::new(|args, _e| match &args[0] {
            Value::Object(o) => Value::array(o.members().iter().map(|k| k.value.clone()).collect()),
            _ => Value::error("type", "values() requires an object"),
        }),
    });
    registry.register_function(FunctionDescriptor {
        name: "typeof".to_string(),
        min_args: 1,
        max_args: Some(1),
        implementation: Arc::new(|args, _e| Value::string(args[0].typeof_extended())),
    });
    registry.register_function(FunctionDescriptor {
        name: "flatten".to_string(),
        min_args: 1,
        max_args: Some(1),
        implementation: Arc::new(|args, _e| flatten(&args[0])),
    });
    registry.register_function(FunctionDescriptor {
        name: "today".to_string(),
        min_args: 0,
        max_args: Some(0),
        implementation: Arc::new(|_args, _e| {
            let now = time::OffsetDateTime::now_utc();
            Value::string(
                now.date()
                    .format(&time::format_description::well_known::Iso8601::DATE)
                    .unwrap_or_default(),
            )
        }),
    });
    registry.register_function(FunctionDescriptor {
        name: "now".to_string(),
        min_args: 0,
        max_args: Some(0),
        implementation: Arc::new(|_args, _e| {
            let now = time::OffsetDateTime::now_utc();
            Value::string(
                now.format(&time::format_description::well_known::Iso8601::DATE_TIME)
                    .unwrap_or_default(),
            )
        }),
    });
}

/// Flattens nested objects into a single-level object with dotted key
/// paths (e.g. `{a:{b:1}}` -> `{"a.b":1}`). Arrays are left intact as
/// member values rather than expanded with numeric keys — an Array is
/// never treated as a sparse Object here.
fn flatten(v: &Value) -> Value {
    let mut out = ObjectValue::new();
    flatten_into(&mut out, "", v);
    Value::Object(out)
}

fn flatten_into(out: &mut ObjectValue, prefix: &str, v: &Value) {
    match v {
        Value::Object(o) if !o.is_empty() => {
            for k in o.members() {
                let path = if prefix.is_empty() { k.name.clone() } else { format!("{prefix}.{}", k.name) };
                flatten_into(out, &path, &k.value);
            }
        }
        other => out.insert(prefix, other.clone()),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::context::Context;
    use crate::registry::{CallExtra, Registry};
    use jvalue::Number;

    #[test]
    fn flatten_nests_dotted_keys() {
        let mut outer = ObjectValue::new();
        let mut inner = ObjectValue::new();
        inner.insert("b", Value::Number(Number::from_int(1)));
        outer.insert("a", Value::Object(inner));
        let flat = flatten(&Value::Object(outer));
        let Value::Object(o) = flat else { panic!() };
        assert_eq!(o.get("a.b").unwrap().to_string(), "1");
    }

    #[test]
    fn keys_and_values_round_trip() {
        let mut reg = Registry::default();
        register(&mut reg);
        let ctx = Context::new();
        let extra = CallExtra { context: &ctx, regex: None };
        let mut o = ObjectValue::new();
        o.insert("a", Value::Number(Number::from_int(1)));
        let keys = reg.function("keys").unwrap();
        let out = (keys.implementation)(&[Value::Object(o)], &extra);
        let Value::Array(a) = out else { panic!() };
        assert_eq!(a.to_vec()[0].to_string(), "a");
    }
}
