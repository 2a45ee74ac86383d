//! Arithmetic builtins: the unary/binary numeric function table and
//! the `math` constant object.

use crate::registry::{CallExtra, FunctionDescriptor};
use jvalue::{Number, Value};
use std::sync::Arc;

fn num(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => Some(n.as_f64()),
        _ => None,
    }
}

fn unary(name: &'static str, f: impl Fn(f64) -> f64 + Send + Sync + 'static) -> FunctionDescriptor {
    FunctionDescriptor {
        name: name.to_string(),
        min_args: 1,
        max_args: Some(1),
        implementation: Arc::new(move |args, _extra| match num(&args[0]) {
            Some(x) => Value::Number(Number::from_f64(f(x))),
            None => Value::error("type", format!("{name}() requires a number")),
        }),
    }
}

pub fn register(registry: &mut crate::registry::Registry) {
    registry.register_function(unary("abs", f64::abs));
    registry.register_function(unary("sqrt", f64::sqrt));
    registry.register_function(unary("floor", f64::floor));
    registry.register_function(unary("ceil", f64::ceil));
    registry.register_function(unary("round", |x| x.round()));
    registry.register_function(unary("sin", f64::sin));
    registry.register_function(unary("cos", f64::cos));
    registry.register_function(unary("tan", f64::tan));
    registry.register_function(unary("log", f64::ln));
    registry.register_function(unary("log10", f64::log10));
    registry.register_function(unary("exp", f64::exp));

    registry.register_function(FunctionDescriptor {
        name: "pow".to_string(),
        min_args: 2,
        max_args: Some(2),
        implementation: Arc::new(|args, _extra| match (num(&args[0]), num(&args[1])) {
            (Some(b), Some(e)) => Value::Number(Number::from_f64(b.powf(e))),
            _ => Value::error("type", "pow() requires two numbers"),
        }),
    });

    registry.register_function(FunctionDescriptor {
        name: "mod".to_string(),
        min_args: 2,
        max_args: Some(2),
        implementation: Arc::new(|args, _extra| match (num(&args[0]), num(&args[1])) {
            (Some(a), Some(b)) if b != 0.0 => Value::Number(Number::from_f64(a % b)),
            (Some(_), Some(_)) => Value::error("math", "division by zero"),
            _ => Value::error("type", "mod() requires two numbers"),
        }),
    });
}

/// The `math` global, part of the std context's population: a handful
/// of named constants, looked up like any other object member.
pub fn constants() -> Value {
    let mut o = jvalue::ObjectValue::new();
    o.insert("pi", Value::Number(Number::from_f64(std::f64::consts::PI)));
    o.insert("e", Value::Number(Number::from_f64(std::f64::consts::E)));
    Value::Object(o)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::context::Context;
    use crate::registry::Registry;

    #[test]
    fn abs_and_pow_round_trip() {
        let mut reg = Registry::default();
        register(&mut reg);
        let ctx = Context::new();
        let extra = CallExtra { context: &ctx, regex: None };
        let abs = reg.function("abs").unwrap();
        let out = (abs.implementation)(&[Value::Number(Number::from_int(-4))], &extra);
        assert_eq!(out.to_string(), "4");
        let pow = reg.function("pow").unwrap();
        let out = (pow.implementation)(
            &[Value::Number(Number::from_int(2)), Value::Number(Number::from_int(10))],
            &extra,
        );
        assert_eq!(out.to_string(), "1024");
    }
}
