//! Function-call dispatch: builtin, aggregate (either form), or
//! user-defined, in that priority order.

use crate::ag::{AgSlot, AgStorage};
use crate::context::{Context, Layer, LayerFlags, UserFunction};
use crate::engine::Engine;
use crate::expr::Expr;
use crate::registry::CallExtra;
use crate::stmt::Outcome;
use jvalue::{Span, Value};

pub fn eval_call(
    name: &str,
    args: &[Expr],
    span: Span,
    ctx: &mut Context,
    engine: &Engine,
    ag: Option<&AgStorage>,
) -> Value {
    if engine.registry().is_aggregate(name) {
        return eval_bare_aggregate(name, args, span, ctx, engine, ag);
    }
    if let Some(func) = ctx.function(name) {
        return call_user_function(&func, args, span, ctx, engine, ag);
    }
    call_builtin(name, args, span, ctx, engine, ag)
}

/// The "aggregate with array first arg" case: a bare
/// `sum(data.price)` outside any `SELECT`/`GROUP BY` iterates its own
/// argument rather than reading a `GROUP BY` group's fed slot.
fn eval_bare_aggregate(
    name: &str,
    args: &[Expr],
    span: Span,
    ctx: &mut Context,
    engine: &Engine,
    ag: Option<&AgStorage>,
) -> Value {
    if args.len() != 1 {
        return Value::error_at("args", format!("{name}() takes exactly one argument"), span);
    }
    let Some(desc) = engine.registry().aggregate(name) else {
        return Value::error_at("name", format!("unknown aggregate {name}"), span);
    };
    let source = super::eval_ag(&args[0], ctx, engine, ag);
    let Value::Array(arr) = source else {
        return Value::error_at("type", format!("{name}() requires an array argument"), span);
    };
    let mut slot = AgSlot::default();
    for row in arr.to_vec() {
        (desc.per_row)(&mut slot, &row);
    }
    (desc.finalize)(&slot)
}

/// The "aggregate accumulated by parent AG" case: reads
/// back a `GROUP BY` group's already-fed slot instead of evaluating
/// anything itself.
pub fn finalize_aggregate(engine: &Engine, name: &str, storage: &AgStorage, offset: usize, span: Span) -> Value {
    match engine.registry().aggregate(name) {
        Some(desc) => (desc.finalize)(&storage.slot(offset)),
        None => Value::error_at("name", format!("unknown aggregate {name}"), span),
    }
}

fn call_builtin(
    name: &str,
    args: &[Expr],
    span: Span,
    ctx: &mut Context,
    engine: &Engine,
    ag: Option<&AgStorage>,
) -> Value {
    let Some(desc) = engine.registry().function(name) else {
        return Value::error_at("name", format!("unknown function {name}"), span);
    };
    if args.len() < desc.min_args || desc.max_args.map(|m| args.len() > m).unwrap_or(false) {
        return Value::error_at("args", format!("{name}() called with {} arguments", args.len()), span);
    }
    let regex = args.last().and_then(|a| match a {
        Expr::Regex { pattern, global, ignore_case } => Some((pattern.as_str(), *global, *ignore_case)),
        _ => None,
    });
    let values: Vec<Value> = args.iter().map(|a| super::eval_ag(a, ctx, engine, ag)).collect();
    let extra = CallExtra { context: ctx, regex };
    (desc.implementation)(&values, &extra)
}

fn call_user_function(
    func: &UserFunction,
    args: &[Expr],
    span: Span,
    ctx: &mut Context,
    engine: &Engine,
    ag: Option<&AgStorage>,
) -> Value {
    if args.len() != func.params.len() {
        return Value::error_at(
            "args",
            format!("function expects {} arguments, got {}", func.params.len(), args.len()),
            span,
        );
    }
    let values: Vec<Value> = args.iter().map(|a| super::eval_ag(a, ctx, engine, ag)).collect();
    let mut frame = jvalue::ObjectValue::new();
    for (param, value) in func.params.iter().zip(values) {
        frame.insert(param.clone(), value);
    }
    ctx.push(Layer::new(Value::Object(frame), LayerFlags::VAR | LayerFlags::ARGS));
    let outcome = super::run_stmt(&func.body, ctx, engine);
    ctx.pop();
    match outcome {
        Outcome::Return(v) => v,
        Outcome::Error { text, .. } => Value::error("runtime", text),
        _ => Value::null(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::parser::parse_expr;

    #[test]
    fn bare_aggregate_iterates_its_own_argument() {
        let engine = Engine::with_std();
        let mut ctx = engine.std_context();
        let mut arr = Vec::new();
        for n in [1, 2, 3] {
            arr.push(Value::Number(jvalue::Number::from_int(n)));
        }
        ctx.declare("data", Value::array(arr));
        let e = parse_expr("sum(data)", 0).unwrap();
        let out = super::super::eval(&e, &mut ctx, &engine);
        assert_eq!(out.to_string(), "6");
    }

    #[test]
    fn unknown_function_is_a_name_error() {
        let engine = Engine::with_std();
        let mut ctx = engine.std_context();
        let e = parse_expr("nope(1)", 0).unwrap();
        let out = super::super::eval(&e, &mut ctx, &engine);
        assert!(out.is_error());
    }
}
