//! Ties the expression tree to a value, and gives statements their
//! execution semantics. Split by concern the way the
//! original splits `calc.c` (expression evaluation), `find.c`
//! (member/subscript access) and the command loop (statement
//! execution) into separate translation units.

pub mod arith;
pub mod call;
pub mod compare;
pub mod member;
pub mod select;

use crate::ag::AgStorage;
use crate::context::{Context, Layer, LayerFlags};
use crate::engine::Engine;
use crate::expr::{BinOp, Expr};
use crate::stmt::{Outcome, Stmt, StmtKind};
use jvalue::{Span, Value};
use std::rc::Rc;

/// The public evaluation entry point: no enclosing `GROUP BY` storage,
/// so any aggregate call reached directly (rather than through an
/// `AggWrap`) is evaluated with its "array first argument" form.
pub fn eval(expr: &Expr, ctx: &mut Context, engine: &Engine) -> Value {
    eval_ag(expr, ctx, engine, None)
}

/// The private dispatcher every node ultimately goes through, threading
/// the current `GROUP BY` group's aggregate storage (if any) down to
/// `Call` nodes the parser marked with an `ag_offset`.
pub(crate) fn eval_ag(expr: &Expr, ctx: &mut Context, engine: &Engine, ag: Option<&AgStorage>) -> Value {
    match expr {
        Expr::Literal(v) => v.clone(),
        Expr::Name(name) => ctx.resolve(name).unwrap_or_else(Value::null),
        Expr::This => ctx.this(),
        Expr::EnvVar { name, suffix } => member::eval_env_var(name, suffix.as_deref(), ctx, engine, ag),
        Expr::Array(items) => Value::array(items.iter().map(|e| eval_ag(e, ctx, engine, ag)).collect()),
        Expr::Object(members) => member::eval_object(members, ctx, engine, ag),
        Expr::Unary { op, operand, span } => {
            let v = eval_ag(operand, ctx, engine, ag);
            arith::eval_unary(*op, v, *span)
        }
        Expr::Binary { op, lhs, rhs, span } => eval_binary(*op, lhs, rhs, *span, ctx, engine, ag),
        Expr::Ternary { cond, then, else_ } => {
            if eval_ag(cond, ctx, engine, ag).is_true() {
                eval_ag(then, ctx, engine, ag)
            } else {
                eval_ag(else_, ctx, engine, ag)
            }
        }
        Expr::Coalesce { lhs, rhs } => {
            let l = eval_ag(lhs, ctx, engine, ag);
            if l.is_null() {
                eval_ag(rhs, ctx, engine, ag)
            } else {
                l
            }
        }
        Expr::Member { object, name } => {
            let obj = eval_ag(object, ctx, engine, ag);
            member::get_member(&obj, name)
        }
        Expr::DeepMember { object, name } => {
            let obj = eval_ag(object, ctx, engine, ag);
            member::deep_member(&obj, name)
        }
        Expr::Index { object, index } => {
            let obj = eval_ag(object, ctx, engine, ag);
            let idx = eval_ag(index, ctx, engine, ag);
            member::index(&obj, &idx)
        }
        Expr::KeyValueIndex { object, key, value } => {
            let obj = eval_ag(object, ctx, engine, ag);
            let v = eval_ag(value, ctx, engine, ag);
            member::key_value_index(&obj, key, &v)
        }
        Expr::Between { value, low, high } => {
            let v = eval_ag(value, ctx, engine, ag);
            let lo = eval_ag(low, ctx, engine, ag);
            let hi = eval_ag(high, ctx, engine, ag);
            Value::Bool(compare::total_le(&lo, &v) && compare::total_le(&v, &hi))
        }
        Expr::IsNull { value, negate } => {
            let v = eval_ag(value, ctx, engine, ag);
            Value::Bool(v.is_null() != *negate)
        }
        Expr::Call { name, args, span, ag_offset } => match (ag_offset, ag) {
            (Some(offset), Some(storage)) => call::finalize_aggregate(engine, name, storage, *offset, *span),
            _ => call::eval_call(name, args, *span, ctx, engine, ag),
        },
        Expr::Regex { pattern, .. } => Value::string(pattern.clone()),
        Expr::Assign { op, target, value } => {
            let v = eval_ag(value, ctx, engine, ag);
            member::assign(target, v, *op, ctx, engine, ag)
        }
        Expr::Append { target, value } => {
            let v = eval_ag(value, ctx, engine, ag);
            member::append(target, v, ctx, engine, ag)
        }
        Expr::Each { source, body, group } => select::eval_each(source, body, *group, ctx, engine, ag),
        Expr::Join { kind, left, right } => select::eval_join(kind, left, right, ctx, engine, ag),
        Expr::Select(spec) => select::eval_select(spec, ctx, engine),
        Expr::Values { keys, values } => member::eval_values(keys, values, ctx, engine, ag),
        Expr::AggWrap { inner, offsets } => {
            let storage = AgStorage::new(offsets.iter().copied().max().map(|m| m + 1).unwrap_or(0));
            if let Some(Value::Array(rows)) = ctx.default_table() {
                for row in rows.to_vec() {
                    ctx.push(Layer::new(row, LayerFlags::THIS));
                    feed_ag_calls(inner, ctx, engine, &storage);
                    ctx.pop();
                }
            }
            eval_ag(inner, ctx, engine, Some(&storage))
        }
    }
}

fn eval_binary(op: BinOp, lhs: &Expr, rhs: &Expr, span: Span, ctx: &mut Context, engine: &Engine, ag: Option<&AgStorage>) -> Value {
    match op {
        BinOp::And => Value::Bool(eval_ag(lhs, ctx, engine, ag).is_true() && eval_ag(rhs, ctx, engine, ag).is_true()),
        BinOp::Or => Value::Bool(eval_ag(lhs, ctx, engine, ag).is_true() || eval_ag(rhs, ctx, engine, ag).is_true()),
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => {
            let l = eval_ag(lhs, ctx, engine, ag);
            let r = eval_ag(rhs, ctx, engine, ag);
            arith::eval_arith(op, l, r, span)
        }
        BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor => {
            let l = eval_ag(lhs, ctx, engine, ag);
            let r = eval_ag(rhs, ctx, engine, ag);
            arith::eval_bitwise(op, l, r, span)
        }
        _ => {
            let l = eval_ag(lhs, ctx, engine, ag);
            let r = eval_ag(rhs, ctx, engine, ag);
            compare::eval_compare(op, l, r, span)
        }
    }
}

/// Feeds one row's worth of aggregate arguments into `storage`, for
/// every aggregate callsite found anywhere under `expr` (mirrors the
/// parser's own aggregate-offset-assignment tree walk, just evaluating
/// instead of numbering).
pub(crate) fn feed_ag_calls(expr: &Expr, ctx: &mut Context, engine: &Engine, storage: &AgStorage) {
    match expr {
        Expr::Call { name, args, ag_offset: Some(offset), .. } => {
            if let Some(desc) = engine.registry().aggregate(name) {
                if let Some(arg) = args.first() {
                    let v = eval_ag(arg, ctx, engine, None);
                    storage.with_slot(*offset, |slot| (desc.per_row)(slot, &v));
                }
            }
            for a in args {
                feed_ag_calls(a, ctx, engine, storage);
            }
        }
        Expr::Call { args, .. } => args.iter().for_each(|a| feed_ag_calls(a, ctx, engine, storage)),
        Expr::Literal(_) | Expr::Name(_) | Expr::This | Expr::Regex { .. } => {}
        Expr::EnvVar { suffix, .. } => {
            if let Some(s) = suffix {
                feed_ag_calls(s, ctx, engine, storage);
            }
        }
        Expr::Array(items) => items.iter().for_each(|e| feed_ag_calls(e, ctx, engine, storage)),
        Expr::Object(members) => {
            for m in members {
                feed_ag_calls(&m.key, ctx, engine, storage);
                feed_ag_calls(&m.value, ctx, engine, storage);
            }
        }
        Expr::Unary { operand, .. } => feed_ag_calls(operand, ctx, engine, storage),
        Expr::Binary { lhs, rhs, .. } => {
            feed_ag_calls(lhs, ctx, engine, storage);
            feed_ag_calls(rhs, ctx, engine, storage);
        }
        Expr::Ternary { cond, then, else_ } => {
            feed_ag_calls(cond, ctx, engine, storage);
            feed_ag_calls(then, ctx, engine, storage);
            feed_ag_calls(else_, ctx, engine, storage);
        }
        Expr::Coalesce { lhs, rhs } => {
            feed_ag_calls(lhs, ctx, engine, storage);
            feed_ag_calls(rhs, ctx, engine, storage);
        }
        Expr::Member { object, .. } | Expr::DeepMember { object, .. } => feed_ag_calls(object, ctx, engine, storage),
        Expr::Index { object, index } => {
            feed_ag_calls(object, ctx, engine, storage);
            feed_ag_calls(index, ctx, engine, storage);
        }
        Expr::KeyValueIndex { object, value, .. } => {
            feed_ag_calls(object, ctx, engine, storage);
            feed_ag_calls(value, ctx, engine, storage);
        }
        Expr::Between { value, low, high } => {
            feed_ag_calls(value, ctx, engine, storage);
            feed_ag_calls(low, ctx, engine, storage);
            feed_ag_calls(high, ctx, engine, storage);
        }
        Expr::IsNull { value, .. } => feed_ag_calls(value, ctx, engine, storage),
        Expr::Assign { value, .. } | Expr::Append { value, .. } => feed_ag_calls(value, ctx, engine, storage),
        Expr::Each { source, .. } => feed_ag_calls(source, ctx, engine, storage),
        Expr::Join { left, right, .. } => {
            feed_ag_calls(left, ctx, engine, storage);
            feed_ag_calls(right, ctx, engine, storage);
        }
        Expr::Select(_) => {}
        Expr::Values { keys, values } => {
            feed_ag_calls(keys, ctx, engine, storage);
            feed_ag_calls(values, ctx, engine, storage);
        }
        Expr::AggWrap { inner, .. } => feed_ag_calls(inner, ctx, engine, storage),
    }
}

/// Runs a block of statements in a fresh scope depth, truncating any
/// layers pushed by it (e.g. a `for` loop's own init layer) once it's
/// done or once control unwinds out of it.
pub fn run_block(stmts: &[Stmt], ctx: &mut Context, engine: &Engine) -> Outcome {
    let depth = ctx.depth();
    for stmt in stmts {
        let outcome = run_stmt(stmt, ctx, engine);
        if outcome.is_unwinding() {
            ctx.truncate(depth);
            return outcome;
        }
    }
    ctx.truncate(depth);
    Outcome::Next
}

pub fn run_stmt(stmt: &Stmt, ctx: &mut Context, engine: &Engine) -> Outcome {
    match &stmt.kind {
        StmtKind::Block(stmts) => run_block(stmts, ctx, engine),
        StmtKind::ExprStmt(expr) => {
            let v = eval(expr, ctx, engine);
            if v.is_error() {
                return Outcome::Error { where_: Some(stmt.span), text: v.to_string() };
            }
            Outcome::Next
        }
        StmtKind::VarDecl { is_const: _, name, init } => {
            // `const` is enforced at the layer level (see `LayerFlags::CONST`),
            // not per declared name; a `const` at block scope behaves like a
            // `var` here unless its enclosing layer was itself pushed const.
            let v = init.as_ref().map(|e| eval(e, ctx, engine)).unwrap_or_else(Value::null);
            ctx.declare(name, v);
            Outcome::Next
        }
        StmtKind::If { cond, then_branch, else_branch } => {
            if eval(cond, ctx, engine).is_true() {
                run_stmt(then_branch, ctx, engine)
            } else if let Some(else_branch) = else_branch {
                run_stmt(else_branch, ctx, engine)
            } else {
                Outcome::Next
            }
        }
        StmtKind::While { cond, body } => {
            while eval(cond, ctx, engine).is_true() {
                if engine.interrupted() {
                    return Outcome::Error {
                        where_: Some(stmt.span),
                        text: Value::error_at("intr", "interrupted", stmt.span).to_string(),
                    };
                }
                match run_stmt(body, ctx, engine) {
                    Outcome::Break => break,
                    Outcome::Continue | Outcome::Next => {}
                    other => return other,
                }
            }
            Outcome::Next
        }
        StmtKind::For { init, cond, step, body } => {
            let depth = ctx.depth();
            if let Some(init) = init {
                let outcome = run_stmt(init, ctx, engine);
                if outcome.is_unwinding() {
                    ctx.truncate(depth);
                    return outcome;
                }
            }
            loop {
                if let Some(cond) = cond {
                    if !eval(cond, ctx, engine).is_true() {
                        break;
                    }
                }
                if engine.interrupted() {
                    ctx.truncate(depth);
                    return Outcome::Error {
                        where_: Some(stmt.span),
                        text: Value::error_at("intr", "interrupted", stmt.span).to_string(),
                    };
                }
                match run_stmt(body, ctx, engine) {
                    Outcome::Break => break,
                    Outcome::Continue | Outcome::Next => {}
                    other => {
                        ctx.truncate(depth);
                        return other;
                    }
                }
                if let Some(step) = step {
                    eval(step, ctx, engine);
                }
            }
            ctx.truncate(depth);
            Outcome::Next
        }
        StmtKind::Break => Outcome::Break,
        StmtKind::Continue => Outcome::Continue,
        StmtKind::Return(expr) => {
            let v = expr.as_ref().map(|e| eval(e, ctx, engine)).unwrap_or_else(Value::null);
            Outcome::Return(v)
        }
        StmtKind::FunctionDecl { name, params, body } => {
            ctx.declare_function(name, params.clone(), Rc::new((**body).clone()));
            Outcome::Next
        }
        StmtKind::Command { name, arg } => match engine.registry().command(name) {
            Some(desc) => match (desc.argparser)(arg) {
                Ok(parsed) => (desc.runner)(&parsed, ctx, engine),
                Err(text) => Outcome::Error { where_: Some(stmt.span), text },
            },
            None => Outcome::Error { where_: Some(stmt.span), text: format!("unknown command {name}") },
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::parser::{parse_expr, parse_program};
    use jvalue::Number;

    #[test]
    fn arithmetic_and_precedence() {
        let engine = Engine::with_std();
        let mut ctx = engine.std_context();
        let e = parse_expr("1 + 2 * 3", 0).unwrap();
        assert_eq!(eval(&e, &mut ctx, &engine).to_string(), "7");
    }

    #[test]
    fn ternary_and_coalesce() {
        let engine = Engine::with_std();
        let mut ctx = engine.std_context();
        let e = parse_expr("null ?? (1 > 0 ? \"yes\" : \"no\")", 0).unwrap();
        assert_eq!(eval(&e, &mut ctx, &engine).to_string(), "yes");
    }

    #[test]
    fn while_loop_accumulates() {
        let engine = Engine::with_std();
        let mut ctx = engine.std_context();
        let program = parse_program("var n = 0; var i = 0; while (i < 5) { n = n + i; i = i + 1; }", 0).unwrap();
        match run_stmt(&program, &mut ctx, &engine) {
            Outcome::Next => {}
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(ctx.resolve("n").unwrap().to_string(), "10");
    }

    #[test]
    fn user_function_call_and_return() {
        let engine = Engine::with_std();
        let mut ctx = engine.std_context();
        let decl = parse_program("function double(x) { return x * 2; }", 0).unwrap();
        run_stmt(&decl, &mut ctx, &engine);
        let call = parse_expr("double(21)", 0).unwrap();
        assert_eq!(eval(&call, &mut ctx, &engine).to_string(), "42");
    }

    #[test]
    fn bare_number_literal() {
        let engine = Engine::with_std();
        let mut ctx = engine.std_context();
        let v = eval(&Expr::Literal(Value::Number(Number::from_int(5))), &mut ctx, &engine);
        assert_eq!(v.to_string(), "5");
    }
}
