//! `SELECT` and the `@`/`@@`/join family: the pipeline runs FROM, WHERE,
//! GROUP BY, HAVING, ORDER BY, LIMIT, DISTINCT, in that order, and the
//! `Join`/`Each` nodes it lowers a full `SELECT` into are also reachable
//! directly from expression syntax.

use crate::ag::AgStorage;
use crate::context::{Context, Layer, LayerFlags};
use crate::engine::Engine;
use crate::expr::{Expr, JoinKind, SelectSpec};
use jvalue::{ArrayValue, ObjectValue, Value};
use std::cmp::Ordering;

/// `source @ body`: bind each element of `source` as `this` and collect
/// `body`'s results into an array. `group` selects the `@@` form, which
/// binds the whole array as `this` once instead of iterating it —
/// used for "apply this to the collection as a whole" expressions.
pub fn eval_each(source: &Expr, body: &Expr, group: bool, ctx: &mut Context, engine: &Engine, ag: Option<&AgStorage>) -> Value {
    let src = super::eval_ag(source, ctx, engine, ag);
    let Value::Array(arr) = src else {
        return Value::error("type", "@ requires an array on the left");
    };
    if group {
        ctx.push(Layer::new(Value::Array(arr), LayerFlags::THIS | LayerFlags::DATA));
        let v = super::eval_ag(body, ctx, engine, ag);
        ctx.pop();
        return v;
    }
    let mut out = Vec::new();
    for row in arr.to_vec() {
        if engine.interrupted() {
            return Value::error("intr", "interrupted");
        }
        ctx.push(Layer::new(row, LayerFlags::THIS | LayerFlags::DATA));
        out.push(super::eval_ag(body, ctx, engine, ag));
        ctx.pop();
    }
    Value::array(out)
}

pub fn eval_join(kind: &JoinKind, left: &Expr, right: &Expr, ctx: &mut Context, engine: &Engine, ag: Option<&AgStorage>) -> Value {
    let l = super::eval_ag(left, ctx, engine, ag);
    let r = super::eval_ag(right, ctx, engine, ag);
    let (Value::Array(la), Value::Array(ra)) = (&l, &r) else {
        return Value::error("type", "join operators require two arrays");
    };

    // When exactly one side is deferred, scan it as the outer loop so its
    // rows are produced one at a time rather than materialized up front;
    // the undeferred side is fully materialized for the inner scan either
    // way, so swapping only changes which side pays for a full scan twice.
    if la.is_deferred() && !ra.is_deferred() {
        return join_scan(&ra.to_vec(), la, true, kind, engine);
    }
    join_scan(&la.to_vec(), ra, false, kind, engine)
}

/// Runs the nested-loop join with `outer` iterated row by row and `inner`
/// scanned for each outer row. `outer_is_right` records which original
/// side `outer` came from, so matched rows always merge left-then-right
/// and unmatched-row emission picks the correct side regardless of which
/// one ended up as the outer loop.
fn join_scan(outer: &[Value], inner: &ArrayValue, outer_is_right: bool, kind: &JoinKind, engine: &Engine) -> Value {
    let inner_rows = inner.to_vec();
    let mut out = Vec::new();
    let mut inner_matched = vec![false; inner_rows.len()];
    for orow in outer {
        if engine.interrupted() {
            return Value::error("intr", "interrupted");
        }
        let mut matched = false;
        for (i, irow) in inner_rows.iter().enumerate() {
            if rows_match_on_common_keys(orow, irow) {
                matched = true;
                inner_matched[i] = true;
                let (lrow, rrow) = if outer_is_right { (irow, orow) } else { (orow, irow) };
                out.push(merge_rows(lrow, rrow));
            }
        }
        let emit_unmatched_outer = match (kind, outer_is_right) {
            (JoinKind::Left, false) | (JoinKind::Right, true) => true,
            _ => false,
        };
        if !matched && emit_unmatched_outer {
            out.push(orow.clone());
        }
    }
    let emit_unmatched_inner = match (kind, outer_is_right) {
        (JoinKind::Right, false) | (JoinKind::Left, true) => true,
        _ => false,
    };
    if emit_unmatched_inner {
        for (i, irow) in inner_rows.iter().enumerate() {
            if !inner_matched[i] {
                out.push(irow.clone());
            }
        }
    }
    Value::array(out)
}

/// Two rows match if they share at least one member name and every
/// shared name agrees loosely on value — a natural join key isn't
/// declared up front, so this is inferred from the data itself, and a
/// single mismatched common key voids the pairing entirely.
fn rows_match_on_common_keys(a: &Value, b: &Value) -> bool {
    let (Value::Object(oa), Value::Object(ob)) = (a, b) else { return false };
    let mut any_common = false;
    for k in oa.members() {
        if let Some(v) = ob.get(&k.name) {
            any_common = true;
            if !v.loose_eq(&k.value) {
                return false;
            }
        }
    }
    any_common
}

fn merge_rows(a: &Value, b: &Value) -> Value {
    let (Value::Object(oa), Value::Object(ob)) = (a, b) else { return a.clone() };
    let mut out = oa.clone();
    for k in ob.members() {
        out.insert(k.name.clone(), k.value.clone());
    }
    Value::Object(out)
}

pub fn eval_select(spec: &SelectSpec, ctx: &mut Context, engine: &Engine) -> Value {
    let source = match &spec.from {
        Some(expr) => super::eval(expr, ctx, engine),
        // Absent both a `FROM` clause and a default table in context,
        // this is an error, not an empty result.
        None => match ctx.default_table() {
            Some(table) => table,
            None => return Value::error("noDefTable", "SELECT has no FROM clause and no default table in context"),
        },
    };
    let Value::Array(arr) = source else {
        return Value::error("type", "SELECT source must be an array");
    };
    let mut rows = arr.to_vec();

    if let Some(where_) = &spec.where_ {
        rows.retain(|row| row_value(where_, row, ctx, engine).is_true());
    }

    let is_aggregate =
        spec.columns.iter().any(|(e, _)| matches!(**e, Expr::AggWrap { .. })) || matches!(spec.having.as_deref(), Some(Expr::AggWrap { .. }));

    let groups: Vec<Vec<Value>> = if !spec.group_by.is_empty() {
        group_rows(&spec.group_by, rows, ctx, engine)
    } else if is_aggregate {
        vec![rows]
    } else {
        rows.into_iter().map(|r| vec![r]).collect()
    };

    let offset_count = spec
        .columns
        .iter()
        .filter_map(|(e, _)| max_ag_offset(e))
        .chain(spec.having.as_deref().and_then(max_ag_offset))
        .max()
        .map(|m| m + 1)
        .unwrap_or(0);

    let mut out_rows = Vec::new();
    for group in &groups {
        if engine.interrupted() {
            return Value::error("intr", "interrupted");
        }
        let storage = AgStorage::new(offset_count);
        let representative = group.first().cloned().unwrap_or_else(Value::null);
        ctx.push(Layer::new(representative, LayerFlags::THIS | LayerFlags::DATA));
        for row in group {
            ctx.push(Layer::new(row.clone(), LayerFlags::THIS));
            for (col, _) in &spec.columns {
                super::feed_ag_calls(col, ctx, engine, &storage);
            }
            if let Some(h) = &spec.having {
                super::feed_ag_calls(h, ctx, engine, &storage);
            }
            ctx.pop();
        }
        let keep = match &spec.having {
            Some(h) => super::eval_ag(h, ctx, engine, Some(&storage)).is_true(),
            None => true,
        };
        if keep {
            let mut obj = ObjectValue::new();
            for (col, alias) in &spec.columns {
                let name = alias.clone().unwrap_or_else(|| column_label(col));
                obj.insert(name, super::eval_ag(col, ctx, engine, Some(&storage)));
            }
            out_rows.push(Value::Object(obj));
        }
        ctx.pop();
    }

    if !spec.order_by.is_empty() {
        let mut keyed: Vec<(Vec<Value>, Value)> = out_rows
            .into_iter()
            .map(|row| {
                let keys = spec.order_by.iter().map(|(e, _)| row_value(e, &row, ctx, engine)).collect();
                (keys, row)
            })
            .collect();
        keyed.sort_by(|a, b| {
            for (i, (_, descending)) in spec.order_by.iter().enumerate() {
                let ord = a.0[i].total_cmp(&b.0[i]);
                if ord != Ordering::Equal {
                    return if *descending { ord.reverse() } else { ord };
                }
            }
            Ordering::Equal
        });
        out_rows = keyed.into_iter().map(|(_, row)| row).collect();
    }

    if spec.distinct {
        let mut seen: Vec<Value> = Vec::new();
        out_rows.retain(|row| {
            if seen.iter().any(|s| s.deep_equal(row)) {
                false
            } else {
                seen.push(row.clone());
                true
            }
        });
    }

    if let Some(limit) = &spec.limit {
        if let Value::Number(n) = super::eval(limit, ctx, engine) {
            if let Some(n) = n.as_i64() {
                out_rows.truncate(n.max(0) as usize);
            }
        }
    }

    Value::array(out_rows)
}

fn row_value(expr: &Expr, row: &Value, ctx: &mut Context, engine: &Engine) -> Value {
    ctx.push(Layer::new(row.clone(), LayerFlags::THIS | LayerFlags::DATA));
    let v = super::eval(expr, ctx, engine);
    ctx.pop();
    v
}

fn group_rows(group_by: &[Box<Expr>], rows: Vec<Value>, ctx: &mut Context, engine: &Engine) -> Vec<Vec<Value>> {
    let mut groups: Vec<(Vec<Value>, Vec<Value>)> = Vec::new();
    for row in rows {
        let key: Vec<Value> = group_by.iter().map(|e| row_value(e, &row, ctx, engine)).collect();
        match groups.iter_mut().find(|(k, _)| keys_eq(k, &key)) {
            Some((_, bucket)) => bucket.push(row),
            None => groups.push((key, vec![row])),
        }
    }
    groups.into_iter().map(|(_, rows)| rows).collect()
}

fn keys_eq(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
}

fn column_label(expr: &Expr) -> String {
    match expr {
        Expr::Name(n) => n.clone(),
        Expr::Member { name, .. } => name.clone(),
        Expr::AggWrap { inner, .. } => column_label(inner),
        // A call's implicit name is its argument's, not the function's:
        // `sum(b)` labels its column "b", the way the original
        // jsoncalc names aggregate columns after the aggregated field.
        Expr::Call { args, name, .. } => args.first().map(column_label).unwrap_or_else(|| name.clone()),
        _ => "expr".to_string(),
    }
}

/// Walks an expression tree for the highest `AgStorage` offset any
/// `AggWrap` node under it uses, to size a group's storage (mirrors
/// the parser's own aggregate-offset assignment walk).
fn max_ag_offset(expr: &Expr) -> Option<usize> {
    let merge = |a: Option<usize>, b: Option<usize>| [a, b].into_iter().flatten().max();
    match expr {
        Expr::AggWrap { inner, offsets } => merge(max_ag_offset(inner), offsets.iter().copied().max()),
        Expr::Binary { lhs, rhs, .. } => merge(max_ag_offset(lhs), max_ag_offset(rhs)),
        Expr::Unary { operand, .. } => max_ag_offset(operand),
        Expr::Ternary { cond, then, else_ } => merge(merge(max_ag_offset(cond), max_ag_offset(then)), max_ag_offset(else_)),
        Expr::Coalesce { lhs, rhs } => merge(max_ag_offset(lhs), max_ag_offset(rhs)),
        Expr::Member { object, .. } | Expr::DeepMember { object, .. } => max_ag_offset(object),
        Expr::Index { object, index } => merge(max_ag_offset(object), max_ag_offset(index)),
        Expr::KeyValueIndex { object, value, .. } => merge(max_ag_offset(object), max_ag_offset(value)),
        Expr::Between { value, low, high } => merge(merge(max_ag_offset(value), max_ag_offset(low)), max_ag_offset(high)),
        Expr::IsNull { value, .. } => max_ag_offset(value),
        Expr::Call { args, .. } => args.iter().filter_map(max_ag_offset).max(),
        Expr::Array(items) => items.iter().filter_map(max_ag_offset).max(),
        Expr::Object(members) => members.iter().filter_map(|m| merge(max_ag_offset(&m.key), max_ag_offset(&m.value))).max(),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::expr::BinOp;
    use jvalue::{Number, Span};

    fn row(pairs: &[(&str, Value)]) -> Value {
        let mut o = ObjectValue::new();
        for (k, v) in pairs {
            o.insert(*k, v.clone());
        }
        Value::Object(o)
    }

    #[test]
    fn where_filters_rows() {
        let engine = Engine::with_std();
        let mut ctx = engine.std_context();
        let rows = vec![
            row(&[("id", Value::Number(Number::from_int(1)))]),
            row(&[("id", Value::Number(Number::from_int(2)))]),
        ];
        ctx.declare("data", Value::array(rows));
        let spec = SelectSpec {
            columns: vec![(Box::new(Expr::Name("id".into())), None)],
            from: Some(Box::new(Expr::Name("data".into()))),
            where_: Some(Box::new(Expr::Binary {
                op: BinOp::Gt,
                lhs: Box::new(Expr::Name("id".into())),
                rhs: Box::new(Expr::Literal(Value::Number(Number::from_int(1)))),
                span: Span::new(0, 0, 0),
            })),
            group_by: vec![],
            having: None,
            order_by: vec![],
            limit: None,
            distinct: false,
        };
        let Value::Array(out) = eval_select(&spec, &mut ctx, &engine) else { panic!() };
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn select_with_no_from_and_no_default_table_is_an_error() {
        let engine = Engine::with_std();
        let mut ctx = engine.std_context();
        let spec = SelectSpec {
            columns: vec![(Box::new(Expr::Name("id".into())), None)],
            from: None,
            where_: None,
            group_by: vec![],
            having: None,
            order_by: vec![],
            limit: None,
            distinct: false,
        };
        let out = eval_select(&spec, &mut ctx, &engine);
        assert_eq!(out.error_code().map(|c| c.code()), Some("noDefTable"));
    }

    #[test]
    fn select_with_no_from_picks_up_the_default_table() {
        let engine = Engine::with_std();
        let mut ctx = engine.std_context();
        let rows = vec![row(&[("id", Value::Number(Number::from_int(1)))])];
        ctx.push(Layer::new(Value::array(rows), LayerFlags::DATA));
        let spec = SelectSpec {
            columns: vec![(Box::new(Expr::Name("id".into())), None)],
            from: None,
            where_: None,
            group_by: vec![],
            having: None,
            order_by: vec![],
            limit: None,
            distinct: false,
        };
        let Value::Array(out) = eval_select(&spec, &mut ctx, &engine) else { panic!() };
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn natural_join_merges_matching_rows() {
        let engine = Engine::with_std();
        let mut ctx = engine.std_context();
        let left = Value::array(vec![row(&[("id", Value::Number(Number::from_int(1)))])]);
        let right = Value::array(vec![row(&[("id", Value::Number(Number::from_int(1))), ("name", Value::string("a"))])]);
        ctx.declare("l", left);
        ctx.declare("r", right);
        let out = eval_join(&JoinKind::Natural, &Expr::Name("l".into()), &Expr::Name("r".into()), &mut ctx, &engine, None);
        let Value::Array(rows) = out else { panic!() };
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn natural_join_rejects_rows_that_clash_on_a_second_common_key() {
        let engine = Engine::with_std();
        let mut ctx = engine.std_context();
        let left = Value::array(vec![row(&[("id", Value::Number(Number::from_int(1))), ("flag", Value::Bool(true))])]);
        let right = Value::array(vec![row(&[("id", Value::Number(Number::from_int(1))), ("flag", Value::Bool(false))])]);
        ctx.declare("l", left);
        ctx.declare("r", right);
        let out = eval_join(&JoinKind::Natural, &Expr::Name("l".into()), &Expr::Name("r".into()), &mut ctx, &engine, None);
        let Value::Array(rows) = out else { panic!() };
        assert_eq!(rows.len(), 0);
    }

    #[test]
    fn left_join_keeps_unmatched_left_rows_regardless_of_which_side_is_deferred() {
        use jvalue::defer::{DeferredArray, RangeArray};
        use std::sync::Arc;

        let engine = Engine::with_std();
        let mut ctx = engine.std_context();
        let left = Value::array(vec![
            row(&[("id", Value::Number(Number::from_int(1)))]),
            row(&[("id", Value::Number(Number::from_int(9)))]),
        ]);
        // A deferred array standing in for the right side: id=1 only, so
        // the left's id=9 row must survive as unmatched either way the
        // join is internally scanned.
        let right = Value::Array(ArrayValue::deferred(DeferredArray::new(Arc::new(RangeArray::new(1, 1)))));
        ctx.declare("l", left);
        ctx.declare("r", right);
        let out = eval_join(&JoinKind::Left, &Expr::Name("l".into()), &Expr::Name("r".into()), &mut ctx, &engine, None);
        let Value::Array(rows) = out else { panic!() };
        assert_eq!(rows.len(), 2);
    }
}
