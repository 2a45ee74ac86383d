//! Aggregate function descriptors.
//!
//! Each descriptor's `per_row` folds one row's argument value into the
//! callsite's [`crate::ag::AgSlot`]; `finalize` reads it back out once
//! every row in the group has been fed. Both halves run under
//! [`crate::eval::AgContext`]'s Feed/Finalize passes — see
//! `crate::eval::select` for how a `GROUP BY` drives the two passes.

use crate::ag::AgSlot;
use crate::registry::AggregateDescriptor;
use jvalue::{Number, Value};
use std::sync::Arc;

/// Names the evaluator treats as aggregates when deciding whether a
/// bare call (the "aggregate with array first arg" form)
/// should iterate its first argument instead of calling a builtin
/// directly, and that [`crate::parser::fold_aggregates`] wraps into an
/// `AG` node inside `SELECT` columns/`HAVING`.
pub const AGGREGATE_NAMES: &[&str] = &["count", "sum", "avg", "min", "max", "any", "every", "arrayagg"];

pub fn is_aggregate_name(name: &str) -> bool {
    AGGREGATE_NAMES.contains(&name)
}

pub fn register(registry: &mut crate::registry::Registry) {
    registry.register_aggregate(AggregateDescriptor {
        name: "count".to_string(),
        per_row: Arc::new(|slot: &mut AgSlot, value: &Value| {
            if !value.is_null() {
                slot.count += 1;
            }
        }),
        finalize: Arc::new(|slot: &AgSlot| Value::Number(Number::from_int(slot.count as i64))),
    });

    registry.register_aggregate(AggregateDescriptor {
        name: "sum".to_string(),
        per_row: Arc::new(|slot: &mut AgSlot, value: &Value| {
            if let Value::Number(n) = value {
                slot.sum += n.as_f64();
                slot.count += 1;
            }
        }),
        finalize: Arc::new(|slot: &AgSlot| Value::Number(Number::from_f64(slot.sum))),
    });

    registry.register_aggregate(AggregateDescriptor {
        name: "avg".to_string(),
        per_row: Arc::new(|slot: &mut AgSlot, value: &Value| {
            if let Value::Number(n) = value {
                slot.sum += n.as_f64();
                slot.count += 1;
            }
        }),
        finalize: Arc::new(|slot: &AgSlot| {
            if slot.count == 0 {
                Value::null()
            } else {
                Value::Number(Number::from_f64(slot.sum / slot.count as f64))
            }
        }),
    });

    registry.register_aggregate(AggregateDescriptor {
        name: "min".to_string(),
        per_row: Arc::new(|slot: &mut AgSlot, value: &Value| {
            if value.is_null() {
                return;
            }
            match &slot.min {
                Some(cur) if cur.total_cmp(value) != std::cmp::Ordering::Greater => {}
                _ => slot.min = Some(value.clone()),
            }
        }),
        finalize: Arc::new(|slot: &AgSlot| slot.min.clone().unwrap_or_else(Value::null)),
    });

    registry.register_aggregate(AggregateDescriptor {
        name: "max".to_string(),
        per_row: Arc::new(|slot: &mut AgSlot, value: &Value| {
            if value.is_null() {
                return;
            }
            match &slot.max {
                Some(cur) if cur.total_cmp(value) != std::cmp::Ordering::Less => {}
                _ => slot.max = Some(value.clone()),
            }
        }),
        finalize: Arc::new(|slot: &AgSlot| slot.max.clone().unwrap_or_else(Value::null)),
    });

    registry.register_aggregate(AggregateDescriptor {
        name: "any".to_string(),
        per_row: Arc::new(|slot: &mut AgSlot, value: &Value| {
            slot.any_true = slot.any_true || value.is_true();
            slot.count += 1;
        }),
        finalize: Arc::new(|slot: &AgSlot| Value::Bool(slot.any_true)),
    });

    registry.register_aggregate(AggregateDescriptor {
        name: "every".to_string(),
        per_row: Arc::new(|slot: &mut AgSlot, value: &Value| {
            slot.all_true = if slot.count == 0 { value.is_true() } else { slot.all_true && value.is_true() };
            slot.count += 1;
        }),
        finalize: Arc::new(|slot: &AgSlot| Value::Bool(slot.count > 0 && slot.all_true)),
    });

    registry.register_aggregate(AggregateDescriptor {
        name: "arrayagg".to_string(),
        per_row: Arc::new(|slot: &mut AgSlot, value: &Value| slot.seen.push(value.clone())),
        finalize: Arc::new(|slot: &AgSlot| Value::array(slot.seen.clone())),
    });
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::registry::Registry;

    #[test]
    fn sum_and_avg_over_fed_rows() {
        let mut reg = Registry::default();
        register(&mut reg);
        let sum = reg.aggregate("sum").unwrap();
        let avg = reg.aggregate("avg").unwrap();
        let mut slot = AgSlot::default();
        for n in [1, 2, 3, 4] {
            (sum.per_row)(&mut slot, &Value::Number(Number::from_int(n)));
        }
        assert_eq!((sum.finalize)(&slot).to_string(), "10");
        assert_eq!((avg.finalize)(&slot).to_string(), "2.5");
    }

    #[test]
    fn every_is_vacuously_false_with_no_rows() {
        let mut reg = Registry::default();
        register(&mut reg);
        let every = reg.aggregate("every").unwrap();
        let slot = AgSlot::default();
        assert!(!(every.finalize)(&slot).is_true());
    }
}
