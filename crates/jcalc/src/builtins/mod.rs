//! Concrete function/aggregate catalogue, assembled from the
//! per-category modules below and registered into a fresh
//! [`crate::registry::Registry`] at [`crate::engine::Engine`]
//! construction.

pub mod aggregate;
pub mod math;
pub mod string;
pub mod table;

use crate::registry::{FunctionDescriptor, Registry};
use jvalue::defer::{DeferredArray, RangeArray};
use jvalue::{ArrayValue, Value};
use std::sync::Arc;

pub use aggregate::is_aggregate_name;

/// The `math` global exposed in the std context.
pub fn math_constants() -> Value {
    math::constants()
}

pub fn register_all(registry: &mut Registry) {
    math::register(registry);
    string::register(registry);
    table::register(registry);
    aggregate::register(registry);
    register_range(registry);
}

/// `a..b`/`a...b` lowers to a call on this hidden name at parse time,
/// producing a deferred integer-range array rather than materializing
/// the whole range up front.
fn register_range(registry: &mut Registry) {
    registry.register_function(FunctionDescriptor {
        name: "__range".to_string(),
        min_args: 2,
        max_args: Some(2),
        implementation: Arc::new(|args, _extra| {
            let (Value::Number(a), Value::Number(b)) = (&args[0], &args[1]) else {
                return Value::error("type", "range operator requires two numbers");
            };
            let (Some(from), Some(to)) = (a.as_i64(), b.as_i64()) else {
                return Value::error("type", "range operator requires integer bounds");
            };
            Value::Array(ArrayValue::deferred(DeferredArray::new(Arc::new(RangeArray::new(from, to)))))
        }),
    });
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::context::Context;
    use crate::registry::CallExtra;

    #[test]
    fn range_builtin_produces_a_deferred_array() {
        let mut reg = Registry::default();
        register_all(&mut reg);
        let ctx = Context::new();
        let extra = CallExtra { context: &ctx, regex: None };
        let range = reg.function("__range").unwrap();
        let out = (range.implementation)(
            &[Value::Number(jvalue::Number::from_int(1)), Value::Number(jvalue::Number::from_int(3))],
            &extra,
        );
        let Value::Array(arr) = out else { panic!("expected array") };
        assert!(arr.is_deferred());
        assert_eq!(arr.len(), 3);
    }
}
