//! Evaluating the same expression tree from two fresh contexts, each
//! with its own aggregate-storage buffer, should yield the same result
//! regardless of row evaluation order. Exercised with `quickcheck` over
//! shuffled row orderings, the way `jvalue`'s own `tests/properties.rs`
//! property-tests the value model.

use jcalc::{parse_expr, Engine};
use quickcheck::{Arbitrary, Gen};
use quickcheck_macros::quickcheck;

/// A handful of small integer rows, plus one arbitrary permutation of
/// them — small enough that `sum`'s float accumulation never loses the
/// exactness needed to compare finalized values across orderings.
#[derive(Debug, Clone)]
struct ShuffledRows {
    values: Vec<i64>,
    permutation: Vec<usize>,
}

impl Arbitrary for ShuffledRows {
    fn arbitrary(g: &mut Gen) -> Self {
        let n = 1 + usize::arbitrary(g) % 6;
        let values: Vec<i64> = (0..n).map(|_| i64::arbitrary(g) % 100).collect();
        let mut permutation: Vec<usize> = (0..n).collect();
        // Fisher-Yates using the generator's own arbitrary bools/ints,
        // since quickcheck::Gen exposes no direct shuffle.
        for i in (1..n).rev() {
            let j = usize::arbitrary(g) % (i + 1);
            permutation.swap(i, j);
        }
        ShuffledRows { values, permutation }
    }
}

fn eval_sum_over(rows: &[i64]) -> String {
    let engine = Engine::with_std();
    let mut ctx = engine.std_context();
    let literal = format!("[{}]", rows.iter().map(|n| format!("{{\"b\":{n}}}")).collect::<Vec<_>>().join(","));
    ctx.declare("data", jvalue::io::parse_str(&literal).unwrap());
    let expr = parse_expr("SELECT sum(b) FROM data", 0).unwrap();
    jcalc::eval::eval(&expr, &mut ctx, &engine).to_string()
}

#[quickcheck]
fn aggregate_sum_is_order_independent(rows: ShuffledRows) -> bool {
    let shuffled: Vec<i64> = rows.permutation.iter().map(|&i| rows.values[i]).collect();
    eval_sum_over(&rows.values) == eval_sum_over(&shuffled)
}

#[quickcheck]
fn aggregate_count_and_min_max_are_order_independent(rows: ShuffledRows) -> bool {
    let shuffled: Vec<i64> = rows.permutation.iter().map(|&i| rows.values[i]).collect();
    let engine = Engine::with_std();

    let eval_all = |values: &[i64]| {
        let mut ctx = engine.std_context();
        let literal = format!("[{}]", values.iter().map(|n| format!("{{\"b\":{n}}}")).collect::<Vec<_>>().join(","));
        ctx.declare("data", jvalue::io::parse_str(&literal).unwrap());
        let expr = parse_expr("SELECT count(b), min(b), max(b) FROM data", 0).unwrap();
        jcalc::eval::eval(&expr, &mut ctx, &engine).to_string()
    };

    eval_all(&rows.values) == eval_all(&shuffled)
}
