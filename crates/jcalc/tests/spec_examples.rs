//! End-to-end expression-language scenarios exercised against the whole
//! pipeline (lexer → parser → evaluator) rather than any one module in
//! isolation, living alongside each module's own unit tests.

use jcalc::{parse_expr, Engine};
use pretty_assertions::assert_eq;

/// Integration tests run with `RUST_LOG` honored so a failing scenario's
/// parse/eval debug spans show up in `cargo test -- --nocapture`.
fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().with_env_filter("debug").try_init();
}

fn eval_str(src: &str) -> String {
    init_tracing();
    let engine = Engine::with_std();
    let mut ctx = engine.std_context();
    let expr = parse_expr(src, 0).expect("parse");
    jcalc::eval::eval(&expr, &mut ctx, &engine).to_string()
}

#[test]
fn arithmetic_precedence() {
    assert_eq!(eval_str("5 + 3 * 2"), "11");
}

#[test]
fn date_plus_period_literal() {
    assert_eq!(eval_str(r#""2024-01-31" + "P1D""#), "2024-02-01");
}

#[test]
fn select_group_by_order_by() {
    let engine = Engine::with_std();
    let mut ctx = engine.std_context();
    let script = jcalc::parse_program(
        "var data = [{a:1,b:2},{a:1,b:3},{a:2,b:4}]; return SELECT a, sum(b) FROM data GROUP BY a ORDER BY a;",
        0,
    )
    .unwrap();
    let jcalc::stmt::StmtKind::Block(stmts) = &script.kind else { panic!("expected block") };
    let outcome = jcalc::eval::run_block(stmts, &mut ctx, &engine);
    let jcalc::Outcome::Return(value) = outcome else { panic!("expected return, got {outcome:?}") };
    assert_eq!(value.to_string(), r#"[{"a":1,"b":5},{"a":2,"b":4}]"#);
}

#[test]
fn each_operator_maps_over_an_array() {
    assert_eq!(eval_str("[1,2,3,4] @ this * 2"), "[2,4,6,8]");
}

#[test]
fn object_bitwise_or_is_union_favoring_the_right_side() {
    assert_eq!(eval_str("{x:1, y:2} | {y:20, z:3}"), r#"{"x":1,"y":20,"z":3}"#);
}

#[test]
fn like_is_case_insensitive_with_single_char_wildcard() {
    assert_eq!(eval_str(r#""Hello" LIKE "h_llo""#), "true");
}

#[test]
fn loose_vs_strict_equality_between_number_and_string() {
    assert_eq!(eval_str(r#"0 == "0""#), "true");
    assert_eq!(eval_str(r#"0 === "0""#), "false");
}

#[test]
fn string_concatenation_and_subtraction() {
    assert_eq!(eval_str(r#""a" + 1"#), "a1");
    assert_eq!(eval_str(r#""a " - " b""#), "a b");
}

#[test]
fn length_attribute_across_types() {
    assert_eq!(eval_str("null.length"), "0");
    assert_eq!(eval_str(r#""abc".length"#), "3");
    assert_eq!(eval_str("[1,2].length"), "2");
    assert_eq!(eval_str("{x:1}.length"), "1");
}

#[test]
fn negative_array_index_wraps_from_the_end() {
    assert_eq!(eval_str("[1,2,3][-1]"), "3");
}

#[test]
fn select_with_no_from_and_no_default_table_is_a_noDefTable_error() {
    let engine = Engine::with_std();
    let mut ctx = engine.std_context();
    let expr = parse_expr("SELECT 1", 0).unwrap();
    let out = jcalc::eval::eval(&expr, &mut ctx, &engine);
    assert!(out.error_code().map(|c| c.code() == "noDefTable").unwrap_or(false));
}

#[test]
fn division_and_modulo_by_zero_are_error_nulls() {
    let engine = Engine::with_std();
    let mut ctx = engine.std_context();
    let div = jcalc::eval::eval(&parse_expr("1 / 0", 0).unwrap(), &mut ctx, &engine);
    assert_eq!(div.error_code().map(|c| c.code()), Some("div0"));
    let modulo = jcalc::eval::eval(&parse_expr("1 % 0", 0).unwrap(), &mut ctx, &engine);
    assert_eq!(modulo.error_code().map(|c| c.code()), Some("mod0"));
}
