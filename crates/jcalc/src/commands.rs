//! Command registration support.
//!
//! Concrete commands — `log`, `logset`, `xmlEntity`, `cache`, and the
//! like — are plugin collaborators: they belong to a host program, not
//! the core engine. What belongs here is the machinery a plugin's
//! command hooks onto: `crate::parser::parse_program` recognizes
//! `name: rest` at statement position and captures it as a raw
//! [`crate::stmt::Stmt`] carrying the command's name and unparsed
//! argument text, leaving `name` to be resolved against whatever the
//! host registered in `crate::registry::Registry` at `run_stmt` time.
//! This module adds the bit of shared parsing support a command's own
//! `argparser` typically needs, plus two worked examples exercised only
//! by this crate's tests.

use crate::context::Context;
use crate::engine::Engine;
use crate::registry::{CommandArgParser, CommandDescriptor, CommandRunner, Registry};
use crate::stmt::{Outcome, Stmt, StmtKind};
use jvalue::{io, Span, Value};
use std::sync::Arc;

/// Splits a command's raw argument text on top-level commas, tracking
/// nesting through `()`/`[]`/`{}` and skipping commas inside string
/// literals.
pub fn split_top_level_commas(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut in_string: Option<char> = None;
    let mut escaped = false;
    let mut byte_pos = 0usize;
    let mut piece_start_byte = 0usize;
    for c in text.chars() {
        if let Some(q) = in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                in_string = None;
            }
        } else {
            match c {
                '"' | '\'' => in_string = Some(c),
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => depth -= 1,
                ',' if depth == 0 => {
                    out.push(text[piece_start_byte..byte_pos].trim().to_string());
                    piece_start_byte = byte_pos + c.len_utf8();
                }
                _ => {}
            }
        }
        byte_pos += c.len_utf8();
    }
    let tail = text[piece_start_byte..].trim();
    if !tail.is_empty() || !out.is_empty() {
        out.push(tail.to_string());
    }
    out
}

/// A worked example of the registry hook: evaluates a comma list of
/// expressions against the current context and writes their rendered
/// text (unquoted strings, JSON for everything else, space-joined) to
/// the engine's output sink. A real `log` plugin layers file rollover,
/// timestamps and config-driven detail levels on top of this shape
/// (out of scope here); this crate only needs to prove the
/// argparser/runner hooks actually run end to end, which is what its
/// test below does.
pub fn demo_log_command() -> CommandDescriptor {
    CommandDescriptor {
        name: "log".to_string(),
        argparser: demo_log_argparser(),
        runner: demo_log_runner(),
    }
}

pub fn register_demo_log_command(registry: &mut Registry) {
    registry.register_command(demo_log_command());
}

/// A second worked example, an `xmlEntity` command: with an argument of
/// `name=value` it records an XML entity substitution in a global
/// `xmlEntity` object (creating it on first use); with no argument it
/// dumps the current table. `value` is restricted to a string or
/// number; the XML codec itself is out of scope here, so this command
/// exists only to exercise the registry hook with a second, differently
/// shaped example.
pub fn demo_xml_entity_command() -> CommandDescriptor {
    CommandDescriptor {
        name: "xmlEntity".to_string(),
        argparser: demo_xml_entity_argparser(),
        runner: demo_xml_entity_runner(),
    }
}

pub fn register_demo_xml_entity_command(registry: &mut Registry) {
    registry.register_command(demo_xml_entity_command());
}

fn demo_xml_entity_argparser() -> CommandArgParser {
    Arc::new(|arg: &str| {
        let arg = arg.trim();
        if !arg.is_empty() {
            let (name, value) = arg.split_once('=').ok_or_else(|| {
                "xmlEntity: expects an entity=value argument".to_string()
            })?;
            if name.trim().is_empty() {
                return Err("xmlEntity: entity name must not be empty".to_string());
            }
            crate::parser::parse_expr(value.trim(), 0).map_err(|e| e.to_string())?;
        }
        Ok(Stmt {
            kind: StmtKind::Command { name: "xmlEntity".to_string(), arg: arg.to_string() },
            span: Span::point(0, 0),
        })
    })
}

fn demo_xml_entity_runner() -> CommandRunner {
    Arc::new(|stmt: &Stmt, ctx: &mut Context, engine: &Engine| {
        let StmtKind::Command { arg, .. } = &stmt.kind else {
            return Outcome::Error {
                where_: Some(stmt.span),
                text: "xmlEntity: malformed command node".to_string(),
            };
        };
        let mut table = match ctx.resolve("xmlEntity") {
            Some(Value::Object(obj)) => obj,
            _ => jvalue::ObjectValue::new(),
        };
        if arg.is_empty() {
            engine.print(&format!("{}\n", io::serialize(&Value::Object(table), &io::Format::default())));
            return Outcome::Next;
        }
        let (name, value_src) = match arg.split_once('=') {
            Some(pair) => pair,
            None => {
                return Outcome::Error {
                    where_: Some(stmt.span),
                    text: "xmlEntity: expects an entity=value argument".to_string(),
                }
            }
        };
        let expr = match crate::parser::parse_expr(value_src.trim(), stmt.span.file_id) {
            Ok(expr) => expr,
            Err(e) => return Outcome::Error { where_: Some(stmt.span), text: e.to_string() },
        };
        let value = crate::eval::eval(&expr, ctx, engine);
        if !matches!(value, Value::String(_) | Value::Number(_)) {
            return Outcome::Error {
                where_: Some(stmt.span),
                text: "xmlEntityType: the value of an entity should be either a string or a number".to_string(),
            };
        }
        table.insert(name.trim(), value);
        ctx.assign("xmlEntity", Value::Object(table));
        Outcome::Next
    })
}

fn demo_log_argparser() -> CommandArgParser {
    Arc::new(|arg: &str| {
        for piece in split_top_level_commas(arg) {
            if piece.is_empty() {
                continue;
            }
            crate::parser::parse_expr(&piece, 0).map_err(|e| e.to_string())?;
        }
        Ok(Stmt { kind: StmtKind::Command { name: "log".to_string(), arg: arg.to_string() }, span: Span::point(0, 0) })
    })
}

fn demo_log_runner() -> CommandRunner {
    Arc::new(|stmt: &Stmt, ctx: &mut Context, engine: &Engine| {
        let StmtKind::Command { arg, .. } = &stmt.kind else {
            return Outcome::Error { where_: Some(stmt.span), text: "log: malformed command node".to_string() };
        };
        let mut rendered = Vec::new();
        for piece in split_top_level_commas(arg) {
            if piece.is_empty() {
                continue;
            }
            let expr = match crate::parser::parse_expr(&piece, stmt.span.file_id) {
                Ok(expr) => expr,
                Err(e) => return Outcome::Error { where_: Some(stmt.span), text: e.to_string() },
            };
            let value = crate::eval::eval(&expr, ctx, engine);
            if value.is_error() {
                return Outcome::Error { where_: Some(stmt.span), text: value.to_string() };
            }
            rendered.push(match &value {
                Value::String(s) => s.clone(),
                other => io::serialize(other, &io::Format::default()),
            });
        }
        engine.print(&format!("{}\n", rendered.join(" ")));
        Outcome::Next
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::parser::parse_program;
    use std::sync::{Arc as StdArc, Mutex};

    #[test]
    fn splits_top_level_commas_respecting_nesting_and_strings() {
        let parts = split_top_level_commas(r#"a, f(1, 2), "x, y", [1,2]"#);
        assert_eq!(parts, vec!["a", "f(1, 2)", "\"x, y\"", "[1,2]"]);
    }

    #[test]
    fn command_statement_round_trips_through_parser_and_registry() {
        let mut engine = Engine::empty();
        register_demo_log_command(engine.registry_mut());

        let captured = StdArc::new(Mutex::new(String::new()));
        let sink = captured.clone();
        engine.set_output(Box::new(move |text| sink.lock().unwrap().push_str(text)));

        let program = parse_program("log: 1 + 2, \"hi\"", 0).unwrap();
        let StmtKind::Block(stmts) = &program.kind else { panic!("expected block") };
        assert_eq!(stmts.len(), 1);
        assert!(matches!(stmts[0].kind, StmtKind::Command { .. }));

        let mut ctx = engine.std_context();
        let outcome = crate::eval::run_block(stmts, &mut ctx, &engine);
        assert!(matches!(outcome, Outcome::Next));
        assert_eq!(captured.lock().unwrap().as_str(), "3 hi\n");
    }

    #[test]
    fn xml_entity_command_records_and_dumps_entities() {
        let mut engine = Engine::empty();
        register_demo_xml_entity_command(engine.registry_mut());

        let captured = StdArc::new(Mutex::new(String::new()));
        let sink = captured.clone();
        engine.set_output(Box::new(move |text| sink.lock().unwrap().push_str(text)));

        let mut ctx = engine.std_context();

        let set_amp = parse_program(r#"xmlEntity: amp="&""#, 0).unwrap();
        let StmtKind::Block(stmts) = &set_amp.kind else { panic!("expected block") };
        assert!(matches!(crate::eval::run_block(stmts, &mut ctx, &engine), Outcome::Next));

        let dump = parse_program("xmlEntity:", 0).unwrap();
        let StmtKind::Block(stmts) = &dump.kind else { panic!("expected block") };
        assert!(matches!(crate::eval::run_block(stmts, &mut ctx, &engine), Outcome::Next));
        assert!(captured.lock().unwrap().contains("amp"));
    }

    #[test]
    fn unregistered_command_name_errors_at_run_time() {
        let engine = Engine::empty();
        let program = parse_program("logset: name", 0).unwrap();
        let StmtKind::Block(stmts) = &program.kind else { panic!("expected block") };
        let mut ctx = engine.std_context();
        let outcome = crate::eval::run_block(stmts, &mut ctx, &engine);
        assert!(matches!(outcome, Outcome::Error { .. }));
    }
}
