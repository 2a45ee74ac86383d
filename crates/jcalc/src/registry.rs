//! Registration points for functions, aggregates, commands, parsers, and
//! table printers, frozen after `Engine` init.

use crate::ag::AgSlot;
use crate::context::Context;
use jvalue::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// The extra record passed to every builtin alongside its evaluated
/// argument array: the current context, for builtins that need to
/// resolve names, and the regex node of the call's last argument, if it
/// was a literal regex.
pub struct CallExtra<'a> {
    pub context: &'a Context,
    pub regex: Option<(&'a str, bool, bool)>,
}

pub type BuiltinFn = Arc<dyn Fn(&[Value], &CallExtra) -> Value + Send + Sync>;

#[derive(Clone)]
pub struct FunctionDescriptor {
    pub name: String,
    pub min_args: usize,
    pub max_args: Option<usize>,
    pub implementation: BuiltinFn,
}

pub type AggRowFn = Arc<dyn Fn(&mut AgSlot, &Value) + Send + Sync>;
pub type AggFinalizeFn = Arc<dyn Fn(&AgSlot) -> Value + Send + Sync>;

#[derive(Clone)]
pub struct AggregateDescriptor {
    pub name: String,
    pub per_row: AggRowFn,
    pub finalize: AggFinalizeFn,
}

/// A registered parser plugin: `tester` sniffs whether this parser
/// handles the given input, `parse` does the actual parse.
pub struct ParserDescriptor {
    pub name: String,
    pub suffix: Option<String>,
    pub mimetype: Option<String>,
    pub tester: Arc<dyn Fn(&[u8]) -> bool + Send + Sync>,
    pub parse: Arc<dyn Fn(&[u8]) -> Result<Value, String> + Send + Sync>,
}

pub type TablePrinterFn = Arc<dyn Fn(&[Value]) -> String + Send + Sync>;

pub type CommandArgParser = Arc<dyn Fn(&str) -> Result<crate::stmt::Stmt, String> + Send + Sync>;
pub type CommandRunner = Arc<
    dyn Fn(&crate::stmt::Stmt, &mut Context, &crate::engine::Engine) -> crate::stmt::Outcome
        + Send
        + Sync,
>;

pub struct CommandDescriptor {
    pub name: String,
    pub argparser: CommandArgParser,
    pub runner: CommandRunner,
}

/// All registries, built once at `Engine` construction and read-mostly
/// thereafter.
#[derive(Default)]
pub struct Registry {
    functions: HashMap<String, FunctionDescriptor>,
    aggregates: HashMap<String, AggregateDescriptor>,
    commands: HashMap<String, CommandDescriptor>,
    parsers: Vec<ParserDescriptor>,
    table_printers: HashMap<String, TablePrinterFn>,
}

impl Registry {
    pub fn register_function(&mut self, desc: FunctionDescriptor) {
        self.functions.insert(desc.name.clone(), desc);
    }

    pub fn register_aggregate(&mut self, desc: AggregateDescriptor) {
        self.aggregates.insert(desc.name.clone(), desc);
    }

    pub fn register_command(&mut self, desc: CommandDescriptor) {
        self.commands.insert(desc.name.clone(), desc);
    }

    pub fn register_parser(&mut self, desc: ParserDescriptor) {
        self.parsers.push(desc);
    }

    pub fn register_table_printer(&mut self, name: &str, f: TablePrinterFn) {
        self.table_printers.insert(name.to_string(), f);
    }

    pub fn function(&self, name: &str) -> Option<&FunctionDescriptor> {
        self.functions.get(name)
    }

    pub fn aggregate(&self, name: &str) -> Option<&AggregateDescriptor> {
        self.aggregates.get(name)
    }

    pub fn is_aggregate(&self, name: &str) -> bool {
        self.aggregates.contains_key(name)
    }

    pub fn command(&self, name: &str) -> Option<&CommandDescriptor> {
        self.commands.get(name)
    }

    pub fn parser_for(&self, bytes: &[u8]) -> Option<&ParserDescriptor> {
        self.parsers.iter().find(|p| (p.tester)(bytes))
    }

    pub fn table_printer(&self, name: &str) -> Option<&TablePrinterFn> {
        self.table_printers.get(name)
    }
}
