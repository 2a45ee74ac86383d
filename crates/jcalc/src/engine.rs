//! The frozen runtime surface an evaluation runs against: a populated
//! [`Registry`], the active [`Config`], and an interrupt flag a host
//! program can set from another thread to ask a long-running evaluation
//! to stop at its next checkpoint.
//!
//! Split the way a build-once "schema"/registry object is kept separate
//! from the many short-lived evaluations run against it.

use crate::config::Config;
use crate::registry::Registry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A place output (e.g. a `print`-style command) can be written. Boxed
/// so a host can plug in stdout, a string buffer, or a channel.
pub type OutputSink = Box<dyn Fn(&str) + Send + Sync>;

pub struct Engine {
    registry: Registry,
    pub config: Config,
    interrupt: Arc<AtomicBool>,
    output: Option<OutputSink>,
}

impl Default for Engine {
    fn default() -> Self {
        Engine::with_std()
    }
}

impl Engine {
    /// An `Engine` with nothing registered — tests that only need a
    /// handful of hand-registered functions build from here.
    pub fn empty() -> Self {
        Engine {
            registry: Registry::default(),
            config: Config::default(),
            interrupt: Arc::new(AtomicBool::new(false)),
            output: None,
        }
    }

    /// The standard `Engine`: every builtin/aggregate catalogue
    /// registered, with a default config.
    pub fn with_std() -> Self {
        let mut registry = Registry::default();
        crate::builtins::register_all(&mut registry);
        Engine { registry, config: Config::default(), interrupt: Arc::new(AtomicBool::new(false)), output: None }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// A fresh `Context` pre-populated with `config`/`system`/`math`,
    /// reflecting this engine's current config.
    pub fn std_context(&self) -> crate::context::Context {
        crate::context::Context::std_context(crate::config::config_to_value(&self.config))
    }

    pub fn set_output(&mut self, sink: OutputSink) {
        self.output = Some(sink);
    }

    pub fn print(&self, text: &str) {
        if let Some(sink) = &self.output {
            sink(text);
        } else {
            print!("{text}");
        }
    }

    /// A cloneable handle a host can use to request interruption from
    /// another thread: evaluation itself is single-threaded, but the
    /// request to stop it isn't.
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        self.interrupt.clone()
    }

    pub fn interrupted(&self) -> bool {
        self.interrupt.load(Ordering::Relaxed)
    }

    pub fn request_interrupt(&self) {
        self.interrupt.store(true, Ordering::Relaxed);
    }

    pub fn clear_interrupt(&self) {
        self.interrupt.store(false, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn with_std_registers_builtins() {
        let engine = Engine::with_std();
        assert!(engine.registry().function("abs").is_some());
        assert!(engine.registry().is_aggregate("sum"));
    }

    #[test]
    fn interrupt_handle_is_shared() {
        let engine = Engine::with_std();
        let handle = engine.interrupt_handle();
        handle.store(true, Ordering::Relaxed);
        assert!(engine.interrupted());
    }
}
