//! Instrumentation hooks around command execution.
//!
//! A [`Middleware`] observes commands and batches as they are sent and
//! their results as they come back. Registrations happen at startup on a
//! registry; the process-global registry from [`Middlewares::global`] is
//! the default, and a [`Config`] can carry its own isolated registry
//! instead. The connection prelude is never reported to middlewares.

use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use crate::command::Command;
use crate::config::Config;
use crate::error::Result;
use crate::resp::Value;

/// Observer of user-initiated commands and batches.
///
/// All hooks default to no-ops; implement only what you need.
pub trait Middleware: Send + Sync {
    /// A single command is about to be sent.
    fn call(&self, _command: &Command, _config: &Config) {}

    /// A single command finished (reply decoded or error raised).
    fn call_result(&self, _command: &Command, _result: &Result<Value>, _config: &Config) {}

    /// A batch is about to be sent.
    fn call_pipelined(&self, _commands: &[Command], _config: &Config) {}

    /// A batch finished.
    fn call_pipelined_result(
        &self,
        _commands: &[Command],
        _result: &Result<Vec<Value>>,
        _config: &Config,
    ) {
    }
}

/// A shared, extensible list of [`Middleware`]s.
///
/// Cloning is cheap and clones share the same underlying list, so
/// registrations on any handle are visible to all of them.
#[derive(Clone, Default)]
pub struct Middlewares {
    entries: Arc<RwLock<Vec<Arc<dyn Middleware>>>>,
}

impl Middlewares {
    /// An empty, isolated registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-global registry, shared by every default [`Config`].
    pub fn global() -> &'static Middlewares {
        static GLOBAL: OnceLock<Middlewares> = OnceLock::new();
        GLOBAL.get_or_init(Middlewares::new)
    }

    /// Append a middleware. Meant to run during startup, before clients
    /// start issuing commands.
    pub fn register(&self, middleware: Arc<dyn Middleware>) {
        self.entries.write().push(middleware);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub(crate) fn call(&self, command: &Command, config: &Config) {
        for middleware in self.entries.read().iter() {
            middleware.call(command, config);
        }
    }

    pub(crate) fn call_result(&self, command: &Command, result: &Result<Value>, config: &Config) {
        for middleware in self.entries.read().iter() {
            middleware.call_result(command, result, config);
        }
    }

    pub(crate) fn call_pipelined(&self, commands: &[Command], config: &Config) {
        for middleware in self.entries.read().iter() {
            middleware.call_pipelined(commands, config);
        }
    }

    pub(crate) fn call_pipelined_result(
        &self,
        commands: &[Command],
        result: &Result<Vec<Value>>,
        config: &Config,
    ) {
        for middleware in self.entries.read().iter() {
            middleware.call_pipelined_result(commands, result, config);
        }
    }
}

impl fmt::Debug for Middlewares {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Middlewares")
            .field("len", &self.len())
            .finish()
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counter {
        calls: AtomicUsize,
        batches: AtomicUsize,
    }

    impl Middleware for Counter {
        fn call(&self, _command: &Command, _config: &Config) {
            self.calls.fetch_add(1, Ordering::Relaxed);
        }

        fn call_pipelined(&self, _commands: &[Command], _config: &Config) {
            self.batches.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn register_and_dispatch() {
        let middlewares = Middlewares::new();
        let counter = Arc::new(Counter::default());
        middlewares.register(counter.clone());
        assert_eq!(middlewares.len(), 1);

        let config = Config::default();
        let command = Command::coerce(&["PING"]).unwrap();
        middlewares.call(&command, &config);
        middlewares.call(&command, &config);
        middlewares.call_pipelined(std::slice::from_ref(&command), &config);

        assert_eq!(counter.calls.load(Ordering::Relaxed), 2);
        assert_eq!(counter.batches.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn clones_share_the_list() {
        let a = Middlewares::new();
        let b = a.clone();
        b.register(Arc::new(Counter::default()));
        assert_eq!(a.len(), 1);
    }

    #[test]
    fn empty_registry_is_a_noop() {
        let middlewares = Middlewares::new();
        let config = Config::default();
        let command = Command::coerce(&["PING"]).unwrap();
        middlewares.call(&command, &config);
        assert!(middlewares.is_empty());
    }
}
