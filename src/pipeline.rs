//! Command batches: pipelines and transactions.
//!
//! A [`Pipeline`] buffers commands with aggregate metadata: whether the
//! whole batch may be replayed after a reconnect, and sparse per-command
//! read-deadline overrides. A [`Transaction`] is a pipeline framed by
//! `MULTI`/`EXEC`. Neither touches the wire; [`crate::Client`] consumes
//! them exactly once.

use std::time::Duration;

use crate::command::Command;
use crate::connection::{BatchTimeouts, CommandTimeout};
use crate::error::Result;

/// An ordered buffer of commands sent in a single round-trip.
#[derive(Debug)]
pub struct Pipeline {
    commands: Vec<Command>,
    timeouts: BatchTimeouts,
    retryable: bool,
}

impl Pipeline {
    pub(crate) fn new() -> Self {
        Self {
            commands: Vec::new(),
            timeouts: BatchTimeouts::new(),
            retryable: true,
        }
    }

    /// Buffer one command. The batch stays replayable.
    pub fn call<A: AsRef<[u8]>>(&mut self, args: &[A]) -> Result<()> {
        self.commands.push(Command::coerce(args)?);
        Ok(())
    }

    /// Buffer one command and mark the whole batch non-replayable.
    pub fn call_once<A: AsRef<[u8]>>(&mut self, args: &[A]) -> Result<()> {
        self.retryable = false;
        self.commands.push(Command::coerce(args)?);
        Ok(())
    }

    /// Buffer one command with its own read deadline.
    ///
    /// `None` or zero waits forever. Does not affect replayability.
    pub fn blocking_call<A: AsRef<[u8]>>(
        &mut self,
        timeout: Option<Duration>,
        args: &[A],
    ) -> Result<()> {
        let index = self.commands.len();
        self.commands.push(Command::coerce(args)?);
        self.timeouts.insert(index, CommandTimeout::from_user(timeout));
        Ok(())
    }

    /// Number of buffered commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Whether every command was added through a replayable path.
    pub fn retryable(&self) -> bool {
        self.retryable
    }

    pub(crate) fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub(crate) fn timeouts(&self) -> &BatchTimeouts {
        &self.timeouts
    }

    pub(crate) fn push_command(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub(crate) fn mark_non_retryable(&mut self) {
        self.retryable = false;
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// A pipeline framed by `MULTI`/`EXEC`.
///
/// The builder seeds `MULTI`; `EXEC` is appended when the client takes
/// the batch. A transaction holding only the framing pair is "empty" and
/// never reaches the wire.
#[derive(Debug)]
pub struct Transaction {
    inner: Pipeline,
}

impl Transaction {
    pub(crate) fn new() -> Self {
        let mut inner = Pipeline::new();
        inner.push_command(Command::new("MULTI"));
        Self { inner }
    }

    /// Queue one command inside the transaction.
    pub fn call<A: AsRef<[u8]>>(&mut self, args: &[A]) -> Result<()> {
        self.inner.call(args)
    }

    /// Queue one command and mark the transaction non-replayable.
    pub fn call_once<A: AsRef<[u8]>>(&mut self, args: &[A]) -> Result<()> {
        self.inner.call_once(args)
    }

    /// Queue one command with its own read deadline.
    pub fn blocking_call<A: AsRef<[u8]>>(
        &mut self,
        timeout: Option<Duration>,
        args: &[A],
    ) -> Result<()> {
        self.inner.blocking_call(timeout, args)
    }

    /// True when no user command was queued (framing only).
    pub fn is_empty(&self) -> bool {
        self.inner.len() <= 1
    }

    /// Number of user-queued commands (framing excluded).
    pub fn len(&self) -> usize {
        self.inner.len().saturating_sub(1)
    }

    pub fn retryable(&self) -> bool {
        self.inner.retryable()
    }

    /// Terminate the frame and hand the batch over for execution.
    pub(crate) fn into_batch(mut self) -> Pipeline {
        self.inner.push_command(Command::new("EXEC"));
        self.inner
    }

    pub(crate) fn mark_non_retryable(&mut self) {
        self.inner.mark_non_retryable();
    }
}

// ── Tests ──────────────────────────────────────────────────────────
