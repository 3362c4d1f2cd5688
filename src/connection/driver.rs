//! The transport contract.
//!
//! A [`Driver`] owns one socket-like endpoint and knows how to ship
//! commands and read replies with bounded waits. The client core is
//! generic over this trait; [`crate::connection::TcpDriver`] is the
//! stock implementation.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use crate::command::Command;
use crate::config::Config;
use crate::error::Result;
use crate::resp::Value;

/// Per-command read-deadline override.
///
/// `Default` keeps the connection's configured read timeout; `Unbounded`
/// waits forever (the rendering of a zero blocking timeout); `Bounded`
/// caps the wait for this one reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandTimeout {
    #[default]
    Default,
    Unbounded,
    Bounded(Duration),
}

impl CommandTimeout {
    /// Map a user-supplied blocking timeout: absent or zero means
    /// "wait forever".
    pub fn from_user(timeout: Option<Duration>) -> Self {
        match timeout {
            None => Self::Unbounded,
            Some(d) if d.is_zero() => Self::Unbounded,
            Some(d) => Self::Bounded(d),
        }
    }

    /// Resolve against the connection default.
    pub fn resolve(self, default: Option<Duration>) -> Option<Duration> {
        match self {
            Self::Default => default,
            Self::Unbounded => None,
            Self::Bounded(d) => Some(d),
        }
    }
}

/// Sparse per-index read-deadline overrides for a batch.
pub type BatchTimeouts = HashMap<usize, CommandTimeout>;

/// A one-shot transport endpoint.
///
/// Errors raised by drivers use the [`crate::error`] taxonomy; a driver
/// reply that is a server error value is *not* an `Err` at this layer —
/// classification happens above, where transactions need the raw values.
pub trait Driver: Send + Sized {
    /// Open a transport to the configured server.
    fn connect(
        config: &Config,
        connect_timeout: Option<Duration>,
        read_timeout: Option<Duration>,
        write_timeout: Option<Duration>,
    ) -> impl Future<Output = Result<Self>> + Send;

    /// Send one command and read its reply.
    fn call(
        &mut self,
        command: &Command,
        timeout: CommandTimeout,
    ) -> impl Future<Output = Result<Value>> + Send;

    /// Send a batch in one write and read one reply per command, in order.
    fn call_pipelined(
        &mut self,
        commands: &[Command],
        timeouts: &BatchTimeouts,
    ) -> impl Future<Output = Result<Vec<Value>>> + Send;

    /// Send one command without reading a reply (pub/sub framing).
    fn write(&mut self, command: &Command) -> impl Future<Output = Result<()>> + Send;

    /// Read one value without having sent anything (pub/sub framing).
    fn read(&mut self, timeout: CommandTimeout) -> impl Future<Output = Result<Value>> + Send;

    /// Mark the transport unusable. Further operations fail with
    /// [`crate::ConnectionError::Closed`]; the socket is released on drop.
    fn close(&mut self);

    /// Whether the transport believes itself healthy.
    fn is_connected(&self) -> bool;

    fn set_read_timeout(&mut self, timeout: Option<Duration>);

    fn set_write_timeout(&mut self, timeout: Option<Duration>);
}

// ── Tests ──────────────────────────────────────────────────────────
