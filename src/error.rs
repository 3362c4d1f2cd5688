//! Error taxonomy.
//!
//! Two top-level families matter to callers: [`ConnectionError`] for
//! transport failures (candidates for reconnection and retry) and
//! [`CommandError`] for errors the server reported inside a reply (the
//! connection stays healthy, nothing is retried).

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::OnceLock;

use parking_lot::RwLock;

/// All error variants produced by this crate.
#[derive(Debug)]
pub enum Error {
    /// Transport-layer failure. Retryable per the configured policy.
    Connection(ConnectionError),
    /// The server answered a command with an error reply.
    Command(CommandError),
    /// Malformed RESP data on the wire.
    Protocol(String),
    /// The parser needs more data — not a real error, used as control flow.
    Incomplete,
    /// Invalid user-supplied command shape (e.g. an empty argument vector).
    Argument(String),
}

impl Error {
    /// Whether this error indicates the connection itself is unusable.
    ///
    /// The retry state machine tears down and (policy permitting) replaces
    /// the connection only for these.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Convenience constructor for server error replies.
    pub(crate) fn command(message: impl Into<String>) -> Self {
        Self::Command(CommandError::parse(message))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(e) => write!(f, "{e}"),
            Self::Command(e) => write!(f, "{e}"),
            Self::Protocol(msg) => write!(f, "protocol error: {msg}"),
            Self::Incomplete => write!(f, "incomplete RESP message"),
            Self::Argument(msg) => write!(f, "argument error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Connection(ConnectionError::Io(e))
    }
}

impl From<ConnectionError> for Error {
    fn from(e: ConnectionError) -> Self {
        Self::Connection(e)
    }
}

impl From<CommandError> for Error {
    fn from(e: CommandError) -> Self {
        Self::Command(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

// ── Connection errors ──────────────────────────────────────────────

/// Transport-layer failures.
#[derive(Debug)]
pub enum ConnectionError {
    /// Socket-level I/O failure (reset, refused, unexpected EOF, …).
    Io(io::Error),
    /// The connection was closed, either explicitly or by a prior failure.
    Closed,
    /// High-availability role mismatch (e.g. replica where primary expected).
    Failover(String),
    /// Deadline exceeded while waiting for a reply.
    ReadTimeout,
    /// Deadline exceeded while flushing a command.
    WriteTimeout,
    /// Deadline exceeded while establishing the connection.
    ConnectTimeout,
    /// Deadline exceeded while checking a connection out of a pool.
    /// Unused by the core; surfaced by pool wrappers through this taxonomy.
    CheckoutTimeout,
}

impl ConnectionError {
    /// True for the timeout sub-family.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ReadTimeout | Self::WriteTimeout | Self::ConnectTimeout | Self::CheckoutTimeout
        )
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "connection error: {e}"),
            Self::Closed => write!(f, "Connection was closed or lost"),
            Self::Failover(msg) => write!(f, "failover error: {msg}"),
            Self::ReadTimeout => write!(f, "read timed out"),
            Self::WriteTimeout => write!(f, "write timed out"),
            Self::ConnectTimeout => write!(f, "connect timed out"),
            Self::CheckoutTimeout => write!(f, "pool checkout timed out"),
        }
    }
}

impl std::error::Error for ConnectionError {}

// ── Command errors ─────────────────────────────────────────────────

/// Classification of a server error reply, derived from its leading code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandErrorKind {
    /// `WRONGPASS` — bad credentials.
    Authentication,
    /// `NOPERM` — ACL denies the command or key.
    Permission,
    /// Any code without a registered mapping (`ERR`, `WRONGTYPE`, …).
    Generic,
}

/// A logical error the server reported in a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandError {
    pub kind: CommandErrorKind,
    pub message: String,
}

impl CommandError {
    /// Classify a raw server error message by its first
    /// whitespace-delimited token.
    ///
    /// Unknown codes fall back to [`CommandErrorKind::Generic`].
    pub fn parse(message: impl Into<String>) -> Self {
        let message = message.into();
        let code = message.split_whitespace().next().unwrap_or("");
        let kind = registry()
            .read()
            .get(code)
            .cloned()
            .unwrap_or(CommandErrorKind::Generic);
        Self { kind, message }
    }

    /// Map an additional server code to a kind.
    ///
    /// Intended to run at startup; registrations are process-global and
    /// visible to every subsequent [`CommandError::parse`].
    pub fn register(code: impl Into<String>, kind: CommandErrorKind) {
        registry().write().insert(code.into(), kind);
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CommandError {}

fn registry() -> &'static RwLock<HashMap<String, CommandErrorKind>> {
    static REGISTRY: OnceLock<RwLock<HashMap<String, CommandErrorKind>>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut map = HashMap::new();
        map.insert("WRONGPASS".to_string(), CommandErrorKind::Authentication);
        map.insert("NOPERM".to_string(), CommandErrorKind::Permission);
        RwLock::new(map)
    })
}

// ── Tests ──────────────────────────────────────────────────────────
