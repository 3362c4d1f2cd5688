//! Client for RESP-speaking key/value and pub/sub servers.
//!
//! The crate is built around a single-connection [`Client`]: it opens its
//! connection lazily, runs the configured prelude (authentication,
//! database selection, naming, optional role verification), and wraps
//! every command in a retry / reconnection policy that never replays an
//! operation whose effects may already have reached the server.
//!
//! ```no_run
//! use redlink::Client;
//!
//! # async fn demo() -> redlink::Result<()> {
//! let mut client: Client = Client::from_url("redis://localhost:6379")?;
//! client.call(&["SET", "greeting", "hello"]).await?;
//! let reply = client.call(&["GET", "greeting"]).await?;
//! assert_eq!(reply.as_str(), Some("hello"));
//!
//! let replies = client
//!     .pipelined(|p| {
//!         p.call(&["INCR", "counter"])?;
//!         p.call(&["GET", "counter"])
//!     })
//!     .await?;
//! assert_eq!(replies.len(), 2);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod command;
pub mod config;
pub mod connection;
pub mod error;
pub mod middleware;
pub mod pipeline;
pub mod pubsub;
pub mod resp;
pub mod scan;

pub use client::Client;
pub use command::Command;
pub use config::{Config, Role};
pub use connection::{BatchTimeouts, CommandTimeout, Connection, Driver, TcpDriver};
pub use error::{CommandError, CommandErrorKind, ConnectionError, Error, Result};
pub use middleware::{Middleware, Middlewares};
pub use pipeline::{Pipeline, Transaction};
pub use pubsub::PubSub;
pub use resp::Value;
pub use scan::{PairScanIter, ScanIter};
