//! Pub/sub mode.
//!
//! A [`PubSub`] owns a connection that its parent [`crate::Client`] gave
//! up; the handoff is one-way and the handle never re-attaches. Commands
//! are fire-and-forget writes, replies arrive asynchronously as events.

use std::time::Duration;

use tracing::debug;

use crate::command::Command;
use crate::connection::{CommandTimeout, Connection, Driver, TcpDriver};
use crate::error::{ConnectionError, Error, Result};
use crate::resp::Value;

/// A connection dedicated to asynchronous event delivery.
pub struct PubSub<D: Driver = TcpDriver> {
    connection: Option<Connection<D>>,
}

impl<D: Driver> PubSub<D> {
    pub(crate) fn new(connection: Connection<D>) -> Self {
        Self {
            connection: Some(connection),
        }
    }

    /// Send a command without waiting for a reply.
    ///
    /// Confirmations (`subscribe` counts and the like) arrive through
    /// [`PubSub::next_event`] along with everything else.
    pub async fn call<A: AsRef<[u8]>>(&mut self, args: &[A]) -> Result<()> {
        let command = Command::coerce(args)?;
        let connection = match self.connection.as_mut() {
            Some(connection) => connection,
            None => return Err(ConnectionError::Closed.into()),
        };
        match connection.write(&command).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.close();
                Err(e)
            }
        }
    }

    /// Wait up to `timeout` for the next event.
    ///
    /// `None` or zero waits forever. An expired wait returns `Ok(None)`
    /// and leaves the subscription intact; any other read failure closes
    /// the handle and raises.
    pub async fn next_event(&mut self, timeout: Option<Duration>) -> Result<Option<Value>> {
        let connection = match self.connection.as_mut() {
            Some(connection) => connection,
            None => return Err(ConnectionError::Closed.into()),
        };
        match connection.read(CommandTimeout::from_user(timeout)).await {
            Ok(event) => Ok(Some(event)),
            Err(Error::Connection(ConnectionError::ReadTimeout)) => Ok(None),
            Err(e) => {
                self.close();
                Err(e)
            }
        }
    }

    /// Close and drop the connection. Idempotent.
    pub fn close(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.close();
            debug!("pub/sub connection dropped");
        }
    }

    /// True iff the underlying connection is still healthy.
    pub fn is_connected(&self) -> bool {
        self.connection
            .as_ref()
            .is_some_and(Connection::is_connected)
    }
}
