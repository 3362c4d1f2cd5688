//! One-shot connection handle over a [`Driver`].

pub mod driver;
pub mod tcp;

pub use driver::{BatchTimeouts, CommandTimeout, Driver};
pub use tcp::TcpDriver;

use std::time::Duration;

use crate::command::Command;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::resp::Value;

/// A live connection: a [`Driver`] plus reply semantics.
///
/// Single commands convert server error replies into
/// [`crate::CommandError`]; batch replies come back raw because callers
/// (pipelines, transactions, the prelude) scan them with different rules.
pub struct Connection<D: Driver = TcpDriver> {
    driver: D,
}

impl<D: Driver> Connection<D> {
    pub(crate) async fn connect(
        config: &Config,
        connect_timeout: Option<Duration>,
        read_timeout: Option<Duration>,
        write_timeout: Option<Duration>,
    ) -> Result<Self> {
        let driver = D::connect(config, connect_timeout, read_timeout, write_timeout).await?;
        Ok(Self { driver })
    }

    /// Send one command; a server error reply becomes `Err(Command(_))`.
    pub(crate) async fn call(
        &mut self,
        command: &Command,
        timeout: CommandTimeout,
    ) -> Result<Value> {
        let reply = self.driver.call(command, timeout).await?;
        match reply.as_error_msg() {
            Some(msg) => Err(Error::command(msg)),
            None => Ok(reply),
        }
    }

    /// Send a batch and return every reply verbatim, error values included.
    pub(crate) async fn call_pipelined(
        &mut self,
        commands: &[Command],
        timeouts: &BatchTimeouts,
    ) -> Result<Vec<Value>> {
        self.driver.call_pipelined(commands, timeouts).await
    }

    /// Fire-and-forget write (pub/sub framing).
    pub(crate) async fn write(&mut self, command: &Command) -> Result<()> {
        self.driver.write(command).await
    }

    /// Read one value off the wire (pub/sub framing).
    pub(crate) async fn read(&mut self, timeout: CommandTimeout) -> Result<Value> {
        self.driver.read(timeout).await
    }

    pub(crate) fn close(&mut self) {
        self.driver.close();
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.driver.is_connected()
    }

    pub(crate) fn set_read_timeout(&mut self, timeout: Option<Duration>) {
        self.driver.set_read_timeout(timeout);
    }

    pub(crate) fn set_write_timeout(&mut self, timeout: Option<Duration>) {
        self.driver.set_write_timeout(timeout);
    }
}
