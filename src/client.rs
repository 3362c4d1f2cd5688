//! The client state machine.
//!
//! A [`Client`] owns at most one live [`Connection`], opens it lazily,
//! runs the connection prelude, and wraps every operation in the retry /
//! reconnection policy. Operations whose effects may already have reached
//! the server are never silently replayed: `call_once`, `blocking_call`
//! and watched transactions pin the connection for their whole scope,
//! while the *initial* open still honors the reconnect schedule.

use std::mem;
use std::time::Duration;

use tracing::debug;

use crate::command::Command;
use crate::config::Config;
use crate::connection::{BatchTimeouts, CommandTimeout, Connection, Driver, TcpDriver};
use crate::error::{ConnectionError, Error, Result};
use crate::pipeline::{Pipeline, Transaction};
use crate::pubsub::PubSub;
use crate::resp::Value;
use crate::scan::{PairScanIter, ScanIter};

/// A client over a single logical connection.
///
/// Not safe for concurrent use from multiple tasks; pool wrappers own one
/// client per slot and provide mutual exclusion.
pub struct Client<D: Driver = TcpDriver> {
    config: Config,
    id: Option<String>,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
    raw_connection: Option<Connection<D>>,
    disable_reconnection: bool,
}

impl<D: Driver> Client<D> {
    /// Build a client from an existing configuration.
    pub fn new(config: Config) -> Self {
        let id = config.id.clone();
        let connect_timeout = config.connect_timeout;
        let read_timeout = config.read_timeout;
        let write_timeout = config.write_timeout;
        Self {
            config,
            id,
            connect_timeout,
            read_timeout,
            write_timeout,
            raw_connection: None,
            disable_reconnection: false,
        }
    }

    /// Build a client from a server URL.
    pub fn from_url(url: &str) -> Result<Self> {
        Ok(Self::new(Config::from_url(url)?))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // ── Single commands ────────────────────────────────────────────

    /// Send one command and return its decoded reply.
    ///
    /// Retries on connection-class failures per the configured policy.
    pub async fn call<A: AsRef<[u8]>>(&mut self, args: &[A]) -> Result<Value> {
        let command = Command::coerce(args)?;
        self.call_command(command, CommandTimeout::Default, true).await
    }

    /// As [`Client::call`], but never replayed, even on transient failure.
    pub async fn call_once<A: AsRef<[u8]>>(&mut self, args: &[A]) -> Result<Value> {
        let command = Command::coerce(args)?;
        self.call_command(command, CommandTimeout::Default, false).await
    }

    /// As [`Client::call`], with the read deadline overridden for this one
    /// command. `None` or zero waits forever. Not replayed on failure.
    pub async fn blocking_call<A: AsRef<[u8]>>(
        &mut self,
        timeout: Option<Duration>,
        args: &[A],
    ) -> Result<Value> {
        let command = Command::coerce(args)?;
        self.call_command(command, CommandTimeout::from_user(timeout), false)
            .await
    }

    // ── Batches ────────────────────────────────────────────────────

    /// Buffer commands in a [`Pipeline`], then send them in one
    /// round-trip and collect the replies in order.
    ///
    /// An empty pipeline returns an empty list without touching the wire.
    /// The first server error reply among the results is raised.
    pub async fn pipelined<F>(&mut self, f: F) -> Result<Vec<Value>>
    where
        F: FnOnce(&mut Pipeline) -> Result<()>,
    {
        let mut pipeline = Pipeline::new();
        f(&mut pipeline)?;
        if pipeline.is_empty() {
            return Ok(Vec::new());
        }

        let middlewares = self.config.middlewares.clone();
        middlewares.call_pipelined(pipeline.commands(), &self.config);
        let result = self
            .execute_batch(pipeline.commands(), pipeline.timeouts(), pipeline.retryable())
            .await;
        middlewares.call_pipelined_result(pipeline.commands(), &result, &self.config);

        let replies = result?;
        for reply in &replies {
            if let Some(msg) = reply.as_error_msg() {
                return Err(Error::command(msg));
            }
        }
        Ok(replies)
    }

    /// Run a `MULTI`/`EXEC` transaction and return the per-command
    /// results from the `EXEC` reply.
    ///
    /// An empty transaction returns an empty list without touching the
    /// wire. The first command error inside the `EXEC` reply is raised.
    pub async fn multi<F>(&mut self, f: F) -> Result<Vec<Value>>
    where
        F: FnOnce(&mut Transaction) -> Result<()>,
    {
        let mut transaction = Transaction::new();
        f(&mut transaction)?;
        if transaction.is_empty() {
            return Ok(Vec::new());
        }
        match self.execute_transaction(transaction).await? {
            Some(results) => Ok(results),
            // EXEC only replies null under WATCH.
            None => Err(Error::Protocol("EXEC replied null without a WATCH".into())),
        }
    }

    /// As [`Client::multi`], guarded by `WATCH` on `watch`.
    ///
    /// Returns `None` when the optimistic lock aborted the transaction.
    /// Reconnection is disabled for the whole scope, since watch state
    /// cannot be replayed safely; any failure after `WATCH` triggers a
    /// best-effort `UNWATCH` on a still-healthy connection.
    pub async fn multi_watch<K, F>(&mut self, watch: &[K], f: F) -> Result<Option<Vec<Value>>>
    where
        K: AsRef<[u8]>,
        F: FnOnce(&mut Transaction) -> Result<()>,
    {
        if watch.is_empty() {
            return Ok(Some(self.multi(f).await?));
        }
        self.connect_with_retry().await?;
        let prev = mem::replace(&mut self.disable_reconnection, true);
        let result = self.watched_transaction(watch, f).await;
        self.disable_reconnection = prev;
        result
    }

    // ── Pub/sub ────────────────────────────────────────────────────

    /// Hand the connection off to pub/sub mode.
    ///
    /// The client keeps no reference; its next command opens a fresh
    /// connection.
    pub async fn pubsub(&mut self) -> Result<PubSub<D>> {
        self.connect_with_retry().await?;
        match self.raw_connection.take() {
            Some(connection) => {
                debug!("connection handed off to pub/sub");
                Ok(PubSub::new(connection))
            }
            None => Err(ConnectionError::Closed.into()),
        }
    }

    // ── Scan iterators ─────────────────────────────────────────────

    /// Iterate the keyspace with `SCAN`.
    ///
    /// `extra_args` are appended after the cursor (`MATCH`, `COUNT`, …).
    /// A fresh iterator always starts from cursor zero.
    pub fn scan<A: AsRef<[u8]>>(&mut self, extra_args: &[A]) -> ScanIter<'_, D> {
        let mut command = Command::new("SCAN");
        command.push("0");
        command.extend(extra_args);
        ScanIter::new(self, command, 1)
    }

    /// Iterate the members of a set with `SSCAN`.
    pub fn sscan<K: AsRef<[u8]>, A: AsRef<[u8]>>(
        &mut self,
        key: K,
        extra_args: &[A],
    ) -> ScanIter<'_, D> {
        let mut command = Command::new("SSCAN");
        command.push(key);
        command.push("0");
        command.extend(extra_args);
        ScanIter::new(self, command, 2)
    }

    /// Iterate the field/value pairs of a hash with `HSCAN`.
    pub fn hscan<K: AsRef<[u8]>, A: AsRef<[u8]>>(
        &mut self,
        key: K,
        extra_args: &[A],
    ) -> PairScanIter<'_, D> {
        let mut command = Command::new("HSCAN");
        command.push(key);
        command.push("0");
        command.extend(extra_args);
        PairScanIter::new(self, command, 2)
    }

    /// Iterate the member/score pairs of a sorted set with `ZSCAN`.
    pub fn zscan<K: AsRef<[u8]>, A: AsRef<[u8]>>(
        &mut self,
        key: K,
        extra_args: &[A],
    ) -> PairScanIter<'_, D> {
        let mut command = Command::new("ZSCAN");
        command.push(key);
        command.push("0");
        command.extend(extra_args);
        PairScanIter::new(self, command, 2)
    }

    // ── Lifecycle ──────────────────────────────────────────────────

    /// Close and drop any live connection. Idempotent.
    pub fn close(&mut self) {
        self.close_connection();
    }

    /// True iff a live connection exists and reports itself healthy.
    pub fn is_connected(&self) -> bool {
        self.raw_connection
            .as_ref()
            .is_some_and(Connection::is_connected)
    }

    /// Number of logical connections: always 1. Pool wrappers report
    /// their pool size through the same method.
    pub fn size(&self) -> usize {
        1
    }

    /// Yield `self`, so call sites can be uniform across pooled and
    /// unpooled clients.
    pub fn with<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        f(self)
    }

    // ── Timeouts ───────────────────────────────────────────────────

    /// Set the connect, read and write timeouts at once.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.connect_timeout = timeout;
        self.set_read_timeout(timeout);
        self.set_write_timeout(timeout);
    }

    /// Affects future opens only.
    pub fn set_connect_timeout(&mut self, timeout: Option<Duration>) {
        self.connect_timeout = timeout;
    }

    /// Applies to the live connection immediately, if there is one.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) {
        self.read_timeout = timeout;
        if let Some(connection) = self.raw_connection.as_mut() {
            connection.set_read_timeout(timeout);
        }
    }

    /// Applies to the live connection immediately, if there is one.
    pub fn set_write_timeout(&mut self, timeout: Option<Duration>) {
        self.write_timeout = timeout;
        if let Some(connection) = self.raw_connection.as_mut() {
            connection.set_write_timeout(timeout);
        }
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout
    }

    // ── Execution core ─────────────────────────────────────────────

    /// Single-command entry point behind the public surface; wraps the
    /// retry machinery in the instrumentation hooks.
    pub(crate) async fn call_command(
        &mut self,
        command: Command,
        timeout: CommandTimeout,
        retryable: bool,
    ) -> Result<Value> {
        let middlewares = self.config.middlewares.clone();
        middlewares.call(&command, &self.config);
        let result = self.execute_call(&command, timeout, retryable).await;
        middlewares.call_result(&command, &result, &self.config);
        result
    }

    async fn execute_call(
        &mut self,
        command: &Command,
        timeout: CommandTimeout,
        retryable: bool,
    ) -> Result<Value> {
        if self.disable_reconnection {
            return self.call_on_connection(command, timeout).await;
        }
        if !retryable {
            // The initial open may still retry; only the command itself
            // is pinned to the connection it runs on.
            self.connect_with_retry().await?;
            let prev = mem::replace(&mut self.disable_reconnection, true);
            let result = self.call_on_connection(command, timeout).await;
            self.disable_reconnection = prev;
            return result;
        }

        let mut tries = 0;
        loop {
            match self.call_on_connection(command, timeout).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_connection_error() => {
                    match self.config.retry_connecting(tries, &e) {
                        Some(backoff) => {
                            debug!(tries, error = %e, "retrying after connection failure");
                            if !backoff.is_zero() {
                                tokio::time::sleep(backoff).await;
                            }
                            tries += 1;
                        }
                        None => return Err(e),
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn execute_batch(
        &mut self,
        commands: &[Command],
        timeouts: &BatchTimeouts,
        retryable: bool,
    ) -> Result<Vec<Value>> {
        if self.disable_reconnection {
            return self.batch_on_connection(commands, timeouts).await;
        }
        if !retryable {
            self.connect_with_retry().await?;
            let prev = mem::replace(&mut self.disable_reconnection, true);
            let result = self.batch_on_connection(commands, timeouts).await;
            self.disable_reconnection = prev;
            return result;
        }

        let mut tries = 0;
        loop {
            match self.batch_on_connection(commands, timeouts).await {
                Ok(replies) => return Ok(replies),
                Err(e) if e.is_connection_error() => {
                    match self.config.retry_connecting(tries, &e) {
                        Some(backoff) => {
                            debug!(tries, error = %e, "retrying batch after connection failure");
                            if !backoff.is_zero() {
                                tokio::time::sleep(backoff).await;
                            }
                            tries += 1;
                        }
                        None => return Err(e),
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One attempt: obtain or open a connection, run the command, and
    /// tear the connection down on a connection-class failure.
    async fn call_on_connection(
        &mut self,
        command: &Command,
        timeout: CommandTimeout,
    ) -> Result<Value> {
        let result = match self.ensure_connected().await {
            Ok(()) => match self.raw_connection.as_mut() {
                Some(connection) => connection.call(command, timeout).await,
                None => Err(ConnectionError::Closed.into()),
            },
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            if e.is_connection_error() {
                self.close_connection();
            }
        }
        result
    }

    async fn batch_on_connection(
        &mut self,
        commands: &[Command],
        timeouts: &BatchTimeouts,
    ) -> Result<Vec<Value>> {
        let result = match self.ensure_connected().await {
            Ok(()) => match self.raw_connection.as_mut() {
                Some(connection) => connection.call_pipelined(commands, timeouts).await,
                None => Err(ConnectionError::Closed.into()),
            },
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            if e.is_connection_error() {
                self.close_connection();
            }
        }
        result
    }

    async fn execute_transaction(&mut self, transaction: Transaction) -> Result<Option<Vec<Value>>> {
        let retryable = transaction.retryable();
        let batch = transaction.into_batch();

        let middlewares = self.config.middlewares.clone();
        middlewares.call_pipelined(batch.commands(), &self.config);
        let result = self
            .execute_batch(batch.commands(), batch.timeouts(), retryable)
            .await;
        middlewares.call_pipelined_result(batch.commands(), &result, &self.config);

        let mut replies = result?;
        match replies.pop() {
            Some(Value::Array(results)) => {
                // The connection is healthy even when a queued command
                // failed: the protocol already consumed every reply.
                for reply in &results {
                    if let Some(msg) = reply.as_error_msg() {
                        return Err(Error::command(msg));
                    }
                }
                Ok(Some(results))
            }
            Some(Value::Null) => Ok(None),
            Some(reply) => match reply.as_error_msg() {
                Some(msg) => Err(Error::command(msg)),
                None => Err(Error::Protocol(format!(
                    "unexpected EXEC reply: {}",
                    reply.type_name()
                ))),
            },
            None => Err(Error::Protocol("empty transaction reply".into())),
        }
    }

    async fn watched_transaction<K, F>(&mut self, watch: &[K], f: F) -> Result<Option<Vec<Value>>>
    where
        K: AsRef<[u8]>,
        F: FnOnce(&mut Transaction) -> Result<()>,
    {
        let mut watch_cmd = Command::new("WATCH");
        watch_cmd.extend(watch);
        self.call_command(watch_cmd, CommandTimeout::Default, false)
            .await?;

        let mut transaction = Transaction::new();
        transaction.mark_non_retryable();
        let outcome = match f(&mut transaction) {
            Ok(()) if transaction.is_empty() => {
                // Nothing to run, but the watch is armed; release it.
                match self
                    .call_command(Command::new("UNWATCH"), CommandTimeout::Default, false)
                    .await
                {
                    Ok(_) => Ok(Some(Vec::new())),
                    Err(e) => Err(e),
                }
            }
            Ok(()) => self.execute_transaction(transaction).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(results) => Ok(results),
            Err(e) => {
                // Don't leak watch state on the server.
                if self.is_connected() {
                    let _ = self
                        .call_command(Command::new("UNWATCH"), CommandTimeout::Default, false)
                        .await;
                }
                Err(e)
            }
        }
    }

    // ── Connection management ──────────────────────────────────────

    /// Obtain-or-open, one attempt. Refuses to open while reconnection
    /// is disabled.
    async fn ensure_connected(&mut self) -> Result<()> {
        if self.raw_connection.is_none() {
            if self.disable_reconnection {
                return Err(ConnectionError::Closed.into());
            }
            let connection = self.connect().await?;
            self.raw_connection = Some(connection);
        }
        Ok(())
    }

    /// Obtain-or-open, honoring the reconnect schedule. Used where the
    /// *open* is retryable even though what follows is not.
    async fn connect_with_retry(&mut self) -> Result<()> {
        let mut tries = 0;
        loop {
            match self.ensure_connected().await {
                Ok(()) => return Ok(()),
                Err(e) => match self.config.retry_connecting(tries, &e) {
                    Some(backoff) => {
                        debug!(tries, error = %e, "retrying connection open");
                        if !backoff.is_zero() {
                            tokio::time::sleep(backoff).await;
                        }
                        tries += 1;
                    }
                    None => return Err(e),
                },
            }
        }
    }

    /// Open a fresh connection and run the prelude over it.
    async fn connect(&mut self) -> Result<Connection<D>> {
        let mut connection = Connection::connect(
            &self.config,
            self.connect_timeout,
            self.read_timeout,
            self.write_timeout,
        )
        .await?;
        debug!(addr = %self.config.addr(), "connection opened");

        let mut prelude = self.config.connection_prelude();
        if let Some(id) = &self.id {
            let mut setname = Command::new("CLIENT");
            setname.push("SETNAME");
            setname.push(id);
            prelude.push(setname);
        }
        let check_role = self.config.expected_role.is_some();
        if check_role {
            prelude.push(Command::new("ROLE"));
        }
        if prelude.is_empty() {
            return Ok(connection);
        }

        // The prelude is not reported to middlewares.
        let replies = connection
            .call_pipelined(&prelude, &BatchTimeouts::new())
            .await?;
        for reply in &replies {
            if let Some(msg) = reply.as_error_msg() {
                return Err(Error::command(msg));
            }
        }
        if check_role {
            let observed = replies
                .last()
                .and_then(|reply| match reply {
                    Value::Array(items) => items.first(),
                    _ => None,
                })
                .and_then(Value::as_str)
                .ok_or_else(|| Error::Protocol("unexpected ROLE reply".into()))?;
            self.config.check_role(observed)?;
        }
        Ok(connection)
    }

    fn close_connection(&mut self) {
        if let Some(mut connection) = self.raw_connection.take() {
            connection.close();
            debug!("connection dropped");
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────
