//! TCP transport.
//!
//! Wraps a `tokio::net::TcpStream` with an integrated read buffer and
//! RESP parser for streaming request/response I/O. Every wait is bounded
//! by the corresponding timeout; an expired deadline marks the transport
//! closed, because a reply that is still in flight would corrupt the
//! framing of whatever came next.

use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::trace;

use crate::command::Command;
use crate::config::Config;
use crate::connection::driver::{BatchTimeouts, CommandTimeout, Driver};
use crate::error::{ConnectionError, Error, Result};
use crate::resp::{encode_batch, encode_command, parse, Value};

/// Initial read buffer capacity (16 KB).
const READ_BUF_CAPACITY: usize = 16 * 1024;

/// Maximum read buffer size (64 MB). A reply that would grow the buffer
/// past this is a protocol error, not an allocation attempt.
const MAX_BUF_SIZE: usize = 64 * 1024 * 1024;

/// A single TCP connection to the server.
#[derive(Debug)]
pub struct TcpDriver {
    stream: TcpStream,
    /// Data read from the socket but not yet consumed by the parser.
    buf: BytesMut,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
    open: bool,
}

impl Driver for TcpDriver {
    async fn connect(
        config: &Config,
        connect_timeout: Option<Duration>,
        read_timeout: Option<Duration>,
        write_timeout: Option<Duration>,
    ) -> Result<Self> {
        if config.tls {
            return Err(Error::Protocol(
                "TLS connections (rediss://) are not supported; use redis:// or set tls=false"
                    .into(),
            ));
        }

        let addr = config.addr();
        let connect = TcpStream::connect(&addr);
        let stream = match connect_timeout {
            Some(limit) => tokio::time::timeout(limit, connect)
                .await
                .map_err(|_| ConnectionError::ConnectTimeout)??,
            None => connect.await?,
        };
        stream.set_nodelay(true).ok();
        trace!(%addr, "transport opened");

        Ok(Self {
            stream,
            buf: BytesMut::with_capacity(READ_BUF_CAPACITY),
            read_timeout,
            write_timeout,
            open: true,
        })
    }

    async fn call(&mut self, command: &Command, timeout: CommandTimeout) -> Result<Value> {
        self.write_bytes(&encode_command(command)).await?;
        self.read_value(timeout.resolve(self.read_timeout), true).await
    }

    async fn call_pipelined(
        &mut self,
        commands: &[Command],
        timeouts: &BatchTimeouts,
    ) -> Result<Vec<Value>> {
        self.write_bytes(&encode_batch(commands)).await?;

        let mut replies = Vec::with_capacity(commands.len());
        for index in 0..commands.len() {
            let timeout = timeouts
                .get(&index)
                .copied()
                .unwrap_or_default()
                .resolve(self.read_timeout);
            replies.push(self.read_value(timeout, true).await?);
        }
        Ok(replies)
    }

    async fn write(&mut self, command: &Command) -> Result<()> {
        self.write_bytes(&encode_command(command)).await
    }

    async fn read(&mut self, timeout: CommandTimeout) -> Result<Value> {
        // An expired wait here just means no event arrived yet; nothing is
        // in flight, so the transport stays usable for the next poll.
        self.read_value(timeout.resolve(self.read_timeout), false).await
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn is_connected(&self) -> bool {
        self.open
    }

    fn set_read_timeout(&mut self, timeout: Option<Duration>) {
        self.read_timeout = timeout;
    }

    fn set_write_timeout(&mut self, timeout: Option<Duration>) {
        self.write_timeout = timeout;
    }
}

impl TcpDriver {
    /// Send raw bytes, bounded by the write timeout.
    async fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        if !self.open {
            return Err(ConnectionError::Closed.into());
        }

        let result = match self.write_timeout {
            Some(limit) => {
                match tokio::time::timeout(limit, self.stream.write_all(bytes)).await {
                    Ok(io_result) => io_result,
                    Err(_) => {
                        self.open = false;
                        return Err(ConnectionError::WriteTimeout.into());
                    }
                }
            }
            None => self.stream.write_all(bytes).await,
        };

        match result {
            Ok(()) => Ok(()),
            Err(e) => {
                self.open = false;
                Err(e.into())
            }
        }
    }

    /// Read and parse one complete RESP value, bounded by `timeout`.
    ///
    /// `close_on_timeout` is set on the command paths, where an expired
    /// deadline leaves a reply in flight.
    async fn read_value(&mut self, timeout: Option<Duration>, close_on_timeout: bool) -> Result<Value> {
        if !self.open {
            return Err(ConnectionError::Closed.into());
        }

        let result = match timeout {
            Some(limit) => match tokio::time::timeout(limit, Self::fill_and_parse(
                &mut self.stream,
                &mut self.buf,
            ))
            .await
            {
                Ok(inner) => inner,
                Err(_) => {
                    if close_on_timeout {
                        self.open = false;
                    }
                    return Err(ConnectionError::ReadTimeout.into());
                }
            },
            None => Self::fill_and_parse(&mut self.stream, &mut self.buf).await,
        };

        match result {
            Ok(value) => Ok(value),
            Err(e) => {
                if e.is_connection_error() {
                    self.open = false;
                }
                Err(e)
            }
        }
    }

    /// The parse-or-read-more loop, with no deadline of its own.
    ///
    /// The buffer is frozen to `Bytes` before parsing so bulk strings are
    /// extracted zero-copy; on `Incomplete` the (typically small) partial
    /// frame is copied back.
    async fn fill_and_parse(stream: &mut TcpStream, buf: &mut BytesMut) -> Result<Value> {
        loop {
            if !buf.is_empty() {
                let snapshot = buf.split().freeze();
                match parse(&snapshot) {
                    Ok((value, consumed)) => {
                        if consumed < snapshot.len() {
                            buf.extend_from_slice(&snapshot[consumed..]);
                        }
                        return Ok(value);
                    }
                    Err(Error::Incomplete) => {
                        buf.extend_from_slice(&snapshot);
                    }
                    Err(e) => {
                        buf.extend_from_slice(&snapshot);
                        return Err(e);
                    }
                }
            }

            if buf.capacity() - buf.len() < 4096 {
                if buf.capacity() >= MAX_BUF_SIZE {
                    return Err(Error::Protocol(format!(
                        "reply too large: buffer would exceed {MAX_BUF_SIZE} bytes"
                    )));
                }
                buf.reserve(READ_BUF_CAPACITY);
            }
            let n = stream.read_buf(buf).await?;
            if n == 0 {
                return Err(Error::Connection(ConnectionError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed by server",
                ))));
            }
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────
