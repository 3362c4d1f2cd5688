//! Lazy cursor-paginated scans.
//!
//! The server paginates `SCAN`-family commands with an opaque cursor; the
//! literal `"0"` terminates iteration. The iterators here drive that
//! protocol page by page, overwriting the cursor slot of their command
//! template in place. Construction is free: the first command is only
//! issued when the iterator is advanced, and a freshly built iterator
//! always restarts from cursor zero.

use std::collections::VecDeque;

use bytes::Bytes;

use crate::client::Client;
use crate::command::Command;
use crate::connection::{CommandTimeout, Driver, TcpDriver};
use crate::error::{Error, Result};
use crate::resp::Value;

/// Iterator over single elements (`SCAN`, `SSCAN`).
pub struct ScanIter<'a, D: Driver = TcpDriver> {
    client: &'a mut Client<D>,
    command: Command,
    cursor_index: usize,
    buffer: VecDeque<Value>,
    finished: bool,
}

impl<'a, D: Driver> ScanIter<'a, D> {
    pub(crate) fn new(client: &'a mut Client<D>, command: Command, cursor_index: usize) -> Self {
        Self {
            client,
            command,
            cursor_index,
            buffer: VecDeque::new(),
            finished: false,
        }
    }

    /// Advance to the next element, fetching pages as needed.
    ///
    /// Elements are delivered in server order; a failure mid-scan
    /// propagates and the iterator yields nothing further.
    pub async fn next(&mut self) -> Result<Option<Bytes>> {
        while self.buffer.is_empty() && !self.finished {
            let page = fetch_page(self.client, &mut self.command, self.cursor_index).await?;
            self.finished = page.finished;
            self.buffer.extend(page.elements);
        }
        match self.buffer.pop_front() {
            Some(element) => Ok(Some(element_bytes(element)?)),
            None => Ok(None),
        }
    }

    /// Drain the scan, feeding every element to `consumer`.
    pub async fn for_each(mut self, mut consumer: impl FnMut(Bytes)) -> Result<()> {
        while let Some(element) = self.next().await? {
            consumer(element);
        }
        Ok(())
    }
}

/// Iterator over pairs (`HSCAN` field/value, `ZSCAN` member/score).
pub struct PairScanIter<'a, D: Driver = TcpDriver> {
    client: &'a mut Client<D>,
    command: Command,
    cursor_index: usize,
    buffer: VecDeque<Value>,
    finished: bool,
}

impl<'a, D: Driver> PairScanIter<'a, D> {
    pub(crate) fn new(client: &'a mut Client<D>, command: Command, cursor_index: usize) -> Self {
        Self {
            client,
            command,
            cursor_index,
            buffer: VecDeque::new(),
            finished: false,
        }
    }

    /// Advance to the next pair, consuming two elements per step.
    pub async fn next(&mut self) -> Result<Option<(Bytes, Bytes)>> {
        while self.buffer.len() < 2 && !self.finished {
            let page = fetch_page(self.client, &mut self.command, self.cursor_index).await?;
            self.finished = page.finished;
            self.buffer.extend(page.elements);
        }
        match (self.buffer.pop_front(), self.buffer.pop_front()) {
            (Some(field), Some(value)) => {
                Ok(Some((element_bytes(field)?, element_bytes(value)?)))
            }
            (Some(_), None) => Err(Error::Protocol(
                "pair scan returned an odd number of elements".into(),
            )),
            _ => Ok(None),
        }
    }

    /// Drain the scan, feeding every pair to `consumer`.
    pub async fn for_each(mut self, mut consumer: impl FnMut(Bytes, Bytes)) -> Result<()> {
        while let Some((field, value)) = self.next().await? {
            consumer(field, value);
        }
        Ok(())
    }
}

// ── Paging ─────────────────────────────────────────────────────────

struct Page {
    elements: Vec<Value>,
    finished: bool,
}

/// Issue one page of the scan and advance the cursor slot in place.
async fn fetch_page<D: Driver>(
    client: &mut Client<D>,
    command: &mut Command,
    cursor_index: usize,
) -> Result<Page> {
    let reply = client
        .call_command(command.clone(), CommandTimeout::Default, true)
        .await?;

    let mut items = match reply {
        Value::Array(items) if items.len() == 2 => items,
        other => {
            return Err(Error::Protocol(format!(
                "unexpected scan reply: {}",
                other.type_name()
            )))
        }
    };
    let elements = match items.pop() {
        Some(Value::Array(elements)) => elements,
        _ => return Err(Error::Protocol("scan reply without an element page".into())),
    };
    let cursor = match items.pop() {
        Some(value) => match value.as_bytes() {
            Some(bytes) => Bytes::copy_from_slice(bytes),
            None => return Err(Error::Protocol("scan reply without a cursor".into())),
        },
        None => return Err(Error::Protocol("scan reply without a cursor".into())),
    };

    command.set(cursor_index, &cursor);
    Ok(Page {
        elements,
        finished: cursor.as_ref() == b"0",
    })
}

fn element_bytes(value: Value) -> Result<Bytes> {
    match value {
        Value::BulkString(bytes) => Ok(bytes),
        Value::SimpleString(s) => Ok(Bytes::from(s.into_bytes())),
        other => Err(Error::Protocol(format!(
            "unexpected scan element: {}",
            other.type_name()
        ))),
    }
}
