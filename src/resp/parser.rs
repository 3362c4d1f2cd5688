//! Streaming RESP2/RESP3 parser.
//!
//! [`parse`] takes a byte buffer and returns `Ok((Value, bytes_consumed))`,
//! `Err(Incomplete)` when more data is needed, or `Err(Protocol(…))` on
//! malformed input.
//!
//! The parser operates on `Bytes` (ref-counted) buffers so bulk strings are
//! extracted with zero-copy `slice()`.

use bytes::Bytes;
use memchr::memchr;

use crate::error::{Error, Result};
use crate::resp::types::Value;

/// Parse one RESP value from the front of `buf`.
///
/// Returns `(value, bytes_consumed)` on success. Returns `Err(Incomplete)`
/// when the buffer is too short — callers should read more data and retry.
pub fn parse(buf: &Bytes) -> Result<(Value, usize)> {
    parse_at(buf, 0)
}

/// Convenience wrapper: parse from a byte slice (copies into `Bytes` first).
pub fn parse_slice(buf: &[u8]) -> Result<(Value, usize)> {
    parse(&Bytes::copy_from_slice(buf))
}

fn parse_at(buf: &Bytes, pos: usize) -> Result<(Value, usize)> {
    let type_byte = *buf.get(pos).ok_or(Error::Incomplete)?;
    match type_byte {
        b'+' => {
            let (line, next) = read_line(buf, pos + 1)?;
            Ok((Value::SimpleString(utf8_line(line)?), next))
        }
        b'-' => {
            let (line, next) = read_line(buf, pos + 1)?;
            Ok((Value::Error(utf8_line(line)?), next))
        }
        b':' => {
            let (line, next) = read_line(buf, pos + 1)?;
            Ok((Value::Integer(parse_int(line)?), next))
        }
        b'$' => parse_bulk(buf, pos).map(|(data, next)| match data {
            Some(bytes) => (Value::BulkString(bytes), next),
            None => (Value::Null, next),
        }),
        b'!' => parse_bulk(buf, pos).and_then(|(data, next)| match data {
            Some(bytes) => Ok((
                Value::BulkError(
                    String::from_utf8(bytes.to_vec())
                        .map_err(|_| Error::Protocol("bulk error is not UTF-8".into()))?,
                ),
                next,
            )),
            None => Err(Error::Protocol("negative bulk error length".into())),
        }),
        b'*' => parse_aggregate(buf, pos).map(|(items, next)| match items {
            Some(items) => (Value::Array(items), next),
            None => (Value::Null, next),
        }),
        b'~' => parse_aggregate(buf, pos).and_then(|(items, next)| match items {
            Some(items) => Ok((Value::Set(items), next)),
            None => Err(Error::Protocol("negative set count".into())),
        }),
        b'>' => parse_aggregate(buf, pos).and_then(|(items, next)| match items {
            Some(items) => {
                let mut items = items.into_iter();
                let kind = items
                    .next()
                    .and_then(|v| v.as_str().map(str::to_string))
                    .ok_or_else(|| Error::Protocol("push message without a kind".into()))?;
                Ok((
                    Value::Push {
                        kind,
                        data: items.collect(),
                    },
                    next,
                ))
            }
            None => Err(Error::Protocol("negative push count".into())),
        }),
        b'%' => {
            let (line, mut next) = read_line(buf, pos + 1)?;
            let count = parse_int(line)?;
            if count < 0 {
                return Err(Error::Protocol("negative map count".into()));
            }
            let mut pairs = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let (key, after_key) = parse_at(buf, next)?;
                let (value, after_value) = parse_at(buf, after_key)?;
                pairs.push((key, value));
                next = after_value;
            }
            Ok((Value::Map(pairs), next))
        }
        b'_' => {
            if buf.len() < pos + 3 {
                return Err(Error::Incomplete);
            }
            Ok((Value::Null, pos + 3))
        }
        b'#' => {
            if buf.len() < pos + 4 {
                return Err(Error::Incomplete);
            }
            match buf[pos + 1] {
                b't' => Ok((Value::Boolean(true), pos + 4)),
                b'f' => Ok((Value::Boolean(false), pos + 4)),
                other => Err(Error::Protocol(format!(
                    "invalid boolean byte: 0x{other:02x}"
                ))),
            }
        }
        b',' => {
            let (line, next) = read_line(buf, pos + 1)?;
            let text = std::str::from_utf8(line)
                .map_err(|_| Error::Protocol("double is not UTF-8".into()))?;
            let value = text
                .parse::<f64>()
                .map_err(|_| Error::Protocol(format!("invalid double: {text}")))?;
            Ok((Value::Double(value), next))
        }
        other => Err(Error::Protocol(format!(
            "unknown RESP type byte: 0x{other:02x}"
        ))),
    }
}

/// Bulk payload shared by `$` and `!`: `Ok((None, next))` for `$-1\r\n`.
fn parse_bulk(buf: &Bytes, pos: usize) -> Result<(Option<Bytes>, usize)> {
    let (line, data_start) = read_line(buf, pos + 1)?;
    let len = parse_int(line)?;
    if len < 0 {
        return Ok((None, data_start));
    }
    let len = len as usize;
    let data_end = data_start + len;
    if buf.len() < data_end + 2 {
        return Err(Error::Incomplete);
    }
    if &buf[data_end..data_end + 2] != b"\r\n" {
        return Err(Error::Protocol("bulk payload not terminated by CRLF".into()));
    }
    Ok((Some(buf.slice(data_start..data_end)), data_end + 2))
}

/// Element list shared by `*`, `~` and `>`: `Ok((None, next))` for `*-1\r\n`.
fn parse_aggregate(buf: &Bytes, pos: usize) -> Result<(Option<Vec<Value>>, usize)> {
    let (line, mut next) = read_line(buf, pos + 1)?;
    let count = parse_int(line)?;
    if count < 0 {
        return Ok((None, next));
    }
    let mut items = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (value, after) = parse_at(buf, next)?;
        items.push(value);
        next = after;
    }
    Ok((Some(items), next))
}

/// Read up to the next CRLF; returns the line and the index just past it.
fn read_line(buf: &[u8], start: usize) -> Result<(&[u8], usize)> {
    if start >= buf.len() {
        return Err(Error::Incomplete);
    }
    match memchr(b'\r', &buf[start..]) {
        Some(offset) => {
            let end = start + offset;
            if end + 1 >= buf.len() {
                Err(Error::Incomplete)
            } else if buf[end + 1] != b'\n' {
                Err(Error::Protocol("expected LF after CR".into()))
            } else {
                Ok((&buf[start..end], end + 2))
            }
        }
        None => Err(Error::Incomplete),
    }
}

fn parse_int(line: &[u8]) -> Result<i64> {
    std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| {
            Error::Protocol(format!(
                "invalid integer: {:?}",
                String::from_utf8_lossy(line)
            ))
        })
}

fn utf8_line(line: &[u8]) -> Result<String> {
    String::from_utf8(line.to_vec())
        .map_err(|_| Error::Protocol("simple line is not UTF-8".into()))
}

// ── Tests ──────────────────────────────────────────────────────────
