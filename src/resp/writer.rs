//! RESP command serializer.
//!
//! Encodes commands into the RESP bulk string array wire format:
//! `*<N>\r\n$<len>\r\narg1\r\n$<len>\r\narg2\r\n…`

use itoa::Buffer;

use crate::command::Command;

/// Encode one command into RESP wire format.
///
/// Every argument is written as a binary-safe bulk string.
pub fn encode_command(command: &Command) -> Vec<u8> {
    let mut buf = Vec::with_capacity(encoded_len(command));
    encode_into(&mut buf, command);
    buf
}

/// Encode a batch of commands into a single contiguous buffer.
///
/// One allocation and one `write_all` for the whole batch.
pub fn encode_batch(commands: &[Command]) -> Vec<u8> {
    let cap = commands.iter().map(encoded_len).sum();
    let mut buf = Vec::with_capacity(cap);
    for command in commands {
        encode_into(&mut buf, command);
    }
    buf
}

fn encode_into(buf: &mut Vec<u8>, command: &Command) {
    let mut itoa_buf = Buffer::new();

    // *<N>\r\n
    buf.push(b'*');
    buf.extend_from_slice(itoa_buf.format(command.len()).as_bytes());
    buf.extend_from_slice(b"\r\n");

    for arg in command.parts() {
        // $<len>\r\n<data>\r\n
        buf.push(b'$');
        buf.extend_from_slice(itoa_buf.format(arg.len()).as_bytes());
        buf.extend_from_slice(b"\r\n");
        buf.extend_from_slice(arg);
        buf.extend_from_slice(b"\r\n");
    }
}

fn encoded_len(command: &Command) -> usize {
    // '*' + max_digits + \r\n, then '$' + max_digits + \r\n + data + \r\n each
    let mut cap = 1 + 10 + 2;
    for arg in command.parts() {
        cap += 1 + 10 + 2 + arg.len() + 2;
    }
    cap
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn cmd(args: &[&[u8]]) -> Command {
        Command::coerce(args).unwrap()
    }

    #[test]
    fn encode_single_arg() {
        assert_eq!(encode_command(&cmd(&[b"PING"])), b"*1\r\n$4\r\nPING\r\n");
    }

    #[test]
    fn encode_three_args() {
        assert_eq!(
            encode_command(&cmd(&[b"SET", b"key", b"value"])),
            b"*3\r\n$3\r\nSET\r\n$3\r\nkey\r\n$5\r\nvalue\r\n"
        );
    }

    #[test]
    fn encode_empty_arg() {
        assert_eq!(
            encode_command(&cmd(&[b"SET", b"key", b""])),
            b"*3\r\n$3\r\nSET\r\n$3\r\nkey\r\n$0\r\n\r\n"
        );
    }

    #[test]
    fn encode_binary_arg() {
        let result = encode_command(&cmd(&[b"SET", b"key", &[0x00, 0x01, 0xff]]));
        assert_eq!(
            result,
            b"*3\r\n$3\r\nSET\r\n$3\r\nkey\r\n$3\r\n\x00\x01\xff\r\n".as_ref()
        );
    }

    #[test]
    fn encode_batch_concatenates() {
        let commands = [cmd(&[b"PING"]), cmd(&[b"GET", b"k"])];
        assert_eq!(
            encode_batch(&commands),
            b"*1\r\n$4\r\nPING\r\n*2\r\n$3\r\nGET\r\n$1\r\nk\r\n".as_ref()
        );
    }

    #[test]
    fn encode_batch_empty() {
        assert!(encode_batch(&[]).is_empty());
    }

    // ── Round-trip: encode → parse ──

    #[test]
    fn roundtrip_encode_parse() {
        use crate::resp::parser::parse_slice;
        use crate::resp::types::Value;

        let wire = encode_command(&cmd(&[b"SET", b"hello", b"world"]));
        let (val, consumed) = parse_slice(&wire).unwrap();
        assert_eq!(consumed, wire.len());
        assert_eq!(
            val,
            Value::Array(vec![
                Value::BulkString(Bytes::from_static(b"SET")),
                Value::BulkString(Bytes::from_static(b"hello")),
                Value::BulkString(Bytes::from_static(b"world")),
            ])
        );
    }
}
