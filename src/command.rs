//! Command argument vectors.
//!
//! A [`Command`] is a validated, immutable sequence of binary-safe
//! argument tokens, ready for the wire. User-facing entry points go
//! through [`Command::coerce`], which rejects empty vectors; internal
//! callers build commands with [`Command::new`] / [`Command::push`].

use bytes::Bytes;

use crate::error::{Error, Result};

/// One command as sent on the wire: `["SET", "key", "value"]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    args: Vec<Bytes>,
}

impl Command {
    /// Start a command from its name.
    pub(crate) fn new(name: impl AsRef<[u8]>) -> Self {
        Self {
            args: vec![Bytes::copy_from_slice(name.as_ref())],
        }
    }

    /// Append one argument token.
    pub(crate) fn push(&mut self, arg: impl AsRef<[u8]>) {
        self.args.push(Bytes::copy_from_slice(arg.as_ref()));
    }

    /// Append a whole argument group, flattened in order.
    pub(crate) fn extend<A: AsRef<[u8]>>(&mut self, group: &[A]) {
        for arg in group {
            self.push(arg);
        }
    }

    /// Validate and coerce a user-supplied argument vector.
    ///
    /// Empty vectors are rejected; arguments are copied into owned,
    /// binary-safe tokens.
    pub fn coerce<A: AsRef<[u8]>>(args: &[A]) -> Result<Self> {
        match args.split_first() {
            Some((name, rest)) => {
                let mut command = Self::new(name);
                command.extend(rest);
                Ok(command)
            }
            None => Err(Error::Argument("command cannot be empty".into())),
        }
    }

    /// The argument tokens, in wire order.
    pub fn parts(&self) -> &[Bytes] {
        &self.args
    }

    /// The command name (first token), when valid UTF-8.
    pub fn name(&self) -> Option<&str> {
        self.args.first().and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Number of argument tokens, including the name.
    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Overwrite the token at `index` in place.
    ///
    /// Used by scan iterators to advance the cursor slot across pages.
    pub(crate) fn set(&mut self, index: usize, arg: impl AsRef<[u8]>) {
        self.args[index] = Bytes::copy_from_slice(arg.as_ref());
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerce_basic() {
        let cmd = Command::coerce(&["SET", "key", "value"]).unwrap();
        assert_eq!(cmd.len(), 3);
        assert_eq!(cmd.name(), Some("SET"));
        assert_eq!(cmd.parts()[2], Bytes::from_static(b"value"));
    }

    #[test]
    fn coerce_rejects_empty() {
        let args: [&str; 0] = [];
        let result = Command::coerce(&args);
        assert!(matches!(result, Err(Error::Argument(_))));
    }

    #[test]
    fn coerce_binary_arguments() {
        let cmd = Command::coerce(&[b"SET".as_ref(), b"key".as_ref(), &[0x00, 0xff]]).unwrap();
        assert_eq!(cmd.parts()[2], Bytes::from_static(&[0x00, 0xff]));
    }

    #[test]
    fn extend_flattens_groups() {
        let mut cmd = Command::new("WATCH");
        cmd.extend(&["k1", "k2", "k3"]);
        assert_eq!(cmd.len(), 4);
        assert_eq!(cmd.parts()[3], Bytes::from_static(b"k3"));
    }

    #[test]
    fn set_overwrites_in_place() {
        let mut cmd = Command::coerce(&["SCAN", "0"]).unwrap();
        cmd.set(1, "42");
        assert_eq!(cmd.parts()[1], Bytes::from_static(b"42"));
        assert_eq!(cmd.len(), 2);
    }

    #[test]
    fn name_on_binary_command() {
        let cmd = Command::coerce(&[&[0xff, 0xfe][..]]).unwrap();
        assert_eq!(cmd.name(), None);
    }
}
