use bytes::Bytes;

/// RESP protocol value types (RESP2 plus the RESP3 types a client sees).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// +OK\r\n
    SimpleString(String),
    /// -ERR message\r\n
    Error(String),
    /// :1000\r\n
    Integer(i64),
    /// $6\r\nfoobar\r\n
    BulkString(Bytes),
    /// *2\r\n…
    Array(Vec<Value>),
    /// $-1\r\n or *-1\r\n (RESP2), or _\r\n (RESP3)
    Null,
    /// ,3.14\r\n (RESP3)
    Double(f64),
    /// #t\r\n or #f\r\n (RESP3)
    Boolean(bool),
    /// %N\r\n (RESP3 map)
    Map(Vec<(Value, Value)>),
    /// ~N\r\n (RESP3 set)
    Set(Vec<Value>),
    /// !21\r\nSYNTAX invalid syntax\r\n (RESP3 bulk error)
    BulkError(String),
    /// >N\r\n… (RESP3 push message)
    Push { kind: String, data: Vec<Value> },
}

// ── Convenience accessors ──────────────────────────────────────────

impl Value {
    /// Try to interpret this value as a UTF-8 string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::SimpleString(s) => Some(s),
            Self::BulkString(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    /// Try to interpret this value as bytes.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::BulkString(b) => Some(b),
            Self::SimpleString(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    /// Try to interpret this value as i64.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to interpret this value as an array (consumes self).
    pub fn into_array(self) -> Option<Vec<Value>> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Returns true when this value represents null / nil.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns true when this is a server error reply (simple or bulk).
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_) | Self::BulkError(_))
    }

    /// Returns the error message if this is an error value.
    pub fn as_error_msg(&self) -> Option<&str> {
        match self {
            Self::Error(msg) => Some(msg),
            Self::BulkError(msg) => Some(msg),
            _ => None,
        }
    }

    /// Returns the type name as a static string (useful for error messages).
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::SimpleString(_) => "simple_string",
            Self::Error(_) => "error",
            Self::Integer(_) => "integer",
            Self::BulkString(_) => "bulk_string",
            Self::Array(_) => "array",
            Self::Null => "null",
            Self::Double(_) => "double",
            Self::Boolean(_) => "boolean",
            Self::Map(_) => "map",
            Self::Set(_) => "set",
            Self::BulkError(_) => "bulk_error",
            Self::Push { .. } => "push",
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn as_str_variants() {
        assert_eq!(Value::SimpleString("OK".into()).as_str(), Some("OK"));
        assert_eq!(
            Value::BulkString(Bytes::from_static(b"hello")).as_str(),
            Some("hello")
        );
        assert_eq!(
            Value::BulkString(Bytes::from_static(&[0xff, 0xfe])).as_str(),
            None
        );
        assert_eq!(Value::Integer(42).as_str(), None);
        assert_eq!(Value::Null.as_str(), None);
    }

    #[test]
    fn as_bytes_variants() {
        assert_eq!(
            Value::BulkString(Bytes::from_static(&[1, 2, 3])).as_bytes(),
            Some(&[1u8, 2, 3][..])
        );
        assert_eq!(
            Value::SimpleString("OK".into()).as_bytes(),
            Some(b"OK".as_ref())
        );
        assert_eq!(Value::Integer(1).as_bytes(), None);
    }

    #[test]
    fn as_int_variants() {
        assert_eq!(Value::Integer(-1).as_int(), Some(-1));
        assert_eq!(Value::SimpleString("42".into()).as_int(), None);
    }

    #[test]
    fn into_array_variants() {
        let v = Value::Array(vec![Value::Integer(1), Value::Integer(2)]);
        assert_eq!(v.into_array().map(|a| a.len()), Some(2));
        assert!(Value::Integer(1).into_array().is_none());
    }

    #[test]
    fn error_predicates() {
        assert!(Value::Error("ERR x".into()).is_error());
        assert!(Value::BulkError("SYNTAX y".into()).is_error());
        assert!(!Value::SimpleString("ERR".into()).is_error());
        assert_eq!(Value::Error("ERR foo".into()).as_error_msg(), Some("ERR foo"));
        assert_eq!(Value::Integer(1).as_error_msg(), None);
    }

    #[test]
    fn null_predicate() {
        assert!(Value::Null.is_null());
        assert!(!Value::BulkString(Bytes::new()).is_null());
    }

    #[test]
    fn type_names() {
        assert_eq!(Value::Null.type_name(), "null");
        assert_eq!(Value::Map(vec![]).type_name(), "map");
        assert_eq!(
            Value::Push {
                kind: "message".into(),
                data: vec![]
            }
            .type_name(),
            "push"
        );
    }
}
