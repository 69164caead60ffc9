//! Reply model shared by the transport and the routing core.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Type tag of a [`Reply`], used for diagnostics and shape checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReplyKind {
    /// Simple status string (`+OK`).
    Status,
    /// Error string (`-ERR ...`).
    Error,
    /// Signed 64-bit integer.
    Integer,
    /// Binary-safe bulk string.
    Bulk,
    /// Null bulk string or null array.
    Nil,
    /// Nested sequence of replies.
    Array,
}

impl fmt::Display for ReplyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReplyKind::Status => "status",
            ReplyKind::Error => "error",
            ReplyKind::Integer => "integer",
            ReplyKind::Bulk => "bulk",
            ReplyKind::Nil => "nil",
            ReplyKind::Array => "array",
        };
        f.write_str(name)
    }
}

/// A decoded server reply.
///
/// The router only inspects the variant and, for arrays, the nesting. Data
/// payloads are handed to the caller untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Simple status string.
    Status(String),
    /// Error string. Application errors travel back to the caller as this variant.
    Error(String),
    /// Integer reply.
    Integer(i64),
    /// Bulk string payload.
    Bulk(Bytes),
    /// Absent value.
    Nil,
    /// Array of nested replies.
    Array(Vec<Reply>),
}

impl Reply {
    /// Returns the type tag of this reply.
    pub fn kind(&self) -> ReplyKind {
        match self {
            Reply::Status(_) => ReplyKind::Status,
            Reply::Error(_) => ReplyKind::Error,
            Reply::Integer(_) => ReplyKind::Integer,
            Reply::Bulk(_) => ReplyKind::Bulk,
            Reply::Nil => ReplyKind::Nil,
            Reply::Array(_) => ReplyKind::Array,
        }
    }

    /// True for `Error` replies.
    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }

    /// Error text, if this is an `Error` reply.
    pub fn error_text(&self) -> Option<&str> {
        match self {
            Reply::Error(text) => Some(text),
            _ => None,
        }
    }

    /// Integer value, if this is an `Integer` reply.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Reply::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Bulk payload as UTF-8, if this is a `Bulk` reply holding valid UTF-8.
    pub fn as_bulk_str(&self) -> Option<&str> {
        match self {
            Reply::Bulk(data) => std::str::from_utf8(data).ok(),
            _ => None,
        }
    }

    /// Nested elements, if this is an `Array` reply.
    pub fn as_array(&self) -> Option<&[Reply]> {
        match self {
            Reply::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Convenience constructor for bulk replies.
    pub fn bulk(data: impl Into<Bytes>) -> Self {
        Reply::Bulk(data.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(Reply::Status("OK".into()).kind(), ReplyKind::Status);
        assert_eq!(Reply::Error("ERR".into()).kind(), ReplyKind::Error);
        assert_eq!(Reply::Integer(7).kind(), ReplyKind::Integer);
        assert_eq!(Reply::bulk("x").kind(), ReplyKind::Bulk);
        assert_eq!(Reply::Nil.kind(), ReplyKind::Nil);
        assert_eq!(Reply::Array(vec![]).kind(), ReplyKind::Array);
    }

    #[test]
    fn test_accessors_reject_other_variants() {
        let reply = Reply::Integer(3);
        assert_eq!(reply.as_integer(), Some(3));
        assert!(reply.as_bulk_str().is_none());
        assert!(reply.as_array().is_none());
        assert!(reply.error_text().is_none());
        assert!(!reply.is_error());
    }

    #[test]
    fn test_bulk_str_requires_utf8() {
        assert_eq!(Reply::bulk("127.0.0.1").as_bulk_str(), Some("127.0.0.1"));
        assert!(Reply::bulk(vec![0xff, 0xfe]).as_bulk_str().is_none());
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ReplyKind::Bulk.to_string(), "bulk");
        assert_eq!(ReplyKind::Error.to_string(), "error");
    }
}
