use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel deadline for entries that never expire.
pub const NO_EXPIRATION: i64 = 0;

pub const NANOS_PER_SEC: i64 = 1_000_000_000;

/// A stored cache value.
///
/// Counters (INCR/DECR) are only defined for the `Integer` variant; every
/// other payload is kept as raw bytes. The variant tag is persisted, so an
/// integer written before a snapshot is still an integer after a restore.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    Integer(i64),
    Bytes(Bytes),
}

impl Value {
    /// Interprets a protocol token the way the wire does: anything that
    /// parses cleanly as a signed 64-bit integer is stored as an integer,
    /// everything else as bytes.
    pub fn parse_token(token: &str) -> Value {
        match token.parse::<i64>() {
            Ok(number) => Value::Integer(number),
            Err(_) => Value::Bytes(Bytes::copy_from_slice(token.as_bytes())),
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Value::Integer(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(number) => write!(f, "{}", number),
            Value::Bytes(bytes) => write!(f, "{}", String::from_utf8_lossy(bytes)),
        }
    }
}

impl From<i64> for Value {
    fn from(number: i64) -> Value {
        Value::Integer(number)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::Bytes(Bytes::copy_from_slice(s.as_bytes()))
    }
}

/// A single cache record: key, value and an absolute expiration deadline
/// in Unix nanoseconds (`NO_EXPIRATION` = never expires).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub key: String,
    pub value: Value,
    pub expires_at: i64,
}

impl Entry {
    pub fn new(key: String, value: Value, expires_at: i64) -> Entry {
        Entry {
            key,
            value,
            expires_at,
        }
    }

    pub fn is_expired(&self, now_nanos: i64) -> bool {
        self.expires_at > NO_EXPIRATION && self.expires_at < now_nanos
    }
}
