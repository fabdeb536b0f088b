//! Response side of the text protocol.
//!
//! Every variant renders to the exact bytes put on the wire, minus the
//! trailing newline added by the line codec. INFO is the one multi-line
//! response; its inner newlines are part of the rendering.

use crate::cache::value::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Ok,
    Pong,
    Nil,
    Value(Value),
    Integer(i64),
    Info(Vec<(String, String)>),
    ConfigValue { parameter: String, value: String },
    Error(String),
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Ok => write!(f, "OK"),
            Response::Pong => write!(f, "PONG"),
            Response::Nil => write!(f, "(nil)"),
            Response::Value(value) => write!(f, "{}", value),
            Response::Integer(number) => write!(f, "{}", number),
            Response::Info(pairs) => {
                let mut first = true;
                for (key, value) in pairs {
                    if !first {
                        writeln!(f)?;
                    }
                    write!(f, "{}:{}", key, value)?;
                    first = false;
                }
                Ok(())
            }
            Response::ConfigValue { parameter, value } => write!(f, "{}:{}", parameter, value),
            Response::Error(message) => write!(f, "ERROR: {}", message),
        }
    }
}
