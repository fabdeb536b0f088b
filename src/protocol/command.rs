//! Request side of the text protocol.
//!
//! A frame is one newline-terminated line, split on whitespace; the first
//! word is the command, matched case-insensitively. Malformed frames turn
//! into a `ProtocolError` that is answered inline while the connection
//! stays open.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Get { key: String },
    Set { key: String, value: String, ttl_seconds: i64 },
    Delete { key: String },
    Incr { key: String },
    Decr { key: String },
    Ping,
    Info,
    ConfigGet { parameter: String },
    ConfigSet { parameter: String, value: String },
    Exit,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("wrong number of arguments for '{0}'")]
    WrongArity(&'static str),
    #[error("TTL must be an integer")]
    InvalidTtl,
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
}

impl Command {
    /// Parses one protocol line. Blank lines produce `Ok(None)` and are
    /// skipped by the connection loop.
    pub fn parse(line: &str) -> Result<Option<Command>, ProtocolError> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.is_empty() {
            return Ok(None);
        }
        let command = parts[0].to_ascii_uppercase();

        let parsed = match command.as_str() {
            "GET" => {
                require_arity(&parts, 2, "GET")?;
                Command::Get {
                    key: parts[1].to_string(),
                }
            }
            "SET" => {
                if parts.len() != 3 && parts.len() != 4 {
                    return Err(ProtocolError::WrongArity("SET"));
                }
                let ttl_seconds = match parts.get(3) {
                    Some(raw) => raw.parse::<i64>().map_err(|_| ProtocolError::InvalidTtl)?,
                    None => 0,
                };
                Command::Set {
                    key: parts[1].to_string(),
                    value: parts[2].to_string(),
                    ttl_seconds,
                }
            }
            "DELETE" | "DEL" => {
                require_arity(&parts, 2, "DELETE")?;
                Command::Delete {
                    key: parts[1].to_string(),
                }
            }
            "INCR" => {
                require_arity(&parts, 2, "INCR")?;
                Command::Incr {
                    key: parts[1].to_string(),
                }
            }
            "DECR" => {
                require_arity(&parts, 2, "DECR")?;
                Command::Decr {
                    key: parts[1].to_string(),
                }
            }
            "PING" => Command::Ping,
            "INFO" => {
                require_arity(&parts, 1, "INFO")?;
                Command::Info
            }
            "CONFIG" => {
                if parts.len() < 3 {
                    return Err(ProtocolError::WrongArity("CONFIG"));
                }
                let subcommand = parts[1].to_ascii_uppercase();
                match subcommand.as_str() {
                    "GET" => {
                        require_arity(&parts, 3, "CONFIG GET")?;
                        Command::ConfigGet {
                            parameter: parts[2].to_string(),
                        }
                    }
                    "SET" => {
                        require_arity(&parts, 4, "CONFIG SET")?;
                        Command::ConfigSet {
                            parameter: parts[2].to_string(),
                            value: parts[3].to_string(),
                        }
                    }
                    _ => {
                        return Err(ProtocolError::UnknownCommand(format!(
                            "CONFIG {}",
                            subcommand
                        )))
                    }
                }
            }
            "EXIT" | "QUIT" => Command::Exit,
            _ => return Err(ProtocolError::UnknownCommand(command)),
        };
        Ok(Some(parsed))
    }
}

fn require_arity(
    parts: &[&str],
    expected: usize,
    command: &'static str,
) -> Result<(), ProtocolError> {
    if parts.len() != expected {
        return Err(ProtocolError::WrongArity(command));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn parse_one(line: &str) -> Command {
        Command::parse(line)
            .expect("line should parse")
            .expect("line should not be blank")
    }

    #[test]
    fn parses_every_command() {
        assert_eq!(parse_one("GET key"), Command::Get { key: "key".into() });
        assert_eq!(
            parse_one("SET key value"),
            Command::Set {
                key: "key".into(),
                value: "value".into(),
                ttl_seconds: 0
            }
        );
        assert_eq!(
            parse_one("SET key value 30"),
            Command::Set {
                key: "key".into(),
                value: "value".into(),
                ttl_seconds: 30
            }
        );
        assert_eq!(parse_one("DELETE key"), Command::Delete { key: "key".into() });
        assert_eq!(parse_one("DEL key"), Command::Delete { key: "key".into() });
        assert_eq!(parse_one("INCR n"), Command::Incr { key: "n".into() });
        assert_eq!(parse_one("DECR n"), Command::Decr { key: "n".into() });
        assert_eq!(parse_one("PING"), Command::Ping);
        assert_eq!(parse_one("INFO"), Command::Info);
        assert_eq!(
            parse_one("CONFIG GET max-size"),
            Command::ConfigGet {
                parameter: "max-size".into()
            }
        );
        assert_eq!(
            parse_one("CONFIG SET max-size 100"),
            Command::ConfigSet {
                parameter: "max-size".into(),
                value: "100".into()
            }
        );
        assert_eq!(parse_one("EXIT"), Command::Exit);
        assert_eq!(parse_one("QUIT"), Command::Exit);
    }

    #[test]
    fn commands_are_case_insensitive_keys_are_not() {
        assert_eq!(parse_one("get Key"), Command::Get { key: "Key".into() });
        assert_eq!(parse_one("config get shards"), parse_one("CONFIG GET shards"));
    }

    #[test]
    fn blank_lines_are_skipped() {
        assert_eq!(Command::parse(""), Ok(None));
        assert_eq!(Command::parse("   \t "), Ok(None));
    }

    #[test_case("GET", "GET" ; "get_missing_key")]
    #[test_case("GET a b", "GET" ; "get_extra_args")]
    #[test_case("SET", "SET" ; "set_no_args")]
    #[test_case("SET key", "SET" ; "set_missing_value")]
    #[test_case("SET key value 10 extra", "SET" ; "set_extra_args")]
    #[test_case("DELETE", "DELETE" ; "delete_missing_key")]
    #[test_case("DEL a b", "DELETE" ; "del_extra_args")]
    #[test_case("INCR", "INCR" ; "incr_missing_key")]
    #[test_case("DECR a b", "DECR" ; "decr_extra_args")]
    #[test_case("INFO sections", "INFO" ; "info_takes_no_args")]
    #[test_case("CONFIG GET", "CONFIG" ; "config_missing_subargs")]
    #[test_case("CONFIG GET a b", "CONFIG GET" ; "config_get_extra_args")]
    #[test_case("CONFIG SET max-size", "CONFIG SET" ; "config_set_missing_value")]
    fn arity_errors_name_the_command(line: &str, command: &str) {
        match Command::parse(line) {
            Err(ProtocolError::WrongArity(name)) => assert_eq!(name, command),
            other => panic!("expected arity error for {:?}, got {:?}", line, other),
        }
    }

    #[test]
    fn ttl_must_parse_as_an_integer() {
        assert_eq!(
            Command::parse("SET key value soon"),
            Err(ProtocolError::InvalidTtl)
        );
        assert_eq!(
            Command::parse("SET key value soon").unwrap_err().to_string(),
            "TTL must be an integer"
        );
    }

    #[test]
    fn unknown_commands_are_reported_uppercased() {
        assert_eq!(
            Command::parse("flush all"),
            Err(ProtocolError::UnknownCommand("FLUSH".to_string()))
        );
        assert_eq!(
            Command::parse("config reset x y")
                .unwrap_err()
                .to_string(),
            "unknown command 'CONFIG RESET'"
        );
    }

    #[test]
    fn arity_error_message_matches_the_wire() {
        assert_eq!(
            Command::parse("SET").unwrap_err().to_string(),
            "wrong number of arguments for 'SET'"
        );
    }
}
