//! Dispatches parsed commands to the cache and shapes the replies.

use std::sync::Arc;
use std::time::Instant;

use crate::cache::error::{CacheResult, ConfigError};
use crate::cache::sharded::ShardedCache;
use crate::cache::value::Value;
use crate::protocol::command::Command;
use crate::protocol::response::Response;
use crate::version::SHARDCACHE_VERSION;

pub struct TextHandler {
    store: Arc<ShardedCache>,
    started_at: Instant,
}

impl TextHandler {
    pub fn new(store: Arc<ShardedCache>) -> TextHandler {
        TextHandler {
            store,
            started_at: Instant::now(),
        }
    }

    pub fn handle(&self, command: Command) -> Response {
        match command {
            Command::Get { key } => match self.store.get(&key) {
                Ok(value) => Response::Value(value),
                Err(_) => Response::Nil,
            },
            Command::Set {
                key,
                value,
                ttl_seconds,
            } => {
                self.store.set(key, Value::parse_token(&value), ttl_seconds);
                Response::Ok
            }
            Command::Delete { key } => {
                // The cache's delete has no return; presence is derived
                // from a lookup first, like the DELETE/GET pairing on the
                // wire implies.
                let existed = self.store.get(&key).is_ok();
                self.store.delete(&key);
                Response::Integer(i64::from(existed))
            }
            Command::Incr { key } => arithmetic_response(self.store.incr(&key)),
            Command::Decr { key } => arithmetic_response(self.store.decr(&key)),
            Command::Ping => Response::Pong,
            Command::Info => Response::Info(self.info()),
            Command::ConfigGet { parameter } => match self.store.config_get(&parameter) {
                Some(value) => Response::ConfigValue { parameter, value },
                None => {
                    Response::Error(ConfigError::UnknownParameter(parameter).to_string())
                }
            },
            Command::ConfigSet { parameter, value } => {
                match self.store.config_set(&parameter, &value) {
                    Ok(()) => Response::Ok,
                    Err(err) => Response::Error(err.to_string()),
                }
            }
            // EXIT closes the connection in the client loop; answering OK
            // here keeps the handler total.
            Command::Exit => Response::Ok,
        }
    }

    fn info(&self) -> Vec<(String, String)> {
        let stats = self.store.stats();
        vec![
            ("version".to_string(), SHARDCACHE_VERSION.to_string()),
            (
                "uptime_seconds".to_string(),
                self.started_at.elapsed().as_secs().to_string(),
            ),
            ("curr_items".to_string(), self.store.len().to_string()),
            (
                "shard_count".to_string(),
                self.store.shard_count().to_string(),
            ),
            ("max_size".to_string(), self.store.max_size().to_string()),
            (
                "cleanup_interval_seconds".to_string(),
                self.store.cleanup_interval().as_secs().to_string(),
            ),
            ("hits".to_string(), stats.hits().to_string()),
            ("misses".to_string(), stats.misses().to_string()),
            ("evictions".to_string(), stats.evictions().to_string()),
            (
                "expired_keys".to_string(),
                stats.expired_keys().to_string(),
            ),
        ]
    }
}

fn arithmetic_response(result: CacheResult<i64>) -> Response {
    match result {
        Ok(value) => Response::Integer(value),
        Err(err) => Response::Error(err.to_string()),
    }
}
