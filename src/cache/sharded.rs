//! Key-space router over a fixed array of shards.
//!
//! Keys are assigned with FNV-1a (32-bit) over the UTF-8 key bytes, modulo
//! the shard count. The hash state never crosses calls, so routing needs no
//! shared mutable state; every lifecycle operation simply fans out.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::clock::SharedClock;
use crate::cache::error::{CacheResult, ConfigError};
use crate::cache::shard::{spawn_expirer, CacheShard};
use crate::cache::stats::CacheStats;
use crate::cache::value::{Entry, Value, NANOS_PER_SEC, NO_EXPIRATION};

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

pub(crate) fn fnv1a_32(bytes: &[u8]) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for &byte in bytes {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

pub struct ShardedCache {
    shards: Vec<Arc<CacheShard>>,
    max_size: AtomicUsize,
    cleanup_interval: Duration,
    stats: Arc<CacheStats>,
    clock: SharedClock,
}

impl ShardedCache {
    /// Builds the shard array and starts one expirer per shard when the
    /// cleanup interval is positive. `max_size` is the total entry budget;
    /// each shard gets `max_size / shard_count`, never less than one, and
    /// 0 means unbounded.
    pub fn new(
        shard_count: u32,
        max_size: usize,
        cleanup_interval: Duration,
        clock: SharedClock,
    ) -> ShardedCache {
        let shard_count = shard_count.max(1);
        let per_shard = per_shard_capacity(max_size, shard_count);
        let stats = Arc::new(CacheStats::new());

        let shards: Vec<Arc<CacheShard>> = (0..shard_count)
            .map(|_| {
                Arc::new(CacheShard::new(
                    per_shard,
                    Arc::clone(&clock),
                    Arc::clone(&stats),
                ))
            })
            .collect();

        if !cleanup_interval.is_zero() {
            for (index, shard) in shards.iter().enumerate() {
                spawn_expirer(shard, cleanup_interval, index);
            }
        }

        ShardedCache {
            shards,
            max_size: AtomicUsize::new(max_size),
            cleanup_interval,
            stats,
            clock,
        }
    }

    pub fn get(&self, key: &str) -> CacheResult<Value> {
        self.shard_for(key).get(key)
    }

    /// Stores a value. `ttl_seconds > 0` sets an absolute deadline from
    /// now; any other TTL means the entry never expires, including on
    /// overwrite of a previously expiring entry.
    pub fn set(&self, key: String, value: Value, ttl_seconds: i64) {
        let expires_at = self.deadline_for(ttl_seconds);
        self.shard_for(&key).set(key, value, expires_at);
    }

    pub fn delete(&self, key: &str) {
        self.shard_for(key).delete(key);
    }

    pub fn incr(&self, key: &str) -> CacheResult<i64> {
        self.shard_for(key).increment_by(key, 1)
    }

    pub fn decr(&self, key: &str) -> CacheResult<i64> {
        self.shard_for(key).increment_by(key, -1)
    }

    /// Stops every shard's expirer. Safe to call more than once.
    pub fn stop(&self) {
        for shard in &self.shards {
            shard.stop();
        }
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| shard.is_empty())
    }

    pub fn shard_count(&self) -> u32 {
        self.shards.len() as u32
    }

    pub fn max_size(&self) -> usize {
        self.max_size.load(Ordering::Relaxed)
    }

    pub fn cleanup_interval(&self) -> Duration {
        self.cleanup_interval
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn config_get(&self, parameter: &str) -> Option<String> {
        match parameter {
            "max-size" => Some(self.max_size().to_string()),
            "shards" => Some(self.shard_count().to_string()),
            "cleanup-interval" => Some(self.cleanup_interval.as_secs().to_string()),
            _ => None,
        }
    }

    /// Applies a runtime configuration change. Only `max-size` is
    /// writable; the new per-shard budget takes effect immediately and any
    /// overflow is trimmed by subsequent inserts.
    pub fn config_set(&self, parameter: &str, value: &str) -> Result<(), ConfigError> {
        match parameter {
            "max-size" => {
                let max_size: usize = value.parse().map_err(|_| ConfigError::InvalidValue {
                    param: "max-size",
                    value: value.to_string(),
                })?;
                self.max_size.store(max_size, Ordering::Relaxed);
                let per_shard = per_shard_capacity(max_size, self.shard_count());
                for shard in &self.shards {
                    shard.set_capacity(per_shard);
                }
                Ok(())
            }
            "shards" => Err(ConfigError::ReadOnly("shards")),
            "cleanup-interval" => Err(ConfigError::ReadOnly("cleanup-interval")),
            _ => Err(ConfigError::UnknownParameter(parameter.to_string())),
        }
    }

    pub(crate) fn shards(&self) -> &[Arc<CacheShard>] {
        &self.shards
    }

    pub(crate) fn restore_entry(&self, entry: Entry) {
        self.shard_for(&entry.key).restore(entry);
    }

    fn shard_for(&self, key: &str) -> &CacheShard {
        let hash = fnv1a_32(key.as_bytes());
        &self.shards[(hash % self.shard_count()) as usize]
    }

    fn deadline_for(&self, ttl_seconds: i64) -> i64 {
        if ttl_seconds > 0 {
            self.clock
                .now_nanos()
                .saturating_add(ttl_seconds.saturating_mul(NANOS_PER_SEC))
        } else {
            NO_EXPIRATION
        }
    }
}

fn per_shard_capacity(max_size: usize, shard_count: u32) -> usize {
    if max_size == 0 {
        return 0;
    }
    (max_size / shard_count as usize).max(1)
}
