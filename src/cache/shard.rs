//! One lockable partition of the cache.
//!
//! A shard pairs a key index with a recency list under a single
//! reader/writer lock. Every client-facing operation, including reads,
//! promotes recency and therefore takes the exclusive lock; the shared
//! lock exists for snapshot traversal only.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error};

use crate::cache::clock::SharedClock;
use crate::cache::error::{CacheError, CacheResult};
use crate::cache::list::{EntryId, EntryList};
use crate::cache::stats::CacheStats;
use crate::cache::value::{Entry, Value, NO_EXPIRATION};

struct ShardState {
    index: HashMap<String, EntryId>,
    entries: EntryList,
}

struct ExpirerHandle {
    stop_tx: mpsc::Sender<()>,
    join: thread::JoinHandle<()>,
}

pub struct CacheShard {
    state: RwLock<ShardState>,
    /// Max live entries; 0 means unbounded. Rewritable at runtime through
    /// CONFIG SET, hence atomic rather than a construction-time constant.
    capacity: AtomicUsize,
    clock: SharedClock,
    stats: Arc<CacheStats>,
    expirer: Mutex<Option<ExpirerHandle>>,
}

impl CacheShard {
    pub fn new(capacity: usize, clock: SharedClock, stats: Arc<CacheStats>) -> CacheShard {
        CacheShard {
            state: RwLock::new(ShardState {
                index: HashMap::new(),
                entries: EntryList::new(),
            }),
            capacity: AtomicUsize::new(capacity),
            clock,
            stats,
            expirer: Mutex::new(None),
        }
    }

    /// Looks up a live entry and promotes it to most recently used.
    ///
    /// An entry whose deadline has passed is removed here and reported as
    /// absent, so readers never observe stale values even if the periodic
    /// sweep has not reached it yet.
    pub fn get(&self, key: &str) -> CacheResult<Value> {
        let now = self.clock.now_nanos();
        let mut state = self.state.write();

        let id = match state.index.get(key) {
            Some(&id) => id,
            None => {
                self.stats.record_miss();
                return Err(CacheError::NotFound);
            }
        };
        let value = match state.entries.get(id) {
            Some(entry) if !entry.is_expired(now) => entry.value.clone(),
            _ => {
                state.entries.remove(id);
                state.index.remove(key);
                self.stats.record_expirations(1);
                self.stats.record_miss();
                return Err(CacheError::NotFound);
            }
        };
        state.entries.move_to_front(id);
        self.stats.record_hit();
        Ok(value)
    }

    /// Inserts or overwrites an entry. An overwrite replaces both value and
    /// deadline and promotes the entry; an insert past capacity evicts
    /// exactly one LRU victim.
    pub fn set(&self, key: String, value: Value, expires_at: i64) {
        let mut state = self.state.write();

        if let Some(&id) = state.index.get(&key) {
            if let Some(entry) = state.entries.get_mut(id) {
                entry.value = value;
                entry.expires_at = expires_at;
            }
            state.entries.move_to_front(id);
            return;
        }

        let id = state.entries.push_front(Entry::new(key.clone(), value, expires_at));
        state.index.insert(key, id);
        self.evict_overflow(&mut state);
    }

    /// Removes an entry if present. Absence is not an error; the presence
    /// flag on the wire is derived by the protocol layer from a prior get.
    pub fn delete(&self, key: &str) {
        let mut state = self.state.write();
        if let Some(id) = state.index.remove(key) {
            state.entries.remove(id);
        }
    }

    /// Adds `delta` to an integer entry and returns the new value.
    ///
    /// A missing (or expired) key is created from the delta alone, with no
    /// expiration. A non-integer value fails with `NotAnInteger` and is
    /// left untouched. 64-bit overflow wraps in two's complement.
    pub fn increment_by(&self, key: &str, delta: i64) -> CacheResult<i64> {
        let now = self.clock.now_nanos();
        let mut state = self.state.write();

        if let Some(&id) = state.index.get(key) {
            let live = state
                .entries
                .get(id)
                .map_or(false, |entry| !entry.is_expired(now));
            if live {
                let updated = match state.entries.get_mut(id) {
                    Some(entry) => match entry.value {
                        Value::Integer(current) => {
                            let next = current.wrapping_add(delta);
                            entry.value = Value::Integer(next);
                            Some(next)
                        }
                        Value::Bytes(_) => None,
                    },
                    None => None,
                };
                return match updated {
                    Some(next) => {
                        state.entries.move_to_front(id);
                        Ok(next)
                    }
                    None => Err(CacheError::NotAnInteger),
                };
            }
            state.entries.remove(id);
            state.index.remove(key);
            self.stats.record_expirations(1);
        }

        let id = state
            .entries
            .push_front(Entry::new(key.to_string(), Value::Integer(delta), NO_EXPIRATION));
        state.index.insert(key.to_string(), id);
        self.evict_overflow(&mut state);
        Ok(delta)
    }

    /// Removes every entry whose deadline has passed. Keys are collected
    /// first and removed second, so the index is never mutated while it is
    /// being iterated.
    pub fn expire_sweep(&self) -> usize {
        let now = self.clock.now_nanos();
        let mut state = self.state.write();
        let state = &mut *state;

        let mut expired: Vec<(String, EntryId)> = Vec::new();
        for (key, &id) in state.index.iter() {
            if state
                .entries
                .get(id)
                .map_or(false, |entry| entry.is_expired(now))
            {
                expired.push((key.clone(), id));
            }
        }
        for (key, id) in &expired {
            state.entries.remove(*id);
            state.index.remove(key);
        }
        if !expired.is_empty() {
            self.stats.record_expirations(expired.len() as u64);
        }
        expired.len()
    }

    /// Re-inserts an entry restored from a snapshot, enforcing capacity the
    /// same way `set` does: within a shard, later entries evict earlier
    /// ones.
    pub(crate) fn restore(&self, entry: Entry) {
        let mut state = self.state.write();
        if let Some(&id) = state.index.get(&entry.key) {
            if let Some(existing) = state.entries.get_mut(id) {
                *existing = entry;
            }
            state.entries.move_to_front(id);
            return;
        }
        let key = entry.key.clone();
        let id = state.entries.push_front(entry);
        state.index.insert(key, id);
        self.evict_overflow(&mut state);
    }

    /// Copies out every entry in recency order (shared lock only).
    pub(crate) fn export_entries(&self) -> Vec<Entry> {
        let state = self.state.read();
        state.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Relaxed)
    }

    pub(crate) fn set_capacity(&self, capacity: usize) {
        self.capacity.store(capacity, Ordering::Relaxed);
    }

    /// Signals the background expirer to exit and joins it. Idempotent; a
    /// shard without an expirer is a no-op.
    pub fn stop(&self) {
        let handle = self.expirer.lock().take();
        if let Some(handle) = handle {
            drop(handle.stop_tx);
            if handle.join.join().is_err() {
                error!("Shard expirer thread panicked");
            }
        }
    }

    fn evict_overflow(&self, state: &mut ShardState) {
        let capacity = self.capacity.load(Ordering::Relaxed);
        if capacity == 0 {
            return;
        }
        while state.entries.len() > capacity {
            match state.entries.pop_back() {
                Some(victim) => {
                    state.index.remove(&victim.key);
                    self.stats.record_eviction();
                }
                None => break,
            }
        }
    }
}

/// Starts the periodic expirer for one shard. The worker is a plain OS
/// thread parked on a channel timeout, so the cache core works without an
/// async runtime; dropping the stop sender wakes and terminates it.
pub(crate) fn spawn_expirer(shard: &Arc<CacheShard>, interval: Duration, shard_index: usize) {
    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    let worker = Arc::clone(shard);
    let spawned = thread::Builder::new()
        .name(format!("shard-expirer-{}", shard_index))
        .spawn(move || loop {
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    let removed = worker.expire_sweep();
                    if removed > 0 {
                        debug!("Shard {} expired {} entries", shard_index, removed);
                    }
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        });
    match spawned {
        Ok(join) => {
            *shard.expirer.lock() = Some(ExpirerHandle { stop_tx, join });
        }
        Err(err) => error!("Failed to spawn expirer for shard {}: {}", shard_index, err),
    }
}
