//! Whole-cache persistence.
//!
//! `save` copies every shard's contents out under its shared lock, one
//! shard at a time, and writes a single file; no lock is ever held across
//! file I/O, and the capture is consistent per shard but not across
//! shards. `load` routes each decoded entry back through the cache's own
//! hashing, so the file does not depend on the shard count it was written
//! with.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::cache::sharded::ShardedCache;
use crate::cache::value::Entry;

const SNAPSHOT_MAGIC: &[u8; 4] = b"SCDF";
const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The file does not exist. Tolerated at startup: the server begins
    /// with an empty cache.
    #[error("snapshot file not found")]
    NotFound,
    #[error("snapshot io error: {0}")]
    Io(io::Error),
    #[error("snapshot encoding error: {0}")]
    Codec(#[from] bincode::Error),
    #[error("not a snapshot file")]
    BadMagic,
    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),
}

/// Writes the union of all shard contents to `path`, creating or
/// truncating it. Returns the number of entries written.
pub fn save(cache: &ShardedCache, path: &Path) -> Result<usize, SnapshotError> {
    let mut entries: HashMap<String, Entry> = HashMap::new();
    for shard in cache.shards() {
        for entry in shard.export_entries() {
            entries.insert(entry.key.clone(), entry);
        }
    }

    let file = File::create(path).map_err(SnapshotError::Io)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(SNAPSHOT_MAGIC).map_err(SnapshotError::Io)?;
    writer
        .write_all(&SNAPSHOT_VERSION.to_le_bytes())
        .map_err(SnapshotError::Io)?;
    bincode::serialize_into(&mut writer, &entries)?;
    writer.flush().map_err(SnapshotError::Io)?;

    debug!("Wrote {} entries to {}", entries.len(), path.display());
    Ok(entries.len())
}

/// Reads a snapshot and redistributes its entries into `cache` via the
/// router. Entries loaded later within a shard evict earlier ones once the
/// shard budget is exceeded, matching normal insert semantics. Returns the
/// number of entries decoded.
pub fn load(cache: &ShardedCache, path: &Path) -> Result<usize, SnapshotError> {
    let file = File::open(path).map_err(|err| match err.kind() {
        ErrorKind::NotFound => SnapshotError::NotFound,
        _ => SnapshotError::Io(err),
    })?;
    let mut reader = BufReader::new(file);

    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic).map_err(SnapshotError::Io)?;
    if &magic != SNAPSHOT_MAGIC {
        return Err(SnapshotError::BadMagic);
    }
    let mut version = [0u8; 4];
    reader.read_exact(&mut version).map_err(SnapshotError::Io)?;
    let version = u32::from_le_bytes(version);
    if version != SNAPSHOT_VERSION {
        return Err(SnapshotError::UnsupportedVersion(version));
    }

    let entries: HashMap<String, Entry> = bincode::deserialize_from(&mut reader)?;
    let count = entries.len();
    for (_, entry) in entries {
        cache.restore_entry(entry);
    }

    debug!("Loaded {} entries from {}", count, path.display());
    Ok(count)
}
