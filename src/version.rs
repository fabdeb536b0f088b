pub const SHARDCACHE_VERSION: &str = env!("CARGO_PKG_VERSION");
