use clap::Parser;
use std::net::IpAddr;
use std::ops::RangeInclusive;
use std::path::PathBuf;

const DEFAULT_PORT: u16 = 6379;
const DEFAULT_ADDRESS: &str = "127.0.0.1";
const DEFAULT_SHARD_COUNT: u32 = 32;
const DEFAULT_MAX_SIZE: usize = 10_000;
const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 10;
const DEFAULT_CONNECTION_LIMIT: u32 = 1024;
const DEFAULT_DUMP_FILE: &str = "dump.goc";

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
/// sharded in-memory cache server with a line-oriented text protocol
pub struct ShardcachedConfig {
    #[arg(short, long, value_name = "PORT", value_parser = port_in_range, default_value_t = DEFAULT_PORT)]
    /// TCP port to listen on
    pub port: u16,

    #[arg(short, long, value_name = "SHARDS", value_parser = positive_shard_count, default_value_t = DEFAULT_SHARD_COUNT)]
    /// number of independently locked cache shards
    pub shards: u32,

    #[arg(short, long, value_name = "MAX-SIZE", default_value_t = DEFAULT_MAX_SIZE)]
    /// max number of entries across all shards (0 = unbounded)
    pub max_size: usize,

    #[arg(short, long, value_name = "CLEANUP-INTERVAL", default_value_t = DEFAULT_CLEANUP_INTERVAL_SECS)]
    /// seconds between expired-entry sweeps (0 disables the sweeper)
    pub cleanup_interval: u64,

    #[arg(long, value_name = "CONNECTION-LIMIT", default_value_t = DEFAULT_CONNECTION_LIMIT)]
    /// max simultaneous connections
    pub connection_limit: u32,

    #[arg(short, long, value_name = "LISTEN", default_value_t = String::from(DEFAULT_ADDRESS).parse::<IpAddr>().unwrap())]
    /// interface to listen on
    pub listen_address: IpAddr,

    #[arg(short, long, value_name = "DUMP-FILE", default_value = DEFAULT_DUMP_FILE)]
    /// snapshot file loaded on startup and written on shutdown
    pub dump_file: PathBuf,

    #[arg(short, long, action = clap::ArgAction::Count, default_value_t = 1)]
    /// sets the level of verbosity
    pub verbose: u8,
}

impl ShardcachedConfig {
    pub fn log_level(&self) -> tracing::Level {
        match self.verbose {
            0 => tracing::Level::ERROR,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }
}

const PORT_RANGE: RangeInclusive<usize> = 1..=65535;

fn port_in_range(s: &str) -> Result<u16, String> {
    let port: usize = s
        .parse()
        .map_err(|_| format!("`{s}` isn't a port number"))?;
    if PORT_RANGE.contains(&port) {
        Ok(port as u16)
    } else {
        Err(format!(
            "port not in range {}-{}",
            PORT_RANGE.start(),
            PORT_RANGE.end()
        ))
    }
}

fn positive_shard_count(s: &str) -> Result<u32, String> {
    let shards: u32 = s
        .parse()
        .map_err(|_| format!("`{s}` isn't a shard count"))?;
    if shards == 0 {
        Err(String::from("shard count must be greater than 0"))
    } else {
        Ok(shards)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::error::Error;

    #[test]
    fn verify_cli() {
        ShardcachedConfig::command().debug_assert()
    }

    #[test]
    fn test_default_config() {
        let config = ShardcachedConfig::try_parse_from(["shardcached"]).unwrap();

        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.shards, DEFAULT_SHARD_COUNT);
        assert_eq!(config.max_size, DEFAULT_MAX_SIZE);
        assert_eq!(config.cleanup_interval, DEFAULT_CLEANUP_INTERVAL_SECS);
        assert_eq!(config.connection_limit, DEFAULT_CONNECTION_LIMIT);
        assert_eq!(
            config.listen_address,
            DEFAULT_ADDRESS.parse::<IpAddr>().unwrap()
        );
        assert_eq!(config.dump_file, PathBuf::from(DEFAULT_DUMP_FILE));
        assert_eq!(config.verbose, 1);
    }

    #[test]
    fn test_custom_port() {
        let config =
            ShardcachedConfig::try_parse_from(["shardcached", "--port", "8080"]).unwrap();
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_invalid_port() {
        let result = ShardcachedConfig::try_parse_from(["shardcached", "--port", "70000"]);
        assert!(result.is_err());

        let error = result.unwrap_err();
        let source = error.source().unwrap();
        assert_eq!(source.to_string(), "port not in range 1-65535");
    }

    #[test]
    fn test_zero_shards_rejected() {
        let result = ShardcachedConfig::try_parse_from(["shardcached", "--shards", "0"]);
        assert!(result.is_err());

        let error = result.unwrap_err();
        let source = error.source().unwrap();
        assert_eq!(source.to_string(), "shard count must be greater than 0");
    }

    #[test]
    fn test_cache_sizing_flags() {
        let config = ShardcachedConfig::try_parse_from([
            "shardcached",
            "--shards",
            "4",
            "--max-size",
            "100",
            "--cleanup-interval",
            "0",
        ])
        .unwrap();

        assert_eq!(config.shards, 4);
        assert_eq!(config.max_size, 100);
        assert_eq!(config.cleanup_interval, 0);
    }

    #[test]
    fn test_verbose_flag_accumulates() {
        let config =
            ShardcachedConfig::try_parse_from(["shardcached", "-v", "-v"]).unwrap();
        assert_eq!(config.verbose, 2);
        assert_eq!(config.log_level(), tracing::Level::DEBUG);
    }

    #[test]
    fn test_dump_file_override() {
        let config =
            ShardcachedConfig::try_parse_from(["shardcached", "--dump-file", "/tmp/x.goc"])
                .unwrap();
        assert_eq!(config.dump_file, PathBuf::from("/tmp/x.goc"));
    }
}
