use clap::Parser;
use std::net::SocketAddr;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::runtime::Builder;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use shardcache::cache::clock::SystemClock;
use shardcache::cache::sharded::ShardedCache;
use shardcache::cache::snapshot::{self, SnapshotError};
use shardcache::cli::parser::ShardcachedConfig;
use shardcache::server::tcp_server::{CacheTcpServer, TcpServerConfig};

const RX_TIMEOUT_SECS: u64 = 60;

fn main() {
    let config = ShardcachedConfig::parse();
    tracing_subscriber::fmt()
        .with_max_level(config.log_level())
        .init();

    info!("Listen address: {}", config.listen_address);
    info!("Listen port: {}", config.port);
    info!("Shards: {}", config.shards);
    info!("Max size: {} entries", config.max_size);
    info!("Cleanup interval: {}s", config.cleanup_interval);
    info!("Connection limit: {}", config.connection_limit);
    info!("Dump file: {}", config.dump_file.display());

    let cache = Arc::new(ShardedCache::new(
        config.shards,
        config.max_size,
        Duration::from_secs(config.cleanup_interval),
        Arc::new(SystemClock::new()),
    ));

    match snapshot::load(&cache, &config.dump_file) {
        Ok(count) => info!(
            "Loaded {} entries from {}",
            count,
            config.dump_file.display()
        ),
        Err(SnapshotError::NotFound) => {
            info!("No dump file found, starting with an empty cache")
        }
        Err(err) => {
            error!(
                "Failed to load dump file {}: {}",
                config.dump_file.display(),
                err
            );
            process::exit(1);
        }
    }

    let runtime = Builder::new_multi_thread()
        .thread_name("shardcached-wrk")
        .enable_all()
        .build()
        .expect("failed to build tokio runtime");

    let addr = SocketAddr::new(config.listen_address, config.port);
    let listener = match runtime.block_on(TcpListener::bind(addr)) {
        Ok(listener) => listener,
        Err(err) => {
            error!("Failed to bind {}: {}", addr, err);
            process::exit(1);
        }
    };
    info!("Server is ready to accept connections at {}", addr);

    let cancellation_token = CancellationToken::new();
    let mut server = CacheTcpServer::new(
        TcpServerConfig::new(RX_TIMEOUT_SECS, config.connection_limit),
        Arc::clone(&cache),
        cancellation_token.clone(),
    );
    let server_handle = runtime.spawn(async move {
        if let Err(err) = server.serve(listener).await {
            error!("Server runtime error: {}", err);
        }
    });

    runtime.block_on(wait_for_shutdown_signal());
    info!("Shutting down server...");
    cancellation_token.cancel();
    if let Err(err) = runtime.block_on(server_handle) {
        error!("Server task failed: {}", err);
    }

    info!("Saving cache to {}...", config.dump_file.display());
    match snapshot::save(&cache, &config.dump_file) {
        Ok(count) => info!("Saved {} entries", count),
        Err(err) => error!("Failed to save cache data: {}", err),
    }

    cache.stop();
    info!("Server gracefully stopped");
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {},
                _ = terminate.recv() => {},
            }
        }
        Err(err) => {
            error!("Failed to install SIGTERM handler: {}", err);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
