use std::sync::Arc;
use std::time::Duration;
use tokio::io;
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::client_handler::Client;
use super::handler::TextHandler;
use crate::cache::sharded::ShardedCache;

#[derive(Clone, Copy, Debug)]
pub struct TcpServerConfig {
    rx_timeout_secs: u64,
    connection_limit: u32,
}

impl TcpServerConfig {
    pub fn new(rx_timeout_secs: u64, connection_limit: u32) -> TcpServerConfig {
        TcpServerConfig {
            rx_timeout_secs,
            connection_limit,
        }
    }
}

pub struct CacheTcpServer {
    config: TcpServerConfig,
    handler: Arc<TextHandler>,
    cancellation_token: CancellationToken,
    limit_connections: Arc<Semaphore>,
}

impl CacheTcpServer {
    pub fn new(
        config: TcpServerConfig,
        store: Arc<ShardedCache>,
        cancellation_token: CancellationToken,
    ) -> CacheTcpServer {
        CacheTcpServer {
            config,
            handler: Arc::new(TextHandler::new(store)),
            cancellation_token,
            limit_connections: Arc::new(Semaphore::new(config.connection_limit as usize)),
        }
    }

    /// Binds `addr` and serves until cancelled. The bind error is
    /// surfaced to the caller so startup failures can be fatal.
    pub async fn run<A: ToSocketAddrs>(&mut self, addr: A) -> io::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Accept loop. On cancellation it stops accepting, drops the
    /// listener, and then waits for every outstanding connection handler
    /// to finish by reacquiring the full connection budget.
    pub async fn serve(&mut self, listener: TcpListener) -> io::Result<()> {
        info!("Listening on {}", listener.local_addr()?);
        loop {
            let permit = tokio::select! {
                _ = self.cancellation_token.cancelled() => break,
                permit = self.limit_connections.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };
            let (socket, peer_addr) = tokio::select! {
                _ = self.cancellation_token.cancelled() => break,
                connection = listener.accept() => match connection {
                    Ok(connection) => connection,
                    Err(err) => {
                        error!("Failed to accept connection: {}", err);
                        continue;
                    }
                },
            };
            if let Err(err) = socket.set_nodelay(true) {
                error!("Failed to configure socket for {}: {}", peer_addr, err);
                continue;
            }

            permit.forget();
            let mut client = Client::new(
                Arc::clone(&self.handler),
                socket,
                peer_addr,
                Duration::from_secs(self.config.rx_timeout_secs),
                Arc::clone(&self.limit_connections),
            );
            tokio::spawn(async move { client.handle().await });
        }

        info!("Shutdown requested, no longer accepting connections");
        drop(listener);
        let _ = self
            .limit_connections
            .acquire_many(self.config.connection_limit)
            .await;
        info!("All connections closed");
        Ok(())
    }
}
