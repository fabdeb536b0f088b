use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::{debug, error};

use super::handler::TextHandler;
use crate::protocol::command::Command;
use crate::protocol::response::Response;

/// Upper bound on a single protocol line; longer frames end the
/// connection.
const MAX_LINE_LENGTH: usize = 1024 * 1024;

pub struct Client {
    frames: Framed<TcpStream, LinesCodec>,
    addr: SocketAddr,
    handler: Arc<TextHandler>,
    rx_timeout: Duration,
    /// Max connection semaphore. The permit this client holds is returned
    /// here on Drop, so it comes back even if the handling task panics.
    limit_connections: Arc<Semaphore>,
}

impl Client {
    pub fn new(
        handler: Arc<TextHandler>,
        socket: TcpStream,
        addr: SocketAddr,
        rx_timeout: Duration,
        limit_connections: Arc<Semaphore>,
    ) -> Client {
        Client {
            frames: Framed::new(socket, LinesCodec::new_with_max_length(MAX_LINE_LENGTH)),
            addr,
            handler,
            rx_timeout,
            limit_connections,
        }
    }

    /// Reads frames until the peer disconnects, sends EXIT, idles past the
    /// receive timeout, or a write fails. Protocol errors are answered
    /// inline and do not end the loop.
    pub async fn handle(&mut self) {
        debug!("New client connected: {}", self.addr);
        loop {
            let frame = match timeout(self.rx_timeout, self.frames.next()).await {
                Ok(frame) => frame,
                Err(_) => {
                    debug!(
                        "Client {} idle for {:?}, disconnecting",
                        self.addr, self.rx_timeout
                    );
                    return;
                }
            };
            let line = match frame {
                Some(Ok(line)) => line,
                Some(Err(err)) => {
                    error!("Error reading from {}: {}", self.addr, err);
                    return;
                }
                None => {
                    debug!("Connection closed: {}", self.addr);
                    return;
                }
            };

            let command = match Command::parse(&line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(err) => {
                    if self.send(Response::Error(err.to_string())).await.is_err() {
                        return;
                    }
                    continue;
                }
            };
            if command == Command::Exit {
                debug!("Client {} requested exit", self.addr);
                return;
            }

            let response = self.handler.handle(command);
            if self.send(response).await.is_err() {
                return;
            }
        }
    }

    async fn send(&mut self, response: Response) -> Result<(), LinesCodecError> {
        self.frames.send(response.to_string()).await.map_err(|err| {
            error!("Error sending response to {}: {}", self.addr, err);
            err
        })
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.limit_connections.add_permits(1);
    }
}
