use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::runtime::Builder;
use tokio_util::sync::CancellationToken;

use shardcache::cache::clock::SystemClock;
use shardcache::cache::sharded::ShardedCache;
use shardcache::server::tcp_server::{CacheTcpServer, TcpServerConfig};

pub struct ServerOptions {
    pub shards: u32,
    pub max_size: usize,
    pub cleanup_interval_secs: u64,
}

impl Default for ServerOptions {
    fn default() -> ServerOptions {
        ServerOptions {
            shards: 4,
            max_size: 10_000,
            cleanup_interval_secs: 1,
        }
    }
}

/// An in-process server on an ephemeral port, killed on Drop.
pub struct TestServer {
    addr: SocketAddr,
    cancellation_token: CancellationToken,
    thread_join_handle: Option<thread::JoinHandle<()>>,
}

#[allow(dead_code)]
pub fn spawn_server() -> TestServer {
    spawn_server_with(ServerOptions::default())
}

pub fn spawn_server_with(options: ServerOptions) -> TestServer {
    let cancellation_token = CancellationToken::new();
    let token = cancellation_token.clone();
    let (addr_tx, addr_rx) = mpsc::channel();

    let thread_join_handle = thread::spawn(move || {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("failed to build test runtime");
        runtime.block_on(async move {
            let listener = TcpListener::bind("127.0.0.1:0")
                .await
                .expect("failed to bind test listener");
            addr_tx
                .send(listener.local_addr().expect("listener has no local addr"))
                .expect("failed to report test server address");

            let cache = Arc::new(ShardedCache::new(
                options.shards,
                options.max_size,
                Duration::from_secs(options.cleanup_interval_secs),
                Arc::new(SystemClock::new()),
            ));
            let mut server = CacheTcpServer::new(
                TcpServerConfig::new(60, 64),
                Arc::clone(&cache),
                token,
            );
            server.serve(listener).await.expect("test server failed");
            cache.stop();
        });
    });

    let addr = addr_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("test server did not start");
    TestServer {
        addr,
        cancellation_token,
        thread_join_handle: Some(thread_join_handle),
    }
}

impl TestServer {
    pub fn connect(&self) -> TestClient {
        TestClient::connect(self.addr)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.cancellation_token.cancel();
        if let Some(handle) = self.thread_join_handle.take() {
            handle.join().expect("test server thread panicked");
        }
    }
}

/// Minimal blocking line-protocol client.
pub struct TestClient {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl TestClient {
    pub fn connect(addr: SocketAddr) -> TestClient {
        let stream = TcpStream::connect(addr).expect("failed to connect to test server");
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("failed to set read timeout");
        let writer = stream.try_clone().expect("failed to clone stream");
        TestClient {
            reader: BufReader::new(stream),
            writer,
        }
    }

    /// Sends one command line and returns the single response line.
    pub fn send(&mut self, command: &str) -> String {
        self.send_raw(command);
        self.read_line()
    }

    #[allow(dead_code)]
    pub fn send_raw(&mut self, command: &str) {
        self.writer
            .write_all(format!("{}\n", command).as_bytes())
            .expect("failed to write command");
    }

    #[allow(dead_code)]
    pub fn read_line(&mut self) -> String {
        let mut line = String::new();
        let read = self
            .reader
            .read_line(&mut line)
            .expect("failed to read response");
        assert!(read > 0, "server closed the connection");
        line.trim_end_matches('\n').to_string()
    }

    /// Reads a fixed number of response lines (INFO is multi-line).
    #[allow(dead_code)]
    pub fn read_lines(&mut self, count: usize) -> Vec<String> {
        (0..count).map(|_| self.read_line()).collect()
    }

    /// True once the server has closed this connection.
    #[allow(dead_code)]
    pub fn is_closed(&mut self) -> bool {
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => true,
            _ => false,
        }
    }
}
