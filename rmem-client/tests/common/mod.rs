//! Common test utilities for integration tests.

#![allow(dead_code)]

use rmem_client::{ClientConfig, RpcClient};
use rmem_core::MemoryPool;
use rmem_server::{GcConfig, MemoryServer, ServerConfig, ShutdownHandle};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// A memory server running on its own runtime thread.
pub struct TestServer {
    addr: SocketAddr,
    pool: Arc<MemoryPool>,
    shutdown: ShutdownHandle,
    thread: Option<JoinHandle<()>>,
}

impl TestServer {
    /// Start a server with a 1 MB pool on an ephemeral port.
    pub fn start() -> Self {
        Self::start_with(test_server_config(0))
    }

    /// Start a server with an explicit configuration.
    pub fn start_with(config: ServerConfig) -> Self {
        let (tx, rx) = mpsc::channel();

        let thread = thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
                .unwrap();

            runtime.block_on(async move {
                let server = MemoryServer::bind(config).await.unwrap();
                tx.send((
                    server.local_addr().unwrap(),
                    server.pool(),
                    server.shutdown_handle(),
                ))
                .unwrap();
                server.run().await.unwrap();
            });
        });

        let (addr, pool, shutdown) = rx.recv().unwrap();
        Self {
            addr,
            pool,
            shutdown,
            thread: Some(thread),
        }
    }

    /// Address clients should connect to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The server's pool, for inspecting reference counts directly.
    pub fn pool(&self) -> &Arc<MemoryPool> {
        &self.pool
    }

    /// Stop the server and close every open connection.
    pub fn stop(&mut self) {
        self.shutdown.shutdown();
        if let Some(thread) = self.thread.take() {
            thread.join().unwrap();
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Server configuration bound to localhost with a fast collector.
pub fn test_server_config(port: u16) -> ServerConfig {
    ServerConfig::new(port, 1)
        .with_host("127.0.0.1")
        .with_gc(GcConfig::default().with_interval(Duration::from_millis(20)))
}

/// Client configuration with short timeouts for tests.
pub fn test_client_config(addr: SocketAddr) -> ClientConfig {
    ClientConfig::new(addr.ip().to_string(), addr.port())
        .with_connect_timeout(Duration::from_millis(500))
        .with_io_timeout(Duration::from_secs(5))
        .with_reconnect(3, Duration::from_millis(50))
}

/// Connect a shared client to `server`.
pub fn connect(server: &TestServer) -> Arc<RpcClient> {
    Arc::new(RpcClient::connect_with(test_client_config(server.addr())).unwrap())
}
