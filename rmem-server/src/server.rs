//! TCP server and per-connection request loop.
//!
//! Each accepted connection gets its own task that reads length-prefixed
//! frames, runs the decoded request against the shared pool and writes the
//! response back. Pool calls run on the blocking thread pool, so the pool
//! lock is only held around the operation itself and never while waiting
//! on a socket.

use crate::config::ServerConfig;
use crate::dispatch::process_request;
use crate::gc::GarbageCollector;
use rmem_core::dump::DumpWriter;
use rmem_core::error::{MemError, Result};
use rmem_core::protocol::MAX_FRAME_SIZE;
use rmem_core::{MemoryPool, Message};
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::time::timeout;
use tracing::Instrument;

/// Requests a running server to stop accepting connections.
#[derive(Debug, Clone)]
pub struct ShutdownHandle(Arc<Notify>);

impl ShutdownHandle {
    /// Signal shutdown. Safe to call before the server starts running.
    pub fn shutdown(&self) {
        self.0.notify_one();
    }
}

/// The rmem memory server.
pub struct MemoryServer {
    config: ServerConfig,
    listener: TcpListener,
    pool: Arc<MemoryPool>,
    shutdown: Arc<Notify>,
}

impl MemoryServer {
    /// Validate the configuration, allocate the pool and bind the listener.
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        config.validate()?;
        config.prepare_dump_dir()?;

        let mut pool = MemoryPool::new(config.pool_size)?;
        if let Some(dir) = &config.dump_dir {
            pool = pool.with_dump_writer(DumpWriter::new(dir));
        }

        let listener = TcpListener::bind(config.bind_addr())
            .await
            .map_err(|e| MemError::Network {
                cause: format!("failed to bind {}: {}", config.bind_addr(), e),
            })?;

        Ok(Self {
            config,
            listener,
            pool: Arc::new(pool),
            shutdown: Arc::new(Notify::new()),
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().map_err(|e| MemError::Network {
            cause: e.to_string(),
        })
    }

    /// Shared handle to the pool.
    pub fn pool(&self) -> Arc<MemoryPool> {
        Arc::clone(&self.pool)
    }

    /// Handle that stops [`run`](Self::run).
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(Arc::clone(&self.shutdown))
    }

    /// Serve connections until shutdown is signalled.
    ///
    /// The garbage collector runs for as long as this future does.
    pub async fn run(self) -> Result<()> {
        let mut gc = GarbageCollector::start(Arc::clone(&self.pool), self.config.gc).map_err(|e| {
            MemError::Io {
                path: PathBuf::from("rmem-gc"),
                cause: e.to_string(),
            }
        })?;

        let addr = self.local_addr()?;
        tracing::info!(
            addr = %addr,
            pool_size = self.pool.capacity(),
            dump_dir = ?self.config.dump_dir,
            "Memory server started"
        );

        let timeouts = Timeouts {
            idle: self.config.idle_timeout,
            io: self.config.io_timeout,
        };

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    let (stream, peer) = match result {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            tracing::warn!(error = %e, "Failed to accept connection");
                            continue;
                        }
                    };

                    let pool = Arc::clone(&self.pool);
                    let span = tracing::info_span!("connection", peer = %peer);
                    tokio::spawn(
                        async move {
                            tracing::info!("Client connected");
                            match handle_connection(stream, pool, timeouts).await {
                                Ok(()) => tracing::info!("Client disconnected"),
                                Err(e) => tracing::debug!(error = %e, "Connection closed"),
                            }
                        }
                        .instrument(span),
                    );
                }
                _ = self.shutdown.notified() => {
                    tracing::info!("Memory server shutting down");
                    break;
                }
            }
        }

        gc.stop();
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct Timeouts {
    idle: Duration,
    io: Duration,
}

/// Serve requests on one connection until the peer closes it.
///
/// Malformed requests get a failure response and the loop continues. An
/// oversized length prefix cannot be skipped safely, so it is answered
/// with a failure and the connection is closed.
async fn handle_connection(mut stream: TcpStream, pool: Arc<MemoryPool>, timeouts: Timeouts) -> io::Result<()> {
    stream.set_nodelay(true)?;

    loop {
        let len = match timeout(timeouts.idle, stream.read_u32_le()).await {
            Err(_) => return Err(timed_out("waiting for a request")),
            Ok(Err(e)) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
            Ok(result) => result? as usize,
        };

        if len > MAX_FRAME_SIZE {
            tracing::warn!(len, max = MAX_FRAME_SIZE, "Oversized frame");
            send(&mut stream, &Message::failure(), timeouts.io).await?;
            return Err(io::Error::new(io::ErrorKind::InvalidData, "frame too large"));
        }

        let mut body = vec![0u8; len];
        timeout(timeouts.io, stream.read_exact(&mut body))
            .await
            .map_err(|_| timed_out("reading a request"))??;

        let response = match Message::from_bytes(&body) {
            Ok(request) => {
                let pool = Arc::clone(&pool);
                tokio::task::spawn_blocking(move || process_request(&pool, &request))
                    .await
                    .map_err(io::Error::other)?
            }
            Err(e) => {
                tracing::debug!(code = e.code(), error = %e, "Malformed request");
                Message::failure()
            }
        };

        send(&mut stream, &response, timeouts.io).await?;
    }
}

async fn send(stream: &mut TcpStream, message: &Message, deadline: Duration) -> io::Result<()> {
    let body = message.to_bytes()?;
    let mut frame = Vec::with_capacity(4 + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_le_bytes());
    frame.extend_from_slice(&body);

    timeout(deadline, async {
        stream.write_all(&frame).await?;
        stream.flush().await
    })
    .await
    .map_err(|_| timed_out("writing a response"))?
}

fn timed_out(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, format!("timed out {}", what))
}
