//! Reconnecting request/response client.

use crate::error::{ClientError, Result};
use parking_lot::Mutex;
use rmem_core::protocol::{MAX_FRAME_SIZE, read_frame, write_frame};
use rmem_core::{BlockId, MemError, Message};
use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;

/// Configuration for [`RpcClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server host name or address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Deadline for establishing a connection.
    pub connect_timeout: Duration,
    /// Deadline for each socket read and write.
    pub io_timeout: Duration,
    /// Connection attempts made before a request gives up.
    pub reconnect_attempts: u32,
    /// Pause between connection attempts.
    pub reconnect_backoff: Duration,
}

impl ClientConfig {
    /// Create a configuration with default timeouts.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: Duration::from_secs(5),
            io_timeout: Duration::from_secs(5),
            reconnect_attempts: 3,
            reconnect_backoff: Duration::from_secs(1),
        }
    }

    /// Set the connect deadline.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the socket read/write deadline.
    #[must_use]
    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Set the reconnect budget.
    #[must_use]
    pub fn with_reconnect(mut self, attempts: u32, backoff: Duration) -> Self {
        self.reconnect_attempts = attempts.max(1);
        self.reconnect_backoff = backoff;
        self
    }

    /// `host:port` string of the server.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Blocking client for an rmem server.
///
/// One request is in flight at a time: the socket sits behind a mutex, so
/// concurrent callers sharing a client through an `Arc` are serialized.
///
/// When a request fails in transit the client drops the connection,
/// reconnects to the same address (a bounded number of attempts with a
/// fixed pause between them) and sends the request exactly once more.
/// A request whose response was lost may therefore reach the server twice.
#[derive(Debug)]
pub struct RpcClient {
    config: ClientConfig,
    conn: Mutex<Option<TcpStream>>,
}

impl RpcClient {
    /// Connect to `host:port` with default settings.
    pub fn connect(host: impl Into<String>, port: u16) -> Result<Self> {
        Self::connect_with(ClientConfig::new(host, port))
    }

    /// Connect using an explicit configuration.
    ///
    /// Fails if the server cannot be reached within the reconnect budget.
    pub fn connect_with(config: ClientConfig) -> Result<Self> {
        let client = Self::lazy(config);
        let stream = client.reconnect()?;
        *client.conn.lock() = Some(stream);
        Ok(client)
    }

    /// Create a client that connects on its first request.
    pub fn lazy(config: ClientConfig) -> Self {
        Self {
            config,
            conn: Mutex::new(None),
        }
    }

    /// The configuration in use.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Whether a connection is currently open.
    ///
    /// A peer that has gone away is only noticed on the next request.
    pub fn is_connected(&self) -> bool {
        self.conn.lock().is_some()
    }

    /// Close the connection. The next request reconnects.
    pub fn disconnect(&self) {
        if let Some(stream) = self.conn.lock().take() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
            tracing::debug!(addr = %self.config.addr(), "Disconnected");
        }
    }

    /// Send one request and wait for its response.
    ///
    /// A request too large to frame is rejected before the socket is
    /// touched, so it never costs a reconnect.
    pub fn send_request(&self, request: &Message) -> Result<Message> {
        let body = request.to_bytes()?;
        if body.len() > MAX_FRAME_SIZE {
            return Err(ClientError::Protocol(MemError::FrameTooLarge {
                len: body.len(),
                max: MAX_FRAME_SIZE,
            }));
        }
        let mut conn = self.conn.lock();

        if let Some(stream) = conn.as_mut() {
            match exchange(stream, &body) {
                Ok(frame) => return decode_response(&frame),
                Err(e) => {
                    tracing::warn!(
                        addr = %self.config.addr(),
                        error = %e,
                        "Request failed, reconnecting"
                    );
                    *conn = None;
                }
            }
        }

        let stream = conn.insert(self.reconnect()?);
        match exchange(stream, &body) {
            Ok(frame) => decode_response(&frame),
            Err(e) => {
                *conn = None;
                Err(ClientError::Transport(e))
            }
        }
    }

    /// Allocate a block of `size` bytes.
    pub fn create_block(&self, size: u64, type_tag: &str) -> Result<BlockId> {
        let response = self.send_request(&Message::create(size, type_tag))?;
        if !response.success {
            return Err(ClientError::Rejected {
                op: "create",
                id: BlockId::NONE,
            });
        }

        let raw: [u8; 4] = response
            .data
            .get(..4)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| {
                ClientError::InvalidResponse(format!(
                    "create returned {} bytes, expected a 4-byte id",
                    response.data.len()
                ))
            })?;
        let id = BlockId::new(i32::from_le_bytes(raw));
        if !id.is_valid() {
            return Err(ClientError::InvalidResponse(format!("create returned id {}", id.as_i32())));
        }
        Ok(id)
    }

    /// Overwrite the start of a block.
    pub fn set_block(&self, id: BlockId, data: &[u8]) -> Result<()> {
        self.expect_success("set", id, Message::set(id, data)).map(drop)
    }

    /// Read a block. The server returns the whole block.
    pub fn get_block(&self, id: BlockId, max_len: u64) -> Result<Vec<u8>> {
        self.expect_success("get", id, Message::get(id, max_len))
    }

    /// Add a reference to a block.
    pub fn increase_ref(&self, id: BlockId) -> Result<()> {
        self.expect_success("increase_ref", id, Message::increase_ref(id)).map(drop)
    }

    /// Drop a reference from a block.
    pub fn decrease_ref(&self, id: BlockId) -> Result<()> {
        self.expect_success("decrease_ref", id, Message::decrease_ref(id)).map(drop)
    }

    fn expect_success(&self, op: &'static str, id: BlockId, request: Message) -> Result<Vec<u8>> {
        let response = self.send_request(&request)?;
        if response.success {
            Ok(response.data)
        } else {
            Err(ClientError::Rejected { op, id })
        }
    }

    fn reconnect(&self) -> Result<TcpStream> {
        let attempts = self.config.reconnect_attempts.max(1);
        let mut last_error = io::Error::new(io::ErrorKind::NotConnected, "no attempt made");

        for attempt in 1..=attempts {
            match self.open_stream() {
                Ok(stream) => {
                    tracing::info!(addr = %self.config.addr(), attempt, "Connected");
                    return Ok(stream);
                }
                Err(e) => {
                    tracing::warn!(
                        addr = %self.config.addr(),
                        attempt,
                        max_attempts = attempts,
                        error = %e,
                        "Connection attempt failed"
                    );
                    last_error = e;
                }
            }

            if attempt < attempts {
                thread::sleep(self.config.reconnect_backoff);
            }
        }

        Err(ClientError::Connect {
            addr: self.config.addr(),
            attempts,
            source: last_error,
        })
    }

    fn open_stream(&self) -> io::Result<TcpStream> {
        let mut last_error = None;

        for addr in (self.config.host.as_str(), self.config.port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, self.config.connect_timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(self.config.io_timeout))?;
                    stream.set_write_timeout(Some(self.config.io_timeout))?;
                    stream.set_nodelay(true)?;
                    return Ok(stream);
                }
                Err(e) => last_error = Some(e),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::AddrNotAvailable, "host resolved to no addresses")
        }))
    }
}

fn exchange(stream: &mut TcpStream, body: &[u8]) -> io::Result<Vec<u8>> {
    write_frame(stream, body)?;
    read_frame(stream)
}

fn decode_response(frame: &[u8]) -> Result<Message> {
    let response = Message::from_bytes(frame)?;
    if response.is_request() {
        return Err(ClientError::InvalidResponse(format!(
            "expected a response, got {:?}",
            response.kind
        )));
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    fn fast_config(port: u16) -> ClientConfig {
        ClientConfig::new("127.0.0.1", port)
            .with_connect_timeout(Duration::from_millis(200))
            .with_reconnect(2, Duration::from_millis(10))
    }

    /// Answer one frame per accepted connection with `reply`.
    fn one_shot_server(reply: Message) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let _ = read_frame(&mut stream).unwrap();
            write_frame(&mut stream, &reply.to_bytes().unwrap()).unwrap();
        });
        port
    }

    #[test]
    fn config_addr() {
        let config = ClientConfig::new("localhost", 9000).with_reconnect(0, Duration::ZERO);
        assert_eq!(config.addr(), "localhost:9000");
        assert_eq!(config.reconnect_attempts, 1);
    }

    #[test]
    fn unreachable_server_is_connect_error() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let err = RpcClient::connect_with(fast_config(port)).unwrap_err();
        assert!(matches!(err, ClientError::Connect { attempts: 2, .. }));
        assert!(err.is_connectivity());
    }

    #[test]
    fn create_parses_id() {
        let port = one_shot_server(Message::response(true, 7i32.to_le_bytes().to_vec()));
        let client = RpcClient::connect_with(fast_config(port)).unwrap();

        assert_eq!(client.create_block(4, "i32").unwrap(), BlockId::new(7));
    }

    #[test]
    fn failed_create_is_rejected() {
        let port = one_shot_server(Message::response(false, (-1i32).to_le_bytes().to_vec()));
        let client = RpcClient::connect_with(fast_config(port)).unwrap();

        let err = client.create_block(4, "i32").unwrap_err();
        assert!(matches!(err, ClientError::Rejected { op: "create", .. }));
    }

    #[test]
    fn non_response_reply_is_invalid() {
        let port = one_shot_server(Message::increase_ref(BlockId::new(1)));
        let client = RpcClient::connect_with(fast_config(port)).unwrap();

        let err = client.get_block(BlockId::new(1), 0).unwrap_err();
        assert!(matches!(err, ClientError::InvalidResponse(_)));
    }

    /// Accept connections and hold them open without ever replying.
    fn silent_server() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        thread::spawn(move || {
            let mut held = Vec::new();
            for stream in listener.incoming() {
                match stream {
                    Ok(stream) => held.push(stream),
                    Err(_) => break,
                }
            }
        });
        port
    }

    #[test]
    fn stalled_server_fails_the_request() {
        let port = silent_server();
        let config = fast_config(port).with_io_timeout(Duration::from_millis(200));
        let client = RpcClient::connect_with(config).unwrap();

        let started = std::time::Instant::now();
        let err = client.get_block(BlockId::new(1), 0).unwrap_err();
        let elapsed = started.elapsed();

        assert!(err.is_connectivity(), "unexpected error: {err}");
        // One timed-out attempt, a reconnect and one timed-out retry.
        assert!(elapsed >= Duration::from_millis(350), "gave up after {elapsed:?}");
        assert!(elapsed < Duration::from_secs(2), "blocked for {elapsed:?}");
        assert!(!client.is_connected());
    }

    #[test]
    fn oversized_request_leaves_socket_alone() {
        let client = RpcClient::lazy(fast_config(1));
        let request = Message::set(BlockId::new(1), vec![0u8; MAX_FRAME_SIZE]);

        let err = client.send_request(&request).unwrap_err();

        assert!(matches!(
            err,
            ClientError::Protocol(MemError::FrameTooLarge { max: MAX_FRAME_SIZE, .. })
        ));
        assert!(!err.is_connectivity());
        assert!(!client.is_connected());
    }

    #[test]
    fn lazy_client_starts_disconnected() {
        let client = RpcClient::lazy(fast_config(1));
        assert!(!client.is_connected());
        client.disconnect();
    }
}
