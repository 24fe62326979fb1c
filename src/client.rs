//! # Command Dispatcher
//!
//! Purpose: Expose the typed command API and correlate each request with
//! the next response published by the reader loop.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `Client` hides the reader task, queue, and
//!    transport behind per-command methods.
//! 2. **Structural Serialization**: The write half and the response
//!    receiver share one mutex, so a request cannot be written without
//!    exclusive access to the response stream. At most one request is
//!    ever outstanding, by construction.
//! 3. **Fail Fast**: Broken connections and expired deadlines surface as
//!    errors on every affected call; nothing waits forever on a dead peer.

use std::time::Duration;

use tokio::io::{self, AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::debug;

use crate::conn::spawn_reader;
use crate::error::{ClientError, ClientResult};

/// Configuration for the client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server address, e.g. "127.0.0.1:6379".
    pub addr: String,
    /// Optional TCP connect timeout.
    pub connect_timeout: Option<Duration>,
    /// Optional deadline for each response wait. `None` preserves the
    /// store protocol's original semantics: a silent peer blocks the
    /// caller indefinitely.
    pub response_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            addr: "127.0.0.1:6379".to_string(),
            connect_timeout: None,
            response_timeout: None,
        }
    }
}

/// Everything a call needs, behind one lock.
///
/// Keeping the receiver next to the writer is what enforces the
/// single-outstanding-request invariant: holding the lock is the only way
/// to reach the socket, and it is not released until the matching
/// response has been consumed.
struct Transport {
    writer: Box<dyn AsyncWrite + Send + Unpin>,
    responses: mpsc::Receiver<String>,
    /// Set after a response deadline expires. Once the pairing between
    /// requests and queued responses is unknown, no further traffic is
    /// allowed on this connection.
    poisoned: bool,
}

/// Asynchronous client for the key-value/set store.
///
/// One client owns one connection for its whole lifetime; it is neither
/// pooled nor cloned. Concurrent callers on the same client are fully
/// serialized: call N's response is consumed before call N+1's request is
/// written.
pub struct Client {
    transport: Mutex<Transport>,
    reader: JoinHandle<()>,
    response_timeout: Option<Duration>,
}

impl Client {
    /// Connects to the store at `host:port` and starts the reader task.
    pub async fn connect(host: &str, port: u16) -> ClientResult<Self> {
        let config = ClientConfig {
            addr: format!("{host}:{port}"),
            ..ClientConfig::default()
        };
        Self::with_config(config).await
    }

    /// Connects with a custom configuration.
    pub async fn with_config(config: ClientConfig) -> ClientResult<Self> {
        let stream = match config.connect_timeout {
            Some(limit) => time::timeout(limit, TcpStream::connect(&config.addr))
                .await
                .map_err(|_| ClientError::Timeout)??,
            None => TcpStream::connect(&config.addr).await?,
        };
        // Disable Nagle to keep request latency low for small payloads.
        stream.set_nodelay(true)?;
        Ok(Self::from_parts(stream, config.response_timeout))
    }

    /// Builds a client on top of an already-open duplex stream.
    ///
    /// Anything implementing read/write is acceptable; tests substitute
    /// `tokio::io::duplex` ends for the TCP socket.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        Self::from_parts(stream, None)
    }

    /// Sets the deadline applied to every response wait.
    pub fn with_response_timeout(mut self, limit: Duration) -> Self {
        self.response_timeout = Some(limit);
        self
    }

    fn from_parts<S>(stream: S, response_timeout: Option<Duration>) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (read_half, write_half) = io::split(stream);
        let (responses, reader) = spawn_reader(read_half);
        Client {
            transport: Mutex::new(Transport {
                writer: Box::new(write_half),
                responses,
                poisoned: false,
            }),
            reader,
            response_timeout,
        }
    }

    /// Stores `value` under `key`.
    pub async fn set(&self, key: &str, value: &str) -> ClientResult<()> {
        let response = self.call(&format!("SET {key} {value}")).await?;
        expect_ok(response)
    }

    /// Fetches the value stored under `key`.
    ///
    /// The store replies with bare text; the response is returned verbatim.
    pub async fn get(&self, key: &str) -> ClientResult<String> {
        self.call(&format!("GET {key}")).await
    }

    /// Deletes `key`.
    pub async fn del(&self, key: &str) -> ClientResult<()> {
        let response = self.call(&format!("DEL {key}")).await?;
        expect_ok(response)
    }

    /// Adds `value` to the set stored under `set`.
    pub async fn add_to_set(&self, set: &str, value: &str) -> ClientResult<()> {
        let response = self.call(&format!("SADD {set} {value}")).await?;
        expect_ok(response)
    }

    /// Removes `value` from the set stored under `set`.
    pub async fn remove_from_set(&self, set: &str, value: &str) -> ClientResult<()> {
        let response = self.call(&format!("SREM {set} {value}")).await?;
        expect_ok(response)
    }

    /// Fetches all members of the set stored under `key`, in store order.
    ///
    /// The store encodes members as a JSON array of strings.
    pub async fn set_members(&self, key: &str) -> ClientResult<Vec<String>> {
        let response = self.call(&format!("SMEMBERS {key}")).await?;
        let members = serde_json::from_str(&response).map_err(|err| {
            debug!(payload = %response, "malformed SMEMBERS payload");
            err
        })?;
        Ok(members)
    }

    /// Returns whether `member` is in the set stored under `set`.
    ///
    /// The store's encoding for true is exactly the lowercase literal
    /// `"true"`; any other reply means false.
    pub async fn is_set_member(&self, set: &str, member: &str) -> ClientResult<bool> {
        let response = self.call(&format!("SISMEMBER {set} {member}")).await?;
        Ok(response == "true")
    }

    /// Checks liveness of the store. The reply is matched case-insensitively.
    pub async fn ping(&self) -> ClientResult<()> {
        let response = self.call("PING").await?;
        if response.eq_ignore_ascii_case("PONG") {
            Ok(())
        } else {
            Err(ClientError::Ping)
        }
    }

    /// One full request/response cycle.
    ///
    /// The lock is held from before the write until the matching response
    /// has been popped from the queue, so responses can never cross
    /// between racing callers.
    async fn call(&self, request: &str) -> ClientResult<String> {
        let mut transport = self.transport.lock().await;
        if transport.poisoned {
            return Err(ClientError::Timeout);
        }

        transport.writer.write_all(request.as_bytes()).await?;
        transport.writer.flush().await?;

        let response = match self.response_timeout {
            Some(limit) => match time::timeout(limit, transport.responses.recv()).await {
                Ok(response) => response,
                Err(_) => {
                    transport.poisoned = true;
                    return Err(ClientError::Timeout);
                }
            },
            None => transport.responses.recv().await,
        };

        response.ok_or(ClientError::ConnectionClosed)
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        // The task also exits on EOF/read error; abort covers the case
        // where the peer is still open when the client goes away.
        self.reader.abort();
    }
}

fn expect_ok(response: String) -> ClientResult<()> {
    if response == "OK" {
        Ok(())
    } else {
        Err(ClientError::Server(response))
    }
}
