//! # Client Errors
//!
//! Purpose: Define the error taxonomy surfaced by every public operation.

use thiserror::Error;

/// Result type for the client.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or IO failure while connecting, reading, or writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The reader task exited (peer closed the connection or the read
    /// failed); no further responses will arrive.
    #[error("connection closed")]
    ConnectionClosed,

    /// Server replied with unexpected text; carries the raw response.
    #[error("server error: {0}")]
    Server(String),

    /// PING did not come back as PONG.
    #[error("failed to ping service")]
    Ping,

    /// SMEMBERS payload did not parse as a JSON array of strings.
    #[error("invalid set members payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// The configured response deadline expired. The client is poisoned
    /// afterwards: a late reply could answer the wrong call, so every
    /// subsequent operation also fails with this error.
    #[error("timed out waiting for response")]
    Timeout,
}
