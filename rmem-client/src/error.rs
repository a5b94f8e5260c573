//! Error types for the rmem client.

use rmem_core::{BlockId, MemError};
use std::io;
use thiserror::Error;

/// Errors that can occur when talking to an rmem server.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server could not be reached within the reconnect budget.
    #[error("Failed to connect to {addr} after {attempts} attempts: {source}")]
    Connect {
        /// The `host:port` that was dialled.
        addr: String,
        /// Connection attempts made.
        attempts: u32,
        /// Error from the last attempt.
        #[source]
        source: io::Error,
    },

    /// Sending or receiving a frame failed after the retry.
    #[error("Transport failure: {0}")]
    Transport(#[from] io::Error),

    /// The server's reply could not be decoded.
    #[error("Malformed response: {0}")]
    Protocol(#[from] MemError),

    /// The server answered with `success = false`.
    #[error("Server rejected {op} on {id}")]
    Rejected {
        /// The request kind.
        op: &'static str,
        /// The target block, `BlockId::NONE` for allocations.
        id: BlockId,
    },

    /// The reply decoded but does not have the expected shape.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// A null remote pointer was dereferenced.
    #[error("Null remote pointer dereferenced")]
    NullPointer,

    /// A block's bytes do not match the size of the value type.
    #[error("Block holds {actual} bytes, {type_name} needs {expected}")]
    ValueSize {
        /// Name of the value type.
        type_name: &'static str,
        /// Bytes the type encodes to.
        expected: usize,
        /// Bytes the block returned.
        actual: usize,
    },
}

impl ClientError {
    /// Check whether the error means the server could not be reached.
    #[must_use]
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connect { .. } | Self::Transport(_))
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
