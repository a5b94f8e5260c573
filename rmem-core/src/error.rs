//! Error types for rmem.
//!
//! Every error carries the identifiers needed to act on it (block id,
//! requested size, frame length). Allocator errors never cross the
//! connection boundary as failures of the handler: the server turns them
//! into `success = false` responses.

use crate::types::BlockId;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for rmem operations.
#[derive(Error, Debug)]
pub enum MemError {
    // =========================================================================
    // Allocator Errors (E101-E199)
    // =========================================================================
    /// No block with this id exists in the table.
    #[error("E101: Unknown block {id}")]
    UnknownBlock {
        /// The id that was looked up.
        id: BlockId,
    },

    /// The block exists but its reference count already dropped to zero.
    #[error("E102: Block {id} is not in use")]
    BlockNotInUse {
        /// The released block.
        id: BlockId,
    },

    /// A write carried more bytes than the block holds.
    #[error("E103: Payload of {len} bytes does not fit block {id} of {size} bytes")]
    PayloadTooLarge {
        /// The target block.
        id: BlockId,
        /// Length of the rejected payload.
        len: usize,
        /// Size of the block.
        size: usize,
    },

    /// A read asked for more bytes than the block holds.
    #[error("E104: Read of {requested} bytes exceeds block {id} of {size} bytes")]
    ReadTooLarge {
        /// The target block.
        id: BlockId,
        /// Number of bytes requested.
        requested: usize,
        /// Size of the block.
        size: usize,
    },

    /// No free run large enough exists, even after compaction.
    #[error("E105: Out of memory: requested {requested} bytes, {available} bytes free after compaction")]
    OutOfMemory {
        /// Number of bytes requested.
        requested: usize,
        /// Free bytes at the end of the pool after compaction.
        available: usize,
    },

    /// Zero-sized allocations are rejected.
    #[error("E106: Invalid allocation size {size}")]
    InvalidSize {
        /// The rejected size.
        size: u64,
    },

    /// The backing pool could not be reserved at startup.
    #[error("E107: Failed to allocate a pool of {capacity} bytes: {cause}")]
    PoolAllocation {
        /// Requested pool capacity.
        capacity: usize,
        /// Reason for the failure.
        cause: String,
    },

    /// Every positive block id has been handed out.
    #[error("E108: Block ids exhausted, last id was {last}")]
    IdsExhausted {
        /// The final id assigned.
        last: BlockId,
    },

    // =========================================================================
    // Protocol Errors (E201-E299)
    // =========================================================================
    /// The frame is shorter than the fixed message header.
    #[error("E201: Frame too short: {len} bytes, header needs {min}")]
    FrameTooShort {
        /// Length of the received frame.
        len: usize,
        /// Minimum header length.
        min: usize,
    },

    /// The message kind tag is not one of the known kinds.
    #[error("E202: Unknown message kind {kind}")]
    UnknownMessageKind {
        /// The raw kind tag.
        kind: u32,
    },

    /// A length field points past the end of the frame.
    #[error("E203: Truncated {field}: needs {needed} bytes, {remaining} remaining")]
    TruncatedField {
        /// Name of the field being read.
        field: &'static str,
        /// Bytes the field claims.
        needed: usize,
        /// Bytes left in the frame.
        remaining: usize,
    },

    /// The length prefix announces a frame larger than the allowed maximum.
    #[error("E204: Frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge {
        /// Announced frame length.
        len: usize,
        /// Maximum accepted frame length.
        max: usize,
    },

    // =========================================================================
    // Configuration Errors (E801-E899)
    // =========================================================================
    /// Invalid configuration value.
    #[error("E802: Invalid configuration '{field}': {cause}")]
    ConfigValue {
        /// The configuration field name.
        field: String,
        /// Reason the value is invalid.
        cause: String,
    },

    // =========================================================================
    // I/O Errors (E901-E999)
    // =========================================================================
    /// Filesystem I/O error.
    #[error("E901: I/O error at {path}: {cause}")]
    Io {
        /// The path where the error occurred.
        path: PathBuf,
        /// Reason for the I/O error.
        cause: String,
    },

    /// Network error.
    #[error("E902: Network error: {cause}")]
    Network {
        /// Reason for the network error.
        cause: String,
    },
}

impl MemError {
    /// Get the error code (e.g., "E101").
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownBlock { .. } => "E101",
            Self::BlockNotInUse { .. } => "E102",
            Self::PayloadTooLarge { .. } => "E103",
            Self::ReadTooLarge { .. } => "E104",
            Self::OutOfMemory { .. } => "E105",
            Self::InvalidSize { .. } => "E106",
            Self::PoolAllocation { .. } => "E107",
            Self::IdsExhausted { .. } => "E108",
            Self::FrameTooShort { .. } => "E201",
            Self::UnknownMessageKind { .. } => "E202",
            Self::TruncatedField { .. } => "E203",
            Self::FrameTooLarge { .. } => "E204",
            Self::ConfigValue { .. } => "E802",
            Self::Io { .. } => "E901",
            Self::Network { .. } => "E902",
        }
    }

    /// Check if this error was raised by the allocator.
    #[must_use]
    pub fn is_allocator_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownBlock { .. }
                | Self::BlockNotInUse { .. }
                | Self::PayloadTooLarge { .. }
                | Self::ReadTooLarge { .. }
                | Self::OutOfMemory { .. }
                | Self::InvalidSize { .. }
                | Self::IdsExhausted { .. }
        )
    }
}

/// Result type alias using `MemError`.
pub type Result<T> = std::result::Result<T, MemError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_correct() {
        let err = MemError::UnknownBlock {
            id: BlockId::new(3),
        };
        assert_eq!(err.code(), "E101");

        let err = MemError::FrameTooShort { len: 3, min: 25 };
        assert_eq!(err.code(), "E201");
    }

    #[test]
    fn error_display() {
        let err = MemError::PayloadTooLarge {
            id: BlockId::new(5),
            len: 8,
            size: 4,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("E103"));
        assert!(msg.contains("block_5"));
        assert!(msg.contains("8 bytes"));
    }

    #[test]
    fn classification() {
        assert!(
            MemError::OutOfMemory {
                requested: 10,
                available: 2
            }
            .is_allocator_error()
        );
        assert!(
            MemError::IdsExhausted {
                last: BlockId::new(i32::MAX)
            }
            .is_allocator_error()
        );
        assert!(!MemError::UnknownMessageKind { kind: 9 }.is_allocator_error());
        assert!(
            !MemError::Network {
                cause: "reset".to_string()
            }
            .is_allocator_error()
        );
    }
}
