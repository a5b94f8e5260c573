//! Offsets into the byte pool.

use std::fmt;

/// Byte offset from the start of the pool.
///
/// Offsets are private to the server: they change when compaction slides a
/// block down and are never sent over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct PoolOffset(usize);

impl PoolOffset {
    /// Offset zero, the start of the pool.
    pub const ZERO: Self = Self(0);

    /// Create a new pool offset.
    #[must_use]
    pub const fn new(offset: usize) -> Self {
        Self(offset)
    }

    /// Get the raw offset value.
    #[must_use]
    pub const fn as_usize(&self) -> usize {
        self.0
    }
}

impl fmt::Display for PoolOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}
