//! Strongly-typed block identifiers.

use std::fmt;

/// Opaque handle identifying a block in the server's pool.
///
/// Ids are assigned monotonically starting at 1 and are never recycled for
/// the lifetime of the server process, even after the block is reclaimed.
/// A `BlockId` is not an address: it carries no offset information and no
/// arithmetic is defined on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct BlockId(i32);

impl BlockId {
    /// The wire value used when a message carries no block id.
    pub const NONE: Self = Self(-1);

    /// The first id handed out by a fresh pool.
    pub const FIRST: Self = Self(1);

    /// Create a block id from its raw wire value.
    #[must_use]
    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    /// Get the raw wire value.
    #[must_use]
    pub const fn as_i32(&self) -> i32 {
        self.0
    }

    /// Check whether this id could name a block (ids are strictly positive).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.0 > 0
    }

    /// The id that follows this one in allocation order, or `None` once
    /// the positive range is used up.
    #[must_use]
    pub(crate) const fn next(&self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(next) => Some(Self(next)),
            None => None,
        }
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block_{}", self.0)
    }
}
