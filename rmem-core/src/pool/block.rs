//! Block table entries.

use crate::types::{BlockId, PoolOffset};

/// A sized range of the pool owned by one block id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Handle returned to clients.
    pub id: BlockId,
    /// Start of the block's byte range. Changes only during compaction.
    pub offset: PoolOffset,
    /// Length of the byte range.
    pub size: usize,
    /// Type name recorded at creation. Diagnostic only.
    pub type_tag: String,
    /// Outstanding references. Starts at 1.
    pub ref_count: i32,
    /// False once the reference count has dropped to zero or below.
    pub in_use: bool,
}

impl Block {
    pub(crate) fn new(id: BlockId, offset: PoolOffset, size: usize, type_tag: String) -> Self {
        Self {
            id,
            offset,
            size,
            type_tag,
            ref_count: 1,
            in_use: true,
        }
    }

    /// One past the last byte of this block.
    #[must_use]
    pub fn end(&self) -> usize {
        self.offset.as_usize() + self.size
    }

    /// Byte range of this block within the pool.
    #[must_use]
    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset.as_usize()..self.end()
    }

    /// Whether the reference count says this block should be released.
    #[must_use]
    pub fn is_unreferenced(&self) -> bool {
        self.ref_count <= 0
    }

    /// Whether `pos` falls inside this block's byte range.
    #[must_use]
    pub fn contains(&self, pos: usize) -> bool {
        self.range().contains(&pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_block_is_live() {
        let block = Block::new(BlockId::FIRST, PoolOffset::new(8), 4, "i32".to_string());

        assert_eq!(block.ref_count, 1);
        assert!(block.in_use);
        assert_eq!(block.range(), 8..12);
        assert!(block.contains(11));
        assert!(!block.contains(12));
    }
}
