//! First-fit placement over the block table.
//!
//! Only in-use blocks occupy pool bytes. Released blocks keep their table
//! entry until compaction, but their range counts as free for placement.

use super::block::Block;
use crate::types::{BlockId, PoolOffset};
use std::collections::HashMap;
use std::ops::Range;

/// Byte ranges of every in-use block, sorted by offset.
pub(crate) fn occupied_ranges(blocks: &HashMap<BlockId, Block>) -> Vec<Range<usize>> {
    let mut ranges: Vec<_> = blocks
        .values()
        .filter(|b| b.in_use)
        .map(Block::range)
        .collect();
    ranges.sort_by_key(|r| r.start);
    ranges
}

/// Find the lowest offset with at least `size` contiguous free bytes.
///
/// Walks the pool left to right, jumping over each occupied range and
/// measuring the free run in front of it.
pub(crate) fn first_fit(
    blocks: &HashMap<BlockId, Block>,
    capacity: usize,
    size: usize,
) -> Option<PoolOffset> {
    let mut pos = 0;

    for range in occupied_ranges(blocks) {
        if range.start > pos && range.start - pos >= size {
            return Some(PoolOffset::new(pos));
        }
        pos = pos.max(range.end);
    }

    (capacity.saturating_sub(pos) >= size).then_some(PoolOffset::new(pos))
}

/// End of the highest in-use block, or zero for an empty pool.
pub(crate) fn high_water_mark(blocks: &HashMap<BlockId, Block>) -> usize {
    blocks
        .values()
        .filter(|b| b.in_use)
        .map(Block::end)
        .max()
        .unwrap_or(0)
}

/// Bytes occupied by in-use blocks.
pub(crate) fn used_bytes(blocks: &HashMap<BlockId, Block>) -> usize {
    blocks.values().filter(|b| b.in_use).map(|b| b.size).sum()
}
