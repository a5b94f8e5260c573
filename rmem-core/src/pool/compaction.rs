//! Pool compaction for reclaiming released blocks.
//!
//! Compaction drops every released table entry and slides the surviving
//! blocks down so that they sit back to back from offset zero. Block ids
//! never change; only offsets do.

use super::block::Block;
use crate::types::{BlockId, PoolOffset};
use std::collections::HashMap;

/// Result of a compaction pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompactionResult {
    /// Released entries removed from the table.
    pub removed: usize,
    /// Bytes that belonged to the removed entries.
    pub bytes_reclaimed: usize,
    /// Bytes held by surviving blocks, which now end at this offset.
    pub bytes_used: usize,
    /// Number of blocks whose payload was moved.
    pub moved: usize,
    /// Whether any payload bytes were moved.
    pub performed: bool,
}

/// A planned relocation of one block.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BlockMove {
    pub id: BlockId,
    pub from: PoolOffset,
    pub to: PoolOffset,
    pub size: usize,
}

/// Plan for packing the live blocks from offset zero.
#[derive(Debug, Default)]
pub(crate) struct CompactionPlan {
    /// Moves in ascending offset order.
    moves: Vec<BlockMove>,
    /// End of the packed region.
    packed_end: usize,
}

impl CompactionPlan {
    /// Compute where each in-use block should live once packed.
    pub(crate) fn new(blocks: &HashMap<BlockId, Block>) -> Self {
        let mut live: Vec<&Block> = blocks.values().filter(|b| b.in_use).collect();
        live.sort_by_key(|b| b.offset);

        let mut plan = Self::default();
        for block in live {
            let target = PoolOffset::new(plan.packed_end);
            if block.offset != target {
                plan.moves.push(BlockMove {
                    id: block.id,
                    from: block.offset,
                    to: target,
                    size: block.size,
                });
            }
            plan.packed_end += block.size;
        }
        plan
    }

    /// True if the live blocks already sit back to back from zero.
    pub(crate) fn is_packed(&self) -> bool {
        self.moves.is_empty()
    }

    pub(crate) fn moves(&self) -> &[BlockMove] {
        &self.moves
    }
}

/// Compact the table and the pool bytes in place.
///
/// Every block moves towards lower offsets, so executing the moves in
/// ascending order never overwrites bytes that are still to be copied.
pub(crate) fn compact(data: &mut [u8], blocks: &mut HashMap<BlockId, Block>) -> CompactionResult {
    let before = blocks.len();
    let mut bytes_reclaimed = 0;
    blocks.retain(|_, block| {
        if !block.in_use {
            bytes_reclaimed += block.size;
        }
        block.in_use
    });

    let plan = CompactionPlan::new(blocks);
    let mut result = CompactionResult {
        removed: before - blocks.len(),
        bytes_reclaimed,
        bytes_used: plan.packed_end,
        moved: 0,
        performed: false,
    };

    if plan.is_packed() {
        return result;
    }

    for mv in plan.moves() {
        let from = mv.from.as_usize();
        data.copy_within(from..from + mv.size, mv.to.as_usize());
        if let Some(block) = blocks.get_mut(&mv.id) {
            block.offset = mv.to;
        }
        result.moved += 1;
    }

    result.performed = true;
    result
}
