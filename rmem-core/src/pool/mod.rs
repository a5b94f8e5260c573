//! The byte pool and its block table.
//!
//! A [`MemoryPool`] owns one fixed-size buffer allocated at startup and a
//! table mapping block ids to byte ranges inside it. Every operation runs
//! under a single mutex for its whole duration, including the diagnostic
//! dump it triggers, so concurrent callers observe serialized updates.
//!
//! Compaction needs the same exclusive access as every other operation.
//! Allocation falls back to compaction while it already holds the lock,
//! so both go through [`PoolInner`] helpers that expect the lock to be
//! taken rather than re-entering the public API.

mod block;
mod compaction;
mod table;

pub use block::Block;
pub use compaction::CompactionResult;

use crate::dump::DumpWriter;
use crate::error::{MemError, Result};
use crate::types::{BlockId, PoolOffset};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Point-in-time usage figures for a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Size of the backing buffer.
    pub capacity: usize,
    /// Bytes held by in-use blocks.
    pub used_bytes: usize,
    /// Bytes held by released blocks awaiting compaction.
    pub reclaimable_bytes: usize,
    /// Table entries, released ones included.
    pub block_count: usize,
    /// Table entries still in use.
    pub live_blocks: usize,
}

impl PoolStats {
    /// Bytes not held by any in-use block.
    #[must_use]
    pub fn free_bytes(&self) -> usize {
        self.capacity - self.used_bytes
    }
}

struct PoolInner {
    data: Vec<u8>,
    blocks: HashMap<BlockId, Block>,
    /// `None` once `i32::MAX` has been handed out.
    next_id: Option<BlockId>,
}

impl PoolInner {
    fn live_block(&mut self, id: BlockId) -> Result<&mut Block> {
        match self.blocks.get_mut(&id) {
            None => Err(MemError::UnknownBlock { id }),
            Some(block) if !block.in_use => Err(MemError::BlockNotInUse { id }),
            Some(block) => Ok(block),
        }
    }

    fn compact_locked(&mut self) -> CompactionResult {
        compaction::compact(&mut self.data, &mut self.blocks)
    }

    fn snapshot(&self) -> Vec<&Block> {
        self.blocks.values().collect()
    }
}

/// Fixed-size byte pool with reference-counted blocks.
pub struct MemoryPool {
    inner: Mutex<PoolInner>,
    capacity: usize,
    dump: Option<DumpWriter>,
}

impl MemoryPool {
    /// Allocate a pool of `capacity` bytes.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(MemError::PoolAllocation {
                capacity,
                cause: "capacity must be positive".to_string(),
            });
        }

        let mut data = Vec::new();
        data.try_reserve_exact(capacity)
            .map_err(|e| MemError::PoolAllocation {
                capacity,
                cause: e.to_string(),
            })?;
        data.resize(capacity, 0);

        tracing::debug!(capacity, "Memory pool allocated");

        Ok(Self {
            inner: Mutex::new(PoolInner {
                data,
                blocks: HashMap::new(),
                next_id: Some(BlockId::FIRST),
            }),
            capacity,
            dump: None,
        })
    }

    /// Write a diagnostic snapshot after every mutating operation.
    #[must_use]
    pub fn with_dump_writer(mut self, writer: DumpWriter) -> Self {
        self.dump = Some(writer);
        self
    }

    /// Size of the backing buffer in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Allocate a zeroed block of `size` bytes.
    ///
    /// Placement is first-fit. When no free run is large enough the pool is
    /// compacted and the block goes directly after the highest live block.
    /// Ids are never reused, so creation fails once every positive id has
    /// been assigned.
    pub fn create(&self, size: u64, type_tag: &str) -> Result<BlockId> {
        if size == 0 {
            return Err(MemError::InvalidSize { size });
        }
        let requested = usize::try_from(size).unwrap_or(usize::MAX);

        let mut inner = self.inner.lock();

        let id = inner.next_id.ok_or(MemError::IdsExhausted {
            last: BlockId::new(i32::MAX),
        })?;

        let offset = match table::first_fit(&inner.blocks, self.capacity, requested) {
            Some(offset) => offset,
            None => {
                let result = inner.compact_locked();
                tracing::debug!(
                    requested,
                    removed = result.removed,
                    moved = result.moved,
                    "Compacted pool to satisfy allocation"
                );
                self.dump_locked(&inner);

                let end = table::high_water_mark(&inner.blocks);
                let available = self.capacity - end;
                if available < requested {
                    return Err(MemError::OutOfMemory {
                        requested,
                        available,
                    });
                }
                PoolOffset::new(end)
            }
        };

        inner.next_id = id.next();

        let block = Block::new(id, offset, requested, type_tag.to_string());
        inner.data[block.range()].fill(0);
        inner.blocks.insert(id, block);

        tracing::debug!(%id, %offset, size = requested, type_tag, "Block created");
        self.dump_locked(&inner);
        Ok(id)
    }

    /// Overwrite the start of a block. Bytes past `bytes.len()` are kept.
    pub fn set(&self, id: BlockId, bytes: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock();

        let block = inner.live_block(id)?;
        if bytes.len() > block.size {
            return Err(MemError::PayloadTooLarge {
                id,
                len: bytes.len(),
                size: block.size,
            });
        }
        let start = block.offset.as_usize();

        inner.data[start..start + bytes.len()].copy_from_slice(bytes);

        tracing::trace!(%id, len = bytes.len(), "Block written");
        self.dump_locked(&inner);
        Ok(())
    }

    /// Read a block.
    ///
    /// `max_len` is only checked against the block size; the full block is
    /// always returned.
    pub fn get(&self, id: BlockId, max_len: u64) -> Result<Vec<u8>> {
        let mut inner = self.inner.lock();

        let block = inner.live_block(id)?;
        if max_len > block.size as u64 {
            return Err(MemError::ReadTooLarge {
                id,
                requested: usize::try_from(max_len).unwrap_or(usize::MAX),
                size: block.size,
            });
        }
        let range = block.range();

        Ok(inner.data[range].to_vec())
    }

    /// Add a reference. Returns the new count.
    pub fn increase_ref(&self, id: BlockId) -> Result<i32> {
        let mut inner = self.inner.lock();

        let block = inner.live_block(id)?;
        block.ref_count += 1;
        let count = block.ref_count;

        tracing::trace!(%id, ref_count = count, "Reference added");
        self.dump_locked(&inner);
        Ok(count)
    }

    /// Drop a reference. Returns the new count.
    ///
    /// The block is released as soon as the count reaches zero; its bytes
    /// are reclaimed by the next compaction.
    pub fn decrease_ref(&self, id: BlockId) -> Result<i32> {
        let mut inner = self.inner.lock();

        let block = inner.live_block(id)?;
        block.ref_count -= 1;
        let count = block.ref_count;
        if block.is_unreferenced() {
            block.in_use = false;
            tracing::debug!(%id, "Block released");
        }

        self.dump_locked(&inner);
        Ok(count)
    }

    /// Drop released entries and pack live blocks from offset zero.
    ///
    /// A snapshot is written on every call, including passes that find
    /// nothing to move.
    pub fn compact(&self) -> CompactionResult {
        let mut inner = self.inner.lock();
        let result = inner.compact_locked();

        tracing::debug!(
            removed = result.removed,
            moved = result.moved,
            bytes_reclaimed = result.bytes_reclaimed,
            bytes_used = result.bytes_used,
            "Pool compacted"
        );
        self.dump_locked(&inner);
        result
    }

    /// Release every in-use block whose count is zero or below.
    ///
    /// Returns the number of blocks released. Entries stay in the table
    /// until the next compaction.
    pub fn mark_unreferenced(&self) -> usize {
        let mut inner = self.inner.lock();

        let mut released = 0;
        for block in inner.blocks.values_mut() {
            if block.in_use && block.is_unreferenced() {
                block.in_use = false;
                released += 1;
            }
        }
        released
    }

    /// Current usage figures.
    pub fn stats(&self) -> PoolStats {
        let inner = self.inner.lock();
        let used_bytes = table::used_bytes(&inner.blocks);
        let total: usize = inner.blocks.values().map(|b| b.size).sum();

        PoolStats {
            capacity: self.capacity,
            used_bytes,
            reclaimable_bytes: total - used_bytes,
            block_count: inner.blocks.len(),
            live_blocks: inner.blocks.values().filter(|b| b.in_use).count(),
        }
    }

    /// Copy of the table, sorted by id.
    pub fn blocks(&self) -> Vec<Block> {
        let inner = self.inner.lock();
        let mut blocks: Vec<Block> = inner.blocks.values().cloned().collect();
        blocks.sort_by_key(|b| b.id);
        blocks
    }

    /// Copy of one table entry, released or not.
    pub fn block(&self, id: BlockId) -> Option<Block> {
        self.inner.lock().blocks.get(&id).cloned()
    }

    fn dump_locked(&self, inner: &PoolInner) {
        if let Some(writer) = &self.dump {
            writer.write(self.capacity, &inner.snapshot());
        }
    }
}

impl std::fmt::Debug for MemoryPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryPool")
            .field("capacity", &self.capacity)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_returns_zeroed_block() {
        let pool = MemoryPool::new(64).unwrap();
        let id = pool.create(8, "u64").unwrap();

        assert_eq!(id, BlockId::FIRST);
        assert_eq!(pool.get(id, 8).unwrap(), vec![0u8; 8]);
    }

    #[test]
    fn ids_are_never_reused() {
        let pool = MemoryPool::new(16).unwrap();
        let a = pool.create(4, "i32").unwrap();
        pool.decrease_ref(a).unwrap();
        pool.compact();
        let b = pool.create(4, "i32").unwrap();

        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn zero_size_is_rejected() {
        let pool = MemoryPool::new(16).unwrap();
        assert!(matches!(pool.create(0, "unit"), Err(MemError::InvalidSize { size: 0 })));
    }

    #[test]
    fn partial_write_keeps_tail() {
        let pool = MemoryPool::new(32).unwrap();
        let id = pool.create(6, "bytes").unwrap();

        pool.set(id, &[1, 2, 3, 4, 5, 6]).unwrap();
        pool.set(id, &[9, 9]).unwrap();

        assert_eq!(pool.get(id, 6).unwrap(), vec![9, 9, 3, 4, 5, 6]);
    }

    #[test]
    fn oversized_write_and_read_fail() {
        let pool = MemoryPool::new(32).unwrap();
        let id = pool.create(4, "i32").unwrap();

        assert!(matches!(
            pool.set(id, &[0; 5]),
            Err(MemError::PayloadTooLarge { len: 5, size: 4, .. })
        ));
        assert!(matches!(
            pool.get(id, 5),
            Err(MemError::ReadTooLarge { requested: 5, size: 4, .. })
        ));
    }

    #[test]
    fn short_read_returns_whole_block() {
        let pool = MemoryPool::new(32).unwrap();
        let id = pool.create(4, "i32").unwrap();
        pool.set(id, &42i32.to_le_bytes()).unwrap();

        assert_eq!(pool.get(id, 1).unwrap(), 42i32.to_le_bytes().to_vec());
        assert_eq!(pool.get(id, 0).unwrap().len(), 4);
    }

    #[test]
    fn unknown_block_fails() {
        let pool = MemoryPool::new(32).unwrap();
        let ghost = BlockId::new(77);

        assert!(matches!(pool.get(ghost, 0), Err(MemError::UnknownBlock { .. })));
        assert!(matches!(pool.set(ghost, &[1]), Err(MemError::UnknownBlock { .. })));
        assert!(matches!(pool.increase_ref(ghost), Err(MemError::UnknownBlock { .. })));
        assert!(matches!(pool.decrease_ref(ghost), Err(MemError::UnknownBlock { .. })));
    }

    #[test]
    fn reference_counting() {
        let pool = MemoryPool::new(32).unwrap();
        let id = pool.create(4, "i32").unwrap();

        assert_eq!(pool.increase_ref(id).unwrap(), 2);
        assert_eq!(pool.decrease_ref(id).unwrap(), 1);
        assert!(pool.block(id).unwrap().in_use);

        assert_eq!(pool.decrease_ref(id).unwrap(), 0);
        let block = pool.block(id).unwrap();
        assert!(!block.in_use);

        assert!(matches!(pool.get(id, 4), Err(MemError::BlockNotInUse { .. })));
        assert!(matches!(pool.increase_ref(id), Err(MemError::BlockNotInUse { .. })));
    }

    #[test]
    fn released_space_is_reused_before_compaction() {
        let pool = MemoryPool::new(8).unwrap();
        let a = pool.create(4, "i32").unwrap();
        let _b = pool.create(4, "i32").unwrap();
        pool.decrease_ref(a).unwrap();

        let c = pool.create(4, "i32").unwrap();

        assert_eq!(pool.block(c).unwrap().offset, PoolOffset::ZERO);
        // The released entry is still in the table.
        assert_eq!(pool.stats().block_count, 3);
    }

    #[test]
    fn allocation_compacts_when_fragmented() {
        let pool = MemoryPool::new(12).unwrap();
        let a = pool.create(4, "i32").unwrap();
        let b = pool.create(4, "i32").unwrap();
        let c = pool.create(4, "i32").unwrap();
        pool.set(b, &[7, 7, 7, 7]).unwrap();
        pool.decrease_ref(a).unwrap();
        pool.decrease_ref(c).unwrap();

        // 8 bytes free but split into two runs of 4.
        let d = pool.create(8, "u64").unwrap();

        assert_eq!(pool.block(b).unwrap().offset, PoolOffset::ZERO);
        assert_eq!(pool.block(d).unwrap().offset, PoolOffset::new(4));
        assert_eq!(pool.get(b, 4).unwrap(), vec![7, 7, 7, 7]);
        assert!(pool.block(a).is_none());
    }

    #[test]
    fn out_of_memory_after_compaction() {
        let pool = MemoryPool::new(8).unwrap();
        pool.create(6, "bytes").unwrap();

        let err = pool.create(4, "i32").unwrap_err();
        assert!(matches!(
            err,
            MemError::OutOfMemory {
                requested: 4,
                available: 2
            }
        ));
    }

    #[test]
    fn mark_unreferenced_releases_only_live_zero_counts() {
        let pool = MemoryPool::new(16).unwrap();
        let id = pool.create(4, "i32").unwrap();
        {
            let mut inner = pool.inner.lock();
            inner.blocks.get_mut(&id).unwrap().ref_count = 0;
        }

        assert_eq!(pool.mark_unreferenced(), 1);
        assert_eq!(pool.mark_unreferenced(), 0);
        assert!(!pool.block(id).unwrap().in_use);
    }

    #[test]
    fn stats_track_reclaimable_bytes() {
        let pool = MemoryPool::new(32).unwrap();
        let a = pool.create(8, "u64").unwrap();
        pool.create(4, "i32").unwrap();
        pool.decrease_ref(a).unwrap();

        let stats = pool.stats();
        assert_eq!(stats.used_bytes, 4);
        assert_eq!(stats.reclaimable_bytes, 8);
        assert_eq!(stats.live_blocks, 1);
        assert_eq!(stats.free_bytes(), 28);

        pool.compact();
        assert_eq!(pool.stats().reclaimable_bytes, 0);
        assert_eq!(pool.stats().block_count, 1);
    }

    #[test]
    fn mutations_write_dumps() {
        let dir = tempfile::tempdir().unwrap();
        let pool = MemoryPool::new(32)
            .unwrap()
            .with_dump_writer(DumpWriter::new(dir.path()));

        let id = pool.create(4, "i32").unwrap();
        pool.set(id, &[1]).unwrap();
        pool.get(id, 4).unwrap();
        pool.increase_ref(id).unwrap();

        let count = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(count, 3);
    }

    #[test]
    fn compaction_always_writes_a_dump() {
        let dir = tempfile::tempdir().unwrap();
        let pool = MemoryPool::new(32)
            .unwrap()
            .with_dump_writer(DumpWriter::new(dir.path()));

        let result = pool.compact();
        assert!(!result.performed);
        assert_eq!(result.removed, 0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);

        pool.compact();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn create_fails_once_ids_run_out() {
        let pool = MemoryPool::new(32).unwrap();
        pool.inner.lock().next_id = Some(BlockId::new(i32::MAX));

        let last = pool.create(4, "i32").unwrap();
        assert_eq!(last, BlockId::new(i32::MAX));

        let err = pool.create(4, "i32").unwrap_err();
        assert!(matches!(err, MemError::IdsExhausted { .. }));
        assert_eq!(err.code(), "E108");

        // Nothing was inserted for the failed call.
        assert_eq!(pool.stats().block_count, 1);
        assert_eq!(pool.stats().used_bytes, 4);
        assert!(pool.get(last, 4).is_ok());
    }
}
