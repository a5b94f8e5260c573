//! Allocator scenarios exercised through the public pool API.

use rmem_core::{BlockId, MemError, MemoryPool};
use std::sync::Arc;
use std::thread;

#[test]
fn value_round_trip() {
    let pool = MemoryPool::new(1024).unwrap();
    let id = pool.create(4, "i32").unwrap();

    pool.set(id, &42i32.to_le_bytes()).unwrap();
    let bytes = pool.get(id, 4).unwrap();

    assert_eq!(bytes, 42i32.to_le_bytes().to_vec());
}

#[test]
fn freed_space_coalesces_for_larger_allocation() {
    let pool = MemoryPool::new(40).unwrap();

    // Exhaust the pool with interleaved short- and long-lived blocks.
    let mut ids = Vec::new();
    for i in 0..5u8 {
        let id = pool.create(8, "u64").unwrap();
        pool.set(id, &[i; 8]).unwrap();
        ids.push(id);
    }
    assert!(matches!(pool.create(1, "u8"), Err(MemError::OutOfMemory { .. })));

    // Free every other block: 24 bytes free in three 8-byte runs.
    for id in [ids[0], ids[2], ids[4]] {
        pool.decrease_ref(id).unwrap();
    }

    let big = pool.create(20, "buffer").unwrap();

    let layout = pool.blocks();
    assert_eq!(layout.len(), 3);
    assert_eq!(pool.get(ids[1], 8).unwrap(), vec![1; 8]);
    assert_eq!(pool.get(ids[3], 8).unwrap(), vec![3; 8]);
    assert_eq!(pool.get(big, 20).unwrap(), vec![0; 20]);
    assert_eq!(pool.block(big).unwrap().offset.as_usize(), 16);
}

#[test]
fn compaction_packs_from_zero_and_keeps_contents() {
    let pool = MemoryPool::new(64).unwrap();
    let ids: Vec<BlockId> = (0..6u8)
        .map(|i| {
            let id = pool.create(u64::from(i) + 1, "bytes").unwrap();
            pool.set(id, &vec![i + 10; usize::from(i) + 1]).unwrap();
            id
        })
        .collect();

    for id in [ids[0], ids[3]] {
        pool.decrease_ref(id).unwrap();
    }
    let result = pool.compact();
    assert!(result.performed);
    assert_eq!(result.removed, 2);

    let mut live = pool.blocks();
    live.sort_by_key(|b| b.offset);
    let mut expected_offset = 0;
    for block in &live {
        assert!(block.in_use);
        assert_eq!(block.offset.as_usize(), expected_offset);
        expected_offset += block.size;
    }

    for (i, id) in ids.iter().enumerate() {
        if i == 0 || i == 3 {
            assert!(pool.block(*id).is_none());
            continue;
        }
        assert_eq!(pool.get(*id, 0).unwrap(), vec![i as u8 + 10; i + 1]);
    }
}

#[test]
fn concurrent_reference_updates_are_serialized() {
    let pool = Arc::new(MemoryPool::new(1024).unwrap());
    let id = pool.create(4, "i32").unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                for _ in 0..100 {
                    pool.increase_ref(id).unwrap();
                }
                for _ in 0..100 {
                    pool.decrease_ref(id).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let block = pool.block(id).unwrap();
    assert_eq!(block.ref_count, 1);
    assert!(block.in_use);
}

#[test]
fn concurrent_allocations_never_overlap() {
    let pool = Arc::new(MemoryPool::new(4096).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                (0..20)
                    .map(|_| {
                        let id = pool.create(16, "chunk").unwrap();
                        pool.set(id, &[t; 16]).unwrap();
                        (id, t)
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let owned: Vec<(BlockId, u8)> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
    assert_eq!(owned.len(), 80);

    let mut ranges: Vec<_> = pool.blocks().iter().map(|b| b.range()).collect();
    ranges.sort_by_key(|r| r.start);
    for pair in ranges.windows(2) {
        assert!(pair[0].end <= pair[1].start);
    }

    for (id, t) in owned {
        assert_eq!(pool.get(id, 16).unwrap(), vec![t; 16]);
    }
}
