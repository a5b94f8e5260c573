//! End-to-end pointer behavior against a live server.

mod common;

use common::{TestServer, connect};
use rmem_client::{BlockId, ClientError, RemotePtr};
use std::sync::Arc;
use std::thread;

fn ref_count(server: &TestServer, id: BlockId) -> i32 {
    server.pool().block(id).unwrap().ref_count
}

#[test]
fn store_and_read_back() {
    let server = TestServer::start();
    let client = connect(&server);

    let ptr = RemotePtr::<i32>::allocate(Arc::clone(&client)).unwrap();
    assert_eq!(ptr.read_value().unwrap(), 0);

    ptr.write_value(&42).unwrap();
    assert_eq!(ptr.read_value().unwrap(), 42);

    let block = server.pool().block(ptr.id().unwrap()).unwrap();
    assert_eq!(block.size, 4);
    assert_eq!(block.type_tag, "i32");
}

#[test]
fn copies_share_the_block_and_its_count() {
    let server = TestServer::start();
    let client = connect(&server);

    let first = RemotePtr::<i32>::new(Arc::clone(&client), &42).unwrap();
    let _second = RemotePtr::<i32>::allocate(Arc::clone(&client)).unwrap();
    let id = first.id().unwrap();

    let copy = first.try_clone().unwrap();
    assert_eq!(copy.id(), Some(id));
    assert_eq!(ref_count(&server, id), 2);

    drop(copy);
    assert_eq!(ref_count(&server, id), 1);
    assert_eq!(first.read_value().unwrap(), 42);
}

#[test]
fn writes_through_one_pointer_are_seen_by_another() {
    let server = TestServer::start();
    let client = connect(&server);

    let a = RemotePtr::<f64>::new(Arc::clone(&client), &1.25).unwrap();
    let b = a.try_clone().unwrap();

    b.proxy().unwrap().write(&9.5).unwrap();
    assert_eq!(a.proxy().unwrap().read().unwrap(), 9.5);
}

#[test]
fn assignment_moves_the_reference() {
    let server = TestServer::start();
    let client = connect(&server);

    let mut a = RemotePtr::<u32>::new(Arc::clone(&client), &1).unwrap();
    let b = RemotePtr::<u32>::new(Arc::clone(&client), &2).unwrap();
    let old = a.id().unwrap();
    let target = b.id().unwrap();

    a.assign(&b).unwrap();

    assert_eq!(a.id(), Some(target));
    assert_eq!(a.read_value().unwrap(), 2);
    assert_eq!(ref_count(&server, target), 2);
    // The old block lost its only reference.
    assert!(server.pool().block(old).is_none_or(|block| !block.in_use));
}

#[test]
fn self_assignment_keeps_the_count() {
    let server = TestServer::start();
    let client = connect(&server);

    let mut a = RemotePtr::<u32>::new(Arc::clone(&client), &5).unwrap();
    let b = a.try_clone().unwrap();
    let id = a.id().unwrap();

    a.assign(&b).unwrap();
    assert_eq!(ref_count(&server, id), 2);
    assert_eq!(a.read_value().unwrap(), 5);
}

#[test]
fn from_id_claims_and_from_raw_adopts() {
    let server = TestServer::start();
    let client = connect(&server);

    let id = client.create_block(4, "i32").unwrap();
    assert_eq!(ref_count(&server, id), 1);

    let claimed = RemotePtr::<i32>::from_id(Arc::clone(&client), id).unwrap();
    assert_eq!(ref_count(&server, id), 2);

    // Adopt the reference returned by create_block.
    let adopted = RemotePtr::<i32>::from_raw(Arc::clone(&client), id);
    assert_eq!(ref_count(&server, id), 2);

    drop(adopted);
    assert_eq!(ref_count(&server, id), 1);
    drop(claimed);
    assert!(server.pool().block(id).is_none_or(|block| !block.in_use));
}

#[test]
fn released_pointer_leaves_the_count_alone() {
    let server = TestServer::start();
    let client = connect(&server);

    let ptr = RemotePtr::<i64>::new(Arc::clone(&client), &-7).unwrap();
    let id = ptr.release().unwrap();
    assert_eq!(ref_count(&server, id), 1);

    let back = RemotePtr::<i64>::from_raw(client, id);
    assert_eq!(back.read_value().unwrap(), -7);
}

#[test]
fn dropped_block_becomes_unreadable() {
    let server = TestServer::start();
    let client = connect(&server);

    let ptr = RemotePtr::<i32>::new(Arc::clone(&client), &3).unwrap();
    let id = ptr.id().unwrap();
    drop(ptr);

    let err = client.get_block(id, 4).unwrap_err();
    assert!(matches!(err, ClientError::Rejected { op: "get", .. }));
}

#[test]
fn pointers_can_link_blocks() {
    let server = TestServer::start();
    let client = connect(&server);

    let tail = RemotePtr::<i32>::new(Arc::clone(&client), &20).unwrap();
    let link = RemotePtr::<BlockId>::new(Arc::clone(&client), &tail.id().unwrap()).unwrap();
    let tail_id = tail.release().unwrap();

    let next = link.read_value().unwrap();
    assert_eq!(next, tail_id);
    let tail = RemotePtr::<i32>::from_raw(Arc::clone(&client), next);
    assert_eq!(tail.read_value().unwrap(), 20);
}

#[test]
fn exhausted_pool_recovers_after_frees() {
    let server = TestServer::start_with(common::test_server_config(0).with_pool_size_bytes(32));
    let client = connect(&server);

    let mut blocks: Vec<_> = (0..4)
        .map(|i| RemotePtr::<u64>::new(Arc::clone(&client), &i).unwrap())
        .collect();
    let err = RemotePtr::<u8>::allocate(Arc::clone(&client)).unwrap_err();
    assert!(matches!(err, ClientError::Rejected { op: "create", .. }));

    // Keep the second block so the free space is split around it.
    let survivor = blocks.remove(1);
    drop(blocks);

    let id = client.create_block(24, "buffer").unwrap();
    assert_eq!(client.get_block(id, 24).unwrap(), vec![0; 24]);
    assert_eq!(survivor.read_value().unwrap(), 1);
    assert_eq!(server.pool().block(survivor.id().unwrap()).unwrap().offset.as_usize(), 0);
}

#[test]
fn concurrent_clients() {
    let server = TestServer::start();
    let shared = connect(&server);
    let counter = RemotePtr::<u32>::new(Arc::clone(&shared), &0).unwrap();
    let id = counter.id().unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let client = connect(&server);
            thread::spawn(move || {
                for _ in 0..25 {
                    let ptr = RemotePtr::<u32>::from_id(Arc::clone(&client), id).unwrap();
                    assert!(ptr.read_value().is_ok());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(ref_count(&server, id), 1);
}
