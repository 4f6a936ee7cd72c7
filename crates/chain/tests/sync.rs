//! Tests of the sync orchestrator draining a verified-block queue.

use chaindb::test_utils::{
    test_chain, ChildBuilder, EchoStateDb, FailingStateDb, TestQueue,
};
use chaindb_primitives::SealedBlock;

fn three_linear_blocks(chain: &chaindb::BlockChain) -> Vec<SealedBlock> {
    let mut parent = chain.genesis_header().clone();
    let mut blocks = Vec::new();
    for _ in 0..3 {
        let block = ChildBuilder::new(&parent).build();
        parent = block.header.clone();
        blocks.push(block);
    }
    blocks
}

#[test]
fn drains_queue_and_aggregates_routes() {
    let chain = test_chain().unwrap();
    let queue = TestQueue::new();
    let blocks = three_linear_blocks(&chain);
    for block in &blocks {
        queue.push(block.clone());
    }

    let (route, more, imported) = chain.sync(&queue, &EchoStateDb, 100);

    assert_eq!(imported, 3);
    assert!(!more);
    assert!(route.dead.is_empty());
    assert_eq!(
        route.live,
        blocks.iter().map(|block| block.hash()).collect::<Vec<_>>()
    );
    assert_eq!(chain.current_hash(), blocks[2].hash());
}

#[test]
fn respects_max() {
    let chain = test_chain().unwrap();
    let queue = TestQueue::new();
    for block in three_linear_blocks(&chain) {
        queue.push(block);
    }

    let (_, more, imported) = chain.sync(&queue, &EchoStateDb, 2);
    assert_eq!(imported, 2);
    assert!(more);
    assert_eq!(chain.current_number(), 2);

    let (_, more, imported) = chain.sync(&queue, &EchoStateDb, 2);
    assert_eq!(imported, 1);
    assert!(!more);
    assert_eq!(chain.current_number(), 3);
}

#[test]
fn defers_blocks_with_missing_parents() {
    let chain = test_chain().unwrap();
    let queue = TestQueue::new();
    let blocks = three_linear_blocks(&chain);

    // Enqueue only the descendants; their ancestor is missing.
    queue.push(blocks[1].clone());
    queue.push(blocks[2].clone());

    let (route, more, imported) = chain.sync(&queue, &EchoStateDb, 100);
    assert_eq!(imported, 0);
    assert!(route.is_empty());
    assert!(more);
    assert_eq!(queue.deferred(), vec![blocks[1].hash(), blocks[2].hash()]);
    assert!(queue.bad().is_empty());

    // Once the ancestor arrives, the deferred blocks import cleanly.
    queue.push(blocks[0].clone());
    queue.release_deferred();
    let (_, more, imported) = chain.sync(&queue, &EchoStateDb, 100);
    assert_eq!(imported, 3);
    assert!(!more);
    assert_eq!(chain.current_hash(), blocks[2].hash());
}

#[test]
fn marks_failing_blocks_bad_and_continues() {
    let chain = test_chain().unwrap();
    let queue = TestQueue::new();
    let blocks = three_linear_blocks(&chain);
    for block in &blocks {
        queue.push(block.clone());
    }

    let (route, more, imported) = chain.sync(&queue, &FailingStateDb, 100);
    assert_eq!(imported, 0);
    assert!(route.is_empty());

    // The first block fails execution and is marked bad; its descendants
    // only miss their parent and are deferred instead.
    assert_eq!(queue.bad(), vec![blocks[0].hash()]);
    assert_eq!(queue.deferred(), vec![blocks[1].hash(), blocks[2].hash()]);
    assert!(more);
    assert_eq!(chain.current_number(), 0);
}
