//! Tests of rewind, rescue and rebuild.

use chaindb::{
    test_utils::{bloom_with_bit, sample_tx, test_chain, ChildBuilder, EchoStateDb},
    BlockChain, ChainError,
};
use chaindb_primitives::{Bloom, SealedBlock};

/// Genesis, three blocks with a transaction and a bloom in the middle, and a
/// heavier two-block fork that takes over the head.
fn build_reorged_chain(chain: &BlockChain) -> (Vec<SealedBlock>, Vec<SealedBlock>) {
    let a1 = ChildBuilder::new(chain.genesis_header()).build();
    let a2 = ChildBuilder::new(&a1.header)
        .transactions(vec![sample_tx(0)])
        .bloom(bloom_with_bit(7))
        .build();
    let a3 = ChildBuilder::new(&a2.header).build();
    for block in [&a1, &a2, &a3] {
        chain.import_block(&block.encoded(), &EchoStateDb, true).unwrap();
    }

    let b1 = ChildBuilder::new(chain.genesis_header())
        .difficulty(250_000)
        .bloom(bloom_with_bit(8))
        .marker(0xb1)
        .build();
    let b2 = ChildBuilder::new(&b1.header).difficulty(250_000).build();
    for block in [&b1, &b2] {
        chain.import_block(&block.encoded(), &EchoStateDb, true).unwrap();
    }
    assert_eq!(chain.current_hash(), b2.hash());

    (vec![a1, a2, a3], vec![b1, b2])
}

#[test]
fn rewind_clears_indexes_but_keeps_blocks() {
    let chain = test_chain().unwrap();
    let a1 = ChildBuilder::new(chain.genesis_header()).build();
    let a2 = ChildBuilder::new(&a1.header).transactions(vec![sample_tx(0)]).build();
    let a3 = ChildBuilder::new(&a2.header).build();
    for block in [&a1, &a2, &a3] {
        chain.import_block(&block.encoded(), &EchoStateDb, true).unwrap();
    }

    chain.rewind(1).unwrap();

    assert_eq!(chain.current_hash(), a1.hash());
    assert_eq!(chain.current_number(), 1);
    assert_eq!(chain.number_hash(2).unwrap(), None);
    assert_eq!(chain.number_hash(3).unwrap(), None);

    // The transaction locator is gone, the block bytes are not.
    let tx_hash = sample_tx(0).hash_slow();
    assert!(chain.transaction_location(tx_hash).unwrap().is_none());
    assert!(chain.block(a2.hash()).unwrap().is_some());
    assert!(chain.details(a2.hash()).unwrap().is_some());

    // Bloom slots above the new head are cleared.
    assert_eq!(chain.block_bloom(2).unwrap(), Bloom::ZERO);
    assert_eq!(chain.block_bloom(3).unwrap(), Bloom::ZERO);

    // Rewinding to the present or the future is a no-op.
    chain.rewind(5).unwrap();
    assert_eq!(chain.current_number(), 1);
}

#[test]
fn rescue_readopts_heaviest_consistent_head() {
    let chain = test_chain().unwrap();
    let (a_chain, _) = build_reorged_chain(&chain);

    // Knock the head back; details of the heavier chain remain on disk, so
    // a rescue finds it again.
    chain.rewind(0).unwrap();
    assert_eq!(chain.current_number(), 0);

    chain.rescue().unwrap();

    // The rescued head is the highest-numbered consistent block: a3.
    let a3 = &a_chain[2];
    assert_eq!(chain.current_hash(), a3.hash());
    assert_eq!(chain.current_number(), 3);
    assert_eq!(chain.number_hash(2).unwrap(), Some(a_chain[1].hash()));

    // Canonical transaction locators are restored along the adopted chain.
    let tx_hash = sample_tx(0).hash_slow();
    let location = chain.transaction_location(tx_hash).unwrap().unwrap();
    assert_eq!(location.block_hash, a_chain[1].hash());

    // And the bloom hierarchy reflects the adopted chain again.
    assert_eq!(chain.with_block_bloom(&bloom_with_bit(7), 0, 3).unwrap(), vec![2]);
}

#[test]
fn rebuild_reconstructs_indexes() {
    let chain = test_chain().unwrap();
    let (a_chain, b_chain) = build_reorged_chain(&chain);
    let b2 = &b_chain[1];

    let head_before = chain.current_hash();
    let numbers_before: Vec<_> = (0..=chain.current_number())
        .map(|n| chain.number_hash(n).unwrap().unwrap())
        .collect();

    let mut calls = 0u64;
    chain
        .rebuild(&mut |done, total| {
            calls += 1;
            assert!(done <= total);
            true
        })
        .unwrap();
    // Six blocks: genesis, three on the retracted chain, two on the fork.
    assert_eq!(calls, 6);

    // Fork choice reaches the same head and the same canonical mapping.
    assert_eq!(chain.current_hash(), head_before);
    assert_eq!(chain.current_hash(), b2.hash());
    let numbers_after: Vec<_> = (0..=chain.current_number())
        .map(|n| chain.number_hash(n).unwrap().unwrap())
        .collect();
    assert_eq!(numbers_after, numbers_before);

    // Side-chain details are reconstructed with correct totals.
    let a3 = &a_chain[2];
    let details = chain.details(a3.hash()).unwrap().unwrap();
    let parent = chain.details(a3.parent_hash()).unwrap().unwrap();
    assert_eq!(
        details.total_difficulty,
        parent.total_difficulty + a3.header.difficulty
    );

    // Retracted transactions stay unindexed; the bloom hierarchy matches
    // the canonical chain.
    assert!(chain.transaction_location(sample_tx(0).hash_slow()).unwrap().is_none());
    assert_eq!(chain.with_block_bloom(&bloom_with_bit(8), 0, 2).unwrap(), vec![1]);
    assert!(chain.with_block_bloom(&bloom_with_bit(7), 0, 2).unwrap().is_empty());
}

#[test]
fn rebuild_can_be_cancelled() {
    let chain = test_chain().unwrap();
    build_reorged_chain(&chain);
    let head = chain.current_hash();

    let result = chain.rebuild(&mut |_, _| false);
    assert!(matches!(result, Err(ChainError::Cancelled)));

    // Nothing was committed.
    assert_eq!(chain.current_hash(), head);
    assert_eq!(chain.number_hash(1).unwrap().is_some(), true);
}
