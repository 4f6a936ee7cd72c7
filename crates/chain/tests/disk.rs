//! Tests of the disk-backed chain: persistence across reopen and the
//! version sentinel policies.

use chaindb::{
    test_utils::{sample_tx, test_spec, ChildBuilder, EchoStateDb},
    BlockChain, WithExisting,
};
use chaindb_consensus::NoopSealEngine;
use chaindb_primitives::ChainSpec;
use std::sync::Arc;

fn open(path: &std::path::Path, with_existing: WithExisting) -> BlockChain {
    BlockChain::open(test_spec(), Arc::new(NoopSealEngine), path, with_existing).unwrap()
}

#[test]
fn state_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();

    let (head, tx_hash) = {
        let chain = open(dir.path(), WithExisting::Trust);
        let a1 = ChildBuilder::new(chain.genesis_header()).build();
        let a2 = ChildBuilder::new(&a1.header).transactions(vec![sample_tx(3)]).build();
        for block in [&a1, &a2] {
            chain.import_block(&block.encoded(), &EchoStateDb, true).unwrap();
        }
        (a2.hash(), sample_tx(3).hash_slow())
    };

    let chain = open(dir.path(), WithExisting::Trust);
    assert_eq!(chain.current_hash(), head);
    assert_eq!(chain.current_number(), 2);
    assert_eq!(chain.number_hash(2).unwrap(), Some(head));

    let location = chain.transaction_location(tx_hash).unwrap().unwrap();
    assert_eq!(location.block_hash, head);
    assert!(chain.receipts(head).unwrap().is_some());
}

#[test]
fn genesis_mismatch_refuses_then_kill_recreates() {
    let dir = tempfile::tempdir().unwrap();
    {
        let chain = open(dir.path(), WithExisting::Trust);
        let block = ChildBuilder::new(chain.genesis_header()).build();
        chain.import_block(&block.encoded(), &EchoStateDb, true).unwrap();
    }

    // A spec with a different genesis no longer matches the sentinel.
    let mut other_spec = test_spec();
    other_spec.genesis.timestamp = 1;
    assert_ne!(other_spec.genesis_hash(), test_spec().genesis_hash());

    let refused = BlockChain::open(
        other_spec.clone(),
        Arc::new(NoopSealEngine),
        dir.path(),
        WithExisting::Trust,
    );
    assert!(refused.is_err());

    // Kill wipes the stores and seeds the new genesis.
    let chain = BlockChain::open(
        other_spec.clone(),
        Arc::new(NoopSealEngine),
        dir.path(),
        WithExisting::Kill,
    )
    .unwrap();
    assert_eq!(chain.current_number(), 0);
    assert_eq!(chain.genesis_hash(), other_spec.genesis_hash());
}

#[test]
fn reopen_resets_handles() {
    let dir = tempfile::tempdir().unwrap();
    let mut chain = open(dir.path(), WithExisting::Trust);
    let block = ChildBuilder::new(chain.genesis_header()).build();
    chain.import_block(&block.encoded(), &EchoStateDb, true).unwrap();

    chain.reopen(WithExisting::Trust).unwrap();
    assert_eq!(chain.current_hash(), block.hash());

    chain.reopen(WithExisting::Kill).unwrap();
    assert_eq!(chain.current_number(), 0);
}

#[test]
fn olympic_spec_shares_genesis_layout() {
    // Distinct parameter presets with identical genesis fields produce the
    // same genesis hash and can reuse each other's stores.
    let dir = tempfile::tempdir().unwrap();
    {
        open(dir.path(), WithExisting::Trust);
    }
    let chain = BlockChain::open(
        ChainSpec::olympic(),
        Arc::new(NoopSealEngine),
        dir.path(),
        WithExisting::Trust,
    )
    .unwrap();
    assert_eq!(chain.current_number(), 0);
}
