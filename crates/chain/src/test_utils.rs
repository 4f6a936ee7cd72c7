//! Helpers for exercising the chain database in tests: an echoing state
//! executor, a deterministic block builder and an in-memory verified-block
//! queue.

use crate::{
    BlockChain, BlockQueue, ChainError, ExecutionError, ExecutionOutcome, StateDb,
};
use alloy_primitives::{Bloom, Bytes, B256, B64, U256};
use chaindb_consensus::NoopSealEngine;
use chaindb_primitives::{
    proofs, ChainSpec, Header, Receipt, ReceiptWithBloom, SealedBlock, SealedHeader,
    TransactionSigned,
};
use parking_lot::Mutex;
use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::Arc,
};

/// Chain parameters used by tests: Frontier constants, genesis at timestamp
/// zero.
pub fn test_spec() -> ChainSpec {
    ChainSpec::frontier()
}

/// An in-memory chain with a seal engine that accepts anything and echoes
/// header difficulties, letting tests steer fork choice directly.
pub fn test_chain() -> Result<BlockChain, ChainError> {
    BlockChain::in_memory(test_spec(), Arc::new(NoopSealEngine))
}

/// The receipts the [`EchoStateDb`] produces for a block: one empty-logs
/// receipt per transaction.
pub fn echo_receipts(block: &SealedBlock) -> Vec<ReceiptWithBloom> {
    block
        .transactions
        .iter()
        .enumerate()
        .map(|(index, _)| {
            Receipt {
                state_root: block.header.state_root,
                cumulative_gas_used: 21_000 * (index as u64 + 1),
                logs: Vec::new(),
            }
            .with_bloom()
        })
        .collect()
}

/// State executor that accepts every block, echoing the header's own state
/// root back.
#[derive(Debug, Clone, Default)]
pub struct EchoStateDb;

impl StateDb for EchoStateDb {
    fn execute(
        &self,
        block: &SealedBlock,
        _parent_state_root: B256,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        Ok(ExecutionOutcome {
            state_root: block.header.state_root,
            receipts: echo_receipts(block),
        })
    }
}

/// State executor that fails every block.
#[derive(Debug, Clone, Default)]
pub struct FailingStateDb;

impl StateDb for FailingStateDb {
    fn execute(
        &self,
        _block: &SealedBlock,
        _parent_state_root: B256,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        Err(ExecutionError("forced failure".into()))
    }
}

/// A legacy transaction with a deterministic hash derived from `nonce`.
pub fn sample_tx(nonce: u64) -> TransactionSigned {
    TransactionSigned {
        nonce,
        gas_price: 20_000_000_000,
        gas_limit: 21_000,
        value: U256::from(nonce + 1),
        v: 27,
        r: U256::from(1u64),
        s: U256::from(2u64),
        ..Default::default()
    }
}

/// A bloom with the single bit `bit` set.
pub fn bloom_with_bit(bit: usize) -> Bloom {
    let mut bytes = [0u8; 256];
    bytes[bit / 8] |= 1 << (bit % 8);
    Bloom::from(bytes)
}

/// Builds a child block of `parent` with controllable difficulty, bloom,
/// transactions and ommers. The receipts root always matches what the
/// [`EchoStateDb`] will produce.
#[derive(Debug)]
pub struct ChildBuilder {
    parent: SealedHeader,
    difficulty: U256,
    bloom: Bloom,
    transactions: Vec<TransactionSigned>,
    ommers: Vec<Header>,
    timestamp_gap: u64,
    extra_data: Bytes,
    nonce: B64,
}

impl ChildBuilder {
    /// Starts a child of `parent` inheriting its difficulty.
    pub fn new(parent: &SealedHeader) -> Self {
        Self {
            parent: parent.clone(),
            difficulty: parent.difficulty,
            bloom: Bloom::ZERO,
            transactions: Vec::new(),
            ommers: Vec::new(),
            timestamp_gap: 10,
            extra_data: Bytes::new(),
            nonce: B64::ZERO,
        }
    }

    /// Carries a non-zero seal nonce, satisfying engines that insist on the
    /// presence of a proof-of-work seal.
    pub fn pow_nonce(mut self) -> Self {
        self.nonce = B64::from([1u8; 8]);
        self
    }

    /// Sets the child's difficulty.
    pub fn difficulty(mut self, difficulty: u64) -> Self {
        self.difficulty = U256::from(difficulty);
        self
    }

    /// Sets the child's logs bloom.
    pub fn bloom(mut self, bloom: Bloom) -> Self {
        self.bloom = bloom;
        self
    }

    /// Adds transactions to the child.
    pub fn transactions(mut self, transactions: Vec<TransactionSigned>) -> Self {
        self.transactions = transactions;
        self
    }

    /// Adds an ommer header to the child.
    pub fn ommer(mut self, ommer: Header) -> Self {
        self.ommers.push(ommer);
        self
    }

    /// Seconds between the parent's timestamp and the child's.
    pub fn timestamp_gap(mut self, gap: u64) -> Self {
        self.timestamp_gap = gap;
        self
    }

    /// Distinguishes otherwise-identical siblings.
    pub fn marker(mut self, marker: u8) -> Self {
        self.extra_data = Bytes::from(vec![marker]);
        self
    }

    /// Seals the child block.
    pub fn build(self) -> SealedBlock {
        let mut header = Header {
            parent_hash: self.parent.hash(),
            ommers_hash: proofs::calculate_ommers_root(&self.ommers),
            beneficiary: Default::default(),
            state_root: self.parent.state_root,
            transactions_root: proofs::calculate_transaction_root(&self.transactions),
            receipts_root: Default::default(),
            logs_bloom: self.bloom,
            difficulty: self.difficulty,
            number: self.parent.number + 1,
            gas_limit: self.parent.gas_limit,
            gas_used: 21_000 * self.transactions.len() as u64,
            timestamp: self.parent.timestamp + self.timestamp_gap,
            extra_data: self.extra_data,
            mix_hash: Default::default(),
            nonce: self.nonce,
        };

        // The receipts root must match what the echoing executor produces.
        let receipts: Vec<ReceiptWithBloom> = self
            .transactions
            .iter()
            .enumerate()
            .map(|(index, _)| {
                Receipt {
                    state_root: header.state_root,
                    cumulative_gas_used: 21_000 * (index as u64 + 1),
                    logs: Vec::new(),
                }
                .with_bloom()
            })
            .collect();
        header.receipts_root = proofs::calculate_receipt_root(&receipts);

        SealedBlock {
            header: header.seal_slow(),
            transactions: self.transactions,
            ommers: self.ommers,
        }
    }
}

#[derive(Debug, Default)]
struct QueueInner {
    pending: VecDeque<SealedBlock>,
    by_hash: HashMap<B256, SealedBlock>,
    deferred: Vec<B256>,
    bad: HashSet<B256>,
}

/// In-memory [`BlockQueue`]. Requeued blocks are parked until
/// [`TestQueue::release_deferred`] moves them back into the pending set,
/// mimicking a staging queue that defers future-timestamp blocks.
#[derive(Debug, Default)]
pub struct TestQueue {
    inner: Mutex<QueueInner>,
}

impl TestQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues a verified block.
    pub fn push(&self, block: SealedBlock) {
        let mut inner = self.inner.lock();
        inner.by_hash.insert(block.hash(), block.clone());
        inner.pending.push_back(block);
    }

    /// Hashes marked permanently bad so far.
    pub fn bad(&self) -> Vec<B256> {
        self.inner.lock().bad.iter().copied().collect()
    }

    /// Hashes currently parked after a transient failure.
    pub fn deferred(&self) -> Vec<B256> {
        self.inner.lock().deferred.clone()
    }

    /// Moves every deferred block back into the pending set.
    pub fn release_deferred(&self) {
        let mut inner = self.inner.lock();
        let deferred = std::mem::take(&mut inner.deferred);
        for hash in deferred {
            if let Some(block) = inner.by_hash.get(&hash).cloned() {
                inner.pending.push_back(block);
            }
        }
    }
}

impl BlockQueue for TestQueue {
    fn dequeue_verified(&self, max: usize) -> Vec<SealedBlock> {
        let mut inner = self.inner.lock();
        let take = max.min(inner.pending.len());
        inner.pending.drain(..take).collect()
    }

    fn requeue(&self, hash: B256) {
        self.inner.lock().deferred.push(hash);
    }

    fn mark_bad(&self, hash: B256) {
        self.inner.lock().bad.insert(hash);
    }

    fn is_empty(&self) -> bool {
        let inner = self.inner.lock();
        inner.pending.is_empty() && inner.deferred.is_empty()
    }
}
