use alloy_primitives::B256;
use chaindb_primitives::{ReceiptWithBloom, SealedBlock};
use thiserror::Error;

/// Result of executing a block's transactions on top of its parent state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    /// Root of the state trie after execution.
    pub state_root: B256,
    /// One receipt per transaction, in order.
    pub receipts: Vec<ReceiptWithBloom>,
}

/// Execution failed; the state must have been rolled back by the executor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ExecutionError(
    /// Human-readable failure description.
    pub String,
);

/// Capability interface over transaction execution and the state trie.
///
/// The chain database never mutates state itself; the import path hands the
/// block to the executor and compares the resulting state root against the
/// header.
pub trait StateDb: Send + Sync {
    /// Executes the block's transactions on top of `parent_state_root`,
    /// committing on success and rolling back on failure.
    fn execute(
        &self,
        block: &SealedBlock,
        parent_state_root: B256,
    ) -> Result<ExecutionOutcome, ExecutionError>;
}
