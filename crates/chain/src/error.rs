use alloy_primitives::B256;
use chaindb_consensus::ConsensusError;
use chaindb_db::StoreError;
use thiserror::Error;

/// Errors surfaced by chain queries and maintenance operations.
#[derive(Debug, Error)]
pub enum ChainError {
    /// The underlying key-value store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The database contradicts a chain invariant.
    #[error("database inconsistency: {0}")]
    InvariantViolation(String),
    /// A long-running operation was cancelled through its progress callback.
    /// No partial state was committed.
    #[error("operation cancelled")]
    Cancelled,
}

/// Errors produced by the import path.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The block hash is already present; callers may ignore this.
    #[error("block is already in the chain")]
    AlreadyHave,
    /// The parent is not known yet; retry once it arrives.
    #[error("parent {0} is unknown")]
    UnknownParent(B256),
    /// The block failed a consensus rule. Transient when the underlying
    /// reason is transient (future timestamp).
    #[error(transparent)]
    Consensus(#[from] ConsensusError),
    /// The block bytes failed to decode. Permanent.
    #[error("malformed block: {0}")]
    Malformed(alloy_rlp::Error),
    /// The post-execution state root disagrees with the header. Permanent.
    #[error("state root {got} does not match header value {expected}")]
    StateRootMismatch {
        /// Root produced by execution.
        got: B256,
        /// Root carried by the header.
        expected: B256,
    },
    /// Transaction execution failed outright. Permanent.
    #[error("execution failed: {0}")]
    Execution(String),
    /// The database contradicts a chain invariant; a rescue is advisable.
    #[error("database inconsistency: {0}")]
    InvariantViolation(String),
    /// The underlying key-value store failed. The batch was rolled back;
    /// caches and the head pointer are unchanged.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ImportError {
    /// Whether the block may become importable without modification, once
    /// the wall clock advances or a missing ancestor arrives.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Consensus(err) => err.is_transient(),
            Self::UnknownParent(_) => true,
            _ => false,
        }
    }

    /// Whether the block is permanently rejected. Only these failures reach
    /// the bad-block hook.
    pub fn is_bad(&self) -> bool {
        match self {
            Self::Consensus(err) => !err.is_transient(),
            Self::Malformed(_) | Self::StateRootMismatch { .. } | Self::Execution(_) => true,
            _ => false,
        }
    }
}

impl From<ChainError> for ImportError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::Store(err) => Self::Store(err),
            ChainError::InvariantViolation(msg) => Self::InvariantViolation(msg),
            ChainError::Cancelled => Self::InvariantViolation("cancelled".into()),
        }
    }
}

/// Condensed import outcome used by [`attempt_import`].
///
/// [`attempt_import`]: crate::BlockChain::attempt_import
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportResult {
    /// The block is now part of the chain.
    Success,
    /// The block was already present.
    AlreadyInChain,
    /// The parent is missing; retry after it arrives.
    UnknownParent,
    /// The block's timestamp is ahead of the wall clock; retry later.
    FutureTime,
    /// The block bytes failed to decode.
    Malformed,
    /// The block is permanently invalid.
    BadChain,
    /// The store failed or the database is inconsistent.
    Failed,
}

impl From<&ImportError> for ImportResult {
    fn from(err: &ImportError) -> Self {
        match err {
            ImportError::AlreadyHave => Self::AlreadyInChain,
            ImportError::UnknownParent(_) => Self::UnknownParent,
            ImportError::Consensus(inner) if inner.is_transient() => Self::FutureTime,
            ImportError::Malformed(_) => Self::Malformed,
            ImportError::Consensus(_) |
            ImportError::StateRootMismatch { .. } |
            ImportError::Execution(_) => Self::BadChain,
            ImportError::InvariantViolation(_) | ImportError::Store(_) => Self::Failed,
        }
    }
}
