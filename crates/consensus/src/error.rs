use alloy_primitives::{B256, U256};
use thiserror::Error;

/// Reasons a block fails consensus validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsensusError {
    /// The header's extra data is larger than the chain allows.
    #[error("extra data of {len} bytes exceeds the maximum of {max}")]
    ExtraDataExceedsMax {
        /// Observed length.
        len: usize,
        /// Configured maximum.
        max: usize,
    },
    /// Gas used is larger than the block's own gas limit.
    #[error("gas used {gas_used} exceeds gas limit {gas_limit}")]
    GasUsedExceedsGasLimit {
        /// Gas used by the block.
        gas_used: u64,
        /// Gas limit of the block.
        gas_limit: u64,
    },
    /// The block's timestamp is not strictly after its parent's.
    #[error("timestamp {timestamp} is not after parent timestamp {parent_timestamp}")]
    TimestampIsInPast {
        /// Timestamp of the parent block.
        parent_timestamp: u64,
        /// Timestamp of the block.
        timestamp: u64,
    },
    /// The block's timestamp lies too far in the future. Transient: the
    /// block may become valid once the wall clock advances.
    #[error("timestamp {timestamp} is too far ahead of the present {present}")]
    TimestampIsInFuture {
        /// Timestamp of the block.
        timestamp: u64,
        /// Present wall-clock timestamp.
        present: u64,
    },
    /// The block number does not follow its parent's.
    #[error("block number {number} does not follow parent number {parent_number}")]
    ParentBlockNumberMismatch {
        /// Number of the parent block.
        parent_number: u64,
        /// Number of the block.
        number: u64,
    },
    /// The header's difficulty disagrees with the difficulty protocol.
    #[error("difficulty {got} does not match the calculated difficulty {expected}")]
    DifficultyMismatch {
        /// Difficulty carried by the header.
        got: U256,
        /// Difficulty required by the protocol.
        expected: U256,
    },
    /// The gas limit moved too far from the parent's, or below the minimum.
    #[error("gas limit {gas_limit} out of bounds against parent gas limit {parent_gas_limit}")]
    GasLimitOutOfBounds {
        /// Gas limit of the parent block.
        parent_gas_limit: u64,
        /// Gas limit of the block.
        gas_limit: u64,
    },
    /// More ommers than allowed.
    #[error("block carries {count} ommers, more than allowed")]
    TooManyOmmers {
        /// Number of ommers carried.
        count: usize,
    },
    /// The same ommer appears twice.
    #[error("duplicate ommer {hash}")]
    DuplicateOmmer {
        /// Hash of the duplicated ommer.
        hash: B256,
    },
    /// An ommer is unknown, out of generational range, or already included.
    #[error("ommer {hash} is not a valid uncle of this block")]
    InvalidOmmer {
        /// Hash of the offending ommer.
        hash: B256,
    },
    /// Recomputed transactions root disagrees with the header.
    #[error("transactions root {got} does not match header value {expected}")]
    BodyTransactionsRootDiff {
        /// Recomputed root.
        got: B256,
        /// Root carried by the header.
        expected: B256,
    },
    /// Recomputed receipts root disagrees with the header.
    #[error("receipts root {got} does not match header value {expected}")]
    ReceiptsRootMismatch {
        /// Recomputed root.
        got: B256,
        /// Root carried by the header.
        expected: B256,
    },
    /// Recomputed ommers hash disagrees with the header.
    #[error("ommers hash {got} does not match header value {expected}")]
    BodyOmmersHashDiff {
        /// Recomputed hash.
        got: B256,
        /// Hash carried by the header.
        expected: B256,
    },
    /// The seal does not satisfy the engine.
    #[error("invalid seal: {0}")]
    InvalidSeal(String),
}

impl ConsensusError {
    /// Whether the failure is transient: the same block may validate later
    /// without modification.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TimestampIsInFuture { .. })
    }
}
