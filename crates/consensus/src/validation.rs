//! Collection of methods for block validation.
//!
//! These are the pure checks: everything that can be decided from the block
//! and its parent header alone. Checks that need chain history (ommer
//! kinship) live with the chain database.

use crate::ConsensusError;
use chaindb_primitives::{constants::MAX_OMMERS, proofs, ChainSpec, Header, SealedBlock};

/// Gas used needs to be less than gas limit. Gas used is going to be checked
/// again after execution.
pub fn validate_header_gas(header: &Header) -> Result<(), ConsensusError> {
    if header.gas_used > header.gas_limit {
        return Err(ConsensusError::GasUsedExceedsGasLimit {
            gas_used: header.gas_used,
            gas_limit: header.gas_limit,
        })
    }
    Ok(())
}

/// Validates the header's extra-data length against the chain parameters.
pub fn validate_header_extra_data(
    header: &Header,
    spec: &ChainSpec,
) -> Result<(), ConsensusError> {
    if header.extra_data.len() > spec.max_extra_data_size {
        return Err(ConsensusError::ExtraDataExceedsMax {
            len: header.extra_data.len(),
            max: spec.max_extra_data_size,
        })
    }
    Ok(())
}

/// Validates the timestamp against the parent to make sure it is strictly
/// increasing.
pub fn validate_against_parent_timestamp(
    header: &Header,
    parent: &Header,
) -> Result<(), ConsensusError> {
    if header.is_timestamp_in_past(parent.timestamp) {
        return Err(ConsensusError::TimestampIsInPast {
            parent_timestamp: parent.timestamp,
            timestamp: header.timestamp,
        })
    }
    Ok(())
}

/// Rejects headers whose timestamp lies beyond the allowed clock skew.
///
/// This failure is transient; see [`ConsensusError::is_transient`].
pub fn validate_timestamp_against_present(
    header: &Header,
    present: u64,
    allowed_skew: u64,
) -> Result<(), ConsensusError> {
    if header.exceeds_allowed_future_timestamp(present, allowed_skew) {
        return Err(ConsensusError::TimestampIsInFuture {
            timestamp: header.timestamp,
            present,
        })
    }
    Ok(())
}

/// Ensures the header's number follows the parent's.
pub fn validate_against_parent_number(
    header: &Header,
    parent: &Header,
) -> Result<(), ConsensusError> {
    if parent.number + 1 != header.number {
        return Err(ConsensusError::ParentBlockNumberMismatch {
            parent_number: parent.number,
            number: header.number,
        })
    }
    Ok(())
}

/// Validates the block's transactions root against the recomputed value.
pub fn validate_transactions_root(block: &SealedBlock) -> Result<(), ConsensusError> {
    let root = proofs::calculate_transaction_root(&block.transactions);
    if block.header.transactions_root != root {
        return Err(ConsensusError::BodyTransactionsRootDiff {
            got: root,
            expected: block.header.transactions_root,
        })
    }
    Ok(())
}

/// Validates the block's ommers hash against the recomputed value, and the
/// ommer count bound.
pub fn validate_ommers_hash(block: &SealedBlock) -> Result<(), ConsensusError> {
    if block.ommers.len() > MAX_OMMERS {
        return Err(ConsensusError::TooManyOmmers { count: block.ommers.len() })
    }
    let ommers_hash = proofs::calculate_ommers_root(&block.ommers);
    if block.header.ommers_hash != ommers_hash {
        return Err(ConsensusError::BodyOmmersHashDiff {
            got: ommers_hash,
            expected: block.header.ommers_hash,
        })
    }
    Ok(())
}
