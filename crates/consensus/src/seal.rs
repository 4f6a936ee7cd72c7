use crate::{difficulty::calculate_difficulty, ConsensusError};
use alloy_primitives::{B64, U256};
use chaindb_primitives::{ChainSpec, Header};
use std::fmt::Debug;

/// Capability interface over the sealing scheme of a chain.
///
/// The chain database consults the engine for everything seal-related:
/// canonical difficulty, gas-limit evolution, and validity of the seal
/// fields themselves.
pub trait SealEngine: Send + Sync + Debug {
    /// The canonical difficulty of `header` given its parent.
    fn calculate_difficulty(&self, header: &Header, parent: &Header) -> U256;

    /// Verifies the seal fields of the header.
    fn verify_seal(&self, header: &Header) -> Result<(), ConsensusError>;

    /// Verifies the gas limit against the parent's.
    fn verify_gas_limit(&self, header: &Header, parent: &Header) -> Result<(), ConsensusError>;
}

/// Proof-of-work engine following the Frontier/Homestead difficulty
/// protocol.
///
/// Full nonce verification requires the dataset-backed hashimoto routine and
/// is delegated to miners; the structural check here rejects headers that do
/// not carry a seal at all.
#[derive(Debug, Clone)]
pub struct Ethash {
    spec: ChainSpec,
}

impl Ethash {
    /// Creates the engine over the given chain parameters.
    pub fn new(spec: ChainSpec) -> Self {
        Self { spec }
    }

    /// The chain parameters the engine was built with.
    pub fn spec(&self) -> &ChainSpec {
        &self.spec
    }
}

impl SealEngine for Ethash {
    fn calculate_difficulty(&self, header: &Header, parent: &Header) -> U256 {
        calculate_difficulty(&self.spec, header, parent)
    }

    fn verify_seal(&self, header: &Header) -> Result<(), ConsensusError> {
        if header.number > 0 && header.nonce == B64::ZERO && header.mix_hash.is_zero() {
            return Err(ConsensusError::InvalidSeal("missing proof-of-work seal".into()))
        }
        Ok(())
    }

    fn verify_gas_limit(&self, header: &Header, parent: &Header) -> Result<(), ConsensusError> {
        let bound = parent.gas_limit / self.spec.gas_limit_bound_divisor;
        let out_of_bounds = header.gas_limit < self.spec.min_gas_limit ||
            header.gas_limit.abs_diff(parent.gas_limit) >= bound;
        if out_of_bounds {
            return Err(ConsensusError::GasLimitOutOfBounds {
                parent_gas_limit: parent.gas_limit,
                gas_limit: header.gas_limit,
            })
        }
        Ok(())
    }
}

/// Engine that accepts any seal and echoes the header's own difficulty.
///
/// Intended for tests: echoing the difficulty lets a test choose arbitrary
/// values and steer fork choice directly.
#[derive(Debug, Clone, Default)]
pub struct NoopSealEngine;

impl SealEngine for NoopSealEngine {
    fn calculate_difficulty(&self, header: &Header, _parent: &Header) -> U256 {
        header.difficulty
    }

    fn verify_seal(&self, _header: &Header) -> Result<(), ConsensusError> {
        Ok(())
    }

    fn verify_gas_limit(&self, _header: &Header, _parent: &Header) -> Result<(), ConsensusError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn ethash_rejects_missing_seal() {
        let engine = Ethash::new(ChainSpec::frontier());
        let header = Header { number: 1, ..Default::default() };
        assert_matches!(engine.verify_seal(&header), Err(ConsensusError::InvalidSeal(_)));

        let sealed = Header { number: 1, nonce: B64::from([1; 8]), ..Default::default() };
        engine.verify_seal(&sealed).unwrap();
    }

    #[test]
    fn gas_limit_bounds_follow_parent() {
        let engine = Ethash::new(ChainSpec::frontier());
        let parent = Header { gas_limit: 1_024_000, ..Default::default() };

        // Within parent/1024 of the parent's limit.
        let ok = Header { gas_limit: 1_024_999, ..Default::default() };
        engine.verify_gas_limit(&ok, &parent).unwrap();

        let too_far = Header { gas_limit: 1_025_000, ..Default::default() };
        assert_matches!(
            engine.verify_gas_limit(&too_far, &parent),
            Err(ConsensusError::GasLimitOutOfBounds { .. })
        );

        let too_small = Header { gas_limit: 4_999, ..Default::default() };
        assert_matches!(
            engine.verify_gas_limit(&too_small, &parent),
            Err(ConsensusError::GasLimitOutOfBounds { .. })
        );
    }
}
