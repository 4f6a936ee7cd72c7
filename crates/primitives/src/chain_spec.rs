use crate::{
    constants::{EMPTY_OMMER_ROOT_HASH, EMPTY_ROOT_HASH},
    Header,
};
use alloy_primitives::{Address, BlockNumber, Bytes, B256, B64, U256};
use serde::{Deserialize, Serialize};

/// The difficulty era a block number falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Era {
    /// Frontier and Olympic rules; Olympic differs only in its parameter
    /// values.
    Frontier,
    /// Homestead rules.
    Homestead,
}

/// Chain parameters.
///
/// Carries the consensus constants consulted by validation and difficulty
/// calculation, plus the genesis description. Loadable from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSpec {
    /// Chain identifier.
    pub chain_id: u64,
    /// Last block number governed by Frontier difficulty rules; blocks above
    /// it use the Homestead formula.
    pub homestead_block: BlockNumber,
    /// The minimum difficulty the chain may ever reach.
    pub minimum_difficulty: U256,
    /// Divisor bounding per-block difficulty adjustment.
    pub difficulty_bound_divisor: U256,
    /// Block-time target separating difficulty increases from decreases
    /// under Frontier rules, in seconds.
    pub duration_limit: u64,
    /// Divisor bounding per-block gas limit adjustment.
    pub gas_limit_bound_divisor: u64,
    /// The minimum gas limit of any block.
    pub min_gas_limit: u64,
    /// Maximum size of a header's extra-data field, in bytes.
    pub max_extra_data_size: usize,
    /// How many generations back an ommer may reach.
    pub max_uncle_generations: u64,
    /// The genesis block description.
    pub genesis: GenesisConfig,
}

/// The fields of the genesis header that are not implied by the chain rules.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GenesisConfig {
    /// Genesis timestamp.
    pub timestamp: u64,
    /// Genesis beneficiary.
    pub author: Address,
    /// Genesis difficulty.
    pub difficulty: U256,
    /// Genesis gas limit.
    pub gas_limit: u64,
    /// Genesis extra data.
    pub extra_data: Bytes,
    /// Genesis seal nonce.
    pub nonce: B64,
    /// Genesis mix hash.
    pub mix_hash: B256,
    /// Root of the genesis state trie.
    pub state_root: B256,
}

impl ChainSpec {
    /// Mainnet-flavoured Frontier parameters.
    pub fn frontier() -> Self {
        Self {
            chain_id: 1,
            homestead_block: 1_150_000,
            minimum_difficulty: U256::from(131_072u64),
            difficulty_bound_divisor: U256::from(2_048u64),
            duration_limit: 13,
            gas_limit_bound_divisor: 1_024,
            min_gas_limit: 5_000,
            max_extra_data_size: 32,
            max_uncle_generations: 6,
            genesis: GenesisConfig {
                difficulty: U256::from(131_072u64),
                gas_limit: 5_000,
                state_root: EMPTY_ROOT_HASH,
                ..Default::default()
            },
        }
    }

    /// Olympic parameters: Frontier rules with an eight second duration
    /// limit.
    pub fn olympic() -> Self {
        Self { duration_limit: 8, ..Self::frontier() }
    }

    /// Parameters with Homestead rules active from the first block.
    pub fn homestead_test() -> Self {
        Self { homestead_block: 0, ..Self::frontier() }
    }

    /// Returns the difficulty era governing the given block number.
    pub fn era_at(&self, number: BlockNumber) -> Era {
        if number > self.homestead_block {
            Era::Homestead
        } else {
            Era::Frontier
        }
    }

    /// Builds the genesis header from the genesis description.
    pub fn genesis_header(&self) -> Header {
        Header {
            parent_hash: B256::ZERO,
            ommers_hash: EMPTY_OMMER_ROOT_HASH,
            beneficiary: self.genesis.author,
            state_root: self.genesis.state_root,
            transactions_root: EMPTY_ROOT_HASH,
            receipts_root: EMPTY_ROOT_HASH,
            logs_bloom: Default::default(),
            difficulty: self.genesis.difficulty,
            number: 0,
            gas_limit: self.genesis.gas_limit,
            gas_used: 0,
            timestamp: self.genesis.timestamp,
            extra_data: self.genesis.extra_data.clone(),
            mix_hash: self.genesis.mix_hash,
            nonce: self.genesis.nonce,
        }
    }

    /// The hash of the genesis block.
    pub fn genesis_hash(&self) -> B256 {
        self.genesis_header().hash_slow()
    }
}

impl Default for ChainSpec {
    fn default() -> Self {
        Self::frontier()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn era_switch_is_exclusive_of_fork_block() {
        let spec = ChainSpec::frontier();
        assert_eq!(spec.era_at(1_150_000), Era::Frontier);
        assert_eq!(spec.era_at(1_150_001), Era::Homestead);

        let spec = ChainSpec::homestead_test();
        assert_eq!(spec.era_at(1), Era::Homestead);
    }

    #[test]
    fn genesis_header_is_well_formed() {
        let spec = ChainSpec::frontier();
        let genesis = spec.genesis_header();
        assert!(genesis.is_genesis());
        assert_eq!(genesis.parent_hash, B256::ZERO);
        assert_eq!(genesis.ommers_hash, EMPTY_OMMER_ROOT_HASH);
        assert_eq!(spec.genesis_hash(), genesis.hash_slow());
    }

    #[test]
    fn spec_json_roundtrip() {
        let spec = ChainSpec::olympic();
        let json = serde_json::to_string(&spec).unwrap();
        let back: ChainSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(spec, back);
        assert_eq!(back.duration_limit, 8);
    }
}
