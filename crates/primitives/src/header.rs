use crate::constants::EMPTY_OMMER_ROOT_HASH;
use alloy_primitives::{keccak256, Address, BlockHash, BlockNumber, Bloom, Bytes, B256, B64, U256};
use alloy_rlp::{RlpDecodable, RlpEncodable};
use serde::{Deserialize, Serialize};
use std::ops::Deref;

/// Block header.
#[derive(
    Debug, Clone, PartialEq, Eq, Default, RlpEncodable, RlpDecodable, Serialize, Deserialize,
)]
pub struct Header {
    /// Keccak-256 hash of the parent block's header.
    pub parent_hash: B256,
    /// Keccak-256 hash of the ommers list portion of this block.
    pub ommers_hash: B256,
    /// Address that receives the block reward.
    pub beneficiary: Address,
    /// Keccak-256 hash of the root node of the state trie after all
    /// transactions are executed.
    pub state_root: B256,
    /// Keccak-256 hash of the root node of the trie populated with each
    /// transaction of the block.
    pub transactions_root: B256,
    /// Keccak-256 hash of the root node of the trie populated with the
    /// receipt of each transaction of the block.
    pub receipts_root: B256,
    /// Bloom filter composed from the blooms of each receipt's logs.
    pub logs_bloom: Bloom,
    /// Difficulty scalar corresponding to the level of effort required to
    /// mine this block.
    pub difficulty: U256,
    /// Number of ancestor blocks; the genesis block has number zero.
    pub number: BlockNumber,
    /// Current limit of gas expenditure per block.
    pub gas_limit: u64,
    /// Total gas spent by the transactions in this block.
    pub gas_used: u64,
    /// Unix timestamp at this block's inception.
    pub timestamp: u64,
    /// Arbitrary byte array relevant to this block, 32 bytes or fewer.
    pub extra_data: Bytes,
    /// Mix hash proving, combined with the nonce, that a sufficient amount of
    /// computation was carried out on this block.
    pub mix_hash: B256,
    /// Seal nonce.
    pub nonce: B64,
}

impl Header {
    /// Heavy function that recomputes the header hash.
    pub fn hash_slow(&self) -> B256 {
        keccak256(alloy_rlp::encode(self))
    }

    /// Returns `true` if the ommers hash corresponds to the empty list.
    pub fn ommers_hash_is_empty(&self) -> bool {
        self.ommers_hash == EMPTY_OMMER_ROOT_HASH
    }

    /// Returns `true` if this is the genesis header.
    pub fn is_genesis(&self) -> bool {
        self.number == 0
    }

    /// Checks if the header's timestamp lies further in the future than the
    /// given present timestamp allows.
    pub fn exceeds_allowed_future_timestamp(
        &self,
        present_timestamp: u64,
        allowed_skew: u64,
    ) -> bool {
        self.timestamp > present_timestamp.saturating_add(allowed_skew)
    }

    /// Checks if the header's timestamp is not strictly after its parent's.
    pub fn is_timestamp_in_past(&self, parent_timestamp: u64) -> bool {
        self.timestamp <= parent_timestamp
    }

    /// Seals the header with the given hash.
    ///
    /// The hash is not verified against the header contents.
    pub fn seal(self, hash: BlockHash) -> SealedHeader {
        SealedHeader { header: self, hash }
    }

    /// Recomputes the hash and seals the header with it.
    pub fn seal_slow(self) -> SealedHeader {
        let hash = self.hash_slow();
        self.seal(hash)
    }
}

/// A [`Header`] together with its memoized block hash.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SealedHeader {
    /// The sealed header.
    header: Header,
    /// The memoized hash of the header.
    hash: BlockHash,
}

impl SealedHeader {
    /// Returns the block hash.
    pub fn hash(&self) -> BlockHash {
        self.hash
    }

    /// Returns a reference to the inner header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Returns the block number and hash.
    pub fn num_hash(&self) -> BlockNumHash {
        BlockNumHash { number: self.header.number, hash: self.hash }
    }

    /// Extracts the inner header, discarding the memoized hash.
    pub fn unseal(self) -> Header {
        self.header
    }
}

impl Deref for SealedHeader {
    type Target = Header;

    fn deref(&self) -> &Self::Target {
        &self.header
    }
}

/// A block number paired with the matching block hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockNumHash {
    /// The block number.
    pub number: BlockNumber,
    /// The block hash.
    pub hash: BlockHash,
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_rlp::Decodable;

    #[test]
    fn header_rlp_roundtrip() {
        let header = Header {
            parent_hash: B256::repeat_byte(1),
            difficulty: U256::from(131_072u64),
            number: 7,
            gas_limit: 5_000,
            timestamp: 1_438_269_988,
            extra_data: Bytes::from_static(b"hi"),
            ..Default::default()
        };

        let encoded = alloy_rlp::encode(&header);
        let decoded = Header::decode(&mut encoded.as_slice()).unwrap();
        assert_eq!(header, decoded);
        assert_eq!(header.hash_slow(), decoded.hash_slow());
    }

    #[test]
    fn sealed_header_hash_matches() {
        let header = Header { number: 3, ..Default::default() };
        let hash = header.hash_slow();
        let sealed = header.seal_slow();
        assert_eq!(sealed.hash(), hash);
        assert_eq!(sealed.num_hash().number, 3);
    }

    #[test]
    fn future_timestamp_bound() {
        let header = Header { timestamp: 1_000, ..Default::default() };
        assert!(!header.exceeds_allowed_future_timestamp(990, 15));
        assert!(header.exceeds_allowed_future_timestamp(980, 15));
        assert!(header.is_timestamp_in_past(1_000));
        assert!(!header.is_timestamp_in_past(999));
    }
}
