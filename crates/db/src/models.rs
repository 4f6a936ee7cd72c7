//! Records persisted in the `extras` namespace.

use alloy_primitives::{BlockNumber, Bloom, B256, U256};
use alloy_rlp::{RlpDecodable, RlpEncodable};
use chaindb_primitives::{constants::BLOOM_INDEX_SIZE, ReceiptWithBloom};

/// Familial details of a block.
///
/// `children` accumulates every known descendant, canonical or not.
#[derive(Debug, Clone, PartialEq, Eq, Default, RlpEncodable, RlpDecodable)]
pub struct BlockDetails {
    /// Height of the block.
    pub number: BlockNumber,
    /// Cumulative difficulty from genesis up to and including this block.
    pub total_difficulty: U256,
    /// Hash of the parent block.
    pub parent: B256,
    /// Hashes of every known child of this block.
    pub children: Vec<B256>,
}

/// Locator of a transaction within a canonical block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, RlpEncodable, RlpDecodable)]
pub struct TransactionAddress {
    /// Hash of the block containing the transaction.
    pub block_hash: B256,
    /// Index of the transaction within the block.
    pub index: u64,
}

/// The log bloom of each transaction of a block, in transaction order.
#[derive(Debug, Clone, PartialEq, Eq, Default, RlpEncodable, RlpDecodable)]
pub struct BlockLogBlooms {
    /// Per-transaction blooms.
    pub blooms: Vec<Bloom>,
}

/// The receipts of a block, in transaction order.
#[derive(Debug, Clone, PartialEq, Eq, Default, RlpEncodable, RlpDecodable)]
pub struct BlockReceipts {
    /// The receipts.
    pub receipts: Vec<ReceiptWithBloom>,
}

/// One chunk of the hierarchical block-bloom index: [`BLOOM_INDEX_SIZE`]
/// blooms, each covering one slot of the chunk's level.
#[derive(Debug, Clone, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct BloomGroup {
    /// The slot blooms.
    pub blooms: Vec<Bloom>,
}

impl BloomGroup {
    /// An empty chunk with every slot zeroed.
    pub fn empty() -> Self {
        Self { blooms: vec![Bloom::ZERO; BLOOM_INDEX_SIZE as usize] }
    }

    /// The bloom at `slot`, zero when the chunk is sparse.
    pub fn bloom_at(&self, slot: usize) -> Bloom {
        self.blooms.get(slot).copied().unwrap_or_default()
    }

    /// ORs `bloom` into `slot`, growing the chunk if needed.
    pub fn accrue_at(&mut self, slot: usize, bloom: Bloom) {
        if self.blooms.len() <= slot {
            self.blooms.resize(slot + 1, Bloom::ZERO);
        }
        self.blooms[slot].accrue_bloom(&bloom);
    }

    /// Replaces the bloom at `slot`, growing the chunk if needed.
    pub fn replace_at(&mut self, slot: usize, bloom: Bloom) {
        if self.blooms.len() <= slot {
            self.blooms.resize(slot + 1, Bloom::ZERO);
        }
        self.blooms[slot] = bloom;
    }
}

impl Default for BloomGroup {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_rlp::Decodable;

    #[test]
    fn details_rlp_roundtrip() {
        let details = BlockDetails {
            number: 12,
            total_difficulty: U256::from(1_000_000u64),
            parent: B256::repeat_byte(0x01),
            children: vec![B256::repeat_byte(0x02), B256::repeat_byte(0x03)],
        };
        let encoded = alloy_rlp::encode(&details);
        assert_eq!(BlockDetails::decode(&mut encoded.as_slice()).unwrap(), details);
    }

    #[test]
    fn transaction_address_rlp_roundtrip() {
        let address = TransactionAddress { block_hash: B256::repeat_byte(0x0f), index: 3 };
        let encoded = alloy_rlp::encode(&address);
        assert_eq!(TransactionAddress::decode(&mut encoded.as_slice()).unwrap(), address);
    }

    #[test]
    fn bloom_group_accrues() {
        let mut group = BloomGroup::empty();
        assert_eq!(group.blooms.len(), BLOOM_INDEX_SIZE as usize);

        let mut first = [0u8; 256];
        first[0] = 0x80;
        let first = Bloom::from(first);
        group.accrue_at(3, first);
        assert_eq!(group.bloom_at(3), first);

        let mut second = [0u8; 256];
        second[1] = 0x01;
        group.accrue_at(3, Bloom::from(second));

        let merged = group.bloom_at(3);
        assert_eq!(merged.as_slice()[0], 0x80);
        assert_eq!(merged.as_slice()[1], 0x01);

        group.replace_at(3, Bloom::ZERO);
        assert_eq!(group.bloom_at(3), Bloom::ZERO);
    }
}
