use crate::{Header, SealedHeader, TransactionSigned};
use alloy_primitives::{BlockHash, BlockNumber, TxHash, B256};
use alloy_rlp::{RlpDecodable, RlpEncodable};
use serde::{Deserialize, Serialize};
use std::ops::Deref;

/// A full block: header, transactions and ommer headers.
///
/// The canonical encoding is the three-item RLP list
/// `[header, transactions, ommers]`; the block hash is the keccak-256 digest
/// of the header portion alone.
#[derive(
    Debug, Clone, PartialEq, Eq, Default, RlpEncodable, RlpDecodable, Serialize, Deserialize,
)]
pub struct Block {
    /// The block header.
    pub header: Header,
    /// The transactions of the block.
    pub transactions: Vec<TransactionSigned>,
    /// The headers of the block's uncles.
    pub ommers: Vec<Header>,
}

impl Block {
    /// Recomputes the header hash and seals the block with it.
    pub fn seal_slow(self) -> SealedBlock {
        SealedBlock {
            header: self.header.seal_slow(),
            transactions: self.transactions,
            ommers: self.ommers,
        }
    }

    /// Seals the block with the given block hash, without verifying it.
    pub fn seal(self, hash: BlockHash) -> SealedBlock {
        SealedBlock {
            header: self.header.seal(hash),
            transactions: self.transactions,
            ommers: self.ommers,
        }
    }
}

/// A [`Block`] whose header hash has been computed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SealedBlock {
    /// The sealed header.
    pub header: SealedHeader,
    /// The transactions of the block.
    pub transactions: Vec<TransactionSigned>,
    /// The headers of the block's uncles.
    pub ommers: Vec<Header>,
}

impl SealedBlock {
    /// Returns the block hash.
    pub fn hash(&self) -> BlockHash {
        self.header.hash()
    }

    /// Returns the block number.
    pub fn number(&self) -> BlockNumber {
        self.header.number
    }

    /// Returns the parent block hash.
    pub fn parent_hash(&self) -> B256 {
        self.header.parent_hash
    }

    /// Recomputes the hash of every transaction in the block, in order.
    pub fn transaction_hashes(&self) -> Vec<TxHash> {
        self.transactions.iter().map(|tx| tx.hash_slow()).collect()
    }

    /// Recomputes the hash of every ommer header, in order.
    pub fn ommer_hashes(&self) -> Vec<B256> {
        self.ommers.iter().map(|ommer| ommer.hash_slow()).collect()
    }

    /// Unseals the block.
    pub fn unseal(self) -> Block {
        Block {
            header: self.header.unseal(),
            transactions: self.transactions,
            ommers: self.ommers,
        }
    }

    /// The canonical encoding of the block.
    pub fn encoded(&self) -> Vec<u8> {
        alloy_rlp::encode(&Block {
            header: self.header.deref().clone(),
            transactions: self.transactions.clone(),
            ommers: self.ommers.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_rlp::Decodable;

    #[test]
    fn block_rlp_roundtrip() {
        let block = Block {
            header: Header { number: 4, ..Default::default() },
            transactions: vec![TransactionSigned::default()],
            ommers: vec![Header { number: 2, ..Default::default() }],
        };

        let encoded = alloy_rlp::encode(&block);
        let decoded = Block::decode(&mut encoded.as_slice()).unwrap();
        assert_eq!(block, decoded);
    }

    #[test]
    fn block_hash_is_header_hash() {
        let block = Block { header: Header { number: 1, ..Default::default() }, ..Default::default() };
        let header_hash = block.header.hash_slow();
        assert_eq!(block.seal_slow().hash(), header_hash);
    }

    #[test]
    fn sealed_block_encoding_matches_unsealed() {
        let block = Block {
            header: Header { number: 9, ..Default::default() },
            transactions: vec![TransactionSigned { nonce: 3, ..Default::default() }],
            ommers: vec![],
        };
        let sealed = block.clone().seal_slow();
        assert_eq!(sealed.encoded(), alloy_rlp::encode(&block));
    }
}
