//! Key schema of the `extras` namespace.
//!
//! Every extras key is the subject's big-endian bytes with a single kind-tag
//! byte appended: 32-byte hashes for most kinds, the 8-byte block number for
//! [`ExtrasKind::BlockHash`], and the synthetic chunk id for
//! [`ExtrasKind::BlocksBlooms`].

use alloy_primitives::{BlockNumber, B256, U256};

/// Tag byte distinguishing the record kinds sharing the `extras` namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ExtrasKind {
    /// Familial metadata of a block.
    Details = 0,
    /// Canonical hash by block number.
    BlockHash = 1,
    /// Locator of a transaction by its hash.
    TransactionAddress = 2,
    /// Per-transaction log blooms of a block.
    LogBlooms = 3,
    /// Receipts of a block.
    Receipts = 4,
    /// A chunk of the hierarchical block-bloom index.
    BlocksBlooms = 5,
}

/// Builds an extras key from a subject and a kind tag.
pub fn extras_key(subject: &[u8], kind: ExtrasKind) -> Vec<u8> {
    let mut key = Vec::with_capacity(subject.len() + 1);
    key.extend_from_slice(subject);
    key.push(kind as u8);
    key
}

/// Key of a [`ExtrasKind::Details`] record.
pub fn details_key(hash: B256) -> Vec<u8> {
    extras_key(hash.as_slice(), ExtrasKind::Details)
}

/// Key of a [`ExtrasKind::BlockHash`] record; the subject is the big-endian
/// block number.
pub fn block_hash_key(number: BlockNumber) -> Vec<u8> {
    extras_key(&number.to_be_bytes(), ExtrasKind::BlockHash)
}

/// Key of a [`ExtrasKind::TransactionAddress`] record.
pub fn transaction_address_key(tx_hash: B256) -> Vec<u8> {
    extras_key(tx_hash.as_slice(), ExtrasKind::TransactionAddress)
}

/// Key of a [`ExtrasKind::LogBlooms`] record.
pub fn log_blooms_key(hash: B256) -> Vec<u8> {
    extras_key(hash.as_slice(), ExtrasKind::LogBlooms)
}

/// Key of a [`ExtrasKind::Receipts`] record.
pub fn receipts_key(hash: B256) -> Vec<u8> {
    extras_key(hash.as_slice(), ExtrasKind::Receipts)
}

/// Key of a [`ExtrasKind::BlocksBlooms`] record.
pub fn blooms_chunk_key(chunk: B256) -> Vec<u8> {
    extras_key(chunk.as_slice(), ExtrasKind::BlocksBlooms)
}

/// Synthetic id of a bloom chunk.
///
/// The `255` multiplier is one less than the square of the branching factor;
/// it is preserved bit-exactly for on-disk compatibility with existing
/// databases.
pub fn chunk_id(level: u32, index: u64) -> B256 {
    B256::from(U256::from(index) * U256::from(255u64) + U256::from(level))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tags_are_stable() {
        assert_eq!(ExtrasKind::Details as u8, 0);
        assert_eq!(ExtrasKind::BlockHash as u8, 1);
        assert_eq!(ExtrasKind::TransactionAddress as u8, 2);
        assert_eq!(ExtrasKind::LogBlooms as u8, 3);
        assert_eq!(ExtrasKind::Receipts as u8, 4);
        assert_eq!(ExtrasKind::BlocksBlooms as u8, 5);
    }

    #[test]
    fn key_layout() {
        let hash = B256::repeat_byte(0xab);
        let key = details_key(hash);
        assert_eq!(key.len(), 33);
        assert_eq!(&key[..32], hash.as_slice());
        assert_eq!(key[32], 0);

        let key = block_hash_key(0x0102);
        assert_eq!(key.len(), 9);
        assert_eq!(&key[..8], &[0, 0, 0, 0, 0, 0, 1, 2]);
        assert_eq!(key[8], 1);
    }

    #[test]
    fn chunk_id_is_bit_exact() {
        assert_eq!(chunk_id(0, 0), B256::from(U256::ZERO));
        assert_eq!(chunk_id(1, 0), B256::from(U256::from(1u64)));
        assert_eq!(chunk_id(0, 1), B256::from(U256::from(255u64)));
        assert_eq!(chunk_id(2, 3), B256::from(U256::from(3u64 * 255 + 2)));
    }

    #[test]
    fn keys_of_distinct_kinds_never_collide() {
        let hash = B256::repeat_byte(0x11);
        assert_ne!(details_key(hash), log_blooms_key(hash));
        assert_ne!(log_blooms_key(hash), receipts_key(hash));
        assert_ne!(receipts_key(hash), transaction_address_key(hash));
    }
}
