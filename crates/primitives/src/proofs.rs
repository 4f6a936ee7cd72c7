//! Helper functions for calculating the Merkle roots referenced by headers.

use crate::{
    constants::{EMPTY_OMMER_ROOT_HASH, EMPTY_ROOT_HASH},
    Header, ReceiptWithBloom, TransactionSigned,
};
use alloy_primitives::{keccak256, B256};
use alloy_rlp::Encodable;
use alloy_trie::HashBuilder;
use nybbles::Nibbles;

/// Adjust the index of an item for rlp encoding.
const fn adjust_index_for_rlp(i: usize, len: usize) -> usize {
    if i > 0x7f {
        i
    } else if i == 0x7f || i + 1 == len {
        0
    } else {
        i + 1
    }
}

/// Compute a trie root of the collection of items with a custom encoder.
fn ordered_trie_root_with_encoder<T, F>(items: &[T], mut encode: F) -> B256
where
    F: FnMut(&T, &mut Vec<u8>),
{
    if items.is_empty() {
        return EMPTY_ROOT_HASH
    }

    let mut value_buffer = Vec::new();

    let mut hb = HashBuilder::default();
    let items_len = items.len();
    for i in 0..items_len {
        let index = adjust_index_for_rlp(i, items_len);

        let index_buffer = alloy_rlp::encode_fixed_size(&index);

        value_buffer.clear();
        encode(&items[index], &mut value_buffer);

        hb.add_leaf(Nibbles::unpack(&index_buffer), &value_buffer);
    }

    hb.root()
}

/// Calculates the transaction root from `(rlp(index), encoded(tx))` pairs.
pub fn calculate_transaction_root(transactions: &[TransactionSigned]) -> B256 {
    ordered_trie_root_with_encoder(transactions, |tx, buf| tx.encode(buf))
}

/// Calculates the receipts root for a header.
pub fn calculate_receipt_root(receipts: &[ReceiptWithBloom]) -> B256 {
    ordered_trie_root_with_encoder(receipts, |receipt, buf| receipt.encode(buf))
}

/// Calculates the root hash of an ommers list.
pub fn calculate_ommers_root(ommers: &[Header]) -> B256 {
    if ommers.is_empty() {
        return EMPTY_OMMER_ROOT_HASH
    }
    let mut ommers_rlp = Vec::new();
    alloy_rlp::encode_list(ommers, &mut ommers_rlp);
    keccak256(ommers_rlp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_roots() {
        assert_eq!(calculate_transaction_root(&[]), EMPTY_ROOT_HASH);
        assert_eq!(calculate_receipt_root(&[]), EMPTY_ROOT_HASH);
        assert_eq!(calculate_ommers_root(&[]), EMPTY_OMMER_ROOT_HASH);
        assert_eq!(EMPTY_ROOT_HASH, alloy_trie::EMPTY_ROOT_HASH);
    }

    #[test]
    fn ommers_root_changes_with_content() {
        let one = vec![Header { number: 1, ..Default::default() }];
        let two = vec![Header { number: 2, ..Default::default() }];
        assert_ne!(calculate_ommers_root(&one), calculate_ommers_root(&two));
        assert_ne!(calculate_ommers_root(&one), EMPTY_OMMER_ROOT_HASH);
    }

    #[test]
    fn transaction_root_is_order_sensitive() {
        let a = TransactionSigned { nonce: 0, ..Default::default() };
        let b = TransactionSigned { nonce: 1, ..Default::default() };
        let ab = calculate_transaction_root(&[a.clone(), b.clone()]);
        let ba = calculate_transaction_root(&[b, a]);
        assert_ne!(ab, ba);
    }
}
