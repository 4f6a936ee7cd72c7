use alloy_primitives::{keccak256, Bytes, TxHash, TxKind, U256};
use alloy_rlp::{RlpDecodable, RlpEncodable};
use serde::{Deserialize, Serialize};

/// A signed legacy transaction.
///
/// The canonical encoding is the nine-field RLP list; the transaction hash is
/// the keccak-256 digest of that encoding.
#[derive(
    Debug, Clone, PartialEq, Eq, Default, RlpEncodable, RlpDecodable, Serialize, Deserialize,
)]
pub struct TransactionSigned {
    /// Number of transactions sent by the sender.
    pub nonce: u64,
    /// Price, in wei, the sender is willing to pay per unit of gas.
    pub gas_price: u128,
    /// Maximum amount of gas the execution of this transaction may consume.
    pub gas_limit: u64,
    /// Recipient, or create when empty.
    pub to: TxKind,
    /// Value, in wei, transferred to the recipient.
    pub value: U256,
    /// Input data.
    pub input: Bytes,
    /// Signature parity byte.
    pub v: u64,
    /// Signature `r` value.
    pub r: U256,
    /// Signature `s` value.
    pub s: U256,
}

impl TransactionSigned {
    /// Recomputes the transaction hash from the canonical encoding.
    pub fn hash_slow(&self) -> TxHash {
        keccak256(alloy_rlp::encode(self))
    }

    /// The length of the canonical encoding in bytes.
    pub fn encoded_length(&self) -> usize {
        alloy_rlp::Encodable::length(self)
    }
}
