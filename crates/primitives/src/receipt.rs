use alloy_primitives::{logs_bloom, Bloom, Log, B256};
use alloy_rlp::{length_of_length, BufMut, Decodable, Encodable};
use serde::{Deserialize, Serialize};

/// Receipt containing the result of a transaction's execution.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Receipt {
    /// Root of the state trie after this transaction executed.
    pub state_root: B256,
    /// Gas used by the block up to and including this transaction.
    pub cumulative_gas_used: u64,
    /// Logs sent from contracts.
    pub logs: Vec<Log>,
}

impl Receipt {
    /// Calculates the bloom filter of the receipt's logs. This is a slow
    /// operation; [`ReceiptWithBloom`] caches the result.
    pub fn bloom_slow(&self) -> Bloom {
        logs_bloom(self.logs.iter())
    }

    /// Computes the logs bloom and returns the caching container type.
    pub fn with_bloom(self) -> ReceiptWithBloom {
        self.into()
    }
}

/// [`Receipt`] with the memoized bloom filter of its logs.
///
/// The canonical encoding is the four-field RLP list
/// `[state_root, cumulative_gas_used, bloom, logs]`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReceiptWithBloom {
    /// The receipt.
    pub receipt: Receipt,
    /// The memoized bloom of the receipt's logs.
    pub bloom: Bloom,
}

impl From<Receipt> for ReceiptWithBloom {
    fn from(receipt: Receipt) -> Self {
        let bloom = receipt.bloom_slow();
        Self { receipt, bloom }
    }
}

impl ReceiptWithBloom {
    fn payload_length(&self) -> usize {
        self.receipt.state_root.length() +
            self.receipt.cumulative_gas_used.length() +
            self.bloom.length() +
            self.receipt.logs.length()
    }
}

impl Encodable for ReceiptWithBloom {
    fn encode(&self, out: &mut dyn BufMut) {
        let payload_length = self.payload_length();
        alloy_rlp::Header { list: true, payload_length }.encode(out);
        self.receipt.state_root.encode(out);
        self.receipt.cumulative_gas_used.encode(out);
        self.bloom.encode(out);
        self.receipt.logs.encode(out);
    }

    fn length(&self) -> usize {
        let payload_length = self.payload_length();
        payload_length + length_of_length(payload_length) + 1
    }
}

impl Decodable for ReceiptWithBloom {
    fn decode(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        let header = alloy_rlp::Header::decode(buf)?;
        if !header.list {
            return Err(alloy_rlp::Error::UnexpectedString)
        }
        let started_len = buf.len();

        let state_root = Decodable::decode(buf)?;
        let cumulative_gas_used = Decodable::decode(buf)?;
        let bloom = Decodable::decode(buf)?;
        let logs = Decodable::decode(buf)?;

        let consumed = started_len - buf.len();
        if consumed != header.payload_length {
            return Err(alloy_rlp::Error::ListLengthMismatch {
                expected: header.payload_length,
                got: consumed,
            })
        }

        Ok(Self { receipt: Receipt { state_root, cumulative_gas_used, logs }, bloom })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, LogData};

    fn sample_receipt() -> Receipt {
        Receipt {
            state_root: B256::repeat_byte(0xaa),
            cumulative_gas_used: 21_000,
            logs: vec![Log {
                address: Address::repeat_byte(0x11),
                data: LogData::new_unchecked(vec![B256::repeat_byte(0x22)], Default::default()),
            }],
        }
    }

    #[test]
    fn receipt_rlp_roundtrip() {
        let receipt = sample_receipt().with_bloom();
        let encoded = alloy_rlp::encode(&receipt);
        assert_eq!(encoded.len(), receipt.length());
        let decoded = ReceiptWithBloom::decode(&mut encoded.as_slice()).unwrap();
        assert_eq!(receipt, decoded);
    }

    #[test]
    fn bloom_covers_log_address() {
        let receipt = sample_receipt();
        let bloom = receipt.bloom_slow();
        assert_ne!(bloom, Bloom::ZERO);
        // A receipt without logs has an empty bloom.
        assert_eq!(Receipt::default().bloom_slow(), Bloom::ZERO);
    }
}
