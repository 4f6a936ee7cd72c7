use alloy_primitives::{TxHash, B256};

/// Describes which blocks left and joined the canonical chain as the result
/// of one import, together with the transactions the imported block carried.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportRoute {
    /// Hashes of blocks that left the canonical chain, tip first.
    pub dead: Vec<B256>,
    /// Hashes of blocks that joined the canonical chain, ancestor first.
    pub live: Vec<B256>,
    /// Hashes of the transactions carried by the imported block.
    pub transactions: Vec<TxHash>,
}

impl ImportRoute {
    /// Route of an import that did not change canonical membership.
    pub fn none() -> Self {
        Self::default()
    }

    /// Whether the import changed canonical membership at all.
    pub fn is_empty(&self) -> bool {
        self.dead.is_empty() && self.live.is_empty()
    }

    /// Folds another route into this one, in import order.
    pub fn merge(&mut self, other: Self) {
        self.dead.extend(other.dead);
        self.live.extend(other.live);
        self.transactions.extend(other.transactions);
    }
}
