use alloy_primitives::{BlockNumber, B256};
use std::{
    collections::{HashSet, VecDeque},
    time::{Duration, Instant},
};

/// Number of recent-use generations tracked before a key becomes eligible
/// for eviction.
pub(crate) const CACHE_GENERATIONS: usize = 10;

/// Interval after which an unforced [`garbage_collect`] performs a full
/// eviction anyway.
///
/// [`garbage_collect`]: crate::BlockChain::garbage_collect
pub(crate) const COLLECTION_INTERVAL: Duration = Duration::from_secs(120);

/// Identity of one cached entry across all cache maps.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum CacheId {
    Block(B256),
    Details(B256),
    LogBlooms(B256),
    Receipts(B256),
    TransactionAddress(B256),
    BlockHash(BlockNumber),
    BloomGroup(B256),
}

/// Generational record of recently used cache keys.
///
/// Keys live in the newest generation they were used in; rotating past the
/// capacity expires the oldest generation, and any key still in it has not
/// been touched for a full window and is evicted.
#[derive(Debug)]
pub(crate) struct CacheUsage {
    generations: VecDeque<HashSet<CacheId>>,
    last_collection: Instant,
}

impl CacheUsage {
    pub(crate) fn new() -> Self {
        let mut generations = VecDeque::with_capacity(CACHE_GENERATIONS + 1);
        generations.push_front(HashSet::new());
        Self { generations, last_collection: Instant::now() }
    }

    /// Marks `id` as used in the current generation.
    pub(crate) fn note(&mut self, id: CacheId) {
        let newest = self.generations.front_mut().expect("at least one generation");
        if newest.contains(&id) {
            return
        }
        newest.insert(id.clone());
        for generation in self.generations.iter_mut().skip(1) {
            generation.remove(&id);
        }
    }

    /// Opens a new generation and returns the expired one, if the window is
    /// full.
    pub(crate) fn rotate(&mut self) -> Option<HashSet<CacheId>> {
        self.generations.push_front(HashSet::new());
        if self.generations.len() > CACHE_GENERATIONS {
            self.generations.pop_back()
        } else {
            None
        }
    }

    /// Whether a full collection is due.
    pub(crate) fn collection_due(&self) -> bool {
        self.last_collection.elapsed() >= COLLECTION_INTERVAL
    }

    /// Resets the usage window after a full collection.
    pub(crate) fn reset(&mut self) {
        self.generations.clear();
        self.generations.push_front(HashSet::new());
        self.last_collection = Instant::now();
    }
}

/// Entry counts of the in-memory caches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Statistics {
    /// Cached raw blocks.
    pub blocks: usize,
    /// Cached block details.
    pub details: usize,
    /// Cached per-block log bloom records.
    pub log_blooms: usize,
    /// Cached receipt records.
    pub receipts: usize,
    /// Cached transaction locators.
    pub transaction_addresses: usize,
    /// Cached canonical number-to-hash entries.
    pub block_hashes: usize,
    /// Cached bloom index chunks.
    pub bloom_groups: usize,
}

impl Statistics {
    /// Total cached entries across every map.
    pub fn total(&self) -> usize {
        self.blocks +
            self.details +
            self.log_blooms +
            self.receipts +
            self.transaction_addresses +
            self.block_hashes +
            self.bloom_groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_expires_untouched_keys() {
        let mut usage = CacheUsage::new();
        let id = CacheId::Details(B256::repeat_byte(1));
        usage.note(id.clone());

        // The key expires after a full window of rotations without re-use.
        for _ in 0..CACHE_GENERATIONS - 1 {
            assert_eq!(usage.rotate(), None);
        }
        let expired = usage.rotate().unwrap();
        assert!(expired.contains(&id));
    }

    #[test]
    fn re_use_moves_key_to_newest_generation() {
        let mut usage = CacheUsage::new();
        let id = CacheId::Block(B256::repeat_byte(2));
        usage.note(id.clone());

        for _ in 0..CACHE_GENERATIONS - 1 {
            usage.rotate();
        }
        // Touch the key right before its generation would expire.
        usage.note(id.clone());
        let expired = usage.rotate().unwrap_or_default();
        assert!(!expired.contains(&id));
    }
}
