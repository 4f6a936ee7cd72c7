//! The hierarchical block-bloom index.
//!
//! Level 0 chunk `i` stores the block-level blooms of numbers
//! `[i*16, (i+1)*16)`; each bloom of a level-`n` chunk is the OR of one full
//! chunk of level `n - 1`. Queries descend from the top level, scanning only
//! chunks whose aggregated bloom matches.

use crate::{cache::CacheId, BlockChain, ChainError};
use alloy_primitives::{BlockNumber, Bloom, B256};
use chaindb_db::{models::BloomGroup, tables, WriteBatch};
use chaindb_primitives::constants::{BLOOM_INDEX_SIZE, BLOOM_LEVELS};
use std::collections::{HashMap, HashSet};

/// Whether `outer` has every bit of `inner` set.
fn contains_bloom(outer: &Bloom, inner: &Bloom) -> bool {
    outer.as_slice().iter().zip(inner.as_slice()).all(|(o, i)| o & i == *i)
}

impl BlockChain {
    /// The bloom chunk at the given level and index.
    pub fn blocks_blooms(&self, level: u32, index: u64) -> Result<BloomGroup, ChainError> {
        self.bloom_group(tables::chunk_id(level, index))
    }

    pub(crate) fn bloom_group(&self, chunk: B256) -> Result<BloomGroup, ChainError> {
        Ok(self
            .query_extras(
                chunk,
                &self.bloom_group_cache,
                tables::blooms_chunk_key(chunk),
                CacheId::BloomGroup,
            )?
            .unwrap_or_else(BloomGroup::empty))
    }

    /// The canonical block-level bloom of `number`.
    ///
    /// For a canonical block this equals the header's logs bloom; slots of
    /// numbers beyond the head carry stale data until the next reorg or
    /// rewind overwrites them.
    pub fn block_bloom(&self, number: BlockNumber) -> Result<Bloom, ChainError> {
        let group = self.blocks_blooms(0, number / BLOOM_INDEX_SIZE)?;
        Ok(group.bloom_at((number % BLOOM_INDEX_SIZE) as usize))
    }

    /// Block numbers within `[from, to]` whose canonical bloom covers every
    /// bit of `bloom`, ascending.
    pub fn with_block_bloom(
        &self,
        bloom: &Bloom,
        from: BlockNumber,
        to: BlockNumber,
    ) -> Result<Vec<BlockNumber>, ChainError> {
        let mut numbers = Vec::new();
        let top_span = BLOOM_INDEX_SIZE.pow(BLOOM_LEVELS);
        for index in (from / top_span)..=(to / top_span) {
            self.with_block_bloom_in(bloom, from, to, BLOOM_LEVELS - 1, index, &mut numbers)?;
        }
        Ok(numbers)
    }

    fn with_block_bloom_in(
        &self,
        bloom: &Bloom,
        from: BlockNumber,
        to: BlockNumber,
        level: u32,
        index: u64,
        numbers: &mut Vec<BlockNumber>,
    ) -> Result<(), ChainError> {
        // Span of this chunk and of each of its slots, in blocks.
        let coarse = BLOOM_INDEX_SIZE.pow(level + 1);
        let fine = BLOOM_INDEX_SIZE.pow(level);

        let begin = if index == from / coarse { (from / fine) % BLOOM_INDEX_SIZE } else { 0 };
        let end =
            if index == to / coarse { (to / fine) % BLOOM_INDEX_SIZE + 1 } else { BLOOM_INDEX_SIZE };

        let group = self.blocks_blooms(level, index)?;
        for slot in begin..end {
            if contains_bloom(&group.bloom_at(slot as usize), bloom) {
                if level > 0 {
                    self.with_block_bloom_in(
                        bloom,
                        from,
                        to,
                        level - 1,
                        index * BLOOM_INDEX_SIZE + slot,
                        numbers,
                    )?;
                } else {
                    numbers.push(index * BLOOM_INDEX_SIZE + slot);
                }
            }
        }
        Ok(())
    }
}

/// Staged mutations of the bloom hierarchy, flushed into a write batch
/// alongside the rest of an import or maintenance operation.
#[derive(Debug)]
pub(crate) struct BloomOverlay {
    pending: HashMap<B256, BloomGroup>,
    /// Level-0 numbers whose slots were replaced; upper levels covering them
    /// are recomputed by [`Self::rebuild_upper`].
    changed: HashSet<BlockNumber>,
    /// When set, the backing store is treated as empty. Used by rebuild,
    /// which discards every existing chunk.
    fresh: bool,
}

impl BloomOverlay {
    pub(crate) fn new(fresh: bool) -> Self {
        Self { pending: HashMap::new(), changed: HashSet::new(), fresh }
    }

    fn load(&self, chain: &BlockChain, chunk: B256) -> Result<BloomGroup, ChainError> {
        if let Some(group) = self.pending.get(&chunk) {
            return Ok(group.clone())
        }
        if self.fresh {
            return Ok(BloomGroup::empty())
        }
        chain.bloom_group(chunk)
    }

    fn group_mut(
        &mut self,
        chain: &BlockChain,
        chunk: B256,
    ) -> Result<&mut BloomGroup, ChainError> {
        if !self.pending.contains_key(&chunk) {
            let group =
                if self.fresh { BloomGroup::empty() } else { chain.bloom_group(chunk)? };
            self.pending.insert(chunk, group);
        }
        Ok(self.pending.get_mut(&chunk).expect("inserted above"))
    }

    /// ORs the bloom of a block extending the canonical chain into every
    /// level.
    pub(crate) fn accrue(
        &mut self,
        chain: &BlockChain,
        number: BlockNumber,
        bloom: Bloom,
    ) -> Result<(), ChainError> {
        for level in 0..BLOOM_LEVELS {
            let fine = BLOOM_INDEX_SIZE.pow(level);
            let index = number / (fine * BLOOM_INDEX_SIZE);
            let slot = ((number / fine) % BLOOM_INDEX_SIZE) as usize;
            self.group_mut(chain, tables::chunk_id(level, index))?.accrue_at(slot, bloom);
        }
        Ok(())
    }

    /// Replaces the level-0 slot of `number` with the new canonical bloom
    /// (zero for numbers leaving the chain); the affected upper levels are
    /// recomputed by [`Self::rebuild_upper`].
    pub(crate) fn replace(
        &mut self,
        chain: &BlockChain,
        number: BlockNumber,
        bloom: Bloom,
    ) -> Result<(), ChainError> {
        self.changed.insert(number);
        let chunk = tables::chunk_id(0, number / BLOOM_INDEX_SIZE);
        let slot = (number % BLOOM_INDEX_SIZE) as usize;
        self.group_mut(chain, chunk)?.replace_at(slot, bloom);
        Ok(())
    }

    /// Recomputes every upper-level slot covering a replaced number,
    /// bottom-up, from the level below.
    pub(crate) fn rebuild_upper(&mut self, chain: &BlockChain) -> Result<(), ChainError> {
        for level in 1..BLOOM_LEVELS {
            let fine = BLOOM_INDEX_SIZE.pow(level);
            let mut slots: HashSet<(u64, usize)> = HashSet::new();
            for number in &self.changed {
                slots.insert((
                    number / (fine * BLOOM_INDEX_SIZE),
                    ((number / fine) % BLOOM_INDEX_SIZE) as usize,
                ));
            }
            for (index, slot) in slots {
                let lower_chunk =
                    tables::chunk_id(level - 1, index * BLOOM_INDEX_SIZE + slot as u64);
                let lower = self.load(chain, lower_chunk)?;
                let mut aggregated = Bloom::default();
                for bloom in &lower.blooms {
                    aggregated.accrue_bloom(bloom);
                }
                self.group_mut(chain, tables::chunk_id(level, index))?
                    .replace_at(slot, aggregated);
            }
        }
        Ok(())
    }

    /// Stages every touched chunk into the batch and returns the chunks for
    /// post-commit cache reconciliation.
    pub(crate) fn flush(self, batch: &mut WriteBatch) -> Vec<(B256, BloomGroup)> {
        for (chunk, group) in &self.pending {
            batch.put(tables::blooms_chunk_key(*chunk), alloy_rlp::encode(group));
        }
        self.pending.into_iter().collect()
    }
}
