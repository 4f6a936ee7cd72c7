//! Offline repair of the chain database: index rebuild, head truncation and
//! head rescue.

use crate::{blockchain::BEST_KEY, blooms::BloomOverlay, BlockChain, ChainError};
use alloy_primitives::{BlockNumber, Bloom, TxHash, B256, U256};
use alloy_rlp::Decodable;
use chaindb_db::{models::TransactionAddress, tables, WriteBatch};
use chaindb_primitives::Block;
use std::collections::{HashMap, VecDeque};
use tracing::{info, warn};

/// Header-level metadata of one stored block, gathered by scanning the
/// blocks store.
#[derive(Debug)]
struct BlockMeta {
    number: BlockNumber,
    parent: B256,
    difficulty: U256,
    bloom: Bloom,
    tx_hashes: Vec<TxHash>,
}

impl BlockChain {
    /// Truncates the canonical head to `new_head`.
    ///
    /// Clears the transaction locators, canonical number entries and bloom
    /// slots of every block above `new_head`; block bytes are retained.
    pub fn rewind(&self, new_head: BlockNumber) -> Result<(), ChainError> {
        let _import = self.import_guard();

        let (_, best_number) = self.current_info();
        if new_head >= best_number {
            return Ok(())
        }
        let target = self.number_hash(new_head)?.ok_or_else(|| {
            ChainError::InvariantViolation(format!("no canonical block at {new_head}"))
        })?;

        let mut extras = WriteBatch::new();
        let mut overlay = BloomOverlay::new(false);
        for number in (new_head + 1)..=best_number {
            let Some(hash) = self.number_hash(number)? else { continue };
            if let Some(block) = self.sealed_block(hash)? {
                for tx_hash in block.transaction_hashes() {
                    extras.delete(tables::transaction_address_key(tx_hash));
                }
            }
            extras.delete(tables::block_hash_key(number));
            overlay.replace(self, number, Bloom::default())?;
        }
        overlay.rebuild_upper(self)?;
        overlay.flush(&mut extras);
        extras.put(BEST_KEY, target.as_slice());

        self.extras_store().write(extras)?;

        self.garbage_collect(true);
        self.set_best(target, new_head);
        info!(target: "chain", number = new_head, hash = ?target, "rewound canonical head");
        Ok(())
    }

    /// Restores a usable head after index corruption.
    ///
    /// Scans the blocks store for the highest-numbered block whose parent
    /// chain reaches genesis with consistent total difficulty, adopts it as
    /// the head, rewrites the canonical indexes along its chain, and clears
    /// index entries beyond it.
    pub fn rescue(&self) -> Result<(), ChainError> {
        let _import = self.import_guard();

        let metas = self.scan_block_metadata()?;
        let genesis_hash = self.genesis_hash();

        let mut candidates: Vec<(&B256, &BlockMeta)> = metas.iter().collect();
        candidates.sort_by(|a, b| b.1.number.cmp(&a.1.number).then(a.0.cmp(b.0)));

        let mut adopted = None;
        'candidates: for (hash, _) in candidates {
            let mut cursor = *hash;
            loop {
                let Some(meta) = metas.get(&cursor) else { continue 'candidates };
                let Some(details) = self.details(cursor)? else { continue 'candidates };
                if details.number != meta.number {
                    continue 'candidates
                }
                if meta.number == 0 {
                    if cursor == genesis_hash {
                        break
                    }
                    continue 'candidates
                }
                let Some(parent_meta) = metas.get(&meta.parent) else { continue 'candidates };
                if parent_meta.number + 1 != meta.number {
                    continue 'candidates
                }
                let Some(parent_details) = self.details(meta.parent)? else {
                    continue 'candidates
                };
                if details.total_difficulty !=
                    parent_details.total_difficulty + meta.difficulty
                {
                    continue 'candidates
                }
                cursor = meta.parent;
            }
            adopted = Some(*hash);
            break
        }

        let head = adopted.ok_or_else(|| {
            ChainError::InvariantViolation("no consistent chain reaches genesis".into())
        })?;
        let head_number = metas[&head].number;
        let (_, old_best_number) = self.current_info();

        let mut extras = WriteBatch::new();
        let mut overlay = BloomOverlay::new(false);

        // Clear index entries beyond the adopted head.
        for number in (head_number + 1)..=old_best_number.max(head_number) {
            let Some(hash) = self.number_hash(number)? else { continue };
            if let Some(meta) = metas.get(&hash) {
                for tx_hash in &meta.tx_hashes {
                    extras.delete(tables::transaction_address_key(*tx_hash));
                }
            }
            extras.delete(tables::block_hash_key(number));
            overlay.replace(self, number, Bloom::default())?;
        }

        self.write_canonical_indexes(head, &metas, &mut extras, &mut overlay)?;
        overlay.rebuild_upper(self)?;
        overlay.flush(&mut extras);
        extras.put(BEST_KEY, head.as_slice());

        self.extras_store().write(extras)?;

        self.garbage_collect(true);
        self.set_best(head, head_number);
        info!(target: "chain", number = head_number, hash = ?head, "rescued chain head");
        Ok(())
    }

    /// Reconstructs every derived index from the block data alone.
    ///
    /// Blocks are replayed in parent-graph order (breadth-first from
    /// genesis), not number order, recomputing details and total
    /// difficulties; persisted receipts and per-block blooms are reused
    /// rather than re-executing transactions. The canonical chain is chosen
    /// by greatest total difficulty and its indexes rewritten from scratch.
    ///
    /// `progress` receives `(done, total)` after each replayed block;
    /// returning `false` cancels the rebuild before anything is committed.
    pub fn rebuild(
        &self,
        progress: &mut dyn FnMut(u64, u64) -> bool,
    ) -> Result<(), ChainError> {
        let _import = self.import_guard();

        let metas = self.scan_block_metadata()?;
        let total = metas.len() as u64;
        let genesis_hash = self.genesis_hash();
        if !metas.contains_key(&genesis_hash) {
            return Err(ChainError::InvariantViolation("genesis missing from block store".into()))
        }

        let mut children: HashMap<B256, Vec<B256>> = HashMap::new();
        for (hash, meta) in &metas {
            if *hash != genesis_hash {
                children.entry(meta.parent).or_default().push(*hash);
            }
        }
        for siblings in children.values_mut() {
            siblings.sort();
        }

        let mut extras = WriteBatch::new();

        // Drop every derived record; per-block receipts and log blooms stay
        // valid regardless of canonical membership and are kept.
        let mut stale = Vec::new();
        self.extras_store().for_each(&mut |key, _| {
            let derived = match key.len() {
                33 => matches!(key[32], 0 | 2 | 5),
                9 => key[8] == 1,
                _ => false,
            };
            if derived {
                stale.push(key.to_vec());
            }
            true
        })?;
        for key in stale {
            extras.delete(key);
        }

        // Breadth-first replay over the parent graph.
        let mut totals: HashMap<B256, U256> = HashMap::new();
        totals.insert(genesis_hash, metas[&genesis_hash].difficulty);
        let mut queue = VecDeque::from([genesis_hash]);
        let mut done = 0u64;
        let mut best = (genesis_hash, metas[&genesis_hash].number, totals[&genesis_hash]);

        while let Some(hash) = queue.pop_front() {
            let meta = &metas[&hash];
            let block_children = children.get(&hash).cloned().unwrap_or_default();
            let total_difficulty = totals[&hash];

            let details = chaindb_db::models::BlockDetails {
                number: meta.number,
                total_difficulty,
                parent: meta.parent,
                children: block_children.clone(),
            };
            extras.put(tables::details_key(hash), alloy_rlp::encode(&details));

            let (_, best_number, best_td) = best;
            if total_difficulty > best_td ||
                (total_difficulty == best_td && meta.number < best_number)
            {
                best = (hash, meta.number, total_difficulty);
            }

            for child in block_children {
                totals.insert(child, total_difficulty + metas[&child].difficulty);
                queue.push_back(child);
            }

            done += 1;
            if !progress(done, total) {
                return Err(ChainError::Cancelled)
            }
        }
        if done < total {
            warn!(
                target: "chain",
                orphaned = total - done,
                "blocks unreachable from genesis were skipped"
            );
        }

        let (head, head_number, _) = best;
        let mut overlay = BloomOverlay::new(true);
        self.write_canonical_indexes(head, &metas, &mut extras, &mut overlay)?;
        overlay.rebuild_upper(self)?;
        overlay.flush(&mut extras);
        extras.put(BEST_KEY, head.as_slice());

        self.extras_store().write(extras)?;

        self.garbage_collect(true);
        self.set_best(head, head_number);
        info!(target: "chain", number = head_number, hash = ?head, replayed = done, "rebuilt extras");
        Ok(())
    }

    fn scan_block_metadata(&self) -> Result<HashMap<B256, BlockMeta>, ChainError> {
        let mut metas = HashMap::new();
        let mut undecodable = 0usize;
        self.blocks_store().for_each(&mut |key, value| {
            if key.len() != 32 {
                return true
            }
            let hash = B256::from_slice(key);
            match Block::decode(&mut &value[..]) {
                Ok(block) => {
                    metas.insert(
                        hash,
                        BlockMeta {
                            number: block.header.number,
                            parent: block.header.parent_hash,
                            difficulty: block.header.difficulty,
                            bloom: block.header.logs_bloom,
                            tx_hashes: block
                                .transactions
                                .iter()
                                .map(|tx| tx.hash_slow())
                                .collect(),
                        },
                    );
                }
                Err(_) => undecodable += 1,
            }
            true
        })?;
        if undecodable > 0 {
            warn!(target: "chain", undecodable, "skipped undecodable block records");
        }
        Ok(metas)
    }

    /// Walks from `head` down to genesis writing the canonical number
    /// mapping, transaction locators and level-0 bloom slots.
    fn write_canonical_indexes(
        &self,
        head: B256,
        metas: &HashMap<B256, BlockMeta>,
        extras: &mut WriteBatch,
        overlay: &mut BloomOverlay,
    ) -> Result<(), ChainError> {
        let mut cursor = head;
        loop {
            let meta = metas.get(&cursor).ok_or_else(|| {
                ChainError::InvariantViolation(format!("missing block body for {cursor}"))
            })?;
            extras.put(tables::block_hash_key(meta.number), alloy_rlp::encode(&cursor));
            for (index, tx_hash) in meta.tx_hashes.iter().enumerate() {
                let address = TransactionAddress { block_hash: cursor, index: index as u64 };
                extras.put(
                    tables::transaction_address_key(*tx_hash),
                    alloy_rlp::encode(&address),
                );
            }
            overlay.replace(self, meta.number, meta.bloom)?;
            if meta.number == 0 {
                break
            }
            cursor = meta.parent;
        }
        Ok(())
    }
}
