use crate::{
    blooms::BloomOverlay,
    cache::{CacheId, CacheUsage, Statistics},
    ChainError, ImportError, ImportResult, ImportRoute, StateDb,
};
use alloy_primitives::{BlockNumber, TxHash, B256, U256};
use alloy_rlp::Decodable;
use chaindb_consensus::{validation, ConsensusError, SealEngine};
use chaindb_db::{
    check_version,
    models::{BlockDetails, BlockLogBlooms, BlockReceipts, BloomGroup, TransactionAddress},
    tables, write_version, KeyValueStore, MemoryStore, RocksStore, StoreError, VersionStatus,
    WithExisting, WriteBatch,
};
use chaindb_primitives::{
    constants::ALLOWED_FUTURE_BLOCK_TIME_SECONDS, proofs, Block, ChainSpec, Header,
    ReceiptWithBloom, SealedBlock, SealedHeader,
};
use parking_lot::{Mutex, RwLock};
use std::{
    collections::{HashMap, HashSet},
    hash::Hash,
    path::{Path, PathBuf},
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};
use tracing::{debug, info, trace, warn};

/// Raw extras key of the head pointer. Extras schema keys are 9 or 33 bytes
/// long, so short raw keys cannot collide.
pub(crate) const BEST_KEY: &[u8] = b"best";
/// Raw extras key of the first block number of a partial chain.
pub(crate) const CHAIN_START_KEY: &[u8] = b"chain-start";

/// How many ancestor hashes [`BlockChain::last_block_hashes`] reports.
const LAST_HASHES_DEPTH: u64 = 256;

const BLOCKS_DIR: &str = "blocks";
const EXTRAS_DIR: &str = "extras";

#[derive(Debug, Clone, Copy)]
struct BestBlock {
    hash: B256,
    number: BlockNumber,
}

type LastHashesMemo = Option<(B256, Vec<B256>)>;

/// The blockchain database. All data is disk-backed; reads go through
/// size-bounded caches and a single writer at a time mutates the chain.
pub struct BlockChain {
    spec: ChainSpec,
    engine: Arc<dyn SealEngine>,

    blocks_db: Arc<dyn KeyValueStore>,
    extras_db: Arc<dyn KeyValueStore>,
    path: Option<PathBuf>,

    genesis: SealedHeader,

    block_cache: RwLock<HashMap<B256, Vec<u8>>>,
    details_cache: RwLock<HashMap<B256, BlockDetails>>,
    log_blooms_cache: RwLock<HashMap<B256, BlockLogBlooms>>,
    receipts_cache: RwLock<HashMap<B256, BlockReceipts>>,
    transaction_address_cache: RwLock<HashMap<B256, TransactionAddress>>,
    block_hash_cache: RwLock<HashMap<BlockNumber, B256>>,
    pub(crate) bloom_group_cache: RwLock<HashMap<B256, BloomGroup>>,

    cache_usage: Mutex<CacheUsage>,

    /// Hash and number of the head are read together; one lock keeps them
    /// consistent.
    best: RwLock<BestBlock>,
    last_hashes: Mutex<LastHashesMemo>,

    import_lock: Mutex<()>,

    on_bad: RwLock<Option<Box<dyn Fn(&ImportError) + Send + Sync>>>,
    on_block_import: RwLock<Option<Box<dyn Fn(&SealedHeader) + Send + Sync>>>,
}

impl std::fmt::Debug for BlockChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let best = self.best.read();
        f.debug_struct("BlockChain")
            .field("genesis", &self.genesis.hash())
            .field("best_hash", &best.hash)
            .field("best_number", &best.number)
            .finish()
    }
}

impl BlockChain {
    /// Opens a memory-backed chain seeded with the genesis block. Used by
    /// tests and ephemeral deployments.
    pub fn in_memory(
        spec: ChainSpec,
        engine: Arc<dyn SealEngine>,
    ) -> Result<Self, ChainError> {
        Self::with_stores(
            spec,
            engine,
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryStore::new()),
            None,
        )
    }

    /// Opens (or creates) the disk-backed chain under `path`.
    ///
    /// A version sentinel beside the `blocks/` and `extras/` directories
    /// records the schema version and genesis hash. On mismatch,
    /// [`WithExisting::Kill`] destroys the stores and starts fresh,
    /// [`WithExisting::Rescue`] opens them and runs a rescue, and the
    /// remaining policies refuse to open.
    pub fn open(
        spec: ChainSpec,
        engine: Arc<dyn SealEngine>,
        path: &Path,
        with_existing: WithExisting,
    ) -> Result<Self, ChainError> {
        let genesis_hash = spec.genesis_hash();

        if with_existing == WithExisting::Kill {
            Self::destroy(path)?;
        }

        match check_version(path, genesis_hash)? {
            VersionStatus::Fresh => write_version(path, genesis_hash)?,
            VersionStatus::Matches => {}
            VersionStatus::Mismatch => match with_existing {
                WithExisting::Rescue => {
                    warn!(target: "chain", "version sentinel mismatch, attempting rescue");
                    write_version(path, genesis_hash)?;
                }
                _ => {
                    return Err(ChainError::InvariantViolation(
                        "database version or genesis mismatch; reopen with \
                         WithExisting::Kill or WithExisting::Rescue"
                            .into(),
                    ))
                }
            },
        }

        let blocks = RocksStore::open(path.join(BLOCKS_DIR))?;
        let extras = RocksStore::open(path.join(EXTRAS_DIR))?;
        let chain = Self::with_stores(
            spec,
            engine,
            Arc::new(blocks),
            Arc::new(extras),
            Some(path.to_path_buf()),
        )?;

        if with_existing == WithExisting::Rescue {
            chain.rescue()?;
        }
        Ok(chain)
    }

    /// Destroys the on-disk stores under `path`.
    pub fn destroy(path: &Path) -> Result<(), ChainError> {
        for dir in [BLOCKS_DIR, EXTRAS_DIR] {
            let dir = path.join(dir);
            if dir.exists() {
                RocksStore::destroy(&dir)?;
            }
        }
        let sentinel = path.join("version.json");
        if sentinel.exists() {
            std::fs::remove_file(sentinel)
                .map_err(|err| StoreError::Version(err.to_string()))?;
        }
        Ok(())
    }

    /// Drops and re-creates the underlying stores.
    pub fn reopen(&mut self, with_existing: WithExisting) -> Result<(), ChainError> {
        let spec = self.spec.clone();
        let engine = self.engine.clone();
        let path = self.path.clone();
        // Release the store handles first; the disk backend locks its
        // directory while open.
        self.blocks_db = Arc::new(MemoryStore::new());
        self.extras_db = Arc::new(MemoryStore::new());
        *self = match path {
            Some(path) => Self::open(spec, engine, &path, with_existing)?,
            None => Self::in_memory(spec, engine)?,
        };
        Ok(())
    }

    /// Releases the chain and its stores.
    pub fn close(self) {}

    fn with_stores(
        spec: ChainSpec,
        engine: Arc<dyn SealEngine>,
        blocks_db: Arc<dyn KeyValueStore>,
        extras_db: Arc<dyn KeyValueStore>,
        path: Option<PathBuf>,
    ) -> Result<Self, ChainError> {
        let genesis = spec.genesis_header().seal_slow();
        let chain = Self {
            spec,
            engine,
            blocks_db,
            extras_db,
            path,
            best: RwLock::new(BestBlock { hash: genesis.hash(), number: 0 }),
            genesis,
            block_cache: Default::default(),
            details_cache: Default::default(),
            log_blooms_cache: Default::default(),
            receipts_cache: Default::default(),
            transaction_address_cache: Default::default(),
            block_hash_cache: Default::default(),
            bloom_group_cache: Default::default(),
            cache_usage: Mutex::new(CacheUsage::new()),
            last_hashes: Mutex::new(None),
            import_lock: Mutex::new(()),
            on_bad: RwLock::new(None),
            on_block_import: RwLock::new(None),
        };
        chain.ensure_genesis()?;
        chain.load_best()?;
        Ok(chain)
    }

    fn ensure_genesis(&self) -> Result<(), ChainError> {
        let genesis_hash = self.genesis.hash();
        if self.blocks_db.get(genesis_hash.as_slice())?.is_some() {
            return Ok(())
        }

        let block = Block { header: self.genesis.header().clone(), ..Default::default() };
        let mut blocks = WriteBatch::new();
        blocks.put(genesis_hash.as_slice(), alloy_rlp::encode(&block));

        let details = BlockDetails {
            number: 0,
            total_difficulty: self.genesis.difficulty,
            parent: B256::ZERO,
            children: Vec::new(),
        };
        let mut extras = WriteBatch::new();
        extras.put(tables::details_key(genesis_hash), alloy_rlp::encode(&details));
        extras.put(tables::block_hash_key(0), alloy_rlp::encode(&genesis_hash));
        extras.put(BEST_KEY, genesis_hash.as_slice());

        self.blocks_db.write(blocks)?;
        self.extras_db.write(extras)?;
        info!(target: "chain", hash = ?genesis_hash, "seeded genesis block");
        Ok(())
    }

    fn load_best(&self) -> Result<(), ChainError> {
        let raw = self.extras_db.get(BEST_KEY)?.ok_or_else(|| {
            ChainError::InvariantViolation("head pointer missing from extras".into())
        })?;
        if raw.len() != 32 {
            return Err(ChainError::InvariantViolation("head pointer is not a hash".into()))
        }
        let hash = B256::from_slice(&raw);
        let details = self.require_details(hash)?;
        *self.best.write() = BestBlock { hash, number: details.number };
        Ok(())
    }

    /// The chain parameters this chain runs under.
    pub fn spec(&self) -> &ChainSpec {
        &self.spec
    }

    /// The seal engine this chain runs under.
    pub fn engine(&self) -> &dyn SealEngine {
        &*self.engine
    }

    /// The chain identifier.
    pub fn chain_id(&self) -> u64 {
        self.spec.chain_id
    }

    /// Hash of the genesis block.
    pub fn genesis_hash(&self) -> B256 {
        self.genesis.hash()
    }

    /// The sealed genesis header.
    pub fn genesis_header(&self) -> &SealedHeader {
        &self.genesis
    }

    /// Hash of the head of the canonical chain.
    pub fn current_hash(&self) -> B256 {
        self.best.read().hash
    }

    /// Number of the head of the canonical chain.
    pub fn current_number(&self) -> BlockNumber {
        self.best.read().number
    }

    /// Hash and number of the head, read consistently.
    pub fn current_info(&self) -> (B256, BlockNumber) {
        let best = self.best.read();
        (best.hash, best.number)
    }

    /// Registers the hook invoked after every permanently rejected block.
    pub fn set_on_bad(&self, hook: impl Fn(&ImportError) + Send + Sync + 'static) {
        *self.on_bad.write() = Some(Box::new(hook));
    }

    /// Registers the hook invoked after every successful import.
    pub fn set_on_block_import(&self, hook: impl Fn(&SealedHeader) + Send + Sync + 'static) {
        *self.on_block_import.write() = Some(Box::new(hook));
    }

    // === Queries =========================================================

    /// Returns true if the block is fully known, though not necessarily
    /// canonical.
    pub fn is_known(&self, hash: B256) -> Result<bool, ChainError> {
        Ok(self.details(hash)?.is_some() && self.block(hash)?.is_some())
    }

    /// The raw encoded block, if known.
    pub fn block(&self, hash: B256) -> Result<Option<Vec<u8>>, ChainError> {
        if let Some(bytes) = self.block_cache.read().get(&hash) {
            return Ok(Some(bytes.clone()))
        }
        let Some(bytes) = self.blocks_db.get(hash.as_slice())? else { return Ok(None) };
        self.note_used(CacheId::Block(hash));
        self.block_cache.write().insert(hash, bytes.clone());
        Ok(Some(bytes))
    }

    /// The decoded block sealed under its own hash, if known.
    pub fn sealed_block(&self, hash: B256) -> Result<Option<SealedBlock>, ChainError> {
        let Some(bytes) = self.block(hash)? else { return Ok(None) };
        let block = Block::decode(&mut bytes.as_slice()).map_err(StoreError::Malformed)?;
        Ok(Some(block.seal(hash)))
    }

    /// The canonical encoding of the block's header, if known.
    pub fn header_data(&self, hash: B256) -> Result<Option<Vec<u8>>, ChainError> {
        Ok(self.info(hash)?.map(|header| alloy_rlp::encode(&header)))
    }

    /// The decoded header, if known.
    pub fn info(&self, hash: B256) -> Result<Option<Header>, ChainError> {
        Ok(self.sealed_block(hash)?.map(|block| block.header.unseal()))
    }

    /// Familial details of the block, if known.
    pub fn details(&self, hash: B256) -> Result<Option<BlockDetails>, ChainError> {
        self.query_extras(
            hash,
            &self.details_cache,
            tables::details_key(hash),
            CacheId::Details,
        )
    }

    pub(crate) fn require_details(&self, hash: B256) -> Result<BlockDetails, ChainError> {
        self.details(hash)?.ok_or_else(|| {
            ChainError::InvariantViolation(format!("missing details for block {hash}"))
        })
    }

    /// Per-transaction log blooms of the block, if known.
    pub fn log_blooms(&self, hash: B256) -> Result<Option<BlockLogBlooms>, ChainError> {
        self.query_extras(
            hash,
            &self.log_blooms_cache,
            tables::log_blooms_key(hash),
            CacheId::LogBlooms,
        )
    }

    /// Receipts of the block, in transaction order, if known.
    pub fn receipts(&self, hash: B256) -> Result<Option<BlockReceipts>, ChainError> {
        self.query_extras(
            hash,
            &self.receipts_cache,
            tables::receipts_key(hash),
            CacheId::Receipts,
        )
    }

    /// Canonical block hash of the given number.
    pub fn number_hash(&self, number: BlockNumber) -> Result<Option<B256>, ChainError> {
        if number == 0 {
            return Ok(Some(self.genesis.hash()))
        }
        self.query_extras(
            number,
            &self.block_hash_cache,
            tables::block_hash_key(number),
            CacheId::BlockHash,
        )
    }

    /// Number of the block, if known.
    pub fn number(&self, hash: B256) -> Result<Option<BlockNumber>, ChainError> {
        Ok(self.details(hash)?.map(|details| details.number))
    }

    /// Locator of a canonical transaction by its hash.
    pub fn transaction_location(
        &self,
        tx_hash: TxHash,
    ) -> Result<Option<TransactionAddress>, ChainError> {
        self.query_extras(
            tx_hash,
            &self.transaction_address_cache,
            tables::transaction_address_key(tx_hash),
            CacheId::TransactionAddress,
        )
    }

    /// Whether the transaction is part of the canonical chain.
    pub fn is_known_transaction(&self, tx_hash: TxHash) -> Result<bool, ChainError> {
        Ok(self.transaction_location(tx_hash)?.is_some())
    }

    /// The canonical encoding of a transaction, located by its hash.
    pub fn transaction(&self, tx_hash: TxHash) -> Result<Option<Vec<u8>>, ChainError> {
        let Some(address) = self.transaction_location(tx_hash)? else { return Ok(None) };
        let Some(block) = self.sealed_block(address.block_hash)? else { return Ok(None) };
        Ok(block
            .transactions
            .get(address.index as usize)
            .map(|tx| alloy_rlp::encode(tx)))
    }

    /// The receipt of a transaction, located by its hash.
    pub fn transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> Result<Option<ReceiptWithBloom>, ChainError> {
        let Some(address) = self.transaction_location(tx_hash)? else { return Ok(None) };
        let Some(receipts) = self.receipts(address.block_hash)? else { return Ok(None) };
        Ok(receipts.receipts.into_iter().nth(address.index as usize))
    }

    /// The canonical encodings of every transaction of the block.
    pub fn transactions(&self, hash: B256) -> Result<Option<Vec<Vec<u8>>>, ChainError> {
        Ok(self
            .sealed_block(hash)?
            .map(|block| block.transactions.iter().map(alloy_rlp::encode).collect()))
    }

    /// The hashes of every transaction of the block, in order.
    pub fn transaction_hashes(&self, hash: B256) -> Result<Option<Vec<TxHash>>, ChainError> {
        Ok(self.sealed_block(hash)?.map(|block| block.transaction_hashes()))
    }

    /// The hashes of every ommer of the block, in order.
    pub fn uncle_hashes(&self, hash: B256) -> Result<Option<Vec<B256>>, ChainError> {
        Ok(self.sealed_block(hash)?.map(|block| block.ommer_hashes()))
    }

    /// First block number of the chain; non-zero after a partial-chain
    /// restore.
    pub fn chain_start_block_number(&self) -> Result<BlockNumber, ChainError> {
        let Some(raw) = self.extras_db.get(CHAIN_START_KEY)? else { return Ok(0) };
        let bytes: [u8; 8] = raw.as_slice().try_into().map_err(|_| {
            ChainError::InvariantViolation("chain start record is not a number".into())
        })?;
        Ok(u64::from_be_bytes(bytes))
    }

    /// Overrides the first block number of the chain.
    pub fn set_chain_start_block_number(&self, number: BlockNumber) -> Result<(), ChainError> {
        let mut batch = WriteBatch::new();
        batch.put(CHAIN_START_KEY, number.to_be_bytes().to_vec());
        Ok(self.extras_db.write(batch)?)
    }

    /// The hashes of the most recent canonical blocks, head first, up to 256
    /// entries. Memoized; the memo is invalidated on every canonical change.
    pub fn last_block_hashes(&self) -> Result<Vec<B256>, ChainError> {
        let (head, head_number) = self.current_info();
        {
            let memo = self.last_hashes.lock();
            if let Some((hash, hashes)) = memo.as_ref() {
                if *hash == head {
                    return Ok(hashes.clone())
                }
            }
        }

        let from = head_number.saturating_sub(LAST_HASHES_DEPTH - 1);
        let mut hashes = Vec::with_capacity((head_number - from + 1) as usize);
        for number in (from..=head_number).rev() {
            let hash = self.number_hash(number)?.ok_or_else(|| {
                ChainError::InvariantViolation(format!("canonical hash missing at {number}"))
            })?;
            hashes.push(hash);
        }
        *self.last_hashes.lock() = Some((head, hashes.clone()));
        Ok(hashes)
    }

    pub(crate) fn invalidate_last_hashes(&self) {
        *self.last_hashes.lock() = None;
    }

    // === Caches ==========================================================

    pub(crate) fn query_extras<K, T>(
        &self,
        key: K,
        cache: &RwLock<HashMap<K, T>>,
        db_key: Vec<u8>,
        make_id: fn(K) -> CacheId,
    ) -> Result<Option<T>, ChainError>
    where
        K: Eq + Hash + Copy,
        T: Decodable + Clone,
    {
        if let Some(value) = cache.read().get(&key) {
            return Ok(Some(value.clone()))
        }
        let Some(raw) = self.extras_db.get(&db_key)? else { return Ok(None) };
        let value = T::decode(&mut raw.as_slice()).map_err(StoreError::Malformed)?;
        self.note_used(make_id(key));
        cache.write().insert(key, value.clone());
        Ok(Some(value))
    }

    pub(crate) fn note_used(&self, id: CacheId) {
        self.cache_usage.lock().note(id);
    }

    /// Best-effort periodic tick, to be called roughly every 100 ms.
    ///
    /// Advances the cache-usage generation window, evicting entries that
    /// went a full window without use. Skips entirely while an import holds
    /// the write lock.
    pub fn process(&self) {
        let Some(_import) = self.import_lock.try_lock() else { return };
        let expired = self.cache_usage.lock().rotate();
        if let Some(ids) = expired {
            trace!(target: "chain", evicted = ids.len(), "cache generation expired");
            for id in ids {
                self.evict(&id);
            }
        }
        self.garbage_collect(false);
    }

    /// Evicts every cached entry, either unconditionally (`force`) or when
    /// the last full collection is older than the collection interval.
    pub fn garbage_collect(&self, force: bool) {
        {
            let mut usage = self.cache_usage.lock();
            if !force && !usage.collection_due() {
                return
            }
            usage.reset();
        }
        self.block_cache.write().clear();
        self.details_cache.write().clear();
        self.log_blooms_cache.write().clear();
        self.receipts_cache.write().clear();
        self.transaction_address_cache.write().clear();
        self.block_hash_cache.write().clear();
        self.bloom_group_cache.write().clear();
        self.invalidate_last_hashes();
    }

    fn evict(&self, id: &CacheId) {
        match id {
            CacheId::Block(hash) => {
                self.block_cache.write().remove(hash);
            }
            CacheId::Details(hash) => {
                self.details_cache.write().remove(hash);
            }
            CacheId::LogBlooms(hash) => {
                self.log_blooms_cache.write().remove(hash);
            }
            CacheId::Receipts(hash) => {
                self.receipts_cache.write().remove(hash);
            }
            CacheId::TransactionAddress(hash) => {
                self.transaction_address_cache.write().remove(hash);
            }
            CacheId::BlockHash(number) => {
                self.block_hash_cache.write().remove(number);
            }
            CacheId::BloomGroup(chunk) => {
                self.bloom_group_cache.write().remove(chunk);
            }
        }
    }

    /// Entry counts of the in-memory caches.
    pub fn usage(&self) -> Statistics {
        Statistics {
            blocks: self.block_cache.read().len(),
            details: self.details_cache.read().len(),
            log_blooms: self.log_blooms_cache.read().len(),
            receipts: self.receipts_cache.read().len(),
            transaction_addresses: self.transaction_address_cache.read().len(),
            block_hashes: self.block_hash_cache.read().len(),
            bloom_groups: self.bloom_group_cache.read().len(),
        }
    }

    // === Verification ====================================================

    /// Decodes and fully verifies a candidate block against the chain.
    pub fn verify_block(&self, bytes: &[u8]) -> Result<SealedBlock, ImportError> {
        let block =
            Block::decode(&mut &bytes[..]).map_err(ImportError::Malformed)?.seal_slow();
        self.verify_sealed(&block)?;
        Ok(block)
    }

    fn verify_sealed(&self, block: &SealedBlock) -> Result<(), ImportError> {
        let header = block.header.header();

        validation::validate_header_extra_data(header, &self.spec)?;
        validation::validate_header_gas(header)?;
        validation::validate_timestamp_against_present(
            header,
            unix_now(),
            ALLOWED_FUTURE_BLOCK_TIME_SECONDS,
        )?;

        let parent = self
            .info(header.parent_hash)?
            .ok_or(ImportError::UnknownParent(header.parent_hash))?;
        validation::validate_against_parent_number(header, &parent)?;
        validation::validate_against_parent_timestamp(header, &parent)?;

        let expected = self.engine.calculate_difficulty(header, &parent);
        if header.difficulty != expected {
            return Err(ConsensusError::DifficultyMismatch {
                got: header.difficulty,
                expected,
            }
            .into())
        }
        self.engine.verify_gas_limit(header, &parent)?;

        self.verify_ommers(block)?;
        validation::validate_transactions_root(block)?;
        validation::validate_ommers_hash(block)?;
        self.engine.verify_seal(header)?;
        Ok(())
    }

    /// All hashes disallowed as ommers under `parent`: every ancestor up to
    /// `generations` back, together with the ommers those ancestors quoted.
    pub fn all_kin_from(
        &self,
        parent: B256,
        generations: u64,
    ) -> Result<HashSet<B256>, ChainError> {
        let (ancestors, mut kin) = self.kin_sets(parent, generations)?;
        kin.extend(ancestors);
        Ok(kin)
    }

    fn kin_sets(
        &self,
        parent: B256,
        generations: u64,
    ) -> Result<(HashSet<B256>, HashSet<B256>), ChainError> {
        let mut ancestors = HashSet::new();
        let mut kin = HashSet::new();
        let mut current = parent;
        for _ in 0..=generations {
            ancestors.insert(current);
            let Some(block) = self.sealed_block(current)? else { break };
            kin.extend(block.ommer_hashes());
            if block.number() == 0 {
                break
            }
            current = block.parent_hash();
        }
        Ok((ancestors, kin))
    }

    fn verify_ommers(&self, block: &SealedBlock) -> Result<(), ImportError> {
        if block.ommers.is_empty() {
            return Ok(())
        }
        let parent_hash = block.parent_hash();
        let (ancestors, kin) =
            self.kin_sets(parent_hash, self.spec.max_uncle_generations)?;

        let mut seen = HashSet::new();
        for ommer in &block.ommers {
            let hash = ommer.hash_slow();
            if !seen.insert(hash) {
                return Err(ConsensusError::DuplicateOmmer { hash }.into())
            }
            // Already an ancestor or already quoted as an ommer.
            if ancestors.contains(&hash) || kin.contains(&hash) {
                return Err(ConsensusError::InvalidOmmer { hash }.into())
            }
            if !self.is_known(hash)? {
                return Err(ConsensusError::InvalidOmmer { hash }.into())
            }
            let details = self.require_details(hash)?;
            // The ommer must branch off a strict ancestor; a fork of the
            // direct parent would be a sibling of this block, not an uncle.
            if details.parent == parent_hash || !ancestors.contains(&details.parent) {
                return Err(ConsensusError::InvalidOmmer { hash }.into())
            }
        }
        Ok(())
    }

    // === Import ==========================================================

    /// Decodes, verifies and imports a candidate block, syncing state
    /// through the given executor.
    ///
    /// Returns the hashes that left and joined the canonical chain.
    pub fn import_block(
        &self,
        bytes: &[u8],
        state: &dyn StateDb,
        must_be_new: bool,
    ) -> Result<ImportRoute, ImportError> {
        let block = match self.verify_block(bytes) {
            Ok(block) => block,
            Err(err) => {
                self.fire_on_bad(&err);
                return Err(err)
            }
        };
        self.import_verified(&block, state, must_be_new)
    }

    /// Imports a block that already passed verification, e.g. one drained
    /// from a verified-block queue.
    pub fn import_verified(
        &self,
        block: &SealedBlock,
        state: &dyn StateDb,
        must_be_new: bool,
    ) -> Result<ImportRoute, ImportError> {
        let result = self.do_import(block, state, must_be_new);
        // Hooks run outside the import lock.
        match &result {
            Ok(_) => self.fire_on_block_import(&block.header),
            Err(err) => self.fire_on_bad(err),
        }
        result
    }

    /// Non-throwing import: packages the error kind alongside the route.
    pub fn attempt_import(
        &self,
        bytes: &[u8],
        state: &dyn StateDb,
        must_be_new: bool,
    ) -> (ImportResult, ImportRoute) {
        match self.import_block(bytes, state, must_be_new) {
            Ok(route) => (ImportResult::Success, route),
            Err(err) => ((&err).into(), ImportRoute::none()),
        }
    }

    fn do_import(
        &self,
        block: &SealedBlock,
        state: &dyn StateDb,
        must_be_new: bool,
    ) -> Result<ImportRoute, ImportError> {
        let _import = self.import_lock.lock();

        if must_be_new && self.is_known(block.hash())? {
            return Err(ImportError::AlreadyHave)
        }

        let parent_hash = block.parent_hash();
        let parent_details =
            self.details(parent_hash)?.ok_or(ImportError::UnknownParent(parent_hash))?;
        let parent = self
            .info(parent_hash)?
            .ok_or(ImportError::UnknownParent(parent_hash))?;

        let outcome = state
            .execute(block, parent.state_root)
            .map_err(|err| ImportError::Execution(err.0))?;
        if outcome.state_root != block.header.state_root {
            return Err(ImportError::StateRootMismatch {
                got: outcome.state_root,
                expected: block.header.state_root,
            })
        }

        let total_difficulty = parent_details.total_difficulty + block.header.difficulty;
        self.insert_block_and_extras(
            block,
            outcome.receipts,
            total_difficulty,
            Some(parent_details),
        )
    }

    /// Persists a block and its receipts without executing transactions.
    /// The receipts must match the header's receipts root.
    pub fn insert(
        &self,
        block: &SealedBlock,
        receipts: Vec<ReceiptWithBloom>,
        must_be_new: bool,
    ) -> Result<ImportRoute, ImportError> {
        let _import = self.import_lock.lock();

        if must_be_new && self.is_known(block.hash())? {
            return Err(ImportError::AlreadyHave)
        }
        let receipts_root = proofs::calculate_receipt_root(&receipts);
        if receipts_root != block.header.receipts_root {
            return Err(ConsensusError::ReceiptsRootMismatch {
                got: receipts_root,
                expected: block.header.receipts_root,
            }
            .into())
        }

        let parent_hash = block.parent_hash();
        let parent_details =
            self.details(parent_hash)?.ok_or(ImportError::UnknownParent(parent_hash))?;
        let total_difficulty = parent_details.total_difficulty + block.header.difficulty;
        self.insert_block_and_extras(block, receipts, total_difficulty, Some(parent_details))
    }

    /// Persists a block whose parent is absent, for partial-chain
    /// restoration. The caller supplies the total difficulty the block is
    /// known to carry.
    ///
    /// The orphan region is not rejoined when the true parent arrives later;
    /// a rebuild is the recovery path.
    pub fn insert_without_parent(
        &self,
        block: &SealedBlock,
        receipts: Vec<ReceiptWithBloom>,
        total_difficulty: U256,
    ) -> Result<ImportRoute, ImportError> {
        let _import = self.import_lock.lock();

        let route = self.insert_block_and_extras(block, receipts, total_difficulty, None)?;

        let start = self.chain_start_block_number()?;
        if start == 0 || block.number() < start {
            self.set_chain_start_block_number(block.number())?;
        }
        Ok(route)
    }

    fn insert_block_and_extras(
        &self,
        block: &SealedBlock,
        receipts: Vec<ReceiptWithBloom>,
        total_difficulty: U256,
        parent_details: Option<BlockDetails>,
    ) -> Result<ImportRoute, ImportError> {
        let hash = block.hash();
        let number = block.number();
        let parent_hash = block.parent_hash();

        let mut blocks_batch = WriteBatch::new();
        blocks_batch.put(hash.as_slice(), block.encoded());

        let mut extras = WriteBatch::new();
        let details = BlockDetails {
            number,
            total_difficulty,
            parent: parent_hash,
            children: Vec::new(),
        };
        extras.put(tables::details_key(hash), alloy_rlp::encode(&details));

        let parent_details = parent_details.map(|mut parent| {
            if !parent.children.contains(&hash) {
                parent.children.push(hash);
            }
            extras.put(tables::details_key(parent_hash), alloy_rlp::encode(&parent));
            parent
        });

        let log_blooms =
            BlockLogBlooms { blooms: receipts.iter().map(|receipt| receipt.bloom).collect() };
        extras.put(tables::log_blooms_key(hash), alloy_rlp::encode(&log_blooms));
        let block_receipts = BlockReceipts { receipts };
        extras.put(tables::receipts_key(hash), alloy_rlp::encode(&block_receipts));

        let (best_hash, best_number) = self.current_info();
        let best_td = self.require_details(best_hash)?.total_difficulty;
        let becomes_canonical = total_difficulty > best_td;

        let mut route =
            ImportRoute { transactions: block.transaction_hashes(), ..Default::default() };

        // Cache reconciliation data, applied only after the commit succeeds.
        let mut dead_transactions: Vec<TxHash> = Vec::new();
        let mut live_transactions: Vec<(TxHash, TransactionAddress)> = Vec::new();
        let mut removed_numbers: Vec<BlockNumber> = Vec::new();
        let mut set_numbers: Vec<(BlockNumber, B256)> = Vec::new();
        let mut flushed_blooms: Vec<(B256, BloomGroup)> = Vec::new();

        if becomes_canonical {
            let mut overlay = BloomOverlay::new(false);

            if parent_details.is_none() && parent_hash != best_hash {
                // Orphan head adoption during partial-chain restore: there
                // is no route to the old head, so only this block's indexes
                // are written.
                overlay.accrue(self, number, block.header.logs_bloom)?;
                route.live.push(hash);
            } else if parent_hash == best_hash {
                overlay.accrue(self, number, block.header.logs_bloom)?;
                route.live.push(hash);
            } else {
                let tree_route =
                    self.tree_route(best_hash, parent_hash, false, true, true)?;
                let dead = tree_route.route[..tree_route.index].to_vec();
                let mut live_path = tree_route.route[tree_route.index..].to_vec();
                // A coincident endpoint in the route is already canonical.
                if live_path.first() == Some(&tree_route.common) {
                    live_path.remove(0);
                }
                let common_number = self.require_details(tree_route.common)?.number;

                info!(
                    target: "chain",
                    ?hash,
                    number,
                    retracted = dead.len(),
                    "reorganizing canonical chain"
                );

                for dead_hash in &dead {
                    let dead_block = self.sealed_block(*dead_hash)?.ok_or_else(|| {
                        ImportError::InvariantViolation(format!(
                            "missing body for retracted block {dead_hash}"
                        ))
                    })?;
                    for tx_hash in dead_block.transaction_hashes() {
                        extras.delete(tables::transaction_address_key(tx_hash));
                        dead_transactions.push(tx_hash);
                    }
                }
                for n in (common_number + 1)..=best_number {
                    extras.delete(tables::block_hash_key(n));
                    removed_numbers.push(n);
                    overlay.replace(self, n, Default::default())?;
                }

                for live_hash in &live_path {
                    let live_block = self.sealed_block(*live_hash)?.ok_or_else(|| {
                        ImportError::InvariantViolation(format!(
                            "missing body for enacted block {live_hash}"
                        ))
                    })?;
                    let live_number = live_block.number();
                    set_numbers.push((live_number, *live_hash));
                    for (index, tx_hash) in
                        live_block.transaction_hashes().into_iter().enumerate()
                    {
                        live_transactions.push((
                            tx_hash,
                            TransactionAddress {
                                block_hash: *live_hash,
                                index: index as u64,
                            },
                        ));
                    }
                    overlay.replace(self, live_number, live_block.header.logs_bloom)?;
                }
                overlay.replace(self, number, block.header.logs_bloom)?;
                overlay.rebuild_upper(self)?;

                route.dead = dead;
                route.live = live_path;
                route.live.push(hash);
            }

            set_numbers.push((number, hash));
            for (index, tx_hash) in block.transaction_hashes().into_iter().enumerate() {
                live_transactions
                    .push((tx_hash, TransactionAddress { block_hash: hash, index: index as u64 }));
            }

            for (tx_hash, address) in &live_transactions {
                extras.put(
                    tables::transaction_address_key(*tx_hash),
                    alloy_rlp::encode(address),
                );
            }
            for (n, h) in &set_numbers {
                extras.put(tables::block_hash_key(*n), alloy_rlp::encode(h));
            }
            flushed_blooms = overlay.flush(&mut extras);
            extras.put(BEST_KEY, hash.as_slice());
        }

        // Commit; a failure here leaves caches and the head untouched.
        self.blocks_db.write(blocks_batch)?;
        self.extras_db.write(extras)?;

        // Reconcile caches with the committed batch.
        self.note_used(CacheId::Block(hash));
        self.block_cache.write().insert(hash, block.encoded());
        self.note_used(CacheId::Details(hash));
        self.note_used(CacheId::Details(parent_hash));
        {
            let mut cache = self.details_cache.write();
            cache.insert(hash, details);
            if let Some(parent) = parent_details {
                cache.insert(parent_hash, parent);
            }
        }
        self.note_used(CacheId::LogBlooms(hash));
        self.log_blooms_cache.write().insert(hash, log_blooms);
        self.receipts_cache.write().remove(&hash);

        if becomes_canonical {
            {
                let mut cache = self.transaction_address_cache.write();
                for tx_hash in &dead_transactions {
                    cache.remove(tx_hash);
                }
                for (tx_hash, address) in live_transactions {
                    self.note_used(CacheId::TransactionAddress(tx_hash));
                    cache.insert(tx_hash, address);
                }
            }
            {
                let mut cache = self.block_hash_cache.write();
                for n in &removed_numbers {
                    cache.remove(n);
                }
                for (n, h) in set_numbers {
                    self.note_used(CacheId::BlockHash(n));
                    cache.insert(n, h);
                }
            }
            {
                let mut cache = self.bloom_group_cache.write();
                for (chunk, group) in flushed_blooms {
                    self.note_used(CacheId::BloomGroup(chunk));
                    cache.insert(chunk, group);
                }
            }
            // The head pointer moves last; hash and number change together.
            *self.best.write() = BestBlock { hash, number };
            self.invalidate_last_hashes();
        }

        debug!(
            target: "chain",
            ?hash,
            number,
            canonical = becomes_canonical,
            "imported block"
        );
        Ok(route)
    }

    pub(crate) fn import_guard(&self) -> parking_lot::MutexGuard<'_, ()> {
        self.import_lock.lock()
    }

    pub(crate) fn set_best(&self, hash: B256, number: BlockNumber) {
        *self.best.write() = BestBlock { hash, number };
        self.invalidate_last_hashes();
    }

    pub(crate) fn blocks_store(&self) -> &dyn KeyValueStore {
        &*self.blocks_db
    }

    pub(crate) fn extras_store(&self) -> &dyn KeyValueStore {
        &*self.extras_db
    }

    fn fire_on_block_import(&self, header: &SealedHeader) {
        if let Some(hook) = self.on_block_import.read().as_ref() {
            hook(header);
        }
    }

    fn fire_on_bad(&self, err: &ImportError) {
        if !err.is_bad() {
            return
        }
        if let Some(hook) = self.on_bad.read().as_ref() {
            hook(err);
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}
