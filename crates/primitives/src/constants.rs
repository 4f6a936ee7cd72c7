//! Constants shared across the chain database.

use alloy_primitives::{b256, B256};

/// Keccak-256 hash of the RLP of an empty list, the root hash of an empty
/// ommers list.
pub const EMPTY_OMMER_ROOT_HASH: B256 =
    b256!("1dcc4de8dec75d7aab85b567b6ccd41ad312451b948a7413f0a142fd40d49347");

/// Root hash of an empty trie.
pub const EMPTY_ROOT_HASH: B256 =
    b256!("56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421");

/// The number of blooms in one chunk of the hierarchical block-bloom index.
///
/// Also the branching factor between levels: a level-`n` bloom aggregates
/// [`BLOOM_INDEX_SIZE`] blooms of level `n - 1`.
pub const BLOOM_INDEX_SIZE: u64 = 16;

/// The number of levels kept in the hierarchical block-bloom index.
pub const BLOOM_LEVELS: u32 = 3;

/// How far into the future a block timestamp may lie before import defers it
/// as a transient failure, in seconds.
pub const ALLOWED_FUTURE_BLOCK_TIME_SECONDS: u64 = 15;

/// The maximum number of ommers a block may carry.
pub const MAX_OMMERS: usize = 2;
