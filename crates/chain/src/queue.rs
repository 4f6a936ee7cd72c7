use alloy_primitives::B256;
use chaindb_primitives::SealedBlock;

/// Capability interface over the staging queue of verified blocks drained by
/// [`sync`].
///
/// [`sync`]: crate::BlockChain::sync
pub trait BlockQueue: Send + Sync {
    /// Removes up to `max` verified blocks from the queue, oldest first.
    fn dequeue_verified(&self, max: usize) -> Vec<SealedBlock>;

    /// Returns a block to the queue after a transient import failure; it
    /// will be handed out again later.
    fn requeue(&self, hash: B256);

    /// Marks a block as permanently bad; it will not be handed out again.
    fn mark_bad(&self, hash: B256);

    /// Whether the queue currently holds any verified blocks.
    fn is_empty(&self) -> bool;
}
