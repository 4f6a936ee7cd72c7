use crate::{BlockChain, BlockQueue, ImportError, ImportRoute, StateDb};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Soft wall-clock budget for one [`BlockChain::sync`] call.
const SYNC_TIME_BUDGET: Duration = Duration::from_secs(1);

impl BlockChain {
    /// Drains up to `max` verified blocks from the queue, or as many as fit
    /// into a one second soft budget, importing each in order.
    ///
    /// Returns the union of the import routes, whether the queue still holds
    /// blocks, and how many were imported. Transiently failing blocks
    /// (future timestamp, missing parent) go back to the queue; permanently
    /// bad blocks are reported to it and skipped.
    pub fn sync(
        &self,
        queue: &dyn BlockQueue,
        state: &dyn StateDb,
        max: usize,
    ) -> (ImportRoute, bool, usize) {
        let deadline = Instant::now() + SYNC_TIME_BUDGET;
        let mut route = ImportRoute::none();
        let mut imported = 0usize;

        'drain: while imported < max {
            let batch = queue.dequeue_verified(max - imported);
            if batch.is_empty() {
                break
            }

            let mut blocks = batch.into_iter();
            while let Some(block) = blocks.next() {
                let hash = block.hash();

                if Instant::now() >= deadline {
                    queue.requeue(hash);
                    for rest in blocks {
                        queue.requeue(rest.hash());
                    }
                    debug!(target: "chain", imported, "sync time budget exhausted");
                    break 'drain
                }

                match self.import_verified(&block, state, true) {
                    Ok(partial) => {
                        route.merge(partial);
                        imported += 1;
                    }
                    Err(ImportError::AlreadyHave) => {}
                    Err(err) if err.is_transient() => {
                        debug!(target: "chain", ?hash, %err, "deferring block");
                        queue.requeue(hash);
                    }
                    Err(err) if err.is_bad() => {
                        debug!(target: "chain", ?hash, %err, "marking block bad");
                        queue.mark_bad(hash);
                    }
                    Err(err) => {
                        // Storage failure or database inconsistency; leave
                        // the block queued and surface through the logs.
                        warn!(target: "chain", ?hash, %err, "sync aborted on store failure");
                        queue.requeue(hash);
                        for rest in blocks {
                            queue.requeue(rest.hash());
                        }
                        break 'drain
                    }
                }
            }
        }

        (route, !queue.is_empty(), imported)
    }
}
