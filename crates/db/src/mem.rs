use crate::{
    store::{BatchOp, WriteBatch},
    KeyValueStore, StoreError,
};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// In-memory [`KeyValueStore`] used for tests and ephemeral chains.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.inner.read().get(key).cloned())
    }

    fn write(&self, batch: WriteBatch) -> Result<(), StoreError> {
        // A single write guard makes the batch atomic with respect to readers.
        let mut inner = self.inner.write();
        for op in batch.ops {
            match op {
                BatchOp::Put(key, value) => {
                    inner.insert(key, value);
                }
                BatchOp::Delete(key) => {
                    inner.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn scan(
        &self,
        start: &[u8],
        f: &mut dyn FnMut(&[u8], &[u8]) -> bool,
    ) -> Result<(), StoreError> {
        for (key, value) in self.inner.read().range(start.to_vec()..) {
            if !f(key, value) {
                break
            }
        }
        Ok(())
    }

    fn entries(&self) -> Result<usize, StoreError> {
        Ok(self.inner.read().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_put_and_delete() {
        let store = MemoryStore::new();

        let mut batch = WriteBatch::new();
        batch.put(b"a".to_vec(), b"1".to_vec());
        batch.put(b"b".to_vec(), b"2".to_vec());
        store.write(batch).unwrap();

        assert_eq!(store.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(store.entries().unwrap(), 2);

        let mut batch = WriteBatch::new();
        batch.delete(b"a".to_vec());
        batch.put(b"c".to_vec(), b"3".to_vec());
        store.write(batch).unwrap();

        assert_eq!(store.get(b"a").unwrap(), None);
        assert_eq!(store.get(b"c").unwrap(), Some(b"3".to_vec()));
    }

    #[test]
    fn later_ops_win_within_a_batch() {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        batch.put(b"k".to_vec(), b"old".to_vec());
        batch.put(b"k".to_vec(), b"new".to_vec());
        batch.delete(b"gone".to_vec());
        store.write(batch).unwrap();
        assert_eq!(store.get(b"k").unwrap(), Some(b"new".to_vec()));
    }

    #[test]
    fn scan_is_ordered_and_stoppable() {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        for key in [b"a", b"b", b"c", b"d"] {
            batch.put(key.to_vec(), key.to_vec());
        }
        store.write(batch).unwrap();

        let mut seen = Vec::new();
        let store: &dyn KeyValueStore = &store;
        store
            .scan(b"b", &mut |key, _| {
                seen.push(key.to_vec());
                seen.len() < 2
            })
            .unwrap();
        assert_eq!(seen, vec![b"b".to_vec(), b"c".to_vec()]);
    }
}
