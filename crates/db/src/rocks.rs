use crate::{
    store::{BatchOp, WriteBatch},
    KeyValueStore, StoreError,
};
use rocksdb::{Direction, IteratorMode, Options, DB};
use std::{
    fmt,
    path::{Path, PathBuf},
};

/// RocksDB-backed [`KeyValueStore`]. One database directory per namespace.
pub struct RocksStore {
    db: DB,
    path: PathBuf,
}

impl fmt::Debug for RocksStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RocksStore").field("path", &self.path).finish()
    }
}

impl RocksStore {
    /// Opens the store at `path`, creating it if missing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, &path).map_err(|err| StoreError::Open(err.to_string()))?;
        Ok(Self { db, path })
    }

    /// Destroys the on-disk store at `path`.
    pub fn destroy(path: impl AsRef<Path>) -> Result<(), StoreError> {
        DB::destroy(&Options::default(), path).map_err(|err| StoreError::Open(err.to_string()))
    }

    /// The directory backing this store.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStore for RocksStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        self.db.get(key).map_err(|err| StoreError::Read(err.to_string()))
    }

    fn write(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut inner = rocksdb::WriteBatch::default();
        for op in batch.ops {
            match op {
                BatchOp::Put(key, value) => inner.put(key, value),
                BatchOp::Delete(key) => inner.delete(key),
            }
        }
        self.db.write(inner).map_err(|err| StoreError::Write(err.to_string()))
    }

    fn scan(
        &self,
        start: &[u8],
        f: &mut dyn FnMut(&[u8], &[u8]) -> bool,
    ) -> Result<(), StoreError> {
        for item in self.db.iterator(IteratorMode::From(start, Direction::Forward)) {
            let (key, value) = item.map_err(|err| StoreError::Read(err.to_string()))?;
            if !f(&key, &value) {
                break
            }
        }
        Ok(())
    }

    fn entries(&self) -> Result<usize, StoreError> {
        // Estimate only; exact counts would require a full scan.
        let estimate = self
            .db
            .property_int_value("rocksdb.estimate-num-keys")
            .map_err(|err| StoreError::Read(err.to_string()))?;
        Ok(estimate.unwrap_or_default() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_write_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kv");

        {
            let store = RocksStore::open(&path).unwrap();
            let mut batch = WriteBatch::new();
            batch.put(b"k".to_vec(), b"v".to_vec());
            store.write(batch).unwrap();
        }

        let store = RocksStore::open(&path).unwrap();
        assert_eq!(store.get(b"k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn scan_from_start_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = RocksStore::open(dir.path().join("kv")).unwrap();

        let mut batch = WriteBatch::new();
        for key in [&b"aa"[..], b"ab", b"b"] {
            batch.put(key.to_vec(), b"x".to_vec());
        }
        store.write(batch).unwrap();

        let mut seen = Vec::new();
        store
            .scan(b"ab", &mut |key, _| {
                seen.push(key.to_vec());
                true
            })
            .unwrap();
        assert_eq!(seen, vec![b"ab".to_vec(), b"b".to_vec()]);
    }
}
