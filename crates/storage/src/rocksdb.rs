use rocksdb::{Direction, IteratorMode, Options, WriteBatch as RocksWriteBatch, DB};
use std::path::Path;

use crate::{BatchOp, Database, KeyValue, Result, StorageError, WriteBatch};

/// Disk-backed store for sandboxes that outlive the process.
pub struct RocksDatabase {
    db: DB,
}

impl RocksDatabase {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts.set_write_buffer_size(64 * 1024 * 1024);
        opts.set_max_open_files(1000);

        let db = DB::open(&opts, path).map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        Ok(Self { db })
    }

    pub fn destroy<P: AsRef<Path>>(path: P) -> Result<()> {
        DB::destroy(&Options::default(), path)
            .map_err(|e| StorageError::DatabaseError(e.to_string()))
    }

    pub fn flush(&self) -> Result<()> {
        self.db
            .flush()
            .map_err(|e| StorageError::DatabaseError(e.to_string()))
    }
}

impl Database for RocksDatabase {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.db
            .get(key)
            .map_err(|e| StorageError::DatabaseError(e.to_string()))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.db
            .put(key, value)
            .map_err(|e| StorageError::DatabaseError(e.to_string()))
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.db
            .delete(key)
            .map_err(|e| StorageError::DatabaseError(e.to_string()))
    }

    fn write_batch(&self, batch: WriteBatch) -> Result<()> {
        let mut rocks_batch = RocksWriteBatch::default();
        for op in batch.into_operations() {
            match op {
                BatchOp::Put(key, value) => rocks_batch.put(key, value),
                BatchOp::Delete(key) => rocks_batch.delete(key),
            }
        }
        self.db
            .write(rocks_batch)
            .map_err(|e| StorageError::DatabaseError(e.to_string()))
    }

    fn iter_prefix(&self, prefix: &[u8]) -> Box<dyn Iterator<Item = Result<KeyValue>> + '_> {
        let start = prefix.to_vec();
        let prefix = prefix.to_vec();
        let iter = self
            .db
            .iterator(IteratorMode::From(&start, Direction::Forward))
            .map(|entry| {
                entry
                    .map(|(k, v)| (k.to_vec(), v.to_vec()))
                    .map_err(|e| StorageError::DatabaseError(e.to_string()))
            })
            .take_while(move |entry| match entry {
                Ok((key, _)) => key.starts_with(&prefix),
                Err(_) => true,
            });
        Box::new(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_rocksdb_basic_operations() {
        let temp_dir = TempDir::new().unwrap();
        let db = RocksDatabase::open(temp_dir.path()).unwrap();

        let key = b"test_key";
        let value = b"test_value";
        db.put(key, value).unwrap();
        assert_eq!(db.get(key).unwrap(), Some(value.to_vec()));
        assert!(db.contains(key).unwrap());

        db.delete(key).unwrap();
        assert!(!db.contains(key).unwrap());
    }

    #[test]
    fn test_batch_operations() {
        let temp_dir = TempDir::new().unwrap();
        let db = RocksDatabase::open(temp_dir.path()).unwrap();

        let mut batch = WriteBatch::new();
        for i in 0..100 {
            let key = format!("key_{}", i);
            let value = format!("value_{}", i);
            batch.put(key.as_bytes(), value.as_bytes());
        }
        batch.delete(b"key_7");
        db.write_batch(batch).unwrap();

        assert!(db.contains(b"key_99").unwrap());
        assert!(!db.contains(b"key_7").unwrap());
    }

    #[test]
    fn test_prefix_iteration_stops_at_boundary() {
        let temp_dir = TempDir::new().unwrap();
        let db = RocksDatabase::open(temp_dir.path()).unwrap();

        db.put(b"prefix_1", b"val1").unwrap();
        db.put(b"prefix_2", b"val2").unwrap();
        db.put(b"other", b"val3").unwrap();
        db.put(b"zzz", b"val4").unwrap();

        let keys: Vec<_> = db
            .iter_prefix(b"prefix_")
            .map(|entry| entry.unwrap().0)
            .collect();
        assert_eq!(keys, vec![b"prefix_1".to_vec(), b"prefix_2".to_vec()]);
    }

    #[test]
    fn test_reopen_keeps_data() {
        let temp_dir = TempDir::new().unwrap();
        {
            let db = RocksDatabase::open(temp_dir.path()).unwrap();
            db.put(b"k", b"v").unwrap();
            db.flush().unwrap();
        }
        let db = RocksDatabase::open(temp_dir.path()).unwrap();
        assert_eq!(db.get(b"k").unwrap(), Some(b"v".to_vec()));
    }
}
