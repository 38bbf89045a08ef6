use crate::{KeyValue, Result, StorageError};

/// Core database operations trait
pub trait Database: Send + Sync {
    /// Get a value by key
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Put a key-value pair
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Delete a key
    fn delete(&self, key: &[u8]) -> Result<()>;

    /// Check if a key exists
    fn contains(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Apply every operation of the batch atomically
    fn write_batch(&self, batch: WriteBatch) -> Result<()>;

    /// Ordered iteration over keys starting with `prefix`
    fn iter_prefix(&self, prefix: &[u8]) -> Box<dyn Iterator<Item = Result<KeyValue>> + '_>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
}

/// Ordered set of writes applied in one step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    operations: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: &[u8], value: &[u8]) {
        self.operations.push(BatchOp::Put(key.to_vec(), value.to_vec()));
    }

    pub fn delete(&mut self, key: &[u8]) {
        self.operations.push(BatchOp::Delete(key.to_vec()));
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn operations(&self) -> &[BatchOp] {
        &self.operations
    }

    pub fn into_operations(self) -> Vec<BatchOp> {
        self.operations
    }
}

/// Extension trait for typed access to database
pub trait TypedDatabase: Database {
    /// Get a value and deserialize it
    fn get_typed<T: serde::de::DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>> {
        match self.get(key)? {
            Some(bytes) => {
                let value = bincode::deserialize(&bytes)
                    .map_err(|e| StorageError::SerializationError(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Serialize and put a value
    fn put_typed<T: serde::Serialize>(&self, key: &[u8], value: &T) -> Result<()> {
        self.put(key, &encode_typed(value)?)
    }
}

/// Implement TypedDatabase for all types that implement Database
impl<T: Database + ?Sized> TypedDatabase for T {}

/// bincode encoding used by `TypedDatabase`, for callers that batch writes themselves.
pub fn encode_typed<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| StorageError::SerializationError(e.to_string()))
}
