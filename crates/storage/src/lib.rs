use sandbox_types::{Address, H256};
use thiserror::Error;

pub mod memory;
#[cfg(feature = "rocksdb")]
pub mod rocksdb;
pub mod traits;

pub use memory::*;
#[cfg(feature = "rocksdb")]
pub use rocksdb::*;
pub use traits::*;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Key-value pair type alias
pub type KeyValue = (Vec<u8>, Vec<u8>);

/// Namespaces of the account store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPrefix {
    Account = 0x01,
    Code = 0x02,
    Storage = 0x03,
}

impl KeyPrefix {
    pub fn as_byte(&self) -> u8 {
        *self as u8
    }

    pub fn make_key(&self, suffix: &[u8]) -> Vec<u8> {
        let mut key = Vec::with_capacity(1 + suffix.len());
        key.push(self.as_byte());
        key.extend_from_slice(suffix);
        key
    }
}

/// Builders for the account store key layout.
pub mod keys {
    use super::*;

    pub fn account_key(address: &Address) -> Vec<u8> {
        KeyPrefix::Account.make_key(address.as_bytes())
    }

    pub fn code_key(code_hash: &H256) -> Vec<u8> {
        KeyPrefix::Code.make_key(code_hash.as_bytes())
    }

    pub fn storage_key(address: &Address, slot: &H256) -> Vec<u8> {
        let mut key = Vec::with_capacity(1 + 20 + 32);
        key.push(KeyPrefix::Storage.as_byte());
        key.extend_from_slice(address.as_bytes());
        key.extend_from_slice(slot.as_bytes());
        key
    }

    /// Prefix shared by every storage slot of `address`.
    pub fn storage_prefix(address: &Address) -> Vec<u8> {
        KeyPrefix::Storage.make_key(address.as_bytes())
    }

    /// Splits an account key back into its address.
    pub fn address_from_account_key(key: &[u8]) -> Option<Address> {
        match key.split_first() {
            Some((&prefix, rest)) if prefix == KeyPrefix::Account.as_byte() => {
                Address::from_slice(rest).ok()
            }
            _ => None,
        }
    }

    /// Slot part of a storage key.
    pub fn slot_from_storage_key(key: &[u8]) -> Option<H256> {
        if key.len() != 1 + 20 + 32 || key[0] != KeyPrefix::Storage.as_byte() {
            return None;
        }
        Some(H256::from_slice(&key[21..]))
    }
}
