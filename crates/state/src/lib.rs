//! Account store for the sandbox.
//!
//! Accounts, code and storage slots are laid out over a flat key-value
//! [`Database`](sandbox_storage::Database). Every write goes through a journal
//! of previous values so that a snapshot can be rolled back exactly.

pub mod account;
pub mod store;

pub use account::{Account, AccountInfo};
pub use store::{AccountStore, SnapshotId};

use sandbox_storage::StorageError;
use sandbox_types::{Address, U256};
use thiserror::Error;

/// Every variant is an invariant violation from the executor's point of view.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Balance underflow for {address}: balance {balance}, debit {amount}")]
    BalanceUnderflow {
        address: Address,
        balance: U256,
        amount: U256,
    },

    #[error("Balance overflow for {address}")]
    BalanceOverflow { address: Address },

    #[error("Code already set for {0}")]
    CodeAlreadySet(Address),

    #[error("Nonce overflow for {0}")]
    NonceOverflow(Address),

    #[error("Invalid snapshot {id}, journal length {len}")]
    InvalidSnapshot { id: usize, len: usize },

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, StateError>;
