use sandbox_crypto::KECCAK_EMPTY;
use sandbox_types::{Address, Bytes, H256, U256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Record stored under the account key. Code lives under its own hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub balance: U256,
    pub nonce: u64,
    pub code_hash: H256,
}

impl AccountInfo {
    pub fn has_code(&self) -> bool {
        self.code_hash != KECCAK_EMPTY
    }

    /// No balance, no nonce, no code.
    pub fn is_empty(&self) -> bool {
        self.balance.is_zero() && self.nonce == 0 && !self.has_code()
    }
}

impl Default for AccountInfo {
    fn default() -> Self {
        AccountInfo {
            balance: U256::zero(),
            nonce: 0,
            code_hash: KECCAK_EMPTY,
        }
    }
}

/// Fully materialized account, storage included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub address: Address,
    pub balance: U256,
    pub nonce: u64,
    pub code: Bytes,
    pub storage: BTreeMap<H256, U256>,
}

impl Account {
    pub fn new(address: Address) -> Self {
        Account {
            address,
            balance: U256::zero(),
            nonce: 0,
            code: Bytes::new(),
            storage: BTreeMap::new(),
        }
    }

    pub fn is_contract(&self) -> bool {
        !self.code.is_empty()
    }
}
