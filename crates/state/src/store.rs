use crate::{Account, AccountInfo, Result, StateError};
use sandbox_crypto::{keccak256, KECCAK_EMPTY};
use sandbox_storage::{encode_typed, keys, Database, KeyPrefix, StorageError, TypedDatabase, WriteBatch};
use sandbox_types::{Address, Bytes, H256, U256};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Position in the journal; valid until the next `commit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SnapshotId(usize);

/// Raw value a key held before one write.
#[derive(Debug, Clone)]
struct JournalEntry {
    key: Vec<u8>,
    previous: Option<Vec<u8>>,
}

/// Mutable ledger of accounts over a key-value backend.
///
/// Reads take `&self`, mutations take `&mut self`; the caller is expected to
/// hold the store behind a lock that serializes writers.
pub struct AccountStore<D: Database> {
    db: Arc<D>,
    journal: Vec<JournalEntry>,
}

impl<D: Database> AccountStore<D> {
    pub fn new(db: Arc<D>) -> Self {
        AccountStore {
            db,
            journal: Vec::new(),
        }
    }

    pub fn database(&self) -> &Arc<D> {
        &self.db
    }

    // ---- reads ----

    pub fn account_info(&self, address: &Address) -> Result<Option<AccountInfo>> {
        self.db
            .get_typed(&keys::account_key(address))
            .map_err(|e| match e {
                StorageError::SerializationError(msg) => {
                    StateError::Corrupt(format!("account {}: {}", address, msg))
                }
                other => StateError::Storage(other),
            })
    }

    pub fn exists(&self, address: &Address) -> Result<bool> {
        Ok(self.db.contains(&keys::account_key(address))?)
    }

    pub fn balance(&self, address: &Address) -> Result<U256> {
        Ok(self.account_info(address)?.map(|info| info.balance).unwrap_or_default())
    }

    pub fn nonce(&self, address: &Address) -> Result<u64> {
        Ok(self.account_info(address)?.map(|info| info.nonce).unwrap_or(0))
    }

    pub fn code_hash(&self, address: &Address) -> Result<H256> {
        Ok(self
            .account_info(address)?
            .map(|info| info.code_hash)
            .unwrap_or(KECCAK_EMPTY))
    }

    pub fn code(&self, address: &Address) -> Result<Bytes> {
        let code_hash = self.code_hash(address)?;
        self.code_by_hash(&code_hash)
    }

    pub fn code_by_hash(&self, code_hash: &H256) -> Result<Bytes> {
        if *code_hash == KECCAK_EMPTY {
            return Ok(Bytes::new());
        }
        match self.db.get(&keys::code_key(code_hash))? {
            Some(code) => Ok(Bytes::from_vec(code)),
            None => Err(StateError::Corrupt(format!("missing code {:?}", code_hash))),
        }
    }

    pub fn storage(&self, address: &Address, slot: &H256) -> Result<U256> {
        match self.db.get(&keys::storage_key(address, slot))? {
            Some(raw) => decode_word(&raw),
            None => Ok(U256::zero()),
        }
    }

    /// Full record including every non-zero storage slot.
    pub fn account(&self, address: &Address) -> Result<Option<Account>> {
        let info = match self.account_info(address)? {
            Some(info) => info,
            None => return Ok(None),
        };

        let mut storage = BTreeMap::new();
        for entry in self.db.iter_prefix(&keys::storage_prefix(address)) {
            let (key, value) = entry?;
            let slot = keys::slot_from_storage_key(&key)
                .ok_or_else(|| StateError::Corrupt(format!("storage key of length {}", key.len())))?;
            storage.insert(slot, decode_word(&value)?);
        }

        Ok(Some(Account {
            address: *address,
            balance: info.balance,
            nonce: info.nonce,
            code: self.code_by_hash(&info.code_hash)?,
            storage,
        }))
    }

    /// Every account in key order.
    pub fn accounts(&self) -> Result<Vec<Account>> {
        let prefix = [KeyPrefix::Account.as_byte()];
        let mut addresses = Vec::new();
        for entry in self.db.iter_prefix(&prefix) {
            let (key, _) = entry?;
            let address = keys::address_from_account_key(&key)
                .ok_or_else(|| StateError::Corrupt(format!("account key of length {}", key.len())))?;
            addresses.push(address);
        }

        let mut accounts = Vec::with_capacity(addresses.len());
        for address in addresses {
            if let Some(account) = self.account(&address)? {
                accounts.push(account);
            }
        }
        Ok(accounts)
    }

    // ---- mutations ----

    /// Returns the account, inserting a zero-valued record if it was absent.
    pub fn get_or_create(&mut self, address: &Address) -> Result<Account> {
        if !self.exists(address)? {
            self.write_info(address, &AccountInfo::default())?;
        }
        self.account(address)?
            .ok_or_else(|| StateError::Corrupt(format!("account {} vanished", address)))
    }

    pub fn set_balance(&mut self, address: &Address, balance: U256) -> Result<()> {
        let mut info = self.account_info(address)?.unwrap_or_default();
        info.balance = balance;
        self.write_info(address, &info)
    }

    pub fn add_balance(&mut self, address: &Address, amount: U256) -> Result<()> {
        let mut info = self.account_info(address)?.unwrap_or_default();
        info.balance = info
            .balance
            .checked_add(amount)
            .ok_or(StateError::BalanceOverflow { address: *address })?;
        self.write_info(address, &info)
    }

    /// Debiting more than the balance is an invariant violation; callers
    /// check the balance first.
    pub fn sub_balance(&mut self, address: &Address, amount: U256) -> Result<()> {
        let mut info = self.account_info(address)?.unwrap_or_default();
        info.balance = info
            .balance
            .checked_sub(amount)
            .ok_or(StateError::BalanceUnderflow {
                address: *address,
                balance: info.balance,
                amount,
            })?;
        self.write_info(address, &info)
    }

    /// Moves `value` and materializes both accounts.
    pub fn transfer(&mut self, from: &Address, to: &Address, value: U256) -> Result<()> {
        self.sub_balance(from, value)?;
        self.add_balance(to, value)
    }

    pub fn set_nonce(&mut self, address: &Address, nonce: u64) -> Result<()> {
        let mut info = self.account_info(address)?.unwrap_or_default();
        info.nonce = nonce;
        self.write_info(address, &info)
    }

    /// Returns the nonce before the increment.
    pub fn increment_nonce(&mut self, address: &Address) -> Result<u64> {
        let mut info = self.account_info(address)?.unwrap_or_default();
        let previous = info.nonce;
        info.nonce = previous
            .checked_add(1)
            .ok_or(StateError::NonceOverflow(*address))?;
        self.write_info(address, &info)?;
        Ok(previous)
    }

    /// Assigns code to an account that has none.
    pub fn set_code(&mut self, address: &Address, code: Bytes) -> Result<()> {
        let mut info = self.account_info(address)?.unwrap_or_default();
        if info.has_code() {
            return Err(StateError::CodeAlreadySet(*address));
        }
        if !code.is_empty() {
            let code_hash = keccak256(&code);
            let code_key = keys::code_key(&code_hash);
            if !self.db.contains(&code_key)? {
                self.write(code_key, Some(code.into_vec()))?;
            }
            info.code_hash = code_hash;
        }
        self.write_info(address, &info)
    }

    /// A zero value removes the slot.
    pub fn set_storage(&mut self, address: &Address, slot: &H256, value: U256) -> Result<()> {
        if !self.exists(address)? {
            self.write_info(address, &AccountInfo::default())?;
        }
        let key = keys::storage_key(address, slot);
        if value.is_zero() {
            self.write(key, None)
        } else {
            let mut raw = [0u8; 32];
            value.to_big_endian(&mut raw);
            self.write(key, Some(raw.to_vec()))
        }
    }

    // ---- snapshots ----

    pub fn snapshot(&self) -> SnapshotId {
        SnapshotId(self.journal.len())
    }

    /// Restores every key written since `id` to its previous raw value in one batch.
    pub fn revert_to_snapshot(&mut self, id: SnapshotId) -> Result<()> {
        if id.0 > self.journal.len() {
            return Err(StateError::InvalidSnapshot {
                id: id.0,
                len: self.journal.len(),
            });
        }

        let mut batch = WriteBatch::new();
        for entry in self.journal[id.0..].iter().rev() {
            match &entry.previous {
                Some(value) => batch.put(&entry.key, value),
                None => batch.delete(&entry.key),
            }
        }
        let reverted = batch.len();
        self.db.write_batch(batch)?;
        self.journal.truncate(id.0);

        tracing::trace!(snapshot = id.0, reverted, "reverted account store");
        Ok(())
    }

    /// Drops the journal; every outstanding snapshot becomes invalid.
    pub fn commit(&mut self) {
        self.journal.clear();
    }

    pub fn journal_len(&self) -> usize {
        self.journal.len()
    }

    fn write_info(&mut self, address: &Address, info: &AccountInfo) -> Result<()> {
        self.write(keys::account_key(address), Some(encode_typed(info)?))
    }

    fn write(&mut self, key: Vec<u8>, value: Option<Vec<u8>>) -> Result<()> {
        let previous = self.db.get(&key)?;
        if previous == value {
            return Ok(());
        }
        match &value {
            Some(value) => self.db.put(&key, value)?,
            None => self.db.delete(&key)?,
        }
        self.journal.push(JournalEntry { key, previous });
        Ok(())
    }
}

fn decode_word(raw: &[u8]) -> Result<U256> {
    if raw.len() != 32 {
        return Err(StateError::Corrupt(format!("storage value of length {}", raw.len())));
    }
    Ok(U256::from_big_endian(raw))
}
