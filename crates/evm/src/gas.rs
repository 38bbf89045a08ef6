use crate::error::{EvmError, EvmResult};

#[derive(Debug, Clone, Copy)]
pub struct Gas {
    limit: u64,
    used: u64,
    refunded: u64,
}

impl Gas {
    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            used: 0,
            refunded: 0,
        }
    }

    pub fn consume(&mut self, amount: u64) -> EvmResult<()> {
        let new_used = self.used.saturating_add(amount);
        if new_used > self.limit {
            Err(EvmError::OutOfGas)
        } else {
            self.used = new_used;
            Ok(())
        }
    }

    /// Gives back gas a child frame did not spend.
    pub fn reimburse(&mut self, amount: u64) {
        self.used = self.used.saturating_sub(amount);
    }

    pub fn record_refund(&mut self, amount: u64) {
        self.refunded = self.refunded.saturating_add(amount);
    }

    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.used)
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn refunded(&self) -> u64 {
        self.refunded
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GasCost;

impl GasCost {
    pub const ZERO: u64 = 0;
    pub const BASE: u64 = 2;
    pub const VERYLOW: u64 = 3;
    pub const LOW: u64 = 5;
    pub const MID: u64 = 8;
    pub const HIGH: u64 = 10;
    pub const JUMPDEST: u64 = 1;
    pub const EXP: u64 = 10;
    pub const EXPBYTE: u64 = 50;
    pub const MEMORY: u64 = 3;
    pub const QUAD_COEFF_DIV: u64 = 512;
    pub const KECCAK256: u64 = 30;
    pub const KECCAK256WORD: u64 = 6;
    pub const COPY: u64 = 3;
    pub const BLOCKHASH: u64 = 20;
    pub const LOG: u64 = 375;
    pub const LOGDATA: u64 = 8;
    pub const LOGTOPIC: u64 = 375;

    pub const COLD_ACCOUNT_ACCESS: u64 = 2600;
    pub const SLOAD: u64 = 2100;
    pub const SSTORE_SET: u64 = 20000;
    pub const SSTORE_RESET: u64 = 2900;
    pub const SSTORE_NOOP: u64 = 100;
    pub const SSTORE_CLEARS_REFUND: u64 = 4800;

    pub const CALL: u64 = 2600;
    pub const CALLVALUE: u64 = 9000;
    pub const CALLSTIPEND: u64 = 2300;
    pub const NEWACCOUNT: u64 = 25000;

    pub const CREATE: u64 = 32000;
    pub const INITCODE_WORD: u64 = 2;
    pub const CODEDEPOSIT: u64 = 200;

    fn words(size: u64) -> u64 {
        size / 32 + u64::from(size % 32 != 0)
    }

    /// Total cost of a memory of `words` 32-byte words.
    pub fn memory_cost(words: u64) -> u64 {
        Self::MEMORY
            .saturating_mul(words)
            .saturating_add(words.saturating_mul(words) / Self::QUAD_COEFF_DIV)
    }

    pub fn exp_cost(exponent_bytes: u64) -> u64 {
        Self::EXP.saturating_add(Self::EXPBYTE.saturating_mul(exponent_bytes))
    }

    pub fn keccak256_cost(size: u64) -> u64 {
        Self::KECCAK256.saturating_add(Self::KECCAK256WORD.saturating_mul(Self::words(size)))
    }

    pub fn copy_cost(size: u64) -> u64 {
        Self::COPY.saturating_mul(Self::words(size))
    }

    pub fn log_cost(topic_count: u64, size: u64) -> u64 {
        Self::LOG
            .saturating_add(Self::LOGTOPIC.saturating_mul(topic_count))
            .saturating_add(Self::LOGDATA.saturating_mul(size))
    }

    pub fn initcode_cost(size: u64) -> u64 {
        Self::INITCODE_WORD.saturating_mul(Self::words(size))
    }

    /// CREATE2 hashes the init code on top of the CREATE charges.
    pub fn create2_hash_cost(size: u64) -> u64 {
        Self::KECCAK256WORD.saturating_mul(Self::words(size))
    }

    pub fn code_deposit_cost(size: u64) -> u64 {
        Self::CODEDEPOSIT.saturating_mul(size)
    }

    /// Gas a caller may forward: everything but one 64th of what is left.
    pub fn max_call_gas(remaining: u64) -> u64 {
        remaining - remaining / 64
    }
}
