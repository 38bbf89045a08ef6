use sandbox_types::{Address, Bytes, H256, U256};
use std::fmt;
use std::sync::Arc;

/// Blocks older than this are not visible to BLOCKHASH.
pub const BLOCK_HASH_HISTORY: u64 = 256;

/// Header fields the execution context is derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub parent_hash: H256,
    pub number: u64,
    pub timestamp: u64,
    pub coinbase: Address,
    pub gas_limit: u64,
    pub difficulty: U256,
    pub mix_hash: H256,
    pub base_fee: Option<U256>,
}

/// Historical header lookup.
pub trait ChainAdapter: Send + Sync {
    fn header(&self, hash: &H256, number: u64) -> Option<Header>;
}

/// A chain with no history; every lookup is unknown.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyChain;

impl ChainAdapter for EmptyChain {
    fn header(&self, _hash: &H256, _number: u64) -> Option<Header> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    pub chain_id: u64,
    /// Overrides the header's base fee when set.
    pub base_fee: Option<U256>,
    pub max_code_size: usize,
    pub max_call_depth: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        ChainConfig {
            chain_id: 1337,
            base_fee: None,
            max_code_size: 24576,
            max_call_depth: 1024,
        }
    }
}

/// Read-only block environment shared by every execution of an engine.
#[derive(Clone)]
pub struct BlockContext {
    pub number: u64,
    pub timestamp: u64,
    pub coinbase: Address,
    pub gas_limit: u64,
    pub difficulty: U256,
    /// Present once difficulty is zero; served by opcode 0x44 instead of difficulty.
    pub prev_randao: Option<H256>,
    pub base_fee: U256,
    pub chain_id: u64,
    pub max_code_size: usize,
    pub max_call_depth: usize,
    parent_hash: H256,
    chain: Arc<dyn ChainAdapter>,
}

impl BlockContext {
    /// Hash of an ancestor block, or zero when it is out of range or unknown.
    pub fn block_hash(&self, number: U256) -> H256 {
        let current = U256::from(self.number);
        if number >= current || current - number > U256::from(BLOCK_HASH_HISTORY) {
            return H256::zero();
        }
        let target = number.low_u64();

        let mut hash = self.parent_hash;
        let mut height = self.number - 1;
        loop {
            if height == target {
                return hash;
            }
            match self.chain.header(&hash, height) {
                Some(header) if header.number == height && height > 0 => {
                    hash = header.parent_hash;
                    height -= 1;
                }
                _ => return H256::zero(),
            }
        }
    }

    pub fn parent_hash(&self) -> H256 {
        self.parent_hash
    }
}

impl fmt::Debug for BlockContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockContext")
            .field("number", &self.number)
            .field("timestamp", &self.timestamp)
            .field("coinbase", &self.coinbase)
            .field("gas_limit", &self.gas_limit)
            .field("difficulty", &self.difficulty)
            .field("base_fee", &self.base_fee)
            .field("chain_id", &self.chain_id)
            .finish_non_exhaustive()
    }
}

/// Builds the block environment. Pure; the adapter is only consulted later by BLOCKHASH.
pub fn build_block_context(
    header: &Header,
    chain: Arc<dyn ChainAdapter>,
    coinbase_override: Option<Address>,
    config: &ChainConfig,
) -> BlockContext {
    let prev_randao = if header.difficulty.is_zero() {
        Some(header.mix_hash)
    } else {
        None
    };

    BlockContext {
        number: header.number,
        timestamp: header.timestamp,
        coinbase: coinbase_override.unwrap_or(header.coinbase),
        gas_limit: header.gas_limit,
        difficulty: header.difficulty,
        prev_randao,
        base_fee: config.base_fee.or(header.base_fee).unwrap_or_default(),
        chain_id: config.chain_id,
        max_code_size: config.max_code_size,
        max_call_depth: config.max_call_depth,
        parent_hash: header.parent_hash,
        chain,
    }
}

/// Per-transaction environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TxContext {
    pub origin: Address,
    pub gas_price: U256,
}

/// Everything one frame of bytecode runs against.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub caller: Address,
    pub address: Address,
    pub value: U256,
    pub code: Bytes,
    pub input: Bytes,
    pub gas_limit: u64,
    pub is_static: bool,
    pub depth: usize,
    pub block: Arc<BlockContext>,
    pub tx: TxContext,
}
