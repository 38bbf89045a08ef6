use anyhow::{Context, Result};
use sandbox_evm::ChainConfig as EvmChainConfig;
use sandbox_rpc::DispatcherConfig;
use sandbox_types::{decode_hex, Address, Bytes, H256, U256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Complete sandbox configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub chain: ChainConfig,
    pub block: BlockConfig,
    pub execution: ExecutionConfig,
    pub genesis: GenesisConfig,
    pub rpc: RpcConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub chain_id: u64,
    /// Served by BASEFEE; not enforced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_fee: Option<u64>,
    pub max_code_size: usize,
    pub max_call_depth: usize,
}

/// Header of the one block every execution sees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockConfig {
    pub number: u64,
    /// Unix seconds; process start when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    pub difficulty: u64,
    pub gas_limit: u64,
    /// First genesis account when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coinbase: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub default_gas_limit: u64,
    /// First genesis account when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_sender: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenesisConfig {
    pub accounts: Vec<GenesisAccount>,
}

/// Account seeded before the node serves requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAccount {
    pub address: String,
    /// Decimal or 0x-hex wei.
    pub balance: String,
    #[serde(default)]
    pub nonce: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub storage: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    pub host: String,
    pub port: u16,
    pub strict_methods: bool,
    pub eth_call_commits: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Memory,
    Rocksdb,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub path: PathBuf,
}

impl Default for ChainConfig {
    fn default() -> Self {
        let defaults = EvmChainConfig::default();
        Self {
            chain_id: defaults.chain_id,
            base_fee: None,
            max_code_size: defaults.max_code_size,
            max_call_depth: defaults.max_call_depth,
        }
    }
}

impl Default for BlockConfig {
    fn default() -> Self {
        Self {
            number: 18_437_836,
            timestamp: None,
            difficulty: 1,
            gas_limit: 1_000_000_000_000,
            coinbase: None,
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            default_gas_limit: 1_000_000,
            default_sender: None,
        }
    }
}

impl Default for GenesisConfig {
    fn default() -> Self {
        let account = |address: &str| GenesisAccount {
            address: address.to_string(),
            balance: "1000000000000000000".to_string(),
            nonce: 0,
            code: None,
            storage: BTreeMap::new(),
        };
        Self {
            accounts: vec![
                account("0x00000000000000000000000000000000000a11ce"),
                account("0x0000000000000000000000000000000000000b0b"),
            ],
        }
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            strict_methods: false,
            eth_call_commits: false,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: DatabaseBackend::Memory,
            path: PathBuf::from("./sandbox-db"),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read configuration file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }

    pub fn validate(&self) -> Result<()> {
        if self.execution.default_gas_limit == 0 {
            anyhow::bail!("default_gas_limit must be greater than 0");
        }
        if self.chain.max_call_depth == 0 {
            anyhow::bail!("max_call_depth must be greater than 0");
        }
        if self.block.number == 0 {
            anyhow::bail!("block number must be greater than 0");
        }
        if self.database.backend == DatabaseBackend::Rocksdb && !cfg!(feature = "rocksdb") {
            anyhow::bail!("rocksdb backend requires the `rocksdb` feature");
        }

        let mut seen = std::collections::BTreeSet::new();
        for account in &self.genesis.accounts {
            let address = account.parsed_address()?;
            if !seen.insert(address) {
                anyhow::bail!("Duplicate genesis account {}", account.address);
            }
            account.parsed_balance()?;
            account.parsed_code()?;
            account.parsed_storage()?;
        }
        if let Some(coinbase) = &self.block.coinbase {
            parse_address(coinbase).context("Invalid coinbase")?;
        }
        if let Some(sender) = &self.execution.default_sender {
            parse_address(sender).context("Invalid default sender")?;
        }
        self.rpc_addr()?;
        Ok(())
    }

    pub fn rpc_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.rpc.host, self.rpc.port)
            .parse()
            .with_context(|| format!("Invalid RPC address {}:{}", self.rpc.host, self.rpc.port))
    }

    fn first_account(&self) -> Result<Option<Address>> {
        self.genesis
            .accounts
            .first()
            .map(GenesisAccount::parsed_address)
            .transpose()
    }

    pub fn coinbase(&self) -> Result<Address> {
        match &self.block.coinbase {
            Some(coinbase) => parse_address(coinbase),
            None => Ok(self.first_account()?.unwrap_or_default()),
        }
    }

    pub fn default_sender(&self) -> Result<Address> {
        match &self.execution.default_sender {
            Some(sender) => parse_address(sender),
            None => Ok(self.first_account()?.unwrap_or_default()),
        }
    }

    pub fn evm_chain_config(&self) -> EvmChainConfig {
        EvmChainConfig {
            chain_id: self.chain.chain_id,
            base_fee: self.chain.base_fee.map(U256::from),
            max_code_size: self.chain.max_code_size,
            max_call_depth: self.chain.max_call_depth,
        }
    }

    pub fn dispatcher_config(&self) -> Result<DispatcherConfig> {
        Ok(DispatcherConfig {
            default_sender: self.default_sender()?,
            default_gas_limit: self.execution.default_gas_limit,
            strict_methods: self.rpc.strict_methods,
            eth_call_commits: self.rpc.eth_call_commits,
        })
    }
}

impl GenesisAccount {
    pub fn parsed_address(&self) -> Result<Address> {
        parse_address(&self.address)
    }

    pub fn parsed_balance(&self) -> Result<U256> {
        parse_u256(&self.balance).with_context(|| format!("Invalid balance for {}", self.address))
    }

    pub fn parsed_code(&self) -> Result<Option<Bytes>> {
        self.code
            .as_deref()
            .map(|code| {
                decode_hex(code)
                    .map(Bytes::from_vec)
                    .with_context(|| format!("Invalid code for {}", self.address))
            })
            .transpose()
    }

    pub fn parsed_storage(&self) -> Result<Vec<(H256, U256)>> {
        self.storage
            .iter()
            .map(|(slot, value)| {
                let slot = parse_u256(slot).with_context(|| format!("Invalid storage slot {}", slot))?;
                let value = parse_u256(value).with_context(|| format!("Invalid storage value {}", value))?;
                Ok((H256::from_slice(&sandbox_types::UintExt::to_be_bytes32(&slot)), value))
            })
            .collect()
    }
}

fn parse_address(s: &str) -> Result<Address> {
    Address::from_str(s).with_context(|| format!("Invalid address {}", s))
}

fn parse_u256(s: &str) -> Result<U256> {
    match s.strip_prefix("0x") {
        Some(digits) => U256::from_str_radix(digits, 16).context("Failed to parse hex U256"),
        None => U256::from_dec_str(s).context("Failed to parse U256"),
    }
}
