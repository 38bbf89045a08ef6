use anyhow::{Context, Result};
use axum::Router;
use sandbox_evm::{build_block_context, BlockContext, EmptyChain, Header};
use sandbox_executor::Engine;
use sandbox_rpc::{router, Dispatcher, RpcServer};
use sandbox_storage::{Database, MemoryDatabase};
use sandbox_types::{H256, U256};
use std::future::Future;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

use crate::config::Config;

/// A seeded engine plus the dispatcher that serves it.
pub struct Node<D: Database> {
    config: Config,
    dispatcher: Arc<Dispatcher<D>>,
}

impl Node<MemoryDatabase> {
    /// Create a node backed by an in-memory store
    pub fn from_config(config: Config) -> Result<Self> {
        Self::with_database(config, Arc::new(MemoryDatabase::new()))
    }
}

#[cfg(feature = "rocksdb")]
impl Node<sandbox_storage::RocksDatabase> {
    /// Create a node backed by RocksDB at `database.path`
    pub fn open(config: Config) -> Result<Self> {
        std::fs::create_dir_all(&config.database.path)
            .with_context(|| format!("Failed to create {}", config.database.path.display()))?;
        let db = sandbox_storage::RocksDatabase::open(&config.database.path)
            .context("Failed to open RocksDB")?;
        Self::with_database(config, Arc::new(db))
    }
}

impl<D: Database + 'static> Node<D> {
    /// Create a node over a custom database and seed the genesis accounts
    pub fn with_database(config: Config, db: Arc<D>) -> Result<Self> {
        config.validate()?;
        info!(chain_id = config.chain.chain_id, block = config.block.number, "Initializing sandbox node");

        let block = block_context(&config)?;
        let engine = Arc::new(Engine::new(db, block));

        for account in &config.genesis.accounts {
            let address = account.parsed_address()?;
            engine
                .seed_account(address, account.parsed_balance()?, account.nonce)
                .with_context(|| format!("Failed to seed {}", address))?;
            if let Some(code) = account.parsed_code()? {
                engine
                    .seed_code(address, code)
                    .with_context(|| format!("Failed to install code at {}", address))?;
            }
            for (slot, value) in account.parsed_storage()? {
                engine.seed_storage(address, slot, value)?;
            }
        }

        let dispatcher = Arc::new(Dispatcher::new(engine, config.dispatcher_config()?));
        info!(accounts = config.genesis.accounts.len(), "Genesis accounts seeded");

        Ok(Self { config, dispatcher })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn engine(&self) -> &Arc<Engine<D>> {
        self.dispatcher.engine()
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher<D>> {
        &self.dispatcher
    }

    pub fn router(&self) -> Router {
        router(self.dispatcher.clone())
    }

    /// Serve JSON-RPC until `shutdown` resolves
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.rpc_addr()?;
        RpcServer::new(addr, self.dispatcher.clone())
            .run_until(shutdown)
            .await
            .context("JSON-RPC server failed")?;
        info!("Sandbox node stopped");
        Ok(())
    }
}

fn block_context(config: &Config) -> Result<BlockContext> {
    let timestamp = match config.block.timestamp {
        Some(timestamp) => timestamp,
        None => SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .context("System clock is before the Unix epoch")?
            .as_secs(),
    };
    let coinbase = config.coinbase()?;
    let header = Header {
        parent_hash: H256::zero(),
        number: config.block.number,
        timestamp,
        coinbase,
        gas_limit: config.block.gas_limit,
        difficulty: U256::from(config.block.difficulty),
        mix_hash: H256::zero(),
        base_fee: None,
    };
    debug!(number = header.number, timestamp, %coinbase, "Built block context");

    Ok(build_block_context(
        &header,
        Arc::new(EmptyChain),
        Some(coinbase),
        &config.evm_chain_config(),
    ))
}
