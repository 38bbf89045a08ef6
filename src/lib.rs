// Core modules
pub mod config;
pub mod node;

// Re-export commonly used types
pub use config::{Config, GenesisAccount, RpcConfig};
pub use node::Node;

// Re-export crate modules
pub use sandbox_crypto as crypto;
pub use sandbox_evm as evm;
pub use sandbox_executor as executor;
pub use sandbox_rpc as rpc;
pub use sandbox_state as state;
pub use sandbox_storage as storage;
pub use sandbox_types as types;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
