use thiserror::Error;

pub mod methods;
pub mod server;
pub mod types;

pub use methods::{Dispatcher, DispatcherConfig, Method};
pub use server::{router, RpcServer, PING_RESPONSE};
pub use types::{RpcRequest, RpcResponse, TransactionRequest};

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("Invalid request")]
    InvalidRequest,

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl RpcError {
    pub fn code(&self) -> i32 {
        match self {
            RpcError::InvalidRequest => -32600,
            RpcError::MethodNotFound(_) => -32601,
            RpcError::InvalidParams(_) => -32602,
            RpcError::InternalError(_) => -32603,
            RpcError::ParseError(_) => -32700,
        }
    }
}

impl From<sandbox_executor::EngineError> for RpcError {
    fn from(err: sandbox_executor::EngineError) -> Self {
        RpcError::InternalError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RpcError>;
