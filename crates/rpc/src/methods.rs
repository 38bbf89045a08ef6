use crate::types::{parse_address, RpcRequest, RpcResponse, TransactionRequest};
use crate::{Result, RpcError};
use sandbox_evm::{BytecodeInterpreter, Interpreter};
use sandbox_executor::{Engine, ExecutionResult, LegacyTransaction, Outcome, Transaction};
use sandbox_storage::Database;
use sandbox_types::{decode_hex, Address, Bytes, UintExt};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Methods the dispatcher routes to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Call,
    Send,
    SendRawTransaction,
    GetBalance,
    GetTransactionCount,
    GetCode,
}

impl Method {
    pub const ALL: [Method; 6] = [
        Method::Call,
        Method::Send,
        Method::SendRawTransaction,
        Method::GetBalance,
        Method::GetTransactionCount,
        Method::GetCode,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|method| method.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Method::Call => "eth_call",
            Method::Send => "eth_send",
            Method::SendRawTransaction => "eth_sendRawTransaction",
            Method::GetBalance => "eth_getBalance",
            Method::GetTransactionCount => "eth_getTransactionCount",
            Method::GetCode => "eth_getCode",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Sender used when a request names none.
    pub default_sender: Address,
    /// Gas limit used when a request asks for 0.
    pub default_gas_limit: u64,
    /// Answer unknown methods with `MethodNotFound` instead of an empty success.
    pub strict_methods: bool,
    /// Let `eth_call` keep its state changes.
    pub eth_call_commits: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        DispatcherConfig {
            default_sender: Address::ZERO,
            default_gas_limit: 1_000_000,
            strict_methods: false,
            eth_call_commits: false,
        }
    }
}

/// What a handler produced, before the envelope is assembled.
struct Reply {
    result: Bytes,
    gas_left: u64,
    error: Option<String>,
}

impl Reply {
    fn data(result: Bytes) -> Self {
        Reply {
            result,
            gas_left: 0,
            error: None,
        }
    }

    fn execution(result: ExecutionResult) -> Self {
        Reply {
            error: result.error_message(),
            gas_left: result.gas_remaining,
            result: result.output,
        }
    }
}

/// Maps JSON-RPC requests onto engine operations.
///
/// Every method owns a counter; the response id is its value before the
/// dispatch, and it advances whether or not the request succeeds.
pub struct Dispatcher<D: Database, I: Interpreter = BytecodeInterpreter> {
    engine: Arc<Engine<D, I>>,
    config: DispatcherConfig,
    counters: [AtomicU64; Method::ALL.len()],
    unknown: AtomicU64,
}

impl<D: Database, I: Interpreter> Dispatcher<D, I> {
    pub fn new(engine: Arc<Engine<D, I>>, config: DispatcherConfig) -> Self {
        Dispatcher {
            engine,
            config,
            counters: Default::default(),
            unknown: AtomicU64::new(0),
        }
    }

    pub fn engine(&self) -> &Arc<Engine<D, I>> {
        &self.engine
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Current counter value of `method`, i.e. the id its next response gets.
    pub fn request_count(&self, method: Method) -> u64 {
        self.counters[method as usize].load(Ordering::SeqCst)
    }

    pub fn dispatch(&self, request: RpcRequest) -> RpcResponse {
        let method = Method::from_name(&request.method);
        let counter = match method {
            Some(method) => &self.counters[method as usize],
            None => &self.unknown,
        };
        let id = counter.fetch_add(1, Ordering::SeqCst);

        let Some(method) = method else {
            if self.config.strict_methods {
                let err = RpcError::MethodNotFound(request.method);
                warn!(code = err.code(), %err, "rejected request");
                return RpcResponse::failure(id, &err.to_string(), Bytes::new(), 0);
            }
            debug!(method = %request.method, id, "unknown method passed through");
            return RpcResponse::success(id, Bytes::new(), 0);
        };

        match self.handle(method, &request.params) {
            Ok(reply) => {
                debug!(method = method.name(), id, gas_left = reply.gas_left, ok = reply.error.is_none(), "dispatched");
                match reply.error {
                    Some(message) => RpcResponse::failure(id, &message, reply.result, reply.gas_left),
                    None => RpcResponse::success(id, reply.result, reply.gas_left),
                }
            }
            Err(err) => {
                warn!(method = method.name(), id, code = err.code(), %err, "request failed");
                RpcResponse::failure(id, &err.to_string(), Bytes::new(), 0)
            }
        }
    }

    fn handle(&self, method: Method, params: &[Value]) -> Result<Reply> {
        match method {
            Method::Call => {
                let tx = self.transaction_param(params)?;
                if tx.to.is_some() && !self.config.eth_call_commits {
                    Ok(Reply::execution(self.engine.simulate(&tx)?))
                } else {
                    self.transact(&tx)
                }
            }
            Method::Send => {
                let tx = self.transaction_param(params)?;
                self.transact(&tx)
            }
            Method::SendRawTransaction => {
                let raw = param_str(params, 0, "raw transaction")?;
                let raw = decode_hex(raw).map_err(|e| RpcError::InvalidParams(format!("raw transaction: {}", e)))?;
                let legacy = LegacyTransaction::decode(&raw)
                    .map_err(|e| RpcError::InvalidParams(format!("raw transaction: {}", e)))?;
                let from = match params.get(1).and_then(Value::as_str) {
                    Some(text) => parse_address(text, "from")?.unwrap_or(self.config.default_sender),
                    None => self.config.default_sender,
                };
                let mut tx = legacy.into_transaction(from);
                if tx.gas == 0 {
                    tx.gas = self.config.default_gas_limit;
                }
                self.transact(&tx)
            }
            Method::GetBalance => {
                let address = self.address_param(params)?;
                let balance = self.engine.balance(&address)?;
                Ok(Reply::data(Bytes::from_slice(&balance.to_be_bytes32())))
            }
            Method::GetTransactionCount => {
                let address = self.address_param(params)?;
                let nonce = self.engine.nonce(&address)?;
                Ok(Reply::data(Bytes::from_slice(&nonce.to_be_bytes())))
            }
            Method::GetCode => {
                let address = self.address_param(params)?;
                Ok(Reply::data(self.engine.code(&address)?))
            }
        }
    }

    fn transact(&self, tx: &Transaction) -> Result<Reply> {
        match self.engine.transact(tx)? {
            Outcome::Call(result) => Ok(Reply::execution(result)),
            Outcome::Create(created) => {
                let mut reply = Reply::execution(created.result);
                if reply.error.is_none() {
                    if let Some(address) = created.address {
                        reply.result = Bytes::from_slice(address.as_bytes());
                    }
                }
                Ok(reply)
            }
        }
    }

    fn transaction_param(&self, params: &[Value]) -> Result<Transaction> {
        let param = params
            .first()
            .ok_or_else(|| RpcError::InvalidParams("missing transaction parameter".to_string()))?;
        TransactionRequest::from_param(param)?
            .into_transaction(self.config.default_sender, self.config.default_gas_limit)
    }

    /// `params[0]` is an address, or a transaction whose `from` names one.
    fn address_param(&self, params: &[Value]) -> Result<Address> {
        let param = params
            .first()
            .ok_or_else(|| RpcError::InvalidParams("missing address parameter".to_string()))?;
        if let Value::String(text) = param {
            if !text.trim_start().starts_with('{') {
                return parse_address(text, "address")?
                    .ok_or_else(|| RpcError::InvalidParams("empty address".to_string()));
            }
        }
        let request = TransactionRequest::from_param(param)?;
        parse_address(request.from.as_deref().unwrap_or_default(), "from")?
            .ok_or_else(|| RpcError::InvalidParams("missing address parameter".to_string()))
    }
}

fn param_str<'a>(params: &'a [Value], index: usize, name: &str) -> Result<&'a str> {
    params
        .get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| RpcError::InvalidParams(format!("missing {} parameter", name)))
}
