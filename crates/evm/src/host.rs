use crate::error::EvmResult;
use crate::result::{CreateOutcome, InterpreterResult};
use sandbox_types::{Address, Bytes, H256, U256};

/// How a message call was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Call,
    CallCode,
    DelegateCall,
    StaticCall,
}

/// A message call handed from a frame to its host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallInputs {
    pub kind: CallKind,
    /// Caller seen by the callee.
    pub caller: Address,
    /// Account whose storage and balance the callee runs against.
    pub target: Address,
    /// Account the callee's code is loaded from.
    pub code_address: Address,
    pub value: U256,
    /// Whether `value` actually moves from `caller` to `target`.
    pub transfer: bool,
    pub input: Bytes,
    pub gas_limit: u64,
    pub is_static: bool,
    pub depth: usize,
}

impl CallInputs {
    /// A plain top-level call from an externally owned account.
    pub fn call(caller: Address, target: Address, value: U256, input: Bytes, gas_limit: u64) -> Self {
        CallInputs {
            kind: CallKind::Call,
            caller,
            target,
            code_address: target,
            value,
            transfer: true,
            input,
            gas_limit,
            is_static: false,
            depth: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateScheme {
    Create,
    Create2 { salt: H256 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateInputs {
    pub caller: Address,
    pub scheme: CreateScheme,
    pub value: U256,
    pub init_code: Bytes,
    pub gas_limit: u64,
    pub depth: usize,
}

/// State access and nested execution a running frame needs from outside.
///
/// Any `Err` returned here is fatal: it is propagated out of every frame
/// untouched instead of halting the current one.
pub trait Host {
    fn balance(&self, address: &Address) -> EvmResult<U256>;

    fn code(&self, address: &Address) -> EvmResult<Bytes>;

    /// Zero for accounts that do not exist.
    fn code_hash(&self, address: &Address) -> EvmResult<H256>;

    fn exists(&self, address: &Address) -> EvmResult<bool>;

    fn sload(&self, address: &Address, key: &H256) -> EvmResult<U256>;

    fn sstore(&mut self, address: &Address, key: &H256, value: U256) -> EvmResult<()>;

    fn call(&mut self, inputs: CallInputs) -> EvmResult<InterpreterResult>;

    fn create(&mut self, inputs: CreateInputs) -> EvmResult<CreateOutcome>;
}
