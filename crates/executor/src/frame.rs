//! Host side of execution: every nested CALL and CREATE comes back through
//! [`Frames`], which applies the same checks, snapshot and rollback as a
//! top-level operation.

use sandbox_crypto::{create2_address, create_address, keccak256, KECCAK_EMPTY};
use sandbox_evm::{
    precompile, BlockContext, CallInputs, CreateInputs, CreateOutcome, CreateScheme, EvmError,
    EvmResult, ExecutionContext, GasCost, HaltReason, Host, Interpreter, InterpreterResult,
    TxContext,
};
use sandbox_state::{AccountStore, StateError};
use sandbox_storage::Database;
use sandbox_types::{Address, Bytes, H256, U256};
use std::sync::Arc;
use tracing::trace;

/// Deployed code may not start with the EOF magic byte.
const EOF_PREFIX: u8 = 0xef;

fn host_error(error: StateError) -> EvmError {
    EvmError::Host(error.to_string())
}

pub(crate) struct Frames<'a, D: Database, I: Interpreter> {
    pub(crate) state: &'a mut AccountStore<D>,
    pub(crate) interpreter: &'a I,
    pub(crate) block: &'a Arc<BlockContext>,
    pub(crate) tx: TxContext,
}

impl<'a, D: Database, I: Interpreter> Frames<'a, D, I> {
    pub(crate) fn new(
        state: &'a mut AccountStore<D>,
        interpreter: &'a I,
        block: &'a Arc<BlockContext>,
        tx: TxContext,
    ) -> Self {
        Frames {
            state,
            interpreter,
            block,
            tx,
        }
    }

    /// Runs a message call: depth and balance checks, snapshot, transfer,
    /// then precompile or bytecode. Anything but success rolls back.
    pub(crate) fn call_frame(&mut self, inputs: CallInputs) -> EvmResult<InterpreterResult> {
        let gas_limit = inputs.gas_limit;
        if inputs.depth > self.block.max_call_depth {
            return Ok(InterpreterResult::halt_with_gas(HaltReason::CallDepthExceeded, gas_limit));
        }
        if inputs.transfer && self.state.balance(&inputs.caller).map_err(host_error)? < inputs.value {
            return Ok(InterpreterResult::halt_with_gas(HaltReason::InsufficientBalance, gas_limit));
        }

        let snapshot = self.state.snapshot();
        if inputs.transfer {
            self.state
                .transfer(&inputs.caller, &inputs.target, inputs.value)
                .map_err(host_error)?;
        }

        let result = if let Some(contract) = precompile(&inputs.code_address) {
            match contract.execute(&inputs.input, gas_limit) {
                Ok((output, used)) => InterpreterResult::success(Bytes::from_vec(output), gas_limit - used),
                Err(error) => {
                    InterpreterResult::halt(error.halt_reason().unwrap_or(HaltReason::PrecompileFailed))
                }
            }
        } else {
            let code = self.state.code(&inputs.code_address).map_err(host_error)?;
            if code.is_empty() {
                InterpreterResult::success(Bytes::new(), gas_limit)
            } else {
                let context = ExecutionContext {
                    caller: inputs.caller,
                    address: inputs.target,
                    value: inputs.value,
                    code,
                    input: inputs.input,
                    gas_limit,
                    is_static: inputs.is_static,
                    depth: inputs.depth,
                    block: Arc::clone(self.block),
                    tx: self.tx,
                };
                let interpreter = self.interpreter;
                interpreter.execute(context, self)?
            }
        };

        if !result.is_success() {
            self.state.revert_to_snapshot(snapshot).map_err(host_error)?;
        }
        trace!(depth = inputs.depth, target = %inputs.target, status = ?result.status, "call frame done");
        Ok(result)
    }

    /// Runs a contract creation. The caller's nonce is bumped before the
    /// snapshot, so a failed deployment still consumes it.
    pub(crate) fn create_frame(&mut self, inputs: CreateInputs) -> EvmResult<CreateOutcome> {
        let gas_limit = inputs.gas_limit;
        let early = |reason| CreateOutcome {
            result: InterpreterResult::halt_with_gas(reason, gas_limit),
            address: None,
        };

        if inputs.depth > self.block.max_call_depth {
            return Ok(early(HaltReason::CallDepthExceeded));
        }
        if self.state.balance(&inputs.caller).map_err(host_error)? < inputs.value {
            return Ok(early(HaltReason::InsufficientBalance));
        }
        let nonce = self.state.nonce(&inputs.caller).map_err(host_error)?;
        if nonce == u64::MAX {
            return Ok(early(HaltReason::NonceOverflow));
        }
        self.state.increment_nonce(&inputs.caller).map_err(host_error)?;

        let address = match inputs.scheme {
            CreateScheme::Create => create_address(&inputs.caller, nonce),
            CreateScheme::Create2 { salt } => {
                create2_address(&inputs.caller, &salt, &keccak256(&inputs.init_code))
            }
        };

        if self.state.code_hash(&address).map_err(host_error)? != KECCAK_EMPTY
            || self.state.nonce(&address).map_err(host_error)? != 0
        {
            return Ok(CreateOutcome {
                result: InterpreterResult::halt(HaltReason::CreateCollision),
                address: Some(address),
            });
        }

        let snapshot = self.state.snapshot();
        self.state.set_nonce(&address, 1).map_err(host_error)?;
        self.state
            .transfer(&inputs.caller, &address, inputs.value)
            .map_err(host_error)?;

        let context = ExecutionContext {
            caller: inputs.caller,
            address,
            value: inputs.value,
            code: inputs.init_code,
            input: Bytes::new(),
            gas_limit,
            is_static: false,
            depth: inputs.depth,
            block: Arc::clone(self.block),
            tx: self.tx,
        };
        let interpreter = self.interpreter;
        let mut result = interpreter.execute(context, self)?;

        if result.is_success() {
            match self.deposit_cost(&result.output, result.gas_left) {
                Ok(cost) => {
                    result.gas_left -= cost;
                    self.state
                        .set_code(&address, result.output.clone())
                        .map_err(host_error)?;
                }
                Err(reason) => result = InterpreterResult::halt(reason),
            }
        }

        if !result.is_success() {
            self.state.revert_to_snapshot(snapshot).map_err(host_error)?;
        }
        trace!(depth = inputs.depth, %address, status = ?result.status, "create frame done");
        Ok(CreateOutcome {
            result,
            address: Some(address),
        })
    }

    fn deposit_cost(&self, code: &[u8], gas_left: u64) -> Result<u64, HaltReason> {
        if code.first() == Some(&EOF_PREFIX) {
            return Err(HaltReason::InvalidCode);
        }
        if code.len() > self.block.max_code_size {
            return Err(HaltReason::CreateContractSizeLimit);
        }
        let cost = GasCost::code_deposit_cost(code.len() as u64);
        if cost > gas_left {
            return Err(HaltReason::OutOfGas);
        }
        Ok(cost)
    }
}

impl<'a, D: Database, I: Interpreter> Host for Frames<'a, D, I> {
    fn balance(&self, address: &Address) -> EvmResult<U256> {
        self.state.balance(address).map_err(host_error)
    }

    fn code(&self, address: &Address) -> EvmResult<Bytes> {
        self.state.code(address).map_err(host_error)
    }

    fn code_hash(&self, address: &Address) -> EvmResult<H256> {
        if !self.state.exists(address).map_err(host_error)? {
            return Ok(H256::zero());
        }
        self.state.code_hash(address).map_err(host_error)
    }

    fn exists(&self, address: &Address) -> EvmResult<bool> {
        self.state.exists(address).map_err(host_error)
    }

    fn sload(&self, address: &Address, key: &H256) -> EvmResult<U256> {
        self.state.storage(address, key).map_err(host_error)
    }

    fn sstore(&mut self, address: &Address, key: &H256, value: U256) -> EvmResult<()> {
        self.state.set_storage(address, key, value).map_err(host_error)
    }

    fn call(&mut self, inputs: CallInputs) -> EvmResult<InterpreterResult> {
        self.call_frame(inputs)
    }

    fn create(&mut self, inputs: CreateInputs) -> EvmResult<CreateOutcome> {
        self.create_frame(inputs)
    }
}
