use crate::frame::Frames;
use crate::result::{CreateResult, ExecutionResult, Outcome};
use crate::transaction::{build_tx_context, Transaction};
use crate::{EngineError, Result};
use parking_lot::RwLock;
use sandbox_evm::{
    BlockContext, BytecodeInterpreter, CallInputs, CreateInputs, CreateScheme, EvmResult,
    Interpreter, TxContext,
};
use sandbox_state::{Account, AccountStore, StateError};
use sandbox_storage::Database;
use sandbox_types::{Address, Bytes, H256, U256};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Executes Calls and Creates against one account store.
///
/// Every mutating operation holds the store's write lock for its whole
/// duration, nested frames included. Reads take the read lock. Once a store
/// invariant is violated the engine poisons itself and refuses further work.
pub struct Engine<D: Database, I: Interpreter = BytecodeInterpreter> {
    state: RwLock<AccountStore<D>>,
    interpreter: I,
    block: Arc<BlockContext>,
    poisoned: AtomicBool,
}

impl<D: Database> Engine<D, BytecodeInterpreter> {
    pub fn new(db: Arc<D>, block: BlockContext) -> Self {
        Self::with_interpreter(db, block, BytecodeInterpreter)
    }
}

impl<D: Database, I: Interpreter> Engine<D, I> {
    pub fn with_interpreter(db: Arc<D>, block: BlockContext, interpreter: I) -> Self {
        Engine {
            state: RwLock::new(AccountStore::new(db)),
            interpreter,
            block: Arc::new(block),
            poisoned: AtomicBool::new(false),
        }
    }

    pub fn block(&self) -> &Arc<BlockContext> {
        &self.block
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::SeqCst)
    }

    /// Runs `input` against `target`'s code, moving `value` from `caller` first.
    pub fn call(
        &self,
        caller: Address,
        target: Address,
        input: Bytes,
        gas_limit: u64,
        value: U256,
    ) -> Result<ExecutionResult> {
        let tx = TxContext {
            origin: caller,
            gas_price: U256::zero(),
        };
        self.run_call(CallInputs::call(caller, target, value, input, gas_limit), tx, true)
    }

    /// Like [`call`](Self::call) but every effect is rolled back afterwards.
    pub fn simulate_call(
        &self,
        caller: Address,
        target: Address,
        input: Bytes,
        gas_limit: u64,
        value: U256,
    ) -> Result<ExecutionResult> {
        self.simulate(&Transaction {
            from: caller,
            to: Some(target),
            gas: gas_limit,
            gas_price: U256::zero(),
            value,
            data: input,
        })
    }

    /// Runs a Call transaction with the same context [`transact`](Self::transact)
    /// would build, then rolls every effect back.
    pub fn simulate(&self, transaction: &Transaction) -> Result<ExecutionResult> {
        let to = transaction.to.ok_or(EngineError::SimulateCreate)?;
        let inputs = CallInputs::call(
            transaction.from,
            to,
            transaction.value,
            transaction.data.clone(),
            transaction.gas,
        );
        self.run_call(inputs, build_tx_context(transaction), false)
    }

    /// Deploys `init_code` at the address derived from `caller` and its nonce.
    pub fn create(
        &self,
        caller: Address,
        init_code: Bytes,
        gas_limit: u64,
        value: U256,
    ) -> Result<CreateResult> {
        let tx = TxContext {
            origin: caller,
            gas_price: U256::zero(),
        };
        self.run_create(caller, init_code, gas_limit, value, tx)
    }

    /// Call or Create depending on whether the transaction names a target.
    pub fn transact(&self, transaction: &Transaction) -> Result<Outcome> {
        let tx = build_tx_context(transaction);
        match transaction.to {
            Some(to) => {
                let inputs = CallInputs::call(
                    transaction.from,
                    to,
                    transaction.value,
                    transaction.data.clone(),
                    transaction.gas,
                );
                self.run_call(inputs, tx, true).map(Outcome::Call)
            }
            None => self
                .run_create(
                    transaction.from,
                    transaction.data.clone(),
                    transaction.gas,
                    transaction.value,
                    tx,
                )
                .map(Outcome::Create),
        }
    }

    fn run_call(&self, mut inputs: CallInputs, tx: TxContext, commit: bool) -> Result<ExecutionResult> {
        inputs.gas_limit = self.cap_gas(inputs.gas_limit);
        let caller = inputs.caller;
        let target = inputs.target;
        let gas_limit = inputs.gas_limit;

        let result = self.execute(tx, |frames| {
            let snapshot = frames.state.snapshot();
            let result = frames.call_frame(inputs)?;
            if !commit {
                frames
                    .state
                    .revert_to_snapshot(snapshot)
                    .map_err(|e| sandbox_evm::EvmError::Host(e.to_string()))?;
            }
            Ok(result)
        })?;

        let result = ExecutionResult::from_interpreter(result, gas_limit);
        debug!(
            %caller,
            %target,
            gas_limit,
            gas_used = result.gas_used(),
            status = ?result.status,
            commit,
            "call"
        );
        Ok(result)
    }

    fn run_create(
        &self,
        caller: Address,
        init_code: Bytes,
        gas_limit: u64,
        value: U256,
        tx: TxContext,
    ) -> Result<CreateResult> {
        let gas_limit = self.cap_gas(gas_limit);
        let inputs = CreateInputs {
            caller,
            scheme: CreateScheme::Create,
            value,
            init_code,
            gas_limit,
            depth: 0,
        };
        let outcome = self.execute(tx, |frames| frames.create_frame(inputs))?;

        let result = ExecutionResult::from_interpreter(outcome.result, gas_limit);
        let deployed_code = if result.is_success() {
            result.output.clone()
        } else {
            Bytes::new()
        };
        debug!(
            %caller,
            address = ?outcome.address,
            gas_limit,
            gas_used = result.gas_used(),
            status = ?result.status,
            "create"
        );
        Ok(CreateResult {
            address: outcome.address,
            deployed_code,
            result,
        })
    }

    /// A top-level frame never gets more gas than the block allows.
    fn cap_gas(&self, gas_limit: u64) -> u64 {
        gas_limit.min(self.block.gas_limit)
    }

    /// Runs `f` under the write lock, then commits the journal. A fatal
    /// host error poisons the engine.
    fn execute<T>(
        &self,
        tx: TxContext,
        f: impl FnOnce(&mut Frames<'_, D, I>) -> EvmResult<T>,
    ) -> Result<T> {
        self.ensure_usable()?;
        let mut state = self.state.write();
        let outcome = {
            let mut frames = Frames::new(&mut state, &self.interpreter, &self.block, tx);
            f(&mut frames)
        };
        match outcome {
            Ok(value) => {
                state.commit();
                Ok(value)
            }
            Err(err) => Err(self.poison(err.to_string())),
        }
    }

    /// Applies a direct state write. Failures here are store failures too.
    fn mutate<T>(&self, f: impl FnOnce(&mut AccountStore<D>) -> Result<T>) -> Result<T> {
        self.ensure_usable()?;
        let mut state = self.state.write();
        let outcome = f(&mut state);
        match outcome {
            Ok(value) => {
                state.commit();
                Ok(value)
            }
            Err(EngineError::State(err)) => Err(self.poison(err.to_string())),
            Err(other) => {
                state.commit();
                Err(other)
            }
        }
    }

    fn read<T>(&self, f: impl FnOnce(&AccountStore<D>) -> std::result::Result<T, StateError>) -> Result<T> {
        self.ensure_usable()?;
        let state = self.state.read();
        Ok(f(&state)?)
    }

    fn ensure_usable(&self) -> Result<()> {
        if self.is_poisoned() {
            return Err(EngineError::Poisoned);
        }
        Ok(())
    }

    fn poison(&self, reason: String) -> EngineError {
        self.poisoned.store(true, Ordering::SeqCst);
        error!(%reason, "account store invariant violated; engine poisoned");
        EngineError::Corrupted(reason)
    }

    // ---- reads ----

    pub fn balance(&self, address: &Address) -> Result<U256> {
        self.read(|state| state.balance(address))
    }

    pub fn nonce(&self, address: &Address) -> Result<u64> {
        self.read(|state| state.nonce(address))
    }

    pub fn code(&self, address: &Address) -> Result<Bytes> {
        self.read(|state| state.code(address))
    }

    pub fn storage(&self, address: &Address, slot: &H256) -> Result<U256> {
        self.read(|state| state.storage(address, slot))
    }

    pub fn account(&self, address: &Address) -> Result<Option<Account>> {
        self.read(|state| state.account(address))
    }

    pub fn accounts(&self) -> Result<Vec<Account>> {
        self.read(|state| state.accounts())
    }

    // ---- seeding ----

    pub fn seed_account(&self, address: Address, balance: U256, nonce: u64) -> Result<()> {
        self.mutate(|state| {
            state.get_or_create(&address)?;
            state.set_balance(&address, balance)?;
            state.set_nonce(&address, nonce)?;
            Ok(())
        })?;
        info!(%address, %balance, nonce, "seeded account");
        Ok(())
    }

    pub fn set_balance(&self, address: Address, balance: U256) -> Result<()> {
        self.mutate(|state| Ok(state.set_balance(&address, balance)?))
    }

    /// Installs code directly. An address that already has code is refused.
    pub fn seed_code(&self, address: Address, code: Bytes) -> Result<()> {
        self.mutate(|state| {
            if state.code_hash(&address)? != sandbox_crypto::KECCAK_EMPTY {
                return Err(EngineError::CodeCollision(address));
            }
            state.set_code(&address, code)?;
            Ok(())
        })
    }

    pub fn seed_storage(&self, address: Address, slot: H256, value: U256) -> Result<()> {
        self.mutate(|state| Ok(state.set_storage(&address, &slot, value)?))
    }
}
