use crate::{
    arithmetic,
    context::ExecutionContext,
    error::{EvmError, EvmResult},
    gas::{Gas, GasCost},
    host::{CallInputs, CallKind, CreateInputs, CreateScheme, Host},
    memory::Memory,
    opcodes::{self, *},
    result::{ExitStatus, InterpreterResult, Log},
    stack::Stack,
};
use sandbox_crypto::keccak256;
use sandbox_types::{Bytes, HashExt, UintExt, H256, U256, U512};
use tracing::trace;

/// Runs one frame of bytecode against a host.
///
/// `Ok` covers every frame outcome including exceptional halts. `Err` is
/// reserved for fatal host failures that must abort the whole execution.
pub trait Interpreter: Send + Sync {
    fn execute(&self, context: ExecutionContext, host: &mut dyn Host) -> EvmResult<InterpreterResult>;
}

/// Straightforward fetch-decode-execute interpreter.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytecodeInterpreter;

impl Interpreter for BytecodeInterpreter {
    fn execute(&self, context: ExecutionContext, host: &mut dyn Host) -> EvmResult<InterpreterResult> {
        Machine::new(context, host).run()
    }
}

struct Machine<'h> {
    context: ExecutionContext,
    host: &'h mut dyn Host,
    stack: Stack,
    memory: Memory,
    gas: Gas,
    pc: usize,
    return_data: Vec<u8>,
    logs: Vec<Log>,
    result: Option<InterpreterResult>,
    jumpdests: Vec<bool>,
}

impl<'h> Machine<'h> {
    fn new(context: ExecutionContext, host: &'h mut dyn Host) -> Self {
        let gas = Gas::new(context.gas_limit);
        let jumpdests = opcodes::analyze_jumpdests(&context.code);
        Self {
            context,
            host,
            stack: Stack::new(),
            memory: Memory::new(),
            gas,
            pc: 0,
            return_data: Vec::new(),
            logs: Vec::new(),
            result: None,
            jumpdests,
        }
    }

    fn run(mut self) -> EvmResult<InterpreterResult> {
        while self.result.is_none() {
            let opcode = match self.context.code.get(self.pc) {
                Some(opcode) => *opcode,
                None => break,
            };

            if let Err(error) = self.step(opcode) {
                if error.is_fatal() {
                    return Err(error);
                }
                return Ok(self.halt(error));
            }
        }

        match self.result.take() {
            Some(result) => Ok(result),
            None => Ok(self.finish(Bytes::new())),
        }
    }

    fn finish(&mut self, output: Bytes) -> InterpreterResult {
        let mut result = InterpreterResult::success(output, self.gas.remaining());
        result.gas_refunded = self.gas.refunded();
        result.logs = std::mem::take(&mut self.logs);
        result
    }

    fn halt(&self, error: EvmError) -> InterpreterResult {
        trace!(pc = self.pc, depth = self.context.depth, %error, "frame halted");
        let reason = error
            .halt_reason()
            .unwrap_or(crate::result::HaltReason::OutOfGas);
        InterpreterResult::halt(reason)
    }

    fn step(&mut self, opcode: u8) -> EvmResult<()> {
        let info = opcodes::info(opcode).ok_or(EvmError::InvalidOpcode(opcode))?;
        self.stack.require(info.inputs as usize)?;
        self.stack
            .limit_check((info.outputs as usize).saturating_sub(info.inputs as usize))?;

        match opcode {
            // Stop and Arithmetic Operations
            STOP => {
                let result = self.finish(Bytes::new());
                self.result = Some(result);
                Ok(())
            }
            ADD => self.binary(GasCost::VERYLOW, |a, b| a.overflowing_add(b).0),
            MUL => self.binary(GasCost::LOW, |a, b| a.overflowing_mul(b).0),
            SUB => self.binary(GasCost::VERYLOW, |a, b| a.overflowing_sub(b).0),
            DIV => self.binary(GasCost::LOW, |a, b| if b.is_zero() { U256::zero() } else { a / b }),
            SDIV => self.binary(GasCost::LOW, arithmetic::signed_div),
            MOD => self.binary(GasCost::LOW, |a, b| if b.is_zero() { U256::zero() } else { a % b }),
            SMOD => self.binary(GasCost::LOW, arithmetic::signed_mod),
            ADDMOD => {
                self.gas.consume(GasCost::MID)?;
                let [a, b, n] = self.stack.popn()?;
                let value = if n.is_zero() {
                    U256::zero()
                } else {
                    narrow((U512::from(a) + U512::from(b)) % U512::from(n))
                };
                self.stack.push(value)?;
                self.pc += 1;
                Ok(())
            }
            MULMOD => {
                self.gas.consume(GasCost::MID)?;
                let [a, b, n] = self.stack.popn()?;
                let value = if n.is_zero() {
                    U256::zero()
                } else {
                    narrow(a.full_mul(b) % U512::from(n))
                };
                self.stack.push(value)?;
                self.pc += 1;
                Ok(())
            }
            EXP => {
                let [base, exponent] = self.stack.popn()?;
                let exponent_bytes = (exponent.bits() as u64 + 7) / 8;
                self.gas.consume(GasCost::exp_cost(exponent_bytes))?;
                self.stack.push(base.overflowing_pow(exponent).0)?;
                self.pc += 1;
                Ok(())
            }
            SIGNEXTEND => self.binary(GasCost::LOW, arithmetic::sign_extend),

            // Comparison & Bitwise Logic Operations
            LT => self.binary(GasCost::VERYLOW, |a, b| bool_word(a < b)),
            GT => self.binary(GasCost::VERYLOW, |a, b| bool_word(a > b)),
            SLT => self.binary(GasCost::VERYLOW, |a, b| bool_word(arithmetic::lt_signed(a, b))),
            SGT => self.binary(GasCost::VERYLOW, |a, b| bool_word(arithmetic::lt_signed(b, a))),
            EQ => self.binary(GasCost::VERYLOW, |a, b| bool_word(a == b)),
            ISZERO => {
                self.gas.consume(GasCost::VERYLOW)?;
                let a = self.stack.pop()?;
                self.stack.push_bool(a.is_zero())?;
                self.pc += 1;
                Ok(())
            }
            AND => self.binary(GasCost::VERYLOW, |a, b| a & b),
            OR => self.binary(GasCost::VERYLOW, |a, b| a | b),
            XOR => self.binary(GasCost::VERYLOW, |a, b| a ^ b),
            NOT => {
                self.gas.consume(GasCost::VERYLOW)?;
                let a = self.stack.pop()?;
                self.stack.push(!a)?;
                self.pc += 1;
                Ok(())
            }
            BYTE => self.binary(GasCost::VERYLOW, arithmetic::byte_at),
            SHL => self.binary(GasCost::VERYLOW, |shift, value| {
                if shift >= U256::from(256) {
                    U256::zero()
                } else {
                    value << shift.low_u64() as usize
                }
            }),
            SHR => self.binary(GasCost::VERYLOW, |shift, value| {
                if shift >= U256::from(256) {
                    U256::zero()
                } else {
                    value >> shift.low_u64() as usize
                }
            }),
            SAR => self.binary(GasCost::VERYLOW, |shift, value| {
                arithmetic::arithmetic_shr(value, shift)
            }),

            KECCAK256 => {
                let [offset, size] = self.stack.popn()?;
                let (offset, size) = self.expand(offset, size)?;
                self.gas.consume(GasCost::keccak256_cost(size as u64))?;
                let hash = keccak256(self.memory.slice(offset, size));
                self.stack.push(hash.to_word())?;
                self.pc += 1;
                Ok(())
            }

            // Environmental Information
            ADDRESS => self.push_env(self.context.address.to_word()),
            BALANCE => {
                self.gas.consume(GasCost::COLD_ACCOUNT_ACCESS)?;
                let address = self.stack.pop_address()?;
                let balance = self.host.balance(&address)?;
                self.stack.push(balance)?;
                self.pc += 1;
                Ok(())
            }
            ORIGIN => self.push_env(self.context.tx.origin.to_word()),
            CALLER => self.push_env(self.context.caller.to_word()),
            CALLVALUE => self.push_env(self.context.value),
            CALLDATALOAD => {
                self.gas.consume(GasCost::VERYLOW)?;
                let offset = self.stack.pop()?;
                let mut word = [0u8; 32];
                if let Some(start) = offset.try_as_usize() {
                    let input = self.context.input.as_slice();
                    if start < input.len() {
                        let available = (input.len() - start).min(32);
                        word[..available].copy_from_slice(&input[start..start + available]);
                    }
                }
                self.stack.push(U256::from_big_endian(&word))?;
                self.pc += 1;
                Ok(())
            }
            CALLDATASIZE => self.push_env(U256::from(self.context.input.len())),
            CALLDATACOPY => {
                let [dest, offset, size] = self.stack.popn()?;
                let (dest, size) = self.expand(dest, size)?;
                self.gas.consume(GasCost::VERYLOW + GasCost::copy_cost(size as u64))?;
                self.memory.set_padded(dest, &self.context.input, offset, size);
                self.pc += 1;
                Ok(())
            }
            CODESIZE => self.push_env(U256::from(self.context.code.len())),
            CODECOPY => {
                let [dest, offset, size] = self.stack.popn()?;
                let (dest, size) = self.expand(dest, size)?;
                self.gas.consume(GasCost::VERYLOW + GasCost::copy_cost(size as u64))?;
                self.memory.set_padded(dest, &self.context.code, offset, size);
                self.pc += 1;
                Ok(())
            }
            GASPRICE => self.push_env(self.context.tx.gas_price),
            EXTCODESIZE => {
                self.gas.consume(GasCost::COLD_ACCOUNT_ACCESS)?;
                let address = self.stack.pop_address()?;
                let code = self.host.code(&address)?;
                self.stack.push(U256::from(code.len()))?;
                self.pc += 1;
                Ok(())
            }
            EXTCODECOPY => {
                let address = self.stack.pop_address()?;
                let [dest, offset, size] = self.stack.popn()?;
                let (dest, size) = self.expand(dest, size)?;
                self.gas
                    .consume(GasCost::COLD_ACCOUNT_ACCESS + GasCost::copy_cost(size as u64))?;
                let code = self.host.code(&address)?;
                self.memory.set_padded(dest, &code, offset, size);
                self.pc += 1;
                Ok(())
            }
            RETURNDATASIZE => self.push_env(U256::from(self.return_data.len())),
            RETURNDATACOPY => {
                let [dest, offset, size] = self.stack.popn()?;
                let (end, overflow) = offset.overflowing_add(size);
                if overflow || end > U256::from(self.return_data.len()) {
                    return Err(EvmError::ReturnDataOutOfBounds);
                }
                let (dest, size) = self.expand(dest, size)?;
                self.gas.consume(GasCost::VERYLOW + GasCost::copy_cost(size as u64))?;
                let data = std::mem::take(&mut self.return_data);
                self.memory.set_padded(dest, &data, offset, size);
                self.return_data = data;
                self.pc += 1;
                Ok(())
            }
            EXTCODEHASH => {
                self.gas.consume(GasCost::COLD_ACCOUNT_ACCESS)?;
                let address = self.stack.pop_address()?;
                let hash = self.host.code_hash(&address)?;
                self.stack.push(hash.to_word())?;
                self.pc += 1;
                Ok(())
            }

            // Block Information
            BLOCKHASH => {
                self.gas.consume(GasCost::BLOCKHASH)?;
                let number = self.stack.pop()?;
                let hash = self.context.block.block_hash(number);
                self.stack.push(hash.to_word())?;
                self.pc += 1;
                Ok(())
            }
            COINBASE => self.push_env(self.context.block.coinbase.to_word()),
            TIMESTAMP => self.push_env(U256::from(self.context.block.timestamp)),
            NUMBER => self.push_env(U256::from(self.context.block.number)),
            DIFFICULTY => {
                let block = &self.context.block;
                let value = match block.prev_randao {
                    Some(randao) => randao.to_word(),
                    None => block.difficulty,
                };
                self.push_env(value)
            }
            GASLIMIT => self.push_env(U256::from(self.context.block.gas_limit)),
            CHAINID => self.push_env(U256::from(self.context.block.chain_id)),
            SELFBALANCE => {
                self.gas.consume(GasCost::LOW)?;
                let balance = self.host.balance(&self.context.address)?;
                self.stack.push(balance)?;
                self.pc += 1;
                Ok(())
            }
            BASEFEE => self.push_env(self.context.block.base_fee),

            // Stack, Memory, Storage and Flow Operations
            POP => {
                self.gas.consume(GasCost::BASE)?;
                self.stack.pop()?;
                self.pc += 1;
                Ok(())
            }
            MLOAD => {
                let offset = self.stack.pop()?;
                let (offset, _) = self.expand(offset, U256::from(32))?;
                self.gas.consume(GasCost::VERYLOW)?;
                let value = self.memory.get_u256(offset);
                self.stack.push(value)?;
                self.pc += 1;
                Ok(())
            }
            MSTORE => {
                let [offset, value] = self.stack.popn()?;
                let (offset, _) = self.expand(offset, U256::from(32))?;
                self.gas.consume(GasCost::VERYLOW)?;
                self.memory.set_u256(offset, value);
                self.pc += 1;
                Ok(())
            }
            MSTORE8 => {
                let [offset, value] = self.stack.popn()?;
                let (offset, _) = self.expand(offset, U256::one())?;
                self.gas.consume(GasCost::VERYLOW)?;
                self.memory.set_byte(offset, value.byte(0));
                self.pc += 1;
                Ok(())
            }
            SLOAD => {
                self.gas.consume(GasCost::SLOAD)?;
                let key = H256::from_word(self.stack.pop()?);
                let value = self.host.sload(&self.context.address, &key)?;
                self.stack.push(value)?;
                self.pc += 1;
                Ok(())
            }
            SSTORE => self.sstore(),
            JUMP => {
                self.gas.consume(GasCost::MID)?;
                let dest = self.stack.pop()?;
                self.jump(dest)
            }
            JUMPI => {
                self.gas.consume(GasCost::HIGH)?;
                let [dest, condition] = self.stack.popn()?;
                if condition.is_zero() {
                    self.pc += 1;
                    Ok(())
                } else {
                    self.jump(dest)
                }
            }
            PC => self.push_env(U256::from(self.pc)),
            MSIZE => self.push_env(U256::from(self.memory.len())),
            GAS => {
                self.gas.consume(GasCost::BASE)?;
                self.stack.push(U256::from(self.gas.remaining()))?;
                self.pc += 1;
                Ok(())
            }
            JUMPDEST => {
                self.gas.consume(GasCost::JUMPDEST)?;
                self.pc += 1;
                Ok(())
            }
            PUSH0 => self.push_env(U256::zero()),
            PUSH1..=PUSH32 => {
                self.gas.consume(GasCost::VERYLOW)?;
                let n = opcodes::push_bytes(opcode);
                let code = self.context.code.as_slice();
                let start = self.pc + 1;
                let end = (start + n).min(code.len());

                // Bytes past the end of code read as zero.
                let mut bytes = [0u8; 32];
                let data = &code[start.min(end)..end];
                bytes[32 - n..32 - n + data.len()].copy_from_slice(data);
                self.stack.push(U256::from_big_endian(&bytes))?;
                self.pc = start + n;
                Ok(())
            }
            DUP1..=DUP16 => {
                self.gas.consume(GasCost::VERYLOW)?;
                self.stack.dup((opcode - DUP1) as usize)?;
                self.pc += 1;
                Ok(())
            }
            SWAP1..=SWAP16 => {
                self.gas.consume(GasCost::VERYLOW)?;
                self.stack.swap((opcode - SWAP1 + 1) as usize)?;
                self.pc += 1;
                Ok(())
            }
            LOG0..=LOG4 => self.log((opcode - LOG0) as usize),

            // System Operations
            CREATE => self.create(false),
            CREATE2 => self.create(true),
            CALL => self.call(CallKind::Call),
            CALLCODE => self.call(CallKind::CallCode),
            DELEGATECALL => self.call(CallKind::DelegateCall),
            STATICCALL => self.call(CallKind::StaticCall),
            RETURN => {
                let [offset, size] = self.stack.popn()?;
                let (offset, size) = self.expand(offset, size)?;
                let output = Bytes::from_slice(self.memory.slice(offset, size));
                let result = self.finish(output);
                self.result = Some(result);
                Ok(())
            }
            REVERT => {
                let [offset, size] = self.stack.popn()?;
                let (offset, size) = self.expand(offset, size)?;
                let output = Bytes::from_slice(self.memory.slice(offset, size));
                self.result = Some(InterpreterResult::revert(output, self.gas.remaining()));
                Ok(())
            }

            _ => Err(EvmError::InvalidOpcode(opcode)),
        }
    }

    /// Pops `a` (top) then `b` and pushes `f(a, b)`.
    fn binary(&mut self, cost: u64, f: impl FnOnce(U256, U256) -> U256) -> EvmResult<()> {
        self.gas.consume(cost)?;
        let [a, b] = self.stack.popn()?;
        self.stack.push(f(a, b))?;
        self.pc += 1;
        Ok(())
    }

    fn push_env(&mut self, value: U256) -> EvmResult<()> {
        self.gas.consume(GasCost::BASE)?;
        self.stack.push(value)?;
        self.pc += 1;
        Ok(())
    }

    /// Grows memory to cover `[offset, offset + size)` and charges for it.
    /// A zero size touches nothing, whatever the offset.
    fn expand(&mut self, offset: U256, size: U256) -> EvmResult<(usize, usize)> {
        if size.is_zero() {
            return Ok((0, 0));
        }
        let limit = U256::from(u32::MAX);
        if offset > limit || size > limit {
            return Err(EvmError::OutOfGas);
        }
        let (offset, size) = (offset.low_u64(), size.low_u64());
        let end = offset + size;
        if end > u32::MAX as u64 {
            return Err(EvmError::OutOfGas);
        }

        let words = (end + 31) / 32;
        let current = self.memory.words();
        if words > current {
            let cost = GasCost::memory_cost(words) - GasCost::memory_cost(current);
            self.gas.consume(cost)?;
            self.memory.resize_words(words);
        }
        Ok((offset as usize, size as usize))
    }

    fn jump(&mut self, dest: U256) -> EvmResult<()> {
        match dest.try_as_usize() {
            Some(dest) if self.jumpdests.get(dest).copied().unwrap_or(false) => {
                self.pc = dest;
                Ok(())
            }
            Some(dest) => Err(EvmError::InvalidJump(dest)),
            None => Err(EvmError::InvalidJump(usize::MAX)),
        }
    }

    fn sstore(&mut self) -> EvmResult<()> {
        if self.context.is_static {
            return Err(EvmError::StaticCallStateModification);
        }
        if self.gas.remaining() <= GasCost::CALLSTIPEND {
            return Err(EvmError::OutOfGas);
        }

        let key = H256::from_word(self.stack.pop()?);
        let value = self.stack.pop()?;
        let current = self.host.sload(&self.context.address, &key)?;

        let cost = if current == value {
            GasCost::SSTORE_NOOP
        } else if current.is_zero() {
            GasCost::SSTORE_SET
        } else {
            GasCost::SSTORE_RESET
        };
        self.gas.consume(cost)?;
        if !current.is_zero() && value.is_zero() {
            self.gas.record_refund(GasCost::SSTORE_CLEARS_REFUND);
        }

        self.host.sstore(&self.context.address, &key, value)?;
        self.pc += 1;
        Ok(())
    }

    fn log(&mut self, topic_count: usize) -> EvmResult<()> {
        if self.context.is_static {
            return Err(EvmError::StaticCallStateModification);
        }
        let [offset, size] = self.stack.popn()?;
        let mut topics = Vec::with_capacity(topic_count);
        for _ in 0..topic_count {
            topics.push(H256::from_word(self.stack.pop()?));
        }

        let (offset, size) = self.expand(offset, size)?;
        self.gas.consume(GasCost::log_cost(topic_count as u64, size as u64))?;
        self.logs.push(Log {
            address: self.context.address,
            topics,
            data: Bytes::from_slice(self.memory.slice(offset, size)),
        });
        self.pc += 1;
        Ok(())
    }

    fn create(&mut self, is_create2: bool) -> EvmResult<()> {
        if self.context.is_static {
            return Err(EvmError::StaticCallStateModification);
        }
        let [value, offset, size] = self.stack.popn()?;
        let salt = if is_create2 {
            Some(H256::from_word(self.stack.pop()?))
        } else {
            None
        };

        let (offset, size) = self.expand(offset, size)?;
        if size > 2 * self.context.block.max_code_size {
            return Err(EvmError::InitCodeSizeExceeded);
        }

        let mut cost = GasCost::CREATE + GasCost::initcode_cost(size as u64);
        if is_create2 {
            cost += GasCost::create2_hash_cost(size as u64);
        }
        self.gas.consume(cost)?;

        let gas_limit = GasCost::max_call_gas(self.gas.remaining());
        self.gas.consume(gas_limit)?;

        let inputs = CreateInputs {
            caller: self.context.address,
            scheme: match salt {
                Some(salt) => CreateScheme::Create2 { salt },
                None => CreateScheme::Create,
            },
            value,
            init_code: Bytes::from_slice(self.memory.slice(offset, size)),
            gas_limit,
            depth: self.context.depth + 1,
        };
        let outcome = self.host.create(inputs)?;
        let mut result = outcome.result;
        self.gas.reimburse(result.gas_left);

        match result.status {
            ExitStatus::Success => {
                let address = outcome.address.map(|a| a.to_word()).unwrap_or_default();
                self.stack.push(address)?;
                self.gas.record_refund(result.gas_refunded);
                self.logs.append(&mut result.logs);
                self.return_data.clear();
            }
            ExitStatus::Revert => {
                self.stack.push(U256::zero())?;
                self.return_data = result.output.into_vec();
            }
            ExitStatus::Halt(_) => {
                self.stack.push(U256::zero())?;
                self.return_data.clear();
            }
        }
        self.pc += 1;
        Ok(())
    }

    fn call(&mut self, kind: CallKind) -> EvmResult<()> {
        let requested = self.stack.pop()?;
        let to = self.stack.pop_address()?;
        let value = match kind {
            CallKind::Call | CallKind::CallCode => self.stack.pop()?,
            CallKind::DelegateCall | CallKind::StaticCall => U256::zero(),
        };
        let [in_offset, in_size, out_offset, out_size] = self.stack.popn()?;

        let transfers_value = !value.is_zero();
        if kind == CallKind::Call && transfers_value && self.context.is_static {
            return Err(EvmError::StaticCallStateModification);
        }

        let (in_offset, in_size) = self.expand(in_offset, in_size)?;
        let (out_offset, out_size) = self.expand(out_offset, out_size)?;

        let mut cost = GasCost::CALL;
        if transfers_value {
            cost += GasCost::CALLVALUE;
            if kind == CallKind::Call && !self.host.exists(&to)? {
                cost += GasCost::NEWACCOUNT;
            }
        }
        self.gas.consume(cost)?;

        let requested = requested.min(U256::from(u64::MAX)).low_u64();
        let forwarded = requested.min(GasCost::max_call_gas(self.gas.remaining()));
        self.gas.consume(forwarded)?;
        let gas_limit = if transfers_value {
            forwarded + GasCost::CALLSTIPEND
        } else {
            forwarded
        };

        let context = &self.context;
        let (caller, target, value, transfer) = match kind {
            CallKind::Call => (context.address, to, value, true),
            CallKind::CallCode => (context.address, context.address, value, true),
            CallKind::DelegateCall => (context.caller, context.address, context.value, false),
            CallKind::StaticCall => (context.address, to, U256::zero(), false),
        };
        let inputs = CallInputs {
            kind,
            caller,
            target,
            code_address: to,
            value,
            transfer,
            input: Bytes::from_slice(self.memory.slice(in_offset, in_size)),
            gas_limit,
            is_static: context.is_static || kind == CallKind::StaticCall,
            depth: context.depth + 1,
        };

        let mut result = self.host.call(inputs)?;
        self.gas.reimburse(result.gas_left);

        let copied = out_size.min(result.output.len());
        self.memory.set(out_offset, &result.output[..copied]);

        let success = result.is_success();
        if success {
            self.gas.record_refund(result.gas_refunded);
            self.logs.append(&mut result.logs);
        }
        self.return_data = result.output.into_vec();
        self.stack.push_bool(success)?;
        self.pc += 1;
        Ok(())
    }
}

fn bool_word(value: bool) -> U256 {
    if value {
        U256::one()
    } else {
        U256::zero()
    }
}

/// Low 256 bits of a value already reduced below a 256-bit modulus.
fn narrow(value: U512) -> U256 {
    let mut bytes = [0u8; 64];
    value.to_big_endian(&mut bytes);
    U256::from_big_endian(&bytes[32..])
}
