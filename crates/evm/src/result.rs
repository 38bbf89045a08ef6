use sandbox_types::{Address, Bytes, H256};

/// Why a frame stopped exceptionally. Every halt consumes the frame's gas
/// except the pre-execution checks, which hand the gas back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HaltReason {
    OutOfGas,
    InvalidOpcode(u8),
    StackUnderflow,
    StackOverflow,
    InvalidJump,
    CallDepthExceeded,
    InsufficientBalance,
    CreateCollision,
    CreateContractSizeLimit,
    /// Deployed code starting with 0xEF.
    InvalidCode,
    StateModificationInStatic,
    ReturnDataOutOfBounds,
    NonceOverflow,
    PrecompileFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    Revert,
    Halt(HaltReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<H256>,
    pub data: Bytes,
}

/// Outcome of one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpreterResult {
    pub status: ExitStatus,
    pub output: Bytes,
    pub gas_left: u64,
    /// Informational refund counter; never credited back.
    pub gas_refunded: u64,
    pub logs: Vec<Log>,
}

impl InterpreterResult {
    pub fn success(output: Bytes, gas_left: u64) -> Self {
        InterpreterResult {
            status: ExitStatus::Success,
            output,
            gas_left,
            gas_refunded: 0,
            logs: Vec::new(),
        }
    }

    pub fn revert(output: Bytes, gas_left: u64) -> Self {
        InterpreterResult {
            status: ExitStatus::Revert,
            output,
            gas_left,
            gas_refunded: 0,
            logs: Vec::new(),
        }
    }

    /// Exceptional halt: all gas of the frame is gone.
    pub fn halt(reason: HaltReason) -> Self {
        Self::halt_with_gas(reason, 0)
    }

    /// Halt raised before the frame ran, with its gas untouched.
    pub fn halt_with_gas(reason: HaltReason, gas_left: u64) -> Self {
        InterpreterResult {
            status: ExitStatus::Halt(reason),
            output: Bytes::new(),
            gas_left,
            gas_refunded: 0,
            logs: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ExitStatus::Success
    }

    pub fn is_revert(&self) -> bool {
        self.status == ExitStatus::Revert
    }
}

/// Outcome of a CREATE frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOutcome {
    pub result: InterpreterResult,
    /// Set whenever an address was derived, even if deployment failed.
    pub address: Option<Address>,
}
