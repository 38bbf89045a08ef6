use crate::result::HaltReason;
use thiserror::Error;

pub type EvmResult<T> = Result<T, EvmError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvmError {
    #[error("Stack overflow")]
    StackOverflow,

    #[error("Stack underflow")]
    StackUnderflow,

    #[error("Invalid jump destination: {0}")]
    InvalidJump(usize),

    #[error("Invalid opcode: {0:#x}")]
    InvalidOpcode(u8),

    #[error("Out of gas")]
    OutOfGas,

    #[error("Return data out of bounds")]
    ReturnDataOutOfBounds,

    #[error("Static call state modification")]
    StaticCallStateModification,

    #[error("Init code size exceeded")]
    InitCodeSizeExceeded,

    #[error("Precompile failed: {0}")]
    PrecompileFailed(String),

    /// The host could not serve a request; the account store is no longer trustworthy.
    #[error("Host failure: {0}")]
    Host(String),
}

impl EvmError {
    /// Errors that abort the whole execution instead of halting one frame.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EvmError::Host(_))
    }

    /// How a non-fatal error ends the frame.
    pub fn halt_reason(&self) -> Option<HaltReason> {
        let reason = match self {
            EvmError::StackOverflow => HaltReason::StackOverflow,
            EvmError::StackUnderflow => HaltReason::StackUnderflow,
            EvmError::InvalidJump(_) => HaltReason::InvalidJump,
            EvmError::InvalidOpcode(op) => HaltReason::InvalidOpcode(*op),
            EvmError::OutOfGas => HaltReason::OutOfGas,
            EvmError::ReturnDataOutOfBounds => HaltReason::ReturnDataOutOfBounds,
            EvmError::StaticCallStateModification => HaltReason::StateModificationInStatic,
            EvmError::InitCodeSizeExceeded => HaltReason::CreateContractSizeLimit,
            EvmError::PrecompileFailed(_) => HaltReason::PrecompileFailed,
            EvmError::Host(_) => return None,
        };
        Some(reason)
    }
}
