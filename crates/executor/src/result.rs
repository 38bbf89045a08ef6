use sandbox_evm::{ExitStatus, HaltReason, InterpreterResult, Log};
use sandbox_types::{Address, Bytes, UintExt, U256};
use std::fmt;

/// Why a Call or Create did not succeed. None of these are errors of the
/// engine itself; they are ordinary outcomes reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Value exceeds the sender's balance; nothing was mutated.
    InsufficientBalance,
    OutOfGas,
    /// Explicit REVERT; the output carries the reason payload.
    Reverted,
    /// Create targeted an address that already has code or a nonce.
    AddressCollision,
    InterpreterFault(HaltReason),
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InsufficientBalance => f.write_str("insufficient balance for transfer"),
            FailureKind::OutOfGas => f.write_str("out of gas"),
            FailureKind::Reverted => f.write_str("execution reverted"),
            FailureKind::AddressCollision => f.write_str("contract address collision"),
            FailureKind::InterpreterFault(reason) => write!(f, "interpreter fault: {:?}", reason),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    Success,
    Failed(FailureKind),
}

impl From<ExitStatus> for ExecutionStatus {
    fn from(status: ExitStatus) -> Self {
        let kind = match status {
            ExitStatus::Success => return ExecutionStatus::Success,
            ExitStatus::Revert => FailureKind::Reverted,
            ExitStatus::Halt(HaltReason::OutOfGas) => FailureKind::OutOfGas,
            ExitStatus::Halt(HaltReason::InsufficientBalance) => FailureKind::InsufficientBalance,
            ExitStatus::Halt(HaltReason::CreateCollision) => FailureKind::AddressCollision,
            ExitStatus::Halt(reason) => FailureKind::InterpreterFault(reason),
        };
        ExecutionStatus::Failed(kind)
    }
}

/// Normalized outcome of one top-level Call or Create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub output: Bytes,
    pub gas_limit: u64,
    pub gas_remaining: u64,
    /// Informational; never credited back.
    pub gas_refunded: u64,
    pub logs: Vec<Log>,
    pub status: ExecutionStatus,
}

/// `Error(string)` selector.
const REVERT_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

impl ExecutionResult {
    pub fn from_interpreter(result: InterpreterResult, gas_limit: u64) -> Self {
        ExecutionResult {
            output: result.output,
            gas_limit,
            gas_remaining: result.gas_left.min(gas_limit),
            gas_refunded: result.gas_refunded,
            logs: result.logs,
            status: result.status.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }

    pub fn failure(&self) -> Option<FailureKind> {
        match self.status {
            ExecutionStatus::Success => None,
            ExecutionStatus::Failed(kind) => Some(kind),
        }
    }

    pub fn gas_used(&self) -> u64 {
        self.gas_limit - self.gas_remaining
    }

    /// Decoded `Error(string)` message of a reverted execution.
    pub fn revert_reason(&self) -> Option<String> {
        if self.status != ExecutionStatus::Failed(FailureKind::Reverted) {
            return None;
        }
        let payload = self.output.strip_prefix(&REVERT_SELECTOR[..])?;
        if payload.len() < 64 {
            return None;
        }

        let offset = U256::from_big_endian(&payload[..32]).try_as_usize()?;
        let len_end = offset.checked_add(32)?;
        let len = U256::from_big_endian(payload.get(offset..len_end)?).try_as_usize()?;
        let text = payload.get(len_end..len_end.checked_add(len)?)?;
        String::from_utf8(text.to_vec()).ok()
    }

    /// Human-readable failure message, `None` on success.
    pub fn error_message(&self) -> Option<String> {
        let kind = self.failure()?;
        Some(match self.revert_reason() {
            Some(reason) => format!("{}: {}", kind, reason),
            None => kind.to_string(),
        })
    }
}

/// Outcome of a Create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateResult {
    /// Derived address, set even when deployment failed after derivation.
    pub address: Option<Address>,
    /// Empty unless deployment succeeded.
    pub deployed_code: Bytes,
    pub result: ExecutionResult,
}

/// What a transaction turned into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Call(ExecutionResult),
    Create(CreateResult),
}

impl Outcome {
    pub fn execution(&self) -> &ExecutionResult {
        match self {
            Outcome::Call(result) => result,
            Outcome::Create(create) => &create.result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reverted(output: Vec<u8>) -> ExecutionResult {
        ExecutionResult::from_interpreter(InterpreterResult::revert(Bytes::from_vec(output), 400), 1000)
    }

    fn error_string(message: &str) -> Vec<u8> {
        let mut out = REVERT_SELECTOR.to_vec();
        out.extend_from_slice(&U256::from(32).to_be_bytes32());
        out.extend_from_slice(&U256::from(message.len()).to_be_bytes32());
        let mut text = message.as_bytes().to_vec();
        text.resize((message.len() + 31) / 32 * 32, 0);
        out.extend_from_slice(&text);
        out
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ExitStatus::Success, ExecutionStatus::Success),
            (ExitStatus::Revert, ExecutionStatus::Failed(FailureKind::Reverted)),
            (ExitStatus::Halt(HaltReason::OutOfGas), ExecutionStatus::Failed(FailureKind::OutOfGas)),
            (
                ExitStatus::Halt(HaltReason::CreateCollision),
                ExecutionStatus::Failed(FailureKind::AddressCollision),
            ),
            (
                ExitStatus::Halt(HaltReason::InvalidJump),
                ExecutionStatus::Failed(FailureKind::InterpreterFault(HaltReason::InvalidJump)),
            ),
        ];
        for (exit, expected) in cases {
            assert_eq!(ExecutionStatus::from(exit), expected);
        }
    }

    #[test]
    fn test_gas_accounting() {
        let result = reverted(Vec::new());
        assert_eq!(result.gas_used() + result.gas_remaining, result.gas_limit);
        assert_eq!(result.gas_used(), 600);
    }

    #[test]
    fn test_revert_reason() {
        let result = reverted(error_string("not enough tokens"));
        assert_eq!(result.revert_reason().as_deref(), Some("not enough tokens"));
        assert_eq!(
            result.error_message().as_deref(),
            Some("execution reverted: not enough tokens")
        );

        let bare = reverted(vec![1, 2, 3]);
        assert_eq!(bare.revert_reason(), None);
        assert_eq!(bare.error_message().as_deref(), Some("execution reverted"));

        let mut truncated = error_string("abc");
        truncated.truncate(40);
        assert_eq!(reverted(truncated).revert_reason(), None);
    }

    #[test]
    fn test_success_has_no_message() {
        let result = ExecutionResult::from_interpreter(InterpreterResult::success(Bytes::new(), 5), 5);
        assert!(result.is_success());
        assert_eq!(result.error_message(), None);
        assert_eq!(result.gas_used(), 0);
    }
}
