//! Execution engine for the sandbox.
//!
//! [`Engine`] runs top-level Calls and Creates over an
//! [`AccountStore`](sandbox_state::AccountStore). Nested frames re-enter the
//! engine through the interpreter's host seam and get the same snapshot
//! discipline as the outermost one.

pub mod engine;
mod frame;
pub mod result;
pub mod transaction;

pub use engine::Engine;
pub use result::{CreateResult, ExecutionResult, ExecutionStatus, FailureKind, Outcome};
pub use transaction::{build_tx_context, LegacyTransaction, Transaction};

use sandbox_state::StateError;
use sandbox_types::Address;
use thiserror::Error;

/// Failures of the engine itself. Transaction-level failures are not
/// errors; they come back as [`ExecutionResult`]s.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A store invariant was violated mid-execution; the engine is now unusable.
    #[error("Account store corrupted: {0}")]
    Corrupted(String),

    #[error("Engine is poisoned by an earlier store failure")]
    Poisoned,

    #[error("Address {0} already has code")]
    CodeCollision(Address),

    #[error("Simulation needs a call target")]
    SimulateCreate,

    #[error("State error: {0}")]
    State(#[from] StateError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
