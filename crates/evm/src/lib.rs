pub mod arithmetic;
pub mod context;
pub mod error;
pub mod gas;
pub mod host;
pub mod interpreter;
pub mod memory;
pub mod opcodes;
pub mod precompiles;
pub mod result;
pub mod stack;

pub use context::{
    build_block_context, BlockContext, ChainAdapter, ChainConfig, EmptyChain, ExecutionContext,
    Header, TxContext,
};
pub use error::{EvmError, EvmResult};
pub use gas::{Gas, GasCost};
pub use host::{CallInputs, CallKind, CreateInputs, CreateScheme, Host};
pub use interpreter::{BytecodeInterpreter, Interpreter};
pub use precompiles::{is_precompile, precompile, PrecompiledContract};
pub use result::{CreateOutcome, ExitStatus, HaltReason, InterpreterResult, Log};
