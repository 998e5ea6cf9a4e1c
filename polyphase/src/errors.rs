//! Top-level error taxonomy.
//!
//! Only `StateCorruption`, `Io`, and user cancellation propagate out of
//! `PhaseCoordinator::run` as `Err`; everything else (transport errors,
//! parse errors, unknown tools, verifier violations, runtime crashes) is
//! folded into a conversation message or a task state transition instead,
//! per the propagation policy - see `polyphase::coordinator`.

use thiserror::Error;

use crate::llm::LlmError;
use crate::tools::ToolError;
use crate::verifier::VerifierError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("state store error: {0}")]
    Store(#[from] taskgraph::StoreError),

    #[error("tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("llm error: {0}")]
    Llm(#[from] LlmError),

    #[error("verifier error: {0}")]
    Verifier(#[from] VerifierError),

    #[error("pipeline state is corrupt: {0}")]
    StateCorruption(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cancelled")]
    Cancelled,
}

/// Process exit codes, per the persisted-layout contract: 0 all tasks
/// COMPLETED, 2 one or more FAILED, 3 budget exhausted with PENDING tasks,
/// 4 fatal error (state corruption, I/O).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    AllCompleted = 0,
    SomeFailed = 2,
    BudgetExhausted = 3,
    Fatal = 4,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}
