//! Scheduler and pattern evaluation errors.

use thiserror::Error;

/// Failure turning loop text into a [`LoopSpec`](crate::LoopSpec).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("line {line}: {reason}")]
    MalformedLoopSpec { line: usize, reason: String },

    #[error("line {line}: unknown generator `{name}`")]
    UnknownGenerator { line: usize, name: String },
}

impl EvalError {
    pub(crate) fn malformed(line: usize, reason: impl Into<String>) -> Self {
        Self::MalformedLoopSpec {
            line,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchedulerError {
    #[error("invalid tempo {0} ms, must be finite and positive")]
    InvalidTempo(f64),

    #[error("invalid scheduler config: {0}")]
    InvalidConfig(&'static str),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    Contract(#[from] lb_ir::ContractError),

    #[error("scheduler thread could not be spawned: {0}")]
    Spawn(String),
}
