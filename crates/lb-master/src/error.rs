use lb_audio::AudioError;
use lb_engine::RenderError;
use lb_ir::ContractError;
use lb_sched::{EvalError, SchedulerError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error("wav error: {0}")]
    Wav(#[from] hound::Error),

    #[error("render control queue is full")]
    ControlQueueFull,

    #[error("scheduler thread is gone")]
    SchedulerGone,
}
