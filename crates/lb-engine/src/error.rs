//! Render bridge errors.
//!
//! Variants raised on the render thread carry only inline data so that
//! constructing and dropping them never allocates.

use lb_ir::{ContractError, ParamLabel, SampleId, SourceType};

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error("render engine is not initialized")]
    NotInitialized,
    #[error("could not allocate {frames} frames of sample memory")]
    AllocationFailed { frames: usize },
    #[error("sample '{0}' has no frames")]
    EmptySample(SampleId),
    #[error("unknown source type '{0}'")]
    UnknownSource(String),
    #[error("unknown sample '{0}'")]
    UnknownSample(SampleId),
    #[error("{0} source requires a sample id")]
    MissingSampleId(SourceType),
    #[error("{0} is not a master bus parameter")]
    NotMasterParam(ParamLabel),
    #[error("invalid render config: {0}")]
    InvalidConfig(&'static str),
    #[error(transparent)]
    Contract(#[from] ContractError),
}
