//! Contract violations detected while decoding plain-data messages.

use alloc::string::String;

use crate::event::MAX_SAMPLE_ID_LEN;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ContractError {
    #[error("unknown source type '{0}'")]
    UnknownSourceType(String),
    #[error("unknown source code {0}")]
    UnknownSourceCode(u16),
    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),
    #[error("sample id '{0}' is longer than {max} bytes", max = MAX_SAMPLE_ID_LEN)]
    SampleIdTooLong(String),
    #[error("contract version mismatch: local {local}, peer {peer}")]
    VersionMismatch { local: u32, peer: u32 },
    #[error("vocabulary table is inconsistent: {0}")]
    InvalidTable(&'static str),
}
