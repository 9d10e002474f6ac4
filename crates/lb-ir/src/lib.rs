//! Shared contract for the loopbox sequencing core.
//!
//! Defines the vocabulary tables (source types and parameter labels), the
//! `Event` value the scheduler emits and the render bridge consumes, the
//! transport `Command` set and the planar audio buffer. Both sides of the
//! scheduler/renderer boundary link against this crate, so the tables are
//! identical by construction and versioned through [`CONTRACT_VERSION`].
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod audio_buffer;
mod command;
mod error;
mod event;
mod vocab;

pub use audio_buffer::{AudioBuffer, DEFAULT_BLOCK_SIZE, STEREO};
pub use command::{Command, Tempo, DEFAULT_STEP_MILLIS, MIN_STEP_MILLIS};
pub use error::ContractError;
pub use event::{Event, ParamSet, SampleId, WireEvent, MAX_PARAMS, MAX_SAMPLE_ID_LEN};
pub use vocab::{validate_contract, ParamLabel, SourceType, CONTRACT_VERSION};
