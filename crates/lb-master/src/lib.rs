//! Headless controller for loopbox.
//!
//! Provides live playback through the audio device and deterministic
//! offline rendering, for the CLI and for tests.

mod controller;
mod error;
mod offline;
mod wav;

pub use controller::Controller;
pub use error::ControllerError;
pub use offline::{render_offline, OfflineJob, Rendered};
pub use wav::{decode_wav_mono, encode_wav, read_wav_mono, write_wav, MonoSample};

// Re-export the types callers need so they don't depend on every crate.
pub use lb_engine::{MetricsSnapshot, RenderConfig, RenderNotice};
pub use lb_ir::{ParamLabel, SampleId, SourceType, CONTRACT_VERSION, DEFAULT_STEP_MILLIS};
pub use lb_sched::{param_label, SchedulerConfig, SchedulerReport, SchedulerSnapshot};
