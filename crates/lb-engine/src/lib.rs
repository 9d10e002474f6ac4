//! Real-time render bridge for loopbox.
//!
//! Turns trigger events into voices and renders them block by block into a
//! stereo stream. Everything reachable from [`RenderBridge::render`] is
//! allocation-free and never logs; failures there only bump counters in
//! [`RenderMetrics`].

mod bridge;
mod config;
mod envelope;
mod error;
mod master;
mod metrics;
mod sample_store;
mod source;
mod task;
mod voice;
mod voice_table;

pub use bridge::RenderBridge;
pub use config::RenderConfig;
pub use error::RenderError;
pub use master::MasterBus;
pub use metrics::{MetricsSnapshot, RenderMetrics};
pub use sample_store::{SampleHandle, SampleRecord, SampleStore, SampleView};
pub use task::{render_task, ControlMessage, RenderHandles, RenderNotice, RenderTask};
pub use voice_table::{InstanceId, VoiceTable};
