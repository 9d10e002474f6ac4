//! Output backend trait and errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no audio output device available")]
    NoDevice,

    #[error("device init error: {0}")]
    DeviceInit(String),

    #[error("stream create error: {0}")]
    StreamCreate(String),

    #[error("playback error: {0}")]
    Playback(String),

    #[error("no stream built")]
    NoStream,
}

/// A device that pulls rendered audio on its own schedule.
pub trait AudioOutput {
    /// Device sample rate; the render context must run at this rate.
    fn sample_rate(&self) -> u32;

    /// Start pulling audio. Silence is produced until then.
    fn start(&mut self) -> Result<(), AudioError>;

    /// Pause the device. The render context is left as it is.
    fn stop(&mut self) -> Result<(), AudioError>;

    fn is_running(&self) -> bool;
}
