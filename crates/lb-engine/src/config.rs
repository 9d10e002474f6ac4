//! Render bridge configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::RenderError;

/// Sizing and timing of the render context.
///
/// Sample rate and block size are configuration, not protocol: changing them
/// does not affect the event or command contract.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Frames per rendered block.
    pub block_size: usize,
    /// Simultaneous voices before the oldest one is stolen.
    pub max_voices: usize,
    /// Upper bound on the sample arena, in frames (guard frames included).
    pub sample_memory_frames: usize,
    /// Arena capacity reserved at initialization, in frames.
    pub initial_arena_frames: usize,
    /// A block counts as a deadline miss when it takes longer than
    /// `block period * deadline_tolerance`.
    pub deadline_tolerance: f64,
    /// Longest delay line on the master bus, in seconds.
    pub max_delay_seconds: f32,
    /// Capacity of the scheduler event inbox.
    pub event_capacity: usize,
    /// Capacity of the host control inbox.
    pub control_capacity: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            block_size: lb_ir::DEFAULT_BLOCK_SIZE,
            max_voices: 128,
            sample_memory_frames: 1 << 26,
            initial_arena_frames: 1 << 20,
            deadline_tolerance: 1.0,
            max_delay_seconds: 2.0,
            event_capacity: 1024,
            control_capacity: 64,
        }
    }
}

impl RenderConfig {
    pub fn validate(&self) -> Result<(), RenderError> {
        if self.sample_rate == 0 {
            return Err(RenderError::InvalidConfig("sample_rate must be positive"));
        }
        if self.block_size == 0 || self.block_size > u16::MAX as usize {
            return Err(RenderError::InvalidConfig("block_size must be in 1..=65535"));
        }
        if self.max_voices == 0 {
            return Err(RenderError::InvalidConfig("max_voices must be positive"));
        }
        if self.initial_arena_frames > self.sample_memory_frames {
            return Err(RenderError::InvalidConfig(
                "initial_arena_frames exceeds sample_memory_frames",
            ));
        }
        if !(self.deadline_tolerance > 0.0) {
            return Err(RenderError::InvalidConfig("deadline_tolerance must be positive"));
        }
        if !(self.max_delay_seconds > 0.0) {
            return Err(RenderError::InvalidConfig("max_delay_seconds must be positive"));
        }
        if self.event_capacity == 0 || self.control_capacity == 0 {
            return Err(RenderError::InvalidConfig("inbox capacities must be positive"));
        }
        Ok(())
    }

    /// Wall-clock duration of one block.
    pub fn block_period(&self) -> Duration {
        Duration::from_secs_f64(self.block_size as f64 / self.sample_rate as f64)
    }

    /// Render time budget per block.
    pub fn deadline(&self) -> Duration {
        self.block_period().mul_f64(self.deadline_tolerance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RenderConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.block_size, 128);
    }

    #[test]
    fn rejects_zero_block() {
        let config = RenderConfig {
            block_size: 0,
            ..RenderConfig::default()
        };
        assert!(matches!(config.validate(), Err(RenderError::InvalidConfig(_))));
    }

    #[test]
    fn block_period_matches_rate() {
        let config = RenderConfig {
            sample_rate: 48000,
            block_size: 480,
            ..RenderConfig::default()
        };
        assert_eq!(config.block_period(), Duration::from_millis(10));
    }
}
