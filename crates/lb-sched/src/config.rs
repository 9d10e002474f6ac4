//! Scheduler timing configuration.

use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;

/// Timing of the lookahead loop. All values are milliseconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Nominal time between generation steps.
    pub period_ms: f64,
    /// How far past the current step events are generated.
    pub lookahead_ms: f64,
    /// Shortest wait the drift compensator may return.
    pub min_delay_ms: f64,
    /// Longest extra wait beyond one period.
    pub max_correction_ms: f64,
    /// Lateness beyond which missed periods are skipped.
    /// Defaults to `lookahead_ms - period_ms`.
    pub saturation_ms: Option<f64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            period_ms: 25.0,
            lookahead_ms: 100.0,
            min_delay_ms: 1.0,
            max_correction_ms: 25.0,
            saturation_ms: None,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<(), SchedulerError> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.period_ms) {
            return Err(SchedulerError::InvalidConfig("period_ms must be positive"));
        }
        if !positive(self.lookahead_ms) || self.lookahead_ms < self.period_ms {
            return Err(SchedulerError::InvalidConfig(
                "lookahead_ms must be at least period_ms",
            ));
        }
        if !positive(self.min_delay_ms) || self.min_delay_ms > self.period_ms {
            return Err(SchedulerError::InvalidConfig(
                "min_delay_ms must be in (0, period_ms]",
            ));
        }
        if !(self.max_correction_ms.is_finite() && self.max_correction_ms >= 0.0) {
            return Err(SchedulerError::InvalidConfig(
                "max_correction_ms must not be negative",
            ));
        }
        if let Some(s) = self.saturation_ms {
            if !positive(s) {
                return Err(SchedulerError::InvalidConfig("saturation_ms must be positive"));
            }
        }
        Ok(())
    }

    pub fn period(&self) -> f64 {
        self.period_ms / 1000.0
    }

    pub fn lookahead(&self) -> f64 {
        self.lookahead_ms / 1000.0
    }

    pub fn min_delay(&self) -> f64 {
        self.min_delay_ms / 1000.0
    }

    pub fn max_correction(&self) -> f64 {
        self.max_correction_ms / 1000.0
    }

    /// Saturation threshold in seconds. Never below one period.
    pub fn saturation(&self) -> f64 {
        let ms = self
            .saturation_ms
            .unwrap_or(self.lookahead_ms - self.period_ms)
            .max(self.period_ms);
        ms / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = SchedulerConfig::default();
        assert!(c.validate().is_ok());
        assert!((c.period() - 0.025).abs() < 1e-12);
        assert!((c.saturation() - 0.075).abs() < 1e-12);
    }

    #[test]
    fn lookahead_shorter_than_period_is_rejected() {
        let c = SchedulerConfig {
            lookahead_ms: 10.0,
            ..SchedulerConfig::default()
        };
        assert!(matches!(c.validate(), Err(SchedulerError::InvalidConfig(_))));
    }

    #[test]
    fn saturation_is_at_least_one_period() {
        let c = SchedulerConfig {
            lookahead_ms: 25.0,
            ..SchedulerConfig::default()
        };
        assert!((c.saturation() - 0.025).abs() < 1e-12);
    }
}
