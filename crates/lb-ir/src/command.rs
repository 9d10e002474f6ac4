//! Control commands sent from a front end to the scheduler.

use alloc::string::String;

/// Default step duration in milliseconds.
pub const DEFAULT_STEP_MILLIS: f64 = 128.0;

/// Shortest step duration accepted, in milliseconds. Bounds the events one
/// scheduler cycle can generate per lane.
pub const MIN_STEP_MILLIS: f64 = 1.0;

/// Duration of one pattern step.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Tempo {
    step_seconds: f64,
}

impl Tempo {
    /// `None` unless `millis` is finite and at least [`MIN_STEP_MILLIS`].
    pub fn from_step_millis(millis: f64) -> Option<Self> {
        Self::from_step_seconds(millis / 1000.0)
    }

    pub fn from_step_seconds(seconds: f64) -> Option<Self> {
        (seconds.is_finite() && seconds >= MIN_STEP_MILLIS / 1000.0).then_some(Self {
            step_seconds: seconds,
        })
    }

    pub fn step_seconds(self) -> f64 {
        self.step_seconds
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self {
            step_seconds: DEFAULT_STEP_MILLIS / 1000.0,
        }
    }
}

/// Scheduler control surface.
///
/// `SetTempo::tempo` is the step duration in milliseconds.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(tag = "cmd", rename_all = "snake_case")
)]
pub enum Command {
    Start {
        origin_timestamp: f64,
        #[cfg_attr(feature = "serde", serde(default))]
        wall_reference: Option<f64>,
    },
    Stop,
    Evaluate {
        loop_spec: String,
    },
    SetTempo {
        tempo: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tempo_rejects_non_positive() {
        assert!(Tempo::from_step_millis(0.0).is_none());
        assert!(Tempo::from_step_millis(-10.0).is_none());
        assert!(Tempo::from_step_millis(f64::NAN).is_none());
        assert!(Tempo::from_step_millis(f64::INFINITY).is_none());
        let t = Tempo::from_step_millis(250.0).unwrap();
        assert!((t.step_seconds() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn tempo_has_a_floor() {
        assert!(Tempo::from_step_millis(1e-4).is_none());
        assert!(Tempo::from_step_millis(0.999).is_none());
        assert!(Tempo::from_step_seconds(1e-9).is_none());
        assert!(Tempo::from_step_millis(MIN_STEP_MILLIS).is_some());
    }

    #[test]
    fn default_tempo() {
        assert!((Tempo::default().step_seconds() - 0.128).abs() < 1e-12);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn commands_from_json() {
        let cmd: Command = serde_json::from_str(r#"{"cmd":"start","origin_timestamp":0.5}"#).unwrap();
        assert_eq!(
            cmd,
            Command::Start {
                origin_timestamp: 0.5,
                wall_reference: None
            }
        );

        let cmd: Command = serde_json::from_str(r#"{"cmd":"stop"}"#).unwrap();
        assert_eq!(cmd, Command::Stop);

        let cmd: Command = serde_json::from_str(r#"{"cmd":"set_tempo","tempo":200.0}"#).unwrap();
        assert_eq!(cmd, Command::SetTempo { tempo: 200.0 });

        assert!(serde_json::from_str::<Command>(r#"{"cmd":"rewind"}"#).is_err());
    }
}
