//! Voice: one live sound instance created from a trigger event.

use lb_ir::{Event, ParamLabel, ParamSet};

use crate::source::Source;
use crate::voice_table::InstanceId;

/// Gains applied to a voice's mono output.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VoiceMix {
    pub left: f32,
    pub right: f32,
    pub reverb_send: f32,
    pub delay_send: f32,
}

impl VoiceMix {
    /// Balance law: the centre position passes unity gain to both sides and
    /// panning attenuates the opposite channel only.
    pub fn from_params(params: &ParamSet, default_level: f32) -> Self {
        let level = params.get(ParamLabel::Level).unwrap_or(default_level).max(0.0);
        let pos = params
            .get(ParamLabel::StereoPosition)
            .unwrap_or(0.0)
            .clamp(-1.0, 1.0);
        Self {
            left: level * (1.0 - pos).min(1.0),
            right: level * (1.0 + pos).min(1.0),
            reverb_send: params.get(ParamLabel::ReverbMix).unwrap_or(0.0).clamp(0.0, 1.0),
            delay_send: params.get(ParamLabel::DelayMix).unwrap_or(0.0).clamp(0.0, 1.0),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Voice {
    pub id: InstanceId,
    /// Start time on the audio clock, seconds.
    pub start: f64,
    pub started: bool,
    pub finished: bool,
    pub source: Source,
    pub mix: VoiceMix,
}

impl Voice {
    pub fn new(id: InstanceId, event: &Event, source: Source) -> Self {
        Self {
            id,
            start: event.timestamp,
            started: false,
            finished: false,
            mix: VoiceMix::from_params(&event.params, Source::default_level(event.source_type)),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centre_is_unity() {
        let mix = VoiceMix::from_params(&ParamSet::new(), 1.0);
        assert_eq!((mix.left, mix.right), (1.0, 1.0));
        assert_eq!((mix.reverb_send, mix.delay_send), (0.0, 0.0));
    }

    #[test]
    fn hard_pan_mutes_other_side() {
        let mut params = ParamSet::new();
        params.set(ParamLabel::StereoPosition, 1.0);
        params.set(ParamLabel::Level, 0.5);
        let mix = VoiceMix::from_params(&params, 1.0);
        assert_eq!((mix.left, mix.right), (0.0, 0.5));
    }
}
