//! Master bus: send effects and their automation.
//!
//! Return levels (`DelayMix`, `ReverbMix`) are ramped sample by sample from
//! the last applied value to the current target across a block. The remaining
//! controls are pushed into the effects at most once per block, and only when
//! the target differs from the value last applied.

mod delay;
mod reverb;

use lb_ir::{AudioBuffer, ParamLabel};

pub use delay::FeedbackDelay;
pub use reverb::Reverb;

use crate::error::RenderError;

/// Block-rate control: remembers what the effect currently runs with.
#[derive(Clone, Copy, Debug)]
struct Control {
    target: f32,
    applied: f32,
}

impl Control {
    fn new(value: f32) -> Self {
        Self {
            target: value,
            applied: value,
        }
    }

    /// Returns the new value if it has to be pushed this block.
    fn take_change(&mut self) -> Option<f32> {
        if self.target.to_bits() == self.applied.to_bits() {
            return None;
        }
        self.applied = self.target;
        Some(self.target)
    }
}

/// Per-sample linear ramp toward a target, one block at a time.
#[derive(Clone, Copy, Debug)]
struct Ramp {
    current: f32,
    target: f32,
}

impl Ramp {
    fn new(value: f32) -> Self {
        Self {
            current: value,
            target: value,
        }
    }

    /// Add `wet * gain(t)` into `out`, with `gain` moving linearly from the
    /// previous block's value to the target.
    fn mix(&mut self, wet: &[f32], out: &mut [f32]) {
        let n = out.len();
        if self.current == self.target {
            let gain = self.current;
            for (o, w) in out.iter_mut().zip(wet) {
                *o += w * gain;
            }
            return;
        }
        let step = (self.target - self.current) / n as f32;
        for (i, (o, w)) in out.iter_mut().zip(wet).enumerate() {
            *o += w * (self.current + step * (i + 1) as f32);
        }
    }

    fn finish_block(&mut self) {
        self.current = self.target;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ControlSlot {
    DelayTime = 0,
    DelayFeedback = 1,
    DelayDampening = 2,
    ReverbRoomsize = 3,
    ReverbDampening = 4,
}

/// Delay and reverb returns summed onto the dry mix.
pub struct MasterBus {
    delay: FeedbackDelay,
    reverb: Reverb,
    delay_mix: Ramp,
    reverb_mix: Ramp,
    controls: [Control; 5],
    wet: AudioBuffer,
}

impl MasterBus {
    pub fn new(sample_rate: f32, block_size: u16, max_delay_seconds: f32) -> Self {
        Self {
            delay: FeedbackDelay::new(sample_rate, max_delay_seconds),
            reverb: Reverb::new(sample_rate),
            delay_mix: Ramp::new(1.0),
            reverb_mix: Ramp::new(1.0),
            controls: [
                Control::new(FeedbackDelay::DEFAULT_TIME),
                Control::new(FeedbackDelay::DEFAULT_FEEDBACK),
                Control::new(FeedbackDelay::DEFAULT_DAMPENING),
                Control::new(Reverb::DEFAULT_ROOMSIZE),
                Control::new(Reverb::DEFAULT_DAMPENING),
            ],
            wet: AudioBuffer::new(lb_ir::STEREO, block_size),
        }
    }

    /// Set the automation target of a master control.
    pub fn set(&mut self, label: ParamLabel, value: f32) -> Result<(), RenderError> {
        if !value.is_finite() {
            return Ok(());
        }
        let slot = match label {
            ParamLabel::DelayMix => {
                self.delay_mix.target = value.max(0.0);
                return Ok(());
            }
            ParamLabel::ReverbMix => {
                self.reverb_mix.target = value.max(0.0);
                return Ok(());
            }
            ParamLabel::DelayTime => ControlSlot::DelayTime,
            ParamLabel::DelayFeedback => ControlSlot::DelayFeedback,
            ParamLabel::DelayDampeningFrequency => ControlSlot::DelayDampening,
            ParamLabel::ReverbRoomsize => ControlSlot::ReverbRoomsize,
            ParamLabel::ReverbDampening => ControlSlot::ReverbDampening,
            other => return Err(RenderError::NotMasterParam(other)),
        };
        self.controls[slot as usize].target = value;
        Ok(())
    }

    /// Value currently applied to a master control, if `label` is one.
    pub fn applied(&self, label: ParamLabel) -> Option<f32> {
        let slot = match label {
            ParamLabel::DelayMix => return Some(self.delay_mix.current),
            ParamLabel::ReverbMix => return Some(self.reverb_mix.current),
            ParamLabel::DelayTime => ControlSlot::DelayTime,
            ParamLabel::DelayFeedback => ControlSlot::DelayFeedback,
            ParamLabel::DelayDampeningFrequency => ControlSlot::DelayDampening,
            ParamLabel::ReverbRoomsize => ControlSlot::ReverbRoomsize,
            ParamLabel::ReverbDampening => ControlSlot::ReverbDampening,
            _ => return None,
        };
        Some(self.controls[slot as usize].applied)
    }

    fn push_controls(&mut self) {
        if let Some(v) = self.controls[ControlSlot::DelayTime as usize].take_change() {
            self.delay.set_time(v);
        }
        if let Some(v) = self.controls[ControlSlot::DelayFeedback as usize].take_change() {
            self.delay.set_feedback(v);
        }
        if let Some(v) = self.controls[ControlSlot::DelayDampening as usize].take_change() {
            self.delay.set_dampening(v);
        }
        if let Some(v) = self.controls[ControlSlot::ReverbRoomsize as usize].take_change() {
            self.reverb.set_roomsize(v);
        }
        if let Some(v) = self.controls[ControlSlot::ReverbDampening as usize].take_change() {
            self.reverb.set_dampening(v);
        }
    }

    /// Run both effects over their sends and add the returns into `out`.
    pub fn process(
        &mut self,
        delay_send: &AudioBuffer,
        reverb_send: &AudioBuffer,
        out: &mut AudioBuffer,
    ) {
        self.push_controls();

        {
            let (wl, wr) = self.wet.stereo_mut();
            self.delay
                .process([delay_send.channel(0), delay_send.channel(1)], [wl, wr]);
        }
        {
            let (ol, or) = out.stereo_mut();
            self.delay_mix.mix(self.wet.channel(0), ol);
            self.delay_mix.mix(self.wet.channel(1), or);
        }
        self.delay_mix.finish_block();

        {
            let (wl, wr) = self.wet.stereo_mut();
            self.reverb
                .process([reverb_send.channel(0), reverb_send.channel(1)], [wl, wr]);
        }
        {
            let (ol, or) = out.stereo_mut();
            self.reverb_mix.mix(self.wet.channel(0), ol);
            self.reverb_mix.mix(self.wet.channel(1), or);
        }
        self.reverb_mix.finish_block();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_pushed_once_per_change() {
        let mut c = Control::new(0.5);
        assert_eq!(c.take_change(), None);
        c.target = 0.7;
        assert_eq!(c.take_change(), Some(0.7));
        assert_eq!(c.take_change(), None);
    }

    #[test]
    fn ramp_interpolates_across_block() {
        let mut ramp = Ramp::new(0.0);
        ramp.target = 1.0;
        let wet = [1.0; 4];
        let mut out = [0.0; 4];
        ramp.mix(&wet, &mut out);
        assert_eq!(out, [0.25, 0.5, 0.75, 1.0]);
        ramp.finish_block();

        let mut out = [0.0; 4];
        ramp.mix(&wet, &mut out);
        assert_eq!(out, [1.0; 4]);
    }

    #[test]
    fn rejects_voice_params() {
        let mut bus = MasterBus::new(44100.0, 128, 1.0);
        assert_eq!(
            bus.set(ParamLabel::Attack, 0.1),
            Err(RenderError::NotMasterParam(ParamLabel::Attack))
        );
        assert!(bus.set(ParamLabel::ReverbRoomsize, 0.9).is_ok());
    }

    #[test]
    fn applied_values_follow_blocks() {
        let mut bus = MasterBus::new(1000.0, 8, 1.0);
        let sends = AudioBuffer::new(2, 8);
        let mut out = AudioBuffer::new(2, 8);

        bus.set(ParamLabel::DelayFeedback, 0.2).unwrap();
        bus.set(ParamLabel::ReverbMix, 0.5).unwrap();
        assert_eq!(bus.applied(ParamLabel::DelayFeedback), Some(FeedbackDelay::DEFAULT_FEEDBACK));

        bus.process(&sends, &sends, &mut out);
        assert_eq!(bus.applied(ParamLabel::DelayFeedback), Some(0.2));
        assert_eq!(bus.applied(ParamLabel::ReverbMix), Some(0.5));
        assert_eq!(bus.applied(ParamLabel::Level), None);
    }

    #[test]
    fn silent_sends_leave_dry_mix_untouched() {
        let mut bus = MasterBus::new(44100.0, 4, 1.0);
        let sends = AudioBuffer::new(2, 4);
        let mut out = AudioBuffer::new(2, 4);
        out.channel_mut(0).copy_from_slice(&[0.1, 0.2, 0.3, 0.4]);
        bus.process(&sends, &sends, &mut out);
        assert_eq!(out.channel(0), &[0.1, 0.2, 0.3, 0.4]);
        assert_eq!(out.channel(1), &[0.0; 4]);
    }
}
