//! Synthesis sources a voice can run.
//!
//! Sources are a closed enum stored inline in the voice, so creating one on
//! the render thread never allocates.

use lb_ir::{Event, ParamLabel, ParamSet, SourceType};

use crate::envelope::Asr;
use crate::error::RenderError;
use crate::sample_store::{SampleRecord, SampleStore};

const TAU: f32 = std::f32::consts::TAU;

const SYNTH_ATTACK: f32 = 0.005;
const SYNTH_SUSTAIN: f32 = 0.1;
const SYNTH_RELEASE: f32 = 0.05;
const OSC_EDGE: f32 = 0.002;
const DEFAULT_PITCH: f32 = 440.0;
/// Fastest sampler playback rate.
const MAX_RATE: f64 = 256.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Saw,
    Square,
}

#[derive(Clone, Debug)]
pub struct SamplerState {
    record: SampleRecord,
    position: f64,
    rate: f64,
    looping: bool,
    envelope: Option<Asr>,
    finished: bool,
}

#[derive(Clone, Debug)]
pub struct OscillatorState {
    waveform: Waveform,
    phase: f32,
    increment: f32,
    pulsewidth: f32,
    envelope: Asr,
}

#[derive(Clone, Debug)]
pub struct WavetableState {
    record: SampleRecord,
    position: f64,
    increment: f64,
    envelope: Asr,
}

#[derive(Clone, Debug)]
pub enum Source {
    Sampler(SamplerState),
    Oscillator(OscillatorState),
    Wavetable(WavetableState),
}

impl Source {
    /// Build the source an event asks for, resolving its sample if needed.
    pub fn from_event(
        event: &Event,
        store: &SampleStore,
        sample_rate: f32,
    ) -> Result<Self, RenderError> {
        let params = &event.params;
        let record = if event.source_type.is_sample_backed() {
            let id = event
                .sample_id
                .ok_or(RenderError::MissingSampleId(event.source_type))?;
            Some(store.resolve(&id).ok_or(RenderError::UnknownSample(id))?)
        } else {
            None
        };

        let source = match (event.source_type, record) {
            (SourceType::Sampler, Some(record)) => {
                Source::Sampler(sampler(record, params, sample_rate))
            }
            (SourceType::Wavetable, Some(record)) => {
                let envelope = synth_envelope(params, sample_rate, SYNTH_ATTACK, SYNTH_RELEASE);
                Source::Wavetable(WavetableState {
                    record,
                    position: 0.0,
                    increment: pitch(params) as f64 * record.frames() as f64
                        / sample_rate as f64,
                    envelope,
                })
            }
            (SourceType::SineOsc, _) => Source::Oscillator(oscillator(
                Waveform::Sine,
                params,
                sample_rate,
                synth_envelope(params, sample_rate, OSC_EDGE, OSC_EDGE),
            )),
            (SourceType::SineSynth, _) => Source::Oscillator(oscillator(
                Waveform::Sine,
                params,
                sample_rate,
                synth_envelope(params, sample_rate, SYNTH_ATTACK, SYNTH_RELEASE),
            )),
            (SourceType::LFSawSynth, _) => Source::Oscillator(oscillator(
                Waveform::Saw,
                params,
                sample_rate,
                synth_envelope(params, sample_rate, SYNTH_ATTACK, SYNTH_RELEASE),
            )),
            (SourceType::LFSquareSynth, _) => Source::Oscillator(oscillator(
                Waveform::Square,
                params,
                sample_rate,
                synth_envelope(params, sample_rate, SYNTH_ATTACK, SYNTH_RELEASE),
            )),
            (kind, None) => return Err(RenderError::MissingSampleId(kind)),
        };
        Ok(source)
    }

    /// Amplitude used when the event carries no `Level`.
    pub fn default_level(kind: SourceType) -> f32 {
        match kind {
            SourceType::Sampler => 1.0,
            _ => 0.3,
        }
    }

    /// Write mono output into `out`. Returns the number of frames produced;
    /// fewer than `out.len()` means the source has finished.
    pub fn render(&mut self, store: &SampleStore, out: &mut [f32]) -> usize {
        match self {
            Source::Sampler(s) => s.render(store, out),
            Source::Oscillator(o) => o.render(out),
            Source::Wavetable(w) => w.render(store, out),
        }
    }
}

fn sampler(record: SampleRecord, params: &ParamSet, sample_rate: f32) -> SamplerState {
    let frames = record.frames() as f64;
    let rate = params
        .get(ParamLabel::PlaybackRate)
        .map(f64::from)
        .filter(|r| r.is_finite() && *r > 0.0)
        .map_or(1.0, |r| r.min(MAX_RATE));
    let start = params
        .get(ParamLabel::PlaybackStart)
        .map(|s| (s as f64).clamp(0.0, 1.0))
        .unwrap_or(0.0);
    let looping = params.get(ParamLabel::PlaybackLoop).is_some_and(|l| l > 0.5);

    let shaped = [
        ParamLabel::Attack,
        ParamLabel::Sustain,
        ParamLabel::Release,
        ParamLabel::Duration,
    ]
    .iter()
    .any(|l| params.get(*l).is_some());

    // A looping sample needs an envelope to end; default to one pass.
    let envelope = (shaped || looping).then(|| {
        let natural = (frames / rate / sample_rate as f64) as f32;
        Asr::new(
            sample_rate,
            params.get(ParamLabel::Attack).unwrap_or(0.0),
            sustain(params).unwrap_or(natural),
            params.get(ParamLabel::Release).unwrap_or(0.0),
        )
    });

    SamplerState {
        record,
        position: (start * frames).min(frames),
        rate,
        looping,
        envelope,
        finished: false,
    }
}

fn oscillator(
    waveform: Waveform,
    params: &ParamSet,
    sample_rate: f32,
    envelope: Asr,
) -> OscillatorState {
    OscillatorState {
        waveform,
        phase: 0.0,
        increment: pitch(params) / sample_rate,
        pulsewidth: params
            .get(ParamLabel::Pulsewidth)
            .unwrap_or(0.5)
            .clamp(0.01, 0.99),
        envelope,
    }
}

fn synth_envelope(params: &ParamSet, sample_rate: f32, attack: f32, release: f32) -> Asr {
    Asr::new(
        sample_rate,
        params.get(ParamLabel::Attack).unwrap_or(attack),
        sustain(params).unwrap_or(SYNTH_SUSTAIN),
        params.get(ParamLabel::Release).unwrap_or(release),
    )
}

fn sustain(params: &ParamSet) -> Option<f32> {
    params
        .get(ParamLabel::Sustain)
        .or_else(|| params.get(ParamLabel::Duration))
}

/// Frequency in Hz from `PitchFrequency`, else from MIDI `PitchNote`.
/// Non-finite results fall back to the default pitch.
fn pitch(params: &ParamSet) -> f32 {
    params
        .get(ParamLabel::PitchFrequency)
        .or_else(|| {
            params
                .get(ParamLabel::PitchNote)
                .map(|n| 440.0 * 2f32.powf((n - 69.0) / 12.0))
        })
        .filter(|f| f.is_finite())
        .unwrap_or(DEFAULT_PITCH)
}

impl SamplerState {
    fn render(&mut self, store: &SampleStore, out: &mut [f32]) -> usize {
        if self.finished {
            return 0;
        }
        let view = store.view(self.record);
        let frames = view.frames() as f64;

        for (i, slot) in out.iter_mut().enumerate() {
            let gain = match &mut self.envelope {
                Some(env) if env.is_finished() => {
                    self.finished = true;
                    return i;
                }
                Some(env) => env.next_gain(),
                None => 1.0,
            };
            let value = if self.looping {
                view.interpolate_wrapped(self.position)
            } else if self.position < frames {
                view.interpolate(self.position)
            } else {
                self.finished = true;
                return i;
            };
            *slot = value * gain;
            self.position += self.rate;
            if self.looping && self.position >= frames {
                self.position %= frames;
            }
        }
        out.len()
    }
}

impl OscillatorState {
    fn render(&mut self, out: &mut [f32]) -> usize {
        for (i, slot) in out.iter_mut().enumerate() {
            if self.envelope.is_finished() {
                return i;
            }
            let raw = match self.waveform {
                Waveform::Sine => (TAU * self.phase).sin(),
                Waveform::Saw => 2.0 * self.phase - 1.0,
                Waveform::Square => {
                    if self.phase < self.pulsewidth {
                        1.0
                    } else {
                        -1.0
                    }
                }
            };
            *slot = raw * self.envelope.next_gain();
            self.phase += self.increment;
            self.phase -= self.phase.floor();
        }
        out.len()
    }
}

impl WavetableState {
    fn render(&mut self, store: &SampleStore, out: &mut [f32]) -> usize {
        let view = store.view(self.record);
        let frames = view.frames() as f64;
        for (i, slot) in out.iter_mut().enumerate() {
            if self.envelope.is_finished() {
                return i;
            }
            *slot = view.interpolate_wrapped(self.position) * self.envelope.next_gain();
            self.position += self.increment;
            if self.position >= frames {
                self.position %= frames;
            }
        }
        out.len()
    }
}
