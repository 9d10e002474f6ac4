//! Source-type and parameter vocabulary shared by scheduler and renderer.
//!
//! Codes are part of the wire contract: appending a variant is backward
//! compatible, renumbering an existing one is a breaking change and must bump
//! [`CONTRACT_VERSION`].

use alloc::string::String;

use crate::error::ContractError;

/// Version of the name/code tables below.
pub const CONTRACT_VERSION: u32 = 1;

/// Which synthesis algorithm a trigger instantiates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "String", into = "&'static str")
)]
#[repr(u16)]
pub enum SourceType {
    Sampler = 0,
    SineOsc = 1,
    SineSynth = 2,
    LFSawSynth = 3,
    LFSquareSynth = 4,
    Wavetable = 5,
}

impl SourceType {
    /// Every variant, ordered by code.
    pub const ALL: [SourceType; 6] = [
        SourceType::Sampler,
        SourceType::SineOsc,
        SourceType::SineSynth,
        SourceType::LFSawSynth,
        SourceType::LFSquareSynth,
        SourceType::Wavetable,
    ];

    /// Stable integer code.
    pub const fn code(self) -> u16 {
        self as u16
    }

    /// Canonical name.
    pub const fn name(self) -> &'static str {
        match self {
            SourceType::Sampler => "sampler",
            SourceType::SineOsc => "sine_osc",
            SourceType::SineSynth => "sine_synth",
            SourceType::LFSawSynth => "lf_saw_synth",
            SourceType::LFSquareSynth => "lf_square_synth",
            SourceType::Wavetable => "wavetable",
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.name() == name)
    }

    /// True for sources that read from the sample store.
    pub const fn is_sample_backed(self) -> bool {
        matches!(self, SourceType::Sampler | SourceType::Wavetable)
    }
}

impl From<SourceType> for &'static str {
    fn from(source: SourceType) -> Self {
        source.name()
    }
}

impl TryFrom<String> for SourceType {
    type Error = ContractError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        SourceType::from_name(&name).ok_or(ContractError::UnknownSourceType(name))
    }
}

impl TryFrom<u16> for SourceType {
    type Error = ContractError;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        SourceType::from_code(code).ok_or(ContractError::UnknownSourceCode(code))
    }
}

impl core::fmt::Display for SourceType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// A parameter that can be set on a voice or on the master bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "String", into = "&'static str")
)]
#[repr(u16)]
pub enum ParamLabel {
    Attack = 0,
    Decay = 1,
    DelayDampeningFrequency = 2,
    DelayFeedback = 3,
    DelayMix = 4,
    DelayTime = 5,
    Duration = 6,
    PitchFrequency = 7,
    PitchNote = 8,
    HighpassCutoffFrequency = 9,
    HighpassQFactor = 10,
    Level = 11,
    LowpassCutoffFrequency = 12,
    LowpassQFactor = 13,
    LowpassFilterDistortion = 14,
    PeakFrequency = 15,
    PeakGain = 16,
    PeakQFactor = 17,
    Pulsewidth = 18,
    PlaybackRate = 19,
    PlaybackStart = 20,
    PlaybackLoop = 21,
    Release = 22,
    ReverbDampening = 23,
    ReverbMix = 24,
    ReverbRoomsize = 25,
    SampleBufferNumber = 26,
    Samplerate = 27,
    StereoPosition = 28,
    Sustain = 29,
}

impl ParamLabel {
    /// Every label, ordered by code.
    pub const ALL: [ParamLabel; 30] = [
        ParamLabel::Attack,
        ParamLabel::Decay,
        ParamLabel::DelayDampeningFrequency,
        ParamLabel::DelayFeedback,
        ParamLabel::DelayMix,
        ParamLabel::DelayTime,
        ParamLabel::Duration,
        ParamLabel::PitchFrequency,
        ParamLabel::PitchNote,
        ParamLabel::HighpassCutoffFrequency,
        ParamLabel::HighpassQFactor,
        ParamLabel::Level,
        ParamLabel::LowpassCutoffFrequency,
        ParamLabel::LowpassQFactor,
        ParamLabel::LowpassFilterDistortion,
        ParamLabel::PeakFrequency,
        ParamLabel::PeakGain,
        ParamLabel::PeakQFactor,
        ParamLabel::Pulsewidth,
        ParamLabel::PlaybackRate,
        ParamLabel::PlaybackStart,
        ParamLabel::PlaybackLoop,
        ParamLabel::Release,
        ParamLabel::ReverbDampening,
        ParamLabel::ReverbMix,
        ParamLabel::ReverbRoomsize,
        ParamLabel::SampleBufferNumber,
        ParamLabel::Samplerate,
        ParamLabel::StereoPosition,
        ParamLabel::Sustain,
    ];

    pub const fn code(self) -> u16 {
        self as u16
    }

    pub const fn name(self) -> &'static str {
        match self {
            ParamLabel::Attack => "attack",
            ParamLabel::Decay => "decay",
            ParamLabel::DelayDampeningFrequency => "delay_dampening_frequency",
            ParamLabel::DelayFeedback => "delay_feedback",
            ParamLabel::DelayMix => "delay_mix",
            ParamLabel::DelayTime => "delay_time",
            ParamLabel::Duration => "duration",
            ParamLabel::PitchFrequency => "pitch_frequency",
            ParamLabel::PitchNote => "pitch_note",
            ParamLabel::HighpassCutoffFrequency => "highpass_cutoff_frequency",
            ParamLabel::HighpassQFactor => "highpass_q_factor",
            ParamLabel::Level => "level",
            ParamLabel::LowpassCutoffFrequency => "lowpass_cutoff_frequency",
            ParamLabel::LowpassQFactor => "lowpass_q_factor",
            ParamLabel::LowpassFilterDistortion => "lowpass_filter_distortion",
            ParamLabel::PeakFrequency => "peak_frequency",
            ParamLabel::PeakGain => "peak_gain",
            ParamLabel::PeakQFactor => "peak_q_factor",
            ParamLabel::Pulsewidth => "pulsewidth",
            ParamLabel::PlaybackRate => "playback_rate",
            ParamLabel::PlaybackStart => "playback_start",
            ParamLabel::PlaybackLoop => "playback_loop",
            ParamLabel::Release => "release",
            ParamLabel::ReverbDampening => "reverb_dampening",
            ParamLabel::ReverbMix => "reverb_mix",
            ParamLabel::ReverbRoomsize => "reverb_roomsize",
            ParamLabel::SampleBufferNumber => "sample_buffer_number",
            ParamLabel::Samplerate => "samplerate",
            ParamLabel::StereoPosition => "stereo_position",
            ParamLabel::Sustain => "sustain",
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.name() == name)
    }

    /// Labels the render bridge accepts as master-bus controls.
    pub const fn is_master(self) -> bool {
        matches!(
            self,
            ParamLabel::DelayDampeningFrequency
                | ParamLabel::DelayFeedback
                | ParamLabel::DelayMix
                | ParamLabel::DelayTime
                | ParamLabel::ReverbDampening
                | ParamLabel::ReverbMix
                | ParamLabel::ReverbRoomsize
        )
    }
}

impl From<ParamLabel> for &'static str {
    fn from(label: ParamLabel) -> Self {
        label.name()
    }
}

impl TryFrom<String> for ParamLabel {
    type Error = ContractError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        ParamLabel::from_name(&name).ok_or(ContractError::UnknownParameter(name))
    }
}

impl core::fmt::Display for ParamLabel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Check a peer's contract version and the internal consistency of both
/// tables. Called at startup by the scheduler runtime and the render bridge.
pub fn validate_contract(peer_version: u32) -> Result<(), ContractError> {
    if peer_version != CONTRACT_VERSION {
        return Err(ContractError::VersionMismatch {
            local: CONTRACT_VERSION,
            peer: peer_version,
        });
    }

    for (i, source) in SourceType::ALL.iter().enumerate() {
        if source.code() as usize != i {
            return Err(ContractError::InvalidTable("source codes are not dense"));
        }
        if SourceType::from_name(source.name()) != Some(*source) {
            return Err(ContractError::InvalidTable("duplicate source name"));
        }
    }

    for (i, label) in ParamLabel::ALL.iter().enumerate() {
        if label.code() as usize != i {
            return Err(ContractError::InvalidTable("parameter codes are not dense"));
        }
        if ParamLabel::from_name(label.name()) != Some(*label) {
            return Err(ContractError::InvalidTable("duplicate parameter name"));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_are_consistent() {
        assert!(validate_contract(CONTRACT_VERSION).is_ok());
    }

    #[test]
    fn version_mismatch_is_reported() {
        assert_eq!(
            validate_contract(CONTRACT_VERSION + 1),
            Err(ContractError::VersionMismatch {
                local: CONTRACT_VERSION,
                peer: CONTRACT_VERSION + 1
            })
        );
    }

    #[test]
    fn source_codes_are_stable() {
        assert_eq!(SourceType::Sampler.code(), 0);
        assert_eq!(SourceType::LFSquareSynth.code(), 4);
        assert_eq!(SourceType::from_code(2), Some(SourceType::SineSynth));
        assert_eq!(SourceType::from_code(99), None);
        assert_eq!(
            SourceType::try_from(6u16),
            Err(ContractError::UnknownSourceCode(6))
        );
    }

    #[test]
    fn param_codes_are_stable() {
        // Master controls are addressed by these codes on the host side.
        assert_eq!(ParamLabel::DelayDampeningFrequency.code(), 2);
        assert_eq!(ParamLabel::DelayFeedback.code(), 3);
        assert_eq!(ParamLabel::DelayTime.code(), 5);
        assert_eq!(ParamLabel::ReverbDampening.code(), 23);
        assert_eq!(ParamLabel::ReverbRoomsize.code(), 25);
        assert_eq!(ParamLabel::Sustain.code(), 29);
    }

    #[test]
    fn names_round_trip() {
        for label in ParamLabel::ALL {
            assert_eq!(ParamLabel::from_name(label.name()), Some(label));
        }
        for source in SourceType::ALL {
            assert_eq!(SourceType::from_name(source.name()), Some(source));
        }
        assert_eq!(ParamLabel::from_name("wobble"), None);
    }

    #[test]
    fn sample_backed_sources() {
        assert!(SourceType::Sampler.is_sample_backed());
        assert!(SourceType::Wavetable.is_sample_backed());
        assert!(!SourceType::SineSynth.is_sample_backed());
    }
}
