//! Trigger events crossing from the scheduler to the render bridge.
//!
//! [`Event`] is fixed-capacity so it can be pushed through a lock-free queue
//! and consumed on the audio thread without touching the allocator.
//! [`WireEvent`] is the string-keyed form used at process boundaries.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};

use arrayvec::{ArrayString, ArrayVec};

use crate::error::ContractError;
use crate::vocab::{ParamLabel, SourceType};

/// Longest sample id accepted, in bytes.
pub const MAX_SAMPLE_ID_LEN: usize = 32;

/// Maximum number of parameters carried by one event. One slot per label.
pub const MAX_PARAMS: usize = ParamLabel::ALL.len();

/// Identifier of a loaded sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SampleId(ArrayString<MAX_SAMPLE_ID_LEN>);

impl SampleId {
    pub fn new(id: &str) -> Result<Self, ContractError> {
        ArrayString::from(id)
            .map(SampleId)
            .map_err(|_| ContractError::SampleIdTooLong(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl core::fmt::Display for SampleId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label/value pairs in insertion order. Setting a label twice keeps the
/// last value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParamSet(ArrayVec<(ParamLabel, f32), MAX_PARAMS>);

impl ParamSet {
    pub fn new() -> Self {
        Self(ArrayVec::new())
    }

    pub fn set(&mut self, label: ParamLabel, value: f32) {
        if let Some(slot) = self.0.iter_mut().find(|(l, _)| *l == label) {
            slot.1 = value;
        } else {
            // Capacity equals the number of labels, so a fresh label always fits.
            self.0.push((label, value));
        }
    }

    pub fn get(&self, label: ParamLabel) -> Option<f32> {
        self.0.iter().find(|(l, _)| *l == label).map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ParamLabel, f32)> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(ParamLabel, f32)> for ParamSet {
    fn from_iter<I: IntoIterator<Item = (ParamLabel, f32)>>(iter: I) -> Self {
        let mut set = ParamSet::new();
        for (label, value) in iter {
            set.set(label, value);
        }
        set
    }
}

/// A request to start one sound instance at an absolute audio-clock time.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    /// What to instantiate
    pub source_type: SourceType,
    /// Start time in seconds on the audio clock
    pub timestamp: f64,
    /// Required by sample-backed sources
    pub sample_id: Option<SampleId>,
    /// Voice parameters
    pub params: ParamSet,
}

impl Event {
    pub fn new(source_type: SourceType, timestamp: f64) -> Self {
        Self {
            source_type,
            timestamp,
            sample_id: None,
            params: ParamSet::new(),
        }
    }

    pub fn with_sample(mut self, id: SampleId) -> Self {
        self.sample_id = Some(id);
        self
    }

    pub fn with_param(mut self, label: ParamLabel, value: f32) -> Self {
        self.params.set(label, value);
        self
    }
}

/// String-keyed event as it appears in JSON or on a message port.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WireEvent {
    pub source_type: String,
    pub timestamp: f64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub sample_id: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub params: BTreeMap<String, f32>,
}

impl WireEvent {
    /// Decode into a typed [`Event`].
    ///
    /// An unknown source type is an error. Unknown parameter names are
    /// skipped so that newer peers can send labels this build lacks.
    pub fn to_event(&self) -> Result<Event, ContractError> {
        let source_type = SourceType::from_name(&self.source_type)
            .ok_or_else(|| ContractError::UnknownSourceType(self.source_type.clone()))?;

        let sample_id = match &self.sample_id {
            Some(id) => Some(SampleId::new(id)?),
            None => None,
        };

        let params = self
            .params
            .iter()
            .filter_map(|(name, value)| ParamLabel::from_name(name).map(|l| (l, *value)))
            .collect();

        Ok(Event {
            source_type,
            timestamp: self.timestamp,
            sample_id,
            params,
        })
    }
}

impl From<&Event> for WireEvent {
    fn from(event: &Event) -> Self {
        Self {
            source_type: event.source_type.name().to_string(),
            timestamp: event.timestamp,
            sample_id: event.sample_id.map(|id| id.as_str().to_string()),
            params: event
                .params
                .iter()
                .map(|(l, v)| (l.name().to_string(), v))
                .collect(),
        }
    }
}
