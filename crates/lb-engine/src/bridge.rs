//! RenderBridge: turns trigger events into voices and renders fixed blocks.

use std::sync::Arc;
use std::time::Instant;

use lb_ir::{AudioBuffer, ContractError, Event, ParamLabel, SampleId, WireEvent, STEREO};
use tracing::{debug, info, warn};

use crate::config::RenderConfig;
use crate::error::RenderError;
use crate::master::MasterBus;
use crate::metrics::RenderMetrics;
use crate::sample_store::{SampleHandle, SampleStore};
use crate::source::Source;
use crate::voice::Voice;
use crate::voice_table::{BlockContext, Buses, InstanceId, VoiceTable};

/// Owns sample memory, voices and the master bus of the render context.
///
/// Created uninitialized; [`initialize`](Self::initialize) performs every
/// allocation the render path needs. Until then triggers and sample loads
/// are refused and [`render`](Self::render) produces silence.
pub struct RenderBridge {
    config: RenderConfig,
    initialized: bool,
    store: SampleStore,
    voices: VoiceTable,
    master: Option<MasterBus>,
    out: AudioBuffer,
    reverb_send: AudioBuffer,
    delay_send: AudioBuffer,
    /// Frames rendered so far; the audio clock.
    position: u64,
    metrics: Arc<RenderMetrics>,
}

impl RenderBridge {
    pub fn new(config: RenderConfig) -> Result<Self, RenderError> {
        config.validate()?;
        let block = config.block_size as u16;
        Ok(Self {
            store: SampleStore::new(config.sample_memory_frames),
            voices: VoiceTable::new(),
            master: None,
            out: AudioBuffer::new(STEREO, block),
            reverb_send: AudioBuffer::new(STEREO, 0),
            delay_send: AudioBuffer::new(STEREO, 0),
            position: 0,
            metrics: Arc::new(RenderMetrics::default()),
            initialized: false,
            config,
        })
    }

    /// Validate the shared vocabulary and preallocate every render buffer.
    /// Calling it again is a no-op.
    pub fn initialize(&mut self) -> Result<(), RenderError> {
        if self.initialized {
            debug!("render engine already initialized");
            return Ok(());
        }
        lb_ir::validate_contract(lb_ir::CONTRACT_VERSION)?;

        let block = self.config.block_size as u16;
        let sample_rate = self.config.sample_rate as f32;
        self.store.reserve(self.config.initial_arena_frames)?;
        self.voices.allocate(self.config.max_voices, self.config.block_size);
        self.master = Some(MasterBus::new(
            sample_rate,
            block,
            self.config.max_delay_seconds,
        ));
        self.reverb_send = AudioBuffer::new(STEREO, block);
        self.delay_send = AudioBuffer::new(STEREO, block);
        self.initialized = true;

        info!(
            sample_rate = self.config.sample_rate,
            block_size = self.config.block_size,
            max_voices = self.config.max_voices,
            "render engine initialized"
        );
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<RenderMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Audio clock at the start of the next block, in seconds.
    pub fn stream_time(&self) -> f64 {
        self.position as f64 / self.config.sample_rate as f64
    }

    pub fn samples(&self) -> &SampleStore {
        &self.store
    }

    /// Copy `frames` into padded sample memory and register `id`.
    pub fn load_sample(&mut self, id: SampleId, frames: &[f32]) -> Result<SampleHandle, RenderError> {
        if !self.initialized {
            return Err(RenderError::NotInitialized);
        }
        match self.store.load(id, frames) {
            Ok(handle) => {
                debug!(%id, frames = frames.len(), used = self.store.used_frames(), "sample loaded");
                Ok(handle)
            }
            Err(e) => {
                warn!(%id, error = %e, "sample load failed");
                Err(e)
            }
        }
    }

    /// Materialize an event into a voice.
    ///
    /// The voice is fully configured from the event's parameters before it is
    /// inserted, and starts at the event's timestamp. Failed triggers are
    /// counted as dropped.
    pub fn apply(&mut self, event: &Event) -> Result<InstanceId, RenderError> {
        let result = self.try_apply(event);
        if result.is_err() {
            self.metrics.record_dropped();
        }
        result
    }

    fn try_apply(&mut self, event: &Event) -> Result<InstanceId, RenderError> {
        if !self.initialized {
            return Err(RenderError::NotInitialized);
        }
        let source = Source::from_event(event, &self.store, self.config.sample_rate as f32)?;
        let voice = Voice::new(self.voices.next_id(), event, source);
        let id = voice.id;
        if self.voices.insert(voice).is_some() {
            self.metrics.record_steal();
        }
        Ok(id)
    }

    /// Decode a name-keyed event and apply it. Host-side entry point.
    pub fn apply_wire(&mut self, wire: &WireEvent) -> Result<InstanceId, RenderError> {
        let event = match wire.to_event() {
            Ok(event) => event,
            Err(e) => {
                self.metrics.record_dropped();
                return Err(match e {
                    ContractError::UnknownSourceType(name) => RenderError::UnknownSource(name),
                    other => RenderError::Contract(other),
                });
            }
        };
        self.apply(&event)
    }

    /// Set a master bus control. Takes effect on the next rendered block.
    pub fn set_master(&mut self, label: ParamLabel, value: f32) -> Result<(), RenderError> {
        match self.master.as_mut() {
            Some(master) => master.set(label, value),
            None => Err(RenderError::NotInitialized),
        }
    }

    pub fn master(&self) -> Option<&MasterBus> {
        self.master.as_ref()
    }

    pub fn active_voices(&self) -> usize {
        self.voices.active_count()
    }

    pub fn voice_is_live(&self, id: InstanceId) -> bool {
        self.voices.get(id).is_some()
    }

    /// Render one block and return it as planar stereo.
    ///
    /// Allocation-free and non-blocking. Finished voices are removed before
    /// returning.
    pub fn render(&mut self) -> &AudioBuffer {
        let began = Instant::now();
        let frames = self.config.block_size;
        self.out.silence();

        if let Some(master) = self.master.as_mut() {
            self.reverb_send.silence();
            self.delay_send.silence();

            let block = BlockContext {
                start: self.position as f64 / self.config.sample_rate as f64,
                sample_rate: self.config.sample_rate as f64,
                frames,
            };
            let stats = self.voices.render(
                &self.store,
                block,
                Buses {
                    dry: &mut self.out,
                    reverb: &mut self.reverb_send,
                    delay: &mut self.delay_send,
                },
            );
            master.process(&self.delay_send, &self.reverb_send, &mut self.out);

            if stats.finished > 0 {
                self.voices.reap_finished();
            }
            self.metrics.record_late(stats.late_starts);
            self.metrics.set_active_voices(self.voices.active_count());
        }

        self.position += frames as u64;
        self.metrics
            .record_block(frames, began.elapsed(), self.config.deadline());
        &self.out
    }

    /// Render one block into an interleaved stereo slice of
    /// `2 * block_size` samples.
    pub fn render_interleaved(&mut self, out: &mut [f32]) {
        self.render();
        self.out.write_interleaved(out);
    }

    /// The most recently rendered block.
    pub fn output(&self) -> &AudioBuffer {
        &self.out
    }
}
