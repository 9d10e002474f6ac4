//! Deterministic offline rendering.
//!
//! The scheduler is stepped on a simulated clock that runs in lockstep with
//! the audio clock, and its events are applied to the bridge between
//! blocks. No threads and no device: the same job always renders the same
//! bits.

use lb_engine::{MetricsSnapshot, RenderBridge, RenderConfig};
use lb_ir::{ParamLabel, SampleId, DEFAULT_STEP_MILLIS};
use lb_sched::{Clock, LookaheadScheduler, ManualClock, SchedulerConfig, SchedulerSnapshot};
use tracing::info;

use crate::error::ControllerError;

/// Everything an offline render needs.
#[derive(Clone, Debug)]
pub struct OfflineJob {
    pub render: RenderConfig,
    pub scheduler: SchedulerConfig,
    /// Step duration in milliseconds.
    pub tempo_ms: f64,
    pub pattern: String,
    pub samples: Vec<(SampleId, Vec<f32>)>,
    pub master: Vec<(ParamLabel, f32)>,
    pub seconds: f64,
}

impl OfflineJob {
    pub fn new(pattern: impl Into<String>, seconds: f64) -> Self {
        Self {
            render: RenderConfig::default(),
            scheduler: SchedulerConfig::default(),
            tempo_ms: DEFAULT_STEP_MILLIS,
            pattern: pattern.into(),
            samples: Vec::new(),
            master: Vec::new(),
            seconds,
        }
    }

    pub fn with_sample(mut self, id: SampleId, frames: Vec<f32>) -> Self {
        self.samples.push((id, frames));
        self
    }

    pub fn with_master(mut self, label: ParamLabel, value: f32) -> Self {
        self.master.push((label, value));
        self
    }
}

/// Result of [`render_offline`].
#[derive(Clone, Debug)]
pub struct Rendered {
    /// Interleaved stereo.
    pub interleaved: Vec<f32>,
    pub sample_rate: u32,
    pub render: MetricsSnapshot,
    pub scheduler: SchedulerSnapshot,
}

impl Rendered {
    pub fn frames(&self) -> usize {
        self.interleaved.len() / 2
    }
}

pub fn render_offline(job: &OfflineJob) -> Result<Rendered, ControllerError> {
    let mut bridge = RenderBridge::new(job.render.clone())?;
    bridge.initialize()?;
    for (id, frames) in &job.samples {
        bridge.load_sample(*id, frames)?;
    }
    for (label, value) in &job.master {
        bridge.set_master(*label, *value)?;
    }

    let mut scheduler = LookaheadScheduler::new(job.scheduler.clone())?;
    scheduler.evaluate(&job.pattern)?;
    scheduler.set_tempo(job.tempo_ms)?;
    let clock = ManualClock::new(0.0);
    scheduler.start(0.0, Some(clock.now()));

    let sample_rate = job.render.sample_rate;
    let block = job.render.block_size;
    let block_seconds = block as f64 / sample_rate as f64;
    let total = (job.seconds.max(0.0) * sample_rate as f64).round() as usize;

    let mut interleaved = vec![0.0; total * 2];
    let mut block_out = vec![0.0; block * 2];
    let mut events = Vec::new();
    let mut next_step = 0.0;
    let mut written = 0;
    while written < total {
        // Wall time and audio time coincide in a simulated run.
        let block_end = bridge.stream_time() + block_seconds;
        while next_step < block_end {
            clock.set(next_step);
            match scheduler.step(clock.now(), &mut events) {
                Some(delay) => next_step += delay,
                None => break,
            }
        }
        for event in events.drain(..) {
            // Failures are counted as dropped events.
            let _ = bridge.apply(&event);
        }

        bridge.render_interleaved(&mut block_out);
        let frames = block.min(total - written);
        interleaved[written * 2..(written + frames) * 2].copy_from_slice(&block_out[..frames * 2]);
        written += frames;
    }

    let render = bridge.metrics().snapshot();
    let scheduler = scheduler.metrics().snapshot();
    info!(
        frames = total,
        events = scheduler.dispatched,
        dropped = render.dropped_events,
        "offline render finished"
    );
    Ok(Rendered {
        interleaved,
        sample_rate,
        render,
        scheduler,
    })
}
