//! Live controller: scheduler thread, audio device and render task wired
//! together.
//!
//! The controller is the command source. It never touches render state
//! directly; samples and master settings travel over the render task's
//! control queue and scheduler commands over the scheduler's channel.

use std::sync::Arc;
use std::time::Duration;

use lb_audio::{AudioOutput, CpalOutput};
use lb_engine::{
    render_task, ControlMessage, MetricsSnapshot, RenderConfig, RenderHandles, RenderMetrics,
    RenderNotice,
};
use lb_ir::{Command, ParamLabel, SampleId};
use lb_sched::{
    MonotonicClock, SchedulerConfig, SchedulerReport, SchedulerRuntime, SchedulerSnapshot,
};
use ringbuf::traits::{Consumer, Producer};
use ringbuf::{HeapCons, HeapProd};
use tracing::{debug, info, warn};

use crate::error::ControllerError;

pub struct Controller {
    output: CpalOutput,
    scheduler: SchedulerRuntime,
    control: HeapProd<ControlMessage>,
    notices: HeapCons<RenderNotice>,
    render_metrics: Arc<RenderMetrics>,
    sample_rate: u32,
    lookahead: f64,
}

impl Controller {
    /// Open the default audio device and start the render and scheduler
    /// contexts. The render config's sample rate is replaced by the
    /// device's.
    pub fn open(render: RenderConfig, scheduler: SchedulerConfig) -> Result<Self, ControllerError> {
        let mut output = CpalOutput::new()?;
        let render = RenderConfig {
            sample_rate: output.sample_rate(),
            ..render
        };
        let sample_rate = render.sample_rate;
        let lookahead = scheduler.lookahead();

        let (task, handles) = render_task(render)?;
        let RenderHandles {
            events,
            mut control,
            notices,
            metrics,
        } = handles;
        control
            .try_push(ControlMessage::Initialize)
            .map_err(|_| ControllerError::ControlQueueFull)?;

        output.build_stream(task)?;
        output.start()?;
        let scheduler = SchedulerRuntime::spawn(scheduler, events, MonotonicClock::new())?;
        info!(sample_rate, "controller ready");

        Ok(Self {
            output,
            scheduler,
            control,
            notices,
            render_metrics: metrics,
            sample_rate,
            lookahead,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn send(&self, command: Command) -> Result<(), ControllerError> {
        if self.scheduler.send(command) {
            Ok(())
        } else {
            Err(ControllerError::SchedulerGone)
        }
    }

    /// Start the pattern one lookahead past the current audio clock, so the
    /// first events reach the renderer ahead of their blocks. Returns the
    /// origin.
    pub fn start_now(&self) -> Result<f64, ControllerError> {
        let origin = self.render_metrics.stream_time(self.sample_rate) + self.lookahead;
        self.start_at(origin)?;
        Ok(origin)
    }

    pub fn start_at(&self, origin: f64) -> Result<(), ControllerError> {
        self.send(Command::Start {
            origin_timestamp: origin,
            wall_reference: None,
        })
    }

    pub fn stop(&self) -> Result<(), ControllerError> {
        self.send(Command::Stop)
    }

    /// Queue a new loop. The outcome arrives as a report.
    pub fn evaluate(&self, loop_spec: impl Into<String>) -> Result<(), ControllerError> {
        self.send(Command::Evaluate {
            loop_spec: loop_spec.into(),
        })
    }

    /// Step duration in milliseconds.
    pub fn set_tempo(&self, step_millis: f64) -> Result<(), ControllerError> {
        self.send(Command::SetTempo { tempo: step_millis })
    }

    pub fn load_sample(&mut self, id: &str, frames: Vec<f32>) -> Result<(), ControllerError> {
        let id = SampleId::new(id)?;
        debug!(%id, frames = frames.len(), "queueing sample");
        self.control
            .try_push(ControlMessage::LoadSample { id, frames })
            .map_err(|_| ControllerError::ControlQueueFull)
    }

    pub fn set_master(&mut self, label: ParamLabel, value: f32) -> Result<(), ControllerError> {
        self.control
            .try_push(ControlMessage::SetMaster { label, value })
            .map_err(|_| ControllerError::ControlQueueFull)
    }

    /// Wait up to `timeout` for the next scheduler report.
    pub fn next_report(&self, timeout: Duration) -> Option<SchedulerReport> {
        self.scheduler.reports().recv_timeout(timeout).ok()
    }

    /// Scheduler reports received so far.
    pub fn reports(&self) -> Vec<SchedulerReport> {
        self.scheduler.reports().try_iter().collect()
    }

    /// Render-side notices received so far. Failures are also logged.
    pub fn notices(&mut self) -> Vec<RenderNotice> {
        let mut out = Vec::new();
        while let Some(notice) = self.notices.try_pop() {
            match &notice {
                RenderNotice::InitializeFailed(e) => warn!(error = %e, "render engine failed"),
                RenderNotice::SampleFailed { id, error } => {
                    warn!(%id, %error, "sample rejected")
                }
                RenderNotice::MasterRejected(e) => warn!(error = %e, "master setting rejected"),
                _ => {}
            }
            out.push(notice);
        }
        out
    }

    pub fn render_metrics(&self) -> MetricsSnapshot {
        self.render_metrics.snapshot()
    }

    pub fn scheduler_metrics(&self) -> SchedulerSnapshot {
        self.scheduler.metrics().snapshot()
    }

    /// Stop generation, pause the device and join the scheduler thread.
    pub fn shutdown(mut self) {
        let _ = self.stop();
        if let Err(e) = self.output.stop() {
            warn!(error = %e, "audio stop failed");
        }
        self.scheduler.shutdown();
    }
}
