//! Render task: the bridge plus its inboxes, driven by the audio device.
//!
//! Events from the scheduler and control messages from the host arrive on
//! lock-free single-producer/single-consumer rings and are drained between
//! blocks. Device buffers of any length are served from fixed-size blocks.

use std::sync::Arc;

use lb_ir::{Event, ParamLabel, SampleId};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

use crate::bridge::RenderBridge;
use crate::config::RenderConfig;
use crate::error::RenderError;
use crate::metrics::RenderMetrics;

/// Host-to-renderer control message.
#[derive(Debug)]
pub enum ControlMessage {
    /// Bring the engine up. Repeats are ignored.
    Initialize,
    /// Load PCM frames under `id`. Deferred if the engine is not up yet.
    LoadSample { id: SampleId, frames: Vec<f32> },
    /// Set a master bus control.
    SetMaster { label: ParamLabel, value: f32 },
}

/// Renderer-to-host report about a control message.
#[derive(Clone, Debug, PartialEq)]
pub enum RenderNotice {
    Initialized,
    InitializeFailed(RenderError),
    SampleLoaded { id: SampleId, frames: usize },
    SampleFailed { id: SampleId, error: RenderError },
    MasterRejected(RenderError),
}

/// Host-side ends of the render task's queues.
pub struct RenderHandles {
    pub events: HeapProd<Event>,
    pub control: HeapProd<ControlMessage>,
    pub notices: HeapCons<RenderNotice>,
    pub metrics: Arc<RenderMetrics>,
}

pub struct RenderTask {
    bridge: RenderBridge,
    events: HeapCons<Event>,
    control: HeapCons<ControlMessage>,
    notices: HeapProd<RenderNotice>,
    deferred: Vec<(SampleId, Vec<f32>)>,
    /// Next unread frame of the current block.
    cursor: usize,
}

/// Build a render task and the handles the host keeps.
pub fn render_task(config: RenderConfig) -> Result<(RenderTask, RenderHandles), RenderError> {
    let events = HeapRb::<Event>::new(config.event_capacity);
    let control = HeapRb::<ControlMessage>::new(config.control_capacity);
    let notices = HeapRb::<RenderNotice>::new(config.control_capacity);
    let (event_prod, event_cons) = events.split();
    let (control_prod, control_cons) = control.split();
    let (notice_prod, notice_cons) = notices.split();

    let bridge = RenderBridge::new(config)?;
    let metrics = bridge.metrics();
    let cursor = bridge.config().block_size;

    let task = RenderTask {
        bridge,
        events: event_cons,
        control: control_cons,
        notices: notice_prod,
        deferred: Vec::new(),
        cursor,
    };
    let handles = RenderHandles {
        events: event_prod,
        control: control_prod,
        notices: notice_cons,
        metrics,
    };
    Ok((task, handles))
}

impl RenderTask {
    pub fn bridge(&self) -> &RenderBridge {
        &self.bridge
    }

    pub fn bridge_mut(&mut self) -> &mut RenderBridge {
        &mut self.bridge
    }

    /// Apply pending host control messages.
    ///
    /// Sample loads may allocate; everything else here is allocation-free.
    pub fn drain_control(&mut self) {
        while let Some(msg) = self.control.try_pop() {
            match msg {
                ControlMessage::Initialize => self.initialize(),
                ControlMessage::LoadSample { id, frames } => {
                    if self.bridge.is_initialized() {
                        self.load(id, &frames);
                    } else {
                        self.deferred.push((id, frames));
                    }
                }
                ControlMessage::SetMaster { label, value } => {
                    if let Err(e) = self.bridge.set_master(label, value) {
                        self.notify(RenderNotice::MasterRejected(e));
                    }
                }
            }
        }
    }

    fn initialize(&mut self) {
        let was_up = self.bridge.is_initialized();
        match self.bridge.initialize() {
            Ok(()) if was_up => {}
            Ok(()) => {
                self.notify(RenderNotice::Initialized);
                for (id, frames) in std::mem::take(&mut self.deferred) {
                    self.load(id, &frames);
                }
            }
            Err(e) => self.notify(RenderNotice::InitializeFailed(e)),
        }
    }

    fn load(&mut self, id: SampleId, frames: &[f32]) {
        let notice = match self.bridge.load_sample(id, frames) {
            Ok(_) => RenderNotice::SampleLoaded {
                id,
                frames: frames.len(),
            },
            Err(error) => RenderNotice::SampleFailed { id, error },
        };
        self.notify(notice);
    }

    fn notify(&mut self, notice: RenderNotice) {
        // A host that stopped reading notices only loses reports.
        let _ = self.notices.try_push(notice);
    }

    /// Hand queued scheduler events to the bridge.
    pub fn drain_events(&mut self) {
        while let Some(event) = self.events.try_pop() {
            // Failures are counted in the bridge metrics.
            let _ = self.bridge.apply(&event);
        }
    }

    /// Fill an interleaved stereo device buffer of any length.
    ///
    /// Events are drained before each new block so a trigger lands in the
    /// block that contains its timestamp, or in the next one if it arrives
    /// late.
    pub fn process(&mut self, out: &mut [f32]) {
        self.drain_control();

        #[cfg(feature = "alloc_check")]
        assert_no_alloc::assert_no_alloc(|| self.fill(out));
        #[cfg(not(feature = "alloc_check"))]
        self.fill(out);
    }

    fn fill(&mut self, out: &mut [f32]) {
        let block = self.bridge.config().block_size;
        let mut written = 0;
        while written < out.len() {
            if self.cursor >= block {
                self.drain_events();
                self.bridge.render();
                self.cursor = 0;
            }
            let buffer = self.bridge.output();
            let left = buffer.channel(0);
            let right = buffer.channel(1);
            let frames = ((out.len() - written) / 2).min(block - self.cursor);
            if frames == 0 {
                // Odd trailing sample: pad with silence.
                out[written..].fill(0.0);
                break;
            }
            for i in 0..frames {
                out[written + 2 * i] = left[self.cursor + i];
                out[written + 2 * i + 1] = right[self.cursor + i];
            }
            written += 2 * frames;
            self.cursor += frames;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lb_ir::SourceType;

    fn config(block: usize) -> RenderConfig {
        RenderConfig {
            block_size: block,
            initial_arena_frames: 256,
            ..RenderConfig::default()
        }
    }

    fn id(s: &str) -> SampleId {
        SampleId::new(s).unwrap()
    }

    fn drain_notices(handles: &mut RenderHandles) -> Vec<RenderNotice> {
        let mut out = Vec::new();
        while let Some(n) = handles.notices.try_pop() {
            out.push(n);
        }
        out
    }

    #[test]
    fn samples_before_init_are_deferred() {
        let (mut task, mut handles) = render_task(config(4)).unwrap();
        handles
            .control
            .try_push(ControlMessage::LoadSample {
                id: id("bd"),
                frames: vec![0.5, 0.25],
            })
            .unwrap();
        task.drain_control();
        assert!(task.bridge().samples().is_empty());

        handles.control.try_push(ControlMessage::Initialize).unwrap();
        handles.control.try_push(ControlMessage::Initialize).unwrap();
        task.drain_control();
        assert!(task.bridge().samples().resolve(&id("bd")).is_some());
        assert_eq!(
            drain_notices(&mut handles),
            vec![
                RenderNotice::Initialized,
                RenderNotice::SampleLoaded {
                    id: id("bd"),
                    frames: 2
                }
            ]
        );
    }

    #[test]
    fn process_serves_any_buffer_length() {
        let (mut task, mut handles) = render_task(config(4)).unwrap();
        handles.control.try_push(ControlMessage::Initialize).unwrap();
        handles
            .control
            .try_push(ControlMessage::LoadSample {
                id: id("ramp"),
                frames: vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6],
            })
            .unwrap();
        task.drain_control();
        handles
            .events
            .try_push(Event::new(SourceType::Sampler, 0.0).with_sample(id("ramp")))
            .unwrap();

        // 3 frames, then 5 frames: crosses the 4-frame block boundary.
        let mut first = [0.0; 6];
        let mut second = [0.0; 10];
        task.process(&mut first);
        task.process(&mut second);

        let left: Vec<f32> = first
            .chunks(2)
            .chain(second.chunks(2))
            .map(|f| f[0])
            .collect();
        assert_eq!(left, vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.0, 0.0]);
    }

    #[test]
    fn rejected_master_param_is_reported() {
        let (mut task, mut handles) = render_task(config(4)).unwrap();
        handles.control.try_push(ControlMessage::Initialize).unwrap();
        handles
            .control
            .try_push(ControlMessage::SetMaster {
                label: ParamLabel::Attack,
                value: 1.0,
            })
            .unwrap();
        task.drain_control();
        let notices = drain_notices(&mut handles);
        assert_eq!(
            notices.last(),
            Some(&RenderNotice::MasterRejected(RenderError::NotMasterParam(
                ParamLabel::Attack
            )))
        );
    }
}
