//! Lookahead scheduler state machine.
//!
//! Each step generates every pattern event due before
//! `origin + k * period + lookahead`, where `k` is the step's slot on the
//! drift-compensated wall-clock grid. Generation therefore depends only on
//! the slot index, not on when the timer actually fired.

use std::sync::Arc;

use lb_ir::Tempo;
use tracing::{debug, warn};

use crate::config::SchedulerConfig;
use crate::drift::DriftCompensator;
use crate::error::{EvalError, SchedulerError};
use crate::loop_spec::{EmptyLoop, Evaluator, LoopSpec, PatternEvent};
use crate::metrics::SchedulerMetrics;
use crate::pattern::StepEvaluator;
use crate::sink::EventSink;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Running,
}

/// Generation progress of one run, from `start` to `stop`.
#[derive(Clone, Copy, Debug)]
struct Run {
    /// Audio-clock time of pattern step 0.
    origin: f64,
    wall_reference: Option<f64>,
    anchored: bool,
    /// Pattern position `anchor_step` sits at audio time `anchor_time`.
    /// Moved to the generation frontier on every tempo change.
    anchor_time: f64,
    anchor_step: f64,
    /// Pattern position of `last_generated`.
    cursor_step: f64,
    /// Everything before this audio time has been generated.
    last_generated: f64,
}

impl Run {
    fn new(origin: f64, wall_reference: Option<f64>) -> Self {
        Self {
            origin,
            wall_reference,
            anchored: false,
            anchor_time: origin,
            anchor_step: 0.0,
            cursor_step: 0.0,
            last_generated: origin,
        }
    }

    fn step_at(&self, time: f64, tempo: Tempo) -> f64 {
        self.anchor_step + (time - self.anchor_time) / tempo.step_seconds()
    }

    fn time_at(&self, step: f64, tempo: Tempo) -> f64 {
        self.anchor_time + (step - self.anchor_step) * tempo.step_seconds()
    }
}

pub struct LookaheadScheduler {
    config: SchedulerConfig,
    evaluator: Box<dyn Evaluator>,
    spec: Box<dyn LoopSpec>,
    staged_spec: Option<Box<dyn LoopSpec>>,
    tempo: Tempo,
    staged_tempo: Option<Tempo>,
    run: Option<Run>,
    drift: DriftCompensator,
    metrics: Arc<SchedulerMetrics>,
    batch: Vec<PatternEvent>,
}

impl LookaheadScheduler {
    /// A stopped scheduler with an empty loop, evaluating the step-pattern
    /// language.
    pub fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        Self::with_evaluator(config, Box::new(StepEvaluator))
    }

    pub fn with_evaluator(
        config: SchedulerConfig,
        evaluator: Box<dyn Evaluator>,
    ) -> Result<Self, SchedulerError> {
        config.validate()?;
        Ok(Self {
            drift: DriftCompensator::new(&config),
            config,
            evaluator,
            spec: Box::new(EmptyLoop),
            staged_spec: None,
            tempo: Tempo::default(),
            staged_tempo: None,
            run: None,
            metrics: Arc::new(SchedulerMetrics::default()),
            batch: Vec::with_capacity(64),
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn state(&self) -> SchedulerState {
        if self.run.is_some() {
            SchedulerState::Running
        } else {
            SchedulerState::Stopped
        }
    }

    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    pub fn metrics(&self) -> Arc<SchedulerMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Tempo used by the current generation cycle.
    pub fn tempo(&self) -> Tempo {
        self.tempo
    }

    /// Audio time up to which events have been generated in this run.
    pub fn last_generated(&self) -> Option<f64> {
        self.run.map(|r| r.last_generated)
    }

    /// Begin generation with pattern step 0 at `origin` on the audio clock.
    ///
    /// `wall_reference` is the wall-clock reading that corresponds to
    /// `origin`; without one, the first step's reading is used. Starting a
    /// running scheduler restarts it.
    pub fn start(&mut self, origin: f64, wall_reference: Option<f64>) {
        debug!(origin, ?wall_reference, "scheduler start");
        self.run = Some(Run::new(origin, wall_reference));
    }

    /// Halt generation. Events already dispatched are unaffected.
    pub fn stop(&mut self) {
        if self.run.take().is_some() {
            debug!("scheduler stop");
        }
    }

    /// Evaluate loop text and stage the result for the next cycle.
    /// On error the active loop stays in place.
    pub fn evaluate(&mut self, text: &str) -> Result<(), EvalError> {
        let spec = self.evaluator.evaluate(text)?;
        self.load(spec);
        Ok(())
    }

    /// Stage an already built loop for the next cycle.
    pub fn load(&mut self, spec: Box<dyn LoopSpec>) {
        self.staged_spec = Some(spec);
    }

    /// Stage a new step duration, in milliseconds, for the next cycle.
    pub fn set_tempo(&mut self, step_millis: f64) -> Result<(), SchedulerError> {
        let tempo =
            Tempo::from_step_millis(step_millis).ok_or(SchedulerError::InvalidTempo(step_millis))?;
        self.staged_tempo = Some(tempo);
        Ok(())
    }

    /// Run one generation cycle at wall time `now`, dispatching into `sink`.
    ///
    /// Returns the wait until the next cycle, in seconds, or `None` when
    /// stopped.
    pub fn step(&mut self, now: f64, sink: &mut dyn EventSink) -> Option<f64> {
        let run = self.run.as_mut()?;
        if !run.anchored {
            self.drift.reset(run.wall_reference.unwrap_or(now));
            run.anchored = true;
        }

        if let Some(spec) = self.staged_spec.take() {
            self.spec = spec;
        }
        if let Some(tempo) = self.staged_tempo.take() {
            run.anchor_time = run.last_generated;
            run.anchor_step = run.cursor_step;
            self.tempo = tempo;
        }

        let tick = self.drift.tick(now);
        let period = self.config.period();
        if tick.skipped > 0 {
            self.metrics.record_saturation(tick.skipped);
            warn!(
                drift = tick.drift,
                skipped = tick.skipped,
                "scheduler fell behind, skipping periods"
            );
            let resumed = run.origin + tick.slot as f64 * period;
            if resumed > run.last_generated {
                run.cursor_step = run.step_at(resumed, self.tempo);
                run.last_generated = resumed;
            }
        }

        let horizon = run.origin + tick.slot as f64 * period + self.config.lookahead();
        if horizon > run.last_generated {
            let to_step = run.step_at(horizon, self.tempo);
            self.batch.clear();
            self.spec.query(run.cursor_step, to_step, &mut self.batch);
            // Stable: ties keep generation order.
            self.batch.sort_by(|a, b| a.position.total_cmp(&b.position));

            let floor = run.last_generated;
            for pattern_event in self.batch.drain(..) {
                let mut event = pattern_event.event;
                event.timestamp = run.time_at(pattern_event.position, self.tempo).max(floor);
                self.metrics.record_dispatch(sink.dispatch(event));
            }
            run.cursor_step = to_step;
            run.last_generated = horizon;
        }

        self.metrics
            .record_step(tick.drift, self.drift.mean_drift(), self.drift.max_drift());
        Some(self.drift.next_delay(tick))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lb_ir::Event;

    fn scheduler(text: &str, step_millis: f64) -> LookaheadScheduler {
        let mut s = LookaheadScheduler::new(SchedulerConfig::default()).unwrap();
        s.evaluate(text).unwrap();
        s.set_tempo(step_millis).unwrap();
        s
    }

    /// Step on the ideal grid until wall time `until`.
    fn run_until(s: &mut LookaheadScheduler, start: f64, until: f64) -> Vec<Event> {
        let mut out = Vec::new();
        let mut now = start;
        while now <= until {
            match s.step(now, &mut out) {
                Some(delay) => now += delay,
                None => break,
            }
        }
        out
    }

    #[test]
    fn stopped_scheduler_does_nothing() {
        let mut s = scheduler("bd", 100.0);
        let mut out = Vec::new();
        assert_eq!(s.step(0.0, &mut out), None);
        assert!(out.is_empty());
        assert_eq!(s.state(), SchedulerState::Stopped);
    }

    #[test]
    fn first_step_covers_lookahead() {
        let mut s = scheduler("bd", 30.0);
        s.start(2.0, Some(0.0));
        let mut out = Vec::new();
        let delay = s.step(0.0, &mut out).unwrap();
        let times: Vec<f64> = out.iter().map(|e| e.timestamp).collect();
        assert_eq!(times.len(), 4);
        for (i, t) in times.iter().enumerate() {
            assert!((t - (2.0 + 0.03 * i as f64)).abs() < 1e-9);
        }
        assert!((delay - 0.025).abs() < 1e-12);
        assert!((s.last_generated().unwrap() - 2.1).abs() < 1e-12);
    }

    #[test]
    fn empty_spec_produces_nothing() {
        let mut s = scheduler("", 100.0);
        s.start(0.0, None);
        assert!(run_until(&mut s, 0.0, 1.0).is_empty());
    }

    #[test]
    fn malformed_evaluate_keeps_old_spec() {
        let mut s = scheduler("bd", 250.0);
        assert!(s.evaluate("wobble >> sn").is_err());
        s.start(0.0, Some(0.0));
        let events = run_until(&mut s, 0.0, 0.6);
        assert!(events
            .iter()
            .all(|e| e.sample_id.as_ref().is_some_and(|id| id.as_str() == "bd")));
        assert!(!events.is_empty());
    }

    #[test]
    fn evaluate_takes_effect_next_cycle() {
        let mut s = scheduler("bd", 100.0);
        s.start(0.0, Some(0.0));
        let mut out = Vec::new();
        s.step(0.0, &mut out);
        let frontier = s.last_generated().unwrap();
        s.evaluate("sn").unwrap();
        s.step(0.025, &mut out);
        let after: Vec<&Event> = out
            .iter()
            .filter(|e| e.sample_id.as_ref().is_some_and(|id| id.as_str() == "sn"))
            .collect();
        assert!(!after.is_empty());
        assert!(after.iter().all(|e| e.timestamp >= frontier));
    }

    #[test]
    fn tempo_change_reanchors_at_frontier() {
        let mut s = scheduler("bd", 100.0);
        s.start(0.0, Some(0.0));
        let mut out = Vec::new();
        // Covers [0, 0.1): one event at 0.
        s.step(0.0, &mut out);
        s.set_tempo(10.0).unwrap();
        // Covers [0.1, 0.125): steps of 10 ms from the frontier.
        s.step(0.025, &mut out);
        let times: Vec<f64> = out.iter().map(|e| e.timestamp).collect();
        assert_eq!(times.len(), 4);
        assert_eq!(times[0], 0.0);
        assert!((times[1] - 0.1).abs() < 1e-9);
        assert!((times[3] - 0.12).abs() < 1e-9);
    }

    #[test]
    fn invalid_tempo_is_rejected() {
        let mut s = scheduler("bd", 100.0);
        assert_eq!(s.set_tempo(0.0), Err(SchedulerError::InvalidTempo(0.0)));
        assert_eq!(s.set_tempo(1e-4), Err(SchedulerError::InvalidTempo(1e-4)));
        assert!((s.tempo().step_seconds() - 0.128).abs() < 1e-12);
    }

    #[test]
    fn fastest_tempo_bounds_a_cycle() {
        let mut s = scheduler("bd", lb_ir::MIN_STEP_MILLIS);
        s.start(0.0, Some(0.0));
        let mut out = Vec::new();
        // One event per millisecond of the 100 ms lookahead.
        s.step(0.0, &mut out);
        assert!((99..=101).contains(&out.len()), "{}", out.len());
    }

    #[test]
    fn saturation_skips_stale_span() {
        let mut s = scheduler("bd", 10.0);
        s.start(0.0, Some(0.0));
        let mut out = Vec::new();
        s.step(0.0, &mut out);
        // About a second late: everything before the resumed slot is stale.
        s.step(1.0125, &mut out);
        assert_eq!(s.metrics().saturations(), 1);
        let late: Vec<f64> = out.iter().map(|e| e.timestamp).filter(|t| *t > 0.5).collect();
        assert!(!late.is_empty());
        assert!(late.iter().all(|t| *t >= 1.0 - 1e-9), "{late:?}");
    }

    #[test]
    fn full_sink_counts_drops() {
        struct Refuse;
        impl EventSink for Refuse {
            fn dispatch(&mut self, _event: Event) -> bool {
                false
            }
        }
        let mut s = scheduler("bd", 50.0);
        s.start(0.0, None);
        s.step(0.0, &mut Refuse);
        assert_eq!(s.metrics().dropped(), 2);
        assert_eq!(s.metrics().dispatched(), 0);
    }
}
