//! The scheduler's view of an evaluated pattern.

use lb_ir::Event;

use crate::error::EvalError;

/// An event placed at a pattern position, in steps from the pattern origin.
///
/// The event's own timestamp is ignored; the scheduler stamps it when the
/// position is mapped onto the audio clock.
#[derive(Clone, Debug, PartialEq)]
pub struct PatternEvent {
    pub position: f64,
    pub event: Event,
}

/// Source of pattern events. Queries must be pure: asking for the same
/// window twice yields the same events.
pub trait LoopSpec: Send {
    /// Append every event with `from <= position < to` to `out`.
    fn query(&self, from: f64, to: f64, out: &mut Vec<PatternEvent>);

    fn is_empty(&self) -> bool;
}

/// Turns loop text into a [`LoopSpec`].
pub trait Evaluator: Send {
    fn evaluate(&self, text: &str) -> Result<Box<dyn LoopSpec>, EvalError>;
}

/// A spec that never produces events.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmptyLoop;

impl LoopSpec for EmptyLoop {
    fn query(&self, _from: f64, _to: f64, _out: &mut Vec<PatternEvent>) {}

    fn is_empty(&self) -> bool {
        true
    }
}

/// Events repeating with a fixed period, for hosts that build patterns in
/// code rather than text.
#[derive(Clone, Debug, Default)]
pub struct EventLoop {
    /// Loop length in steps.
    length: f64,
    events: Vec<PatternEvent>,
}

impl EventLoop {
    /// `None` if `length` is not finite and positive.
    pub fn new(length: f64) -> Option<Self> {
        (length.is_finite() && length > 0.0).then(|| Self {
            length,
            events: Vec::new(),
        })
    }

    /// Add an event at `offset` steps into the loop (wrapped into the loop).
    pub fn with_event(mut self, offset: f64, event: Event) -> Self {
        let position = offset.rem_euclid(self.length);
        let at = self.events.partition_point(|e| e.position <= position);
        self.events.insert(at, PatternEvent { position, event });
        self
    }
}

impl LoopSpec for EventLoop {
    fn query(&self, from: f64, to: f64, out: &mut Vec<PatternEvent>) {
        if self.events.is_empty() || !(to > from) {
            return;
        }
        let mut cycle = (from / self.length).floor();
        loop {
            let base = cycle * self.length;
            if base >= to {
                break;
            }
            for e in &self.events {
                let position = base + e.position;
                if position >= to {
                    break;
                }
                if position >= from {
                    out.push(PatternEvent {
                        position,
                        event: e.event.clone(),
                    });
                }
            }
            cycle += 1.0;
        }
    }

    fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lb_ir::SourceType;

    fn positions(spec: &dyn LoopSpec, from: f64, to: f64) -> Vec<f64> {
        let mut out = Vec::new();
        spec.query(from, to, &mut out);
        out.iter().map(|e| e.position).collect()
    }

    #[test]
    fn empty_loop_yields_nothing() {
        assert!(positions(&EmptyLoop, 0.0, 100.0).is_empty());
    }

    #[test]
    fn event_loop_repeats() {
        let spec = EventLoop::new(2.0)
            .unwrap()
            .with_event(1.0, Event::new(SourceType::Sampler, 0.0))
            .with_event(0.0, Event::new(SourceType::SineOsc, 0.0));
        assert_eq!(positions(&spec, 0.0, 5.0), vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(positions(&spec, 1.5, 3.0), vec![2.0]);
        assert!(positions(&spec, 3.0, 3.0).is_empty());
    }
}
