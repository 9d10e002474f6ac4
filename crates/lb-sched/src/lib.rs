//! Lookahead event scheduler for loopbox.
//!
//! Runs apart from the audio callback: on every cycle it generates the
//! pattern events due within the lookahead window, stamps them on the audio
//! clock and hands them to an [`EventSink`]. Cycle timing is corrected
//! against an absolute wall-clock grid so timer jitter does not accumulate.

mod clock;
mod config;
mod drift;
mod error;
mod learn;
mod loop_spec;
mod metrics;
mod pattern;
mod runtime;
mod scheduler;
mod sink;
mod syntax;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::SchedulerConfig;
pub use drift::{DriftCompensator, Tick, DRIFT_HISTORY};
pub use error::{EvalError, SchedulerError};
pub use loop_spec::{EmptyLoop, EventLoop, Evaluator, LoopSpec, PatternEvent};
pub use metrics::{SchedulerMetrics, SchedulerSnapshot};
pub use pattern::{param_label, StepEvaluator, StepPattern, MAX_STEPS};
pub use runtime::{SchedulerReport, SchedulerRuntime};
pub use scheduler::{LookaheadScheduler, SchedulerState};
pub use sink::EventSink;
