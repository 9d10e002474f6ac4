//! Scheduler thread.
//!
//! The scheduler owns its loop, tempo and timing state on a dedicated
//! thread. Commands arrive over a channel and interrupt the wait between
//! generation cycles; outcomes go back over a second channel.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use lb_ir::Command;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::SchedulerConfig;
use crate::error::{EvalError, SchedulerError};
use crate::metrics::SchedulerMetrics;
use crate::scheduler::LookaheadScheduler;
use crate::sink::EventSink;

/// Outcome of a command, reported back to the command source.
#[derive(Clone, Debug, PartialEq)]
pub enum SchedulerReport {
    Started { origin: f64 },
    Stopped,
    Evaluated,
    /// The previous loop keeps playing.
    EvaluateFailed(EvalError),
    TempoRejected(SchedulerError),
}

/// Handle to a scheduler running on its own thread.
///
/// Dropping the handle stops the thread.
pub struct SchedulerRuntime {
    commands: Option<Sender<Command>>,
    reports: Receiver<SchedulerReport>,
    metrics: Arc<SchedulerMetrics>,
    thread: Option<JoinHandle<()>>,
}

impl SchedulerRuntime {
    /// Validate the shared vocabulary and start the scheduler thread.
    pub fn spawn<S, C>(config: SchedulerConfig, sink: S, clock: C) -> Result<Self, SchedulerError>
    where
        S: EventSink + Send + 'static,
        C: Clock + 'static,
    {
        lb_ir::validate_contract(lb_ir::CONTRACT_VERSION)?;
        let scheduler = LookaheadScheduler::new(config)?;
        let metrics = scheduler.metrics();
        let (command_tx, command_rx) = crossbeam_channel::unbounded();
        let (report_tx, report_rx) = crossbeam_channel::unbounded();

        let worker = Worker {
            scheduler,
            sink,
            clock,
            commands: command_rx,
            reports: report_tx,
        };
        let thread = std::thread::Builder::new()
            .name("lb-sched".into())
            .spawn(move || worker.run())
            .map_err(|e| SchedulerError::Spawn(e.to_string()))?;

        Ok(Self {
            commands: Some(command_tx),
            reports: report_rx,
            metrics,
            thread: Some(thread),
        })
    }

    /// Queue a command. Returns `false` if the thread has exited.
    pub fn send(&self, command: Command) -> bool {
        self.commands
            .as_ref()
            .is_some_and(|tx| tx.send(command).is_ok())
    }

    /// A sender for other command sources.
    pub fn commands(&self) -> Option<Sender<Command>> {
        self.commands.clone()
    }

    pub fn reports(&self) -> &Receiver<SchedulerReport> {
        &self.reports
    }

    pub fn metrics(&self) -> Arc<SchedulerMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Stop the thread and wait for it. Outstanding command senders handed
    /// out by [`commands`](Self::commands) must be dropped first.
    pub fn shutdown(mut self) {
        self.close();
    }

    fn close(&mut self) {
        self.commands = None;
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("scheduler thread panicked");
            }
        }
    }
}

impl Drop for SchedulerRuntime {
    fn drop(&mut self) {
        self.close();
    }
}

struct Worker<S, C> {
    scheduler: LookaheadScheduler,
    sink: S,
    clock: C,
    commands: Receiver<Command>,
    reports: Sender<SchedulerReport>,
}

impl<S: EventSink, C: Clock> Worker<S, C> {
    fn run(mut self) {
        debug!("scheduler thread up");
        // Wall time of the next generation cycle while running.
        let mut next: Option<f64> = None;
        loop {
            let received = match next {
                Some(at) => {
                    let wait = at - self.clock.now();
                    if wait > 0.0 {
                        self.commands.recv_timeout(Duration::from_secs_f64(wait))
                    } else {
                        Err(RecvTimeoutError::Timeout)
                    }
                }
                None => self
                    .commands
                    .recv()
                    .map_err(|_| RecvTimeoutError::Disconnected),
            };

            match received {
                Ok(command) => {
                    if self.handle(command) {
                        next = Some(self.clock.now());
                    } else if !self.scheduler.is_running() {
                        next = None;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    let now = self.clock.now();
                    next = self
                        .scheduler
                        .step(now, &mut self.sink)
                        .map(|delay| now + delay);
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        debug!("scheduler thread exiting");
    }

    /// Apply a command. Returns `true` when a cycle should run right away.
    fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Start {
                origin_timestamp,
                wall_reference,
            } => {
                self.scheduler.start(origin_timestamp, wall_reference);
                info!(origin = origin_timestamp, "scheduler started");
                self.report(SchedulerReport::Started {
                    origin: origin_timestamp,
                });
                true
            }
            Command::Stop => {
                self.scheduler.stop();
                info!("scheduler stopped");
                self.report(SchedulerReport::Stopped);
                false
            }
            Command::Evaluate { loop_spec } => {
                match self.scheduler.evaluate(&loop_spec) {
                    Ok(()) => {
                        debug!(bytes = loop_spec.len(), "loop evaluated");
                        self.report(SchedulerReport::Evaluated);
                    }
                    Err(e) => {
                        warn!(error = %e, "evaluate failed, keeping previous loop");
                        self.report(SchedulerReport::EvaluateFailed(e));
                    }
                }
                false
            }
            Command::SetTempo { tempo } => {
                if let Err(e) = self.scheduler.set_tempo(tempo) {
                    warn!(error = %e, "tempo rejected");
                    self.report(SchedulerReport::TempoRejected(e));
                } else {
                    debug!(step_millis = tempo, "tempo staged");
                }
                false
            }
        }
    }

    fn report(&self, report: SchedulerReport) {
        // Nobody listening is fine.
        let _ = self.reports.send(report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MonotonicClock;
    use lb_ir::Event;

    fn recv_report(rt: &SchedulerRuntime) -> SchedulerReport {
        rt.reports()
            .recv_timeout(Duration::from_secs(2))
            .expect("report")
    }

    #[test]
    fn commands_are_reported() {
        let (tx, _rx) = crossbeam_channel::unbounded::<Event>();
        let rt = SchedulerRuntime::spawn(SchedulerConfig::default(), tx, MonotonicClock::new())
            .unwrap();

        assert!(rt.send(Command::Evaluate {
            loop_spec: "wobble >> bd".into()
        }));
        assert!(matches!(recv_report(&rt), SchedulerReport::EvaluateFailed(_)));

        rt.send(Command::Evaluate {
            loop_spec: "bd".into(),
        });
        assert_eq!(recv_report(&rt), SchedulerReport::Evaluated);

        rt.send(Command::SetTempo { tempo: -1.0 });
        assert_eq!(
            recv_report(&rt),
            SchedulerReport::TempoRejected(SchedulerError::InvalidTempo(-1.0))
        );
        rt.shutdown();
    }

    #[test]
    fn running_thread_dispatches_in_order() {
        let (tx, rx) = crossbeam_channel::unbounded::<Event>();
        let rt = SchedulerRuntime::spawn(SchedulerConfig::default(), tx, MonotonicClock::new())
            .unwrap();
        rt.send(Command::Evaluate {
            loop_spec: "bd sn".into(),
        });
        rt.send(Command::SetTempo { tempo: 20.0 });
        rt.send(Command::Start {
            origin_timestamp: 5.0,
            wall_reference: None,
        });

        let mut events = Vec::new();
        while events.len() < 10 {
            let event = rx.recv_timeout(Duration::from_secs(2)).expect("event");
            events.push(event);
        }
        rt.send(Command::Stop);
        assert!((events[0].timestamp - 5.0).abs() < 1e-9);
        assert!(events.windows(2).all(|w| w[0].timestamp < w[1].timestamp));

        let reports: Vec<SchedulerReport> = std::iter::from_fn(|| {
            rt.reports().recv_timeout(Duration::from_secs(2)).ok()
        })
        .take(3)
        .collect();
        assert!(reports.contains(&SchedulerReport::Started { origin: 5.0 }));
        assert!(reports.contains(&SchedulerReport::Stopped));
        assert!(rt.metrics().dispatched() >= 10);
    }
}
