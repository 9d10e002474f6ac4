//! Scheduler counters, readable from any thread.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct SchedulerMetrics {
    steps: AtomicU64,
    dispatched: AtomicU64,
    dropped: AtomicU64,
    saturations: AtomicU64,
    skipped_periods: AtomicU64,
    // f64 bits
    last_drift: AtomicU64,
    mean_drift: AtomicU64,
    max_drift: AtomicU64,
}

/// Point-in-time copy of [`SchedulerMetrics`]. Drift values are seconds.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SchedulerSnapshot {
    pub steps: u64,
    pub dispatched: u64,
    pub dropped: u64,
    pub saturations: u64,
    pub skipped_periods: u64,
    pub last_drift: f64,
    pub mean_drift: f64,
    pub max_drift: f64,
}

impl SchedulerMetrics {
    pub(crate) fn record_step(&self, drift: f64, mean: f64, max: f64) {
        self.steps.fetch_add(1, Ordering::Relaxed);
        self.last_drift.store(drift.to_bits(), Ordering::Relaxed);
        self.mean_drift.store(mean.to_bits(), Ordering::Relaxed);
        self.max_drift.store(max.to_bits(), Ordering::Relaxed);
    }

    pub(crate) fn record_saturation(&self, skipped: u64) {
        self.saturations.fetch_add(1, Ordering::Relaxed);
        self.skipped_periods.fetch_add(skipped, Ordering::Relaxed);
    }

    pub(crate) fn record_dispatch(&self, delivered: bool) {
        if delivered {
            self.dispatched.fetch_add(1, Ordering::Relaxed);
        } else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn saturations(&self) -> u64 {
        self.saturations.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> SchedulerSnapshot {
        let f = |a: &AtomicU64| f64::from_bits(a.load(Ordering::Relaxed));
        SchedulerSnapshot {
            steps: self.steps.load(Ordering::Relaxed),
            dispatched: self.dispatched(),
            dropped: self.dropped(),
            saturations: self.saturations(),
            skipped_periods: self.skipped_periods.load(Ordering::Relaxed),
            last_drift: f(&self.last_drift),
            mean_drift: f(&self.mean_drift),
            max_drift: f(&self.max_drift),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reads_back() {
        let m = SchedulerMetrics::default();
        m.record_step(0.002, 0.001, 0.003);
        m.record_dispatch(true);
        m.record_dispatch(false);
        m.record_saturation(4);
        let s = m.snapshot();
        assert_eq!((s.steps, s.dispatched, s.dropped), (1, 1, 1));
        assert_eq!((s.saturations, s.skipped_periods), (1, 4));
        assert_eq!(s.last_drift, 0.002);
        assert_eq!(s.max_drift, 0.003);
    }
}
