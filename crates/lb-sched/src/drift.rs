//! Timer drift compensation.
//!
//! Steps are due on an absolute wall-clock grid `anchor + k * period`. Each
//! step measures how late it ran against its grid slot and shortens the next
//! wait by that amount, so lateness never accumulates. Waits are clamped to
//! `[min_delay, period + max_correction]`. A step later than the saturation
//! threshold gives up on the slots it missed and rejoins the grid.

use heapless::HistoryBuffer;

use crate::config::SchedulerConfig;

/// Drift samples kept for [`DriftCompensator::mean_drift`].
pub const DRIFT_HISTORY: usize = 64;

/// Where a step landed relative to the grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tick {
    /// Grid slot this step stands for, after any skip.
    pub slot: u64,
    /// Lateness against that slot, seconds. Negative when early.
    pub drift: f64,
    /// Slots given up because of saturation.
    pub skipped: u64,
}

#[derive(Debug)]
pub struct DriftCompensator {
    period: f64,
    min_delay: f64,
    max_delay: f64,
    saturation: f64,
    anchor: f64,
    slot: u64,
    history: HistoryBuffer<f64, DRIFT_HISTORY>,
    max_drift: f64,
}

impl DriftCompensator {
    pub fn new(config: &SchedulerConfig) -> Self {
        let period = config.period();
        Self {
            period,
            min_delay: config.min_delay(),
            max_delay: period + config.max_correction(),
            saturation: config.saturation(),
            anchor: 0.0,
            slot: 0,
            history: HistoryBuffer::new(),
            max_drift: 0.0,
        }
    }

    /// Restart the grid at `wall` with slot 0 due immediately.
    pub fn reset(&mut self, wall: f64) {
        self.anchor = wall;
        self.slot = 0;
        self.history = HistoryBuffer::new();
        self.max_drift = 0.0;
    }

    pub fn period(&self) -> f64 {
        self.period
    }

    /// Wall time the current slot is due.
    pub fn due(&self) -> f64 {
        self.anchor + self.slot as f64 * self.period
    }

    /// Place a step that ran at `now` on the grid.
    pub fn tick(&mut self, now: f64) -> Tick {
        let mut drift = now - self.due();
        let mut skipped = 0;
        if drift > self.saturation {
            skipped = (drift / self.period).floor() as u64;
            self.slot += skipped;
            drift = now - self.due();
        }
        self.history.write(drift);
        self.max_drift = self.max_drift.max(drift);
        Tick {
            slot: self.slot,
            drift,
            skipped,
        }
    }

    /// Wait until the next step and move to the next slot.
    pub fn next_delay(&mut self, tick: Tick) -> f64 {
        self.slot = tick.slot + 1;
        (self.period - tick.drift).clamp(self.min_delay, self.max_delay)
    }

    /// Mean drift over the last [`DRIFT_HISTORY`] steps.
    pub fn mean_drift(&self) -> f64 {
        if self.history.is_empty() {
            return 0.0;
        }
        self.history.iter().sum::<f64>() / self.history.len() as f64
    }

    /// Largest drift since the last reset.
    pub fn max_drift(&self) -> f64 {
        self.max_drift
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compensator() -> DriftCompensator {
        let mut d = DriftCompensator::new(&SchedulerConfig::default());
        d.reset(10.0);
        d
    }

    #[test]
    fn on_time_step_waits_one_period() {
        let mut d = compensator();
        let t = d.tick(10.0);
        assert_eq!(t.drift, 0.0);
        assert!((d.next_delay(t) - 0.025).abs() < 1e-12);
        assert!((d.due() - 10.025).abs() < 1e-12);
    }

    #[test]
    fn late_step_shortens_next_wait() {
        let mut d = compensator();
        let t = d.tick(10.010);
        assert!((d.next_delay(t) - 0.015).abs() < 1e-9);
    }

    #[test]
    fn delay_never_below_minimum() {
        let mut d = compensator();
        let t = d.tick(10.060);
        assert_eq!(t.skipped, 0);
        assert!((d.next_delay(t) - 0.001).abs() < 1e-12);
    }

    #[test]
    fn early_step_waits_at_most_period_plus_correction() {
        let mut d = compensator();
        let t = d.tick(9.9);
        assert!((d.next_delay(t) - 0.050).abs() < 1e-12);
    }

    #[test]
    fn saturation_skips_missed_slots() {
        let mut d = compensator();
        // 8.5 periods of 25 ms late.
        let t = d.tick(10.2125);
        assert_eq!(t.skipped, 8);
        assert_eq!(t.slot, 8);
        assert!((t.drift - 0.0125).abs() < 1e-9);
        assert!((d.max_drift() - 0.0125).abs() < 1e-9);
    }

    #[test]
    fn history_mean_is_windowed() {
        let mut d = compensator();
        for _ in 0..DRIFT_HISTORY * 2 {
            let due = d.due();
            let t = d.tick(due + 0.002);
            d.next_delay(t);
        }
        assert!((d.mean_drift() - 0.002).abs() < 1e-9);
    }
}
