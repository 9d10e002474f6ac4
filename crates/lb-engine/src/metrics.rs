//! Render-side counters, shared with the host through an `Arc`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Lock-free counters updated from the render context.
#[derive(Debug, Default)]
pub struct RenderMetrics {
    blocks: AtomicU64,
    frames: AtomicU64,
    deadline_misses: AtomicU64,
    dropped_events: AtomicU64,
    voice_steals: AtomicU64,
    late_triggers: AtomicU64,
    active_voices: AtomicU64,
    last_render_nanos: AtomicU64,
}

/// Point-in-time copy of [`RenderMetrics`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub blocks: u64,
    pub frames: u64,
    pub deadline_misses: u64,
    pub dropped_events: u64,
    pub voice_steals: u64,
    pub late_triggers: u64,
    pub active_voices: u64,
    pub last_render_nanos: u64,
}

impl RenderMetrics {
    pub(crate) fn record_block(&self, frames: usize, elapsed: Duration, deadline: Duration) {
        self.blocks.fetch_add(1, Ordering::Relaxed);
        self.frames.fetch_add(frames as u64, Ordering::Relaxed);
        self.last_render_nanos
            .store(elapsed.as_nanos() as u64, Ordering::Relaxed);
        if elapsed > deadline {
            self.deadline_misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped_events.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_steal(&self) {
        self.voice_steals.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_late(&self, count: u64) {
        if count > 0 {
            self.late_triggers.fetch_add(count, Ordering::Relaxed);
        }
    }

    pub(crate) fn set_active_voices(&self, count: usize) {
        self.active_voices.store(count as u64, Ordering::Relaxed);
    }

    /// Frames rendered since the bridge was created.
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    /// Audio clock in seconds: rendered frames over the sample rate.
    pub fn stream_time(&self, sample_rate: u32) -> f64 {
        self.frames() as f64 / sample_rate as f64
    }

    pub fn deadline_misses(&self) -> u64 {
        self.deadline_misses.load(Ordering::Relaxed)
    }

    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            blocks: self.blocks.load(Ordering::Relaxed),
            frames: self.frames.load(Ordering::Relaxed),
            deadline_misses: self.deadline_misses.load(Ordering::Relaxed),
            dropped_events: self.dropped_events.load(Ordering::Relaxed),
            voice_steals: self.voice_steals.load(Ordering::Relaxed),
            late_triggers: self.late_triggers.load(Ordering::Relaxed),
            active_voices: self.active_voices.load(Ordering::Relaxed),
            last_render_nanos: self.last_render_nanos.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadline_miss_counted() {
        let m = RenderMetrics::default();
        m.record_block(128, Duration::from_micros(100), Duration::from_millis(2));
        m.record_block(128, Duration::from_millis(5), Duration::from_millis(2));
        let s = m.snapshot();
        assert_eq!(s.blocks, 2);
        assert_eq!(s.frames, 256);
        assert_eq!(s.deadline_misses, 1);
    }

    #[test]
    fn stream_time_from_frames() {
        let m = RenderMetrics::default();
        m.record_block(22050, Duration::ZERO, Duration::from_secs(1));
        assert!((m.stream_time(44100) - 0.5).abs() < 1e-12);
    }
}
