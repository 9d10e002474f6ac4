//! Sample memory: one contiguous padded arena addressed by handles.
//!
//! Every sample is stored as `[guard] frames.. [guard guard]` so that a
//! 4-point interpolation window centred anywhere in `0..frames` stays inside
//! the sample's own region. Records store offsets, never pointers, so growing
//! the arena cannot invalidate them.

use std::collections::HashMap;

use lb_ir::SampleId;
use slotmap::{new_key_type, SlotMap};

use crate::error::RenderError;

/// Guard frames before the first sample frame.
pub const GUARD_BEFORE: usize = 1;
/// Guard frames after the last sample frame.
pub const GUARD_AFTER: usize = 2;

new_key_type! {
    /// Handle to a loaded sample.
    pub struct SampleHandle;
}

/// Location of one sample inside the arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SampleRecord {
    /// Arena index of the first guard frame.
    offset: usize,
    frames: usize,
}

impl SampleRecord {
    pub fn frames(&self) -> usize {
        self.frames
    }

    fn padded_len(&self) -> usize {
        GUARD_BEFORE + self.frames + GUARD_AFTER
    }
}

/// Owns all sample data for the render context.
pub struct SampleStore {
    arena: Vec<f32>,
    records: SlotMap<SampleHandle, SampleRecord>,
    ids: HashMap<SampleId, SampleHandle>,
    limit_frames: usize,
}

impl SampleStore {
    pub fn new(limit_frames: usize) -> Self {
        Self {
            arena: Vec::new(),
            records: SlotMap::with_key(),
            ids: HashMap::new(),
            limit_frames,
        }
    }

    /// Reserve arena space up front, outside the render path.
    pub fn reserve(&mut self, frames: usize) -> Result<(), RenderError> {
        let frames = frames.min(self.limit_frames);
        let additional = frames.saturating_sub(self.arena.len());
        self.arena
            .try_reserve_exact(additional)
            .map_err(|_| RenderError::AllocationFailed { frames })
    }

    /// Copy `frames` into the arena and register `id`.
    ///
    /// Loading an id again points it at the new data; the old region stays
    /// allocated.
    pub fn load(&mut self, id: SampleId, frames: &[f32]) -> Result<SampleHandle, RenderError> {
        if frames.is_empty() {
            return Err(RenderError::EmptySample(id));
        }

        let padded = GUARD_BEFORE + frames.len() + GUARD_AFTER;
        let needed = self.arena.len() + padded;
        if needed > self.limit_frames {
            return Err(RenderError::AllocationFailed { frames: needed });
        }
        if needed > self.arena.capacity() {
            let target = needed.max(self.arena.capacity() * 2).min(self.limit_frames);
            self.arena
                .try_reserve_exact(target - self.arena.len())
                .map_err(|_| RenderError::AllocationFailed { frames: target })?;
        }

        let offset = self.arena.len();
        self.arena.extend(std::iter::repeat(0.0).take(GUARD_BEFORE));
        self.arena.extend_from_slice(frames);
        self.arena.extend(std::iter::repeat(0.0).take(GUARD_AFTER));

        let handle = self.records.insert(SampleRecord {
            offset,
            frames: frames.len(),
        });
        self.ids.insert(id, handle);
        Ok(handle)
    }

    pub fn handle(&self, id: &SampleId) -> Option<SampleHandle> {
        self.ids.get(id).copied()
    }

    pub fn record(&self, handle: SampleHandle) -> Option<SampleRecord> {
        self.records.get(handle).copied()
    }

    /// Resolve an id straight to its record.
    pub fn resolve(&self, id: &SampleId) -> Option<SampleRecord> {
        self.handle(id).and_then(|h| self.record(h))
    }

    /// Interpolation-safe view of one sample.
    pub fn view(&self, record: SampleRecord) -> SampleView<'_> {
        SampleView {
            padded: &self.arena[record.offset..record.offset + record.padded_len()],
            frames: record.frames,
        }
    }

    /// Number of loaded samples.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Arena frames in use, guard frames included.
    pub fn used_frames(&self) -> usize {
        self.arena.len()
    }

    pub fn capacity_frames(&self) -> usize {
        self.arena.capacity()
    }
}

/// Read access to one padded sample region.
#[derive(Clone, Copy, Debug)]
pub struct SampleView<'a> {
    padded: &'a [f32],
    frames: usize,
}

impl SampleView<'_> {
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Raw frame `index`, or silence outside `0..frames`.
    pub fn frame(&self, index: usize) -> f32 {
        if index < self.frames {
            self.padded[GUARD_BEFORE + index]
        } else {
            0.0
        }
    }

    /// Cubic Hermite read at fractional `position`, clamped into the sample.
    /// Integer positions return the stored frame exactly.
    pub fn interpolate(&self, position: f64) -> f32 {
        let max = (self.frames - 1) as f64;
        let position = position.clamp(0.0, max);
        let index = position as usize;
        let frac = (position - index as f64) as f32;
        // padded[index] is frame index-1, so the window is index-1..=index+2.
        let w = &self.padded[index..index + 4];
        hermite(w[0], w[1], w[2], w[3], frac)
    }

    /// Like [`interpolate`](Self::interpolate) but wraps around the sample
    /// ends, for single-cycle playback.
    pub fn interpolate_wrapped(&self, position: f64) -> f32 {
        let n = self.frames;
        let position = position.rem_euclid(n as f64);
        let index = (position as usize).min(n - 1);
        let frac = (position - index as f64) as f32;
        let at = |i: usize| self.padded[GUARD_BEFORE + i % n];
        hermite(at(index + n - 1), at(index), at(index + 1), at(index + 2), frac)
    }
}

fn hermite(y0: f32, y1: f32, y2: f32, y3: f32, t: f32) -> f32 {
    let c1 = 0.5 * (y2 - y0);
    let c2 = y0 - 2.5 * y1 + 2.0 * y2 - 0.5 * y3;
    let c3 = 0.5 * (y3 - y0) + 1.5 * (y1 - y2);
    ((c3 * t + c2) * t + c1) * t + y1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> SampleId {
        SampleId::new(s).unwrap()
    }

    #[test]
    fn load_and_resolve() {
        let mut store = SampleStore::new(1024);
        let h = store.load(id("bd"), &[0.1, 0.2, 0.3]).unwrap();
        assert_eq!(store.handle(&id("bd")), Some(h));
        assert_eq!(store.record(h).unwrap().frames(), 3);
        assert_eq!(store.used_frames(), 3 + GUARD_BEFORE + GUARD_AFTER);
        assert!(store.resolve(&id("sn")).is_none());
    }

    #[test]
    fn empty_sample_rejected() {
        let mut store = SampleStore::new(1024);
        assert_eq!(
            store.load(id("bd"), &[]),
            Err(RenderError::EmptySample(id("bd")))
        );
    }

    #[test]
    fn limit_exceeded_is_allocation_failure() {
        let mut store = SampleStore::new(8);
        assert!(store.load(id("a"), &[0.0; 4]).is_ok());
        assert!(matches!(
            store.load(id("b"), &[0.0; 4]),
            Err(RenderError::AllocationFailed { .. })
        ));
        // Earlier samples survive the failed load.
        assert!(store.resolve(&id("a")).is_some());
    }

    #[test]
    fn growth_is_geometric() {
        let mut store = SampleStore::new(1 << 20);
        store.load(id("a"), &[0.0; 100]).unwrap();
        let first = store.capacity_frames();
        store.load(id("b"), &[0.0; 10]).unwrap();
        assert!(store.capacity_frames() >= first * 2 || store.capacity_frames() == first);
        assert!(store.capacity_frames() >= store.used_frames());
    }

    #[test]
    fn records_survive_reallocation() {
        let mut store = SampleStore::new(1 << 20);
        let a = store.load(id("a"), &[1.0, 2.0, 3.0]).unwrap();
        for i in 0..20 {
            store.load(id(&format!("s{i}")), &[0.5; 1000]).unwrap();
        }
        let view = store.view(store.record(a).unwrap());
        assert_eq!(view.frame(0), 1.0);
        assert_eq!(view.frame(2), 3.0);
    }

    #[test]
    fn reload_repoints_id() {
        let mut store = SampleStore::new(1024);
        let old = store.load(id("bd"), &[1.0]).unwrap();
        let new = store.load(id("bd"), &[2.0, 2.0]).unwrap();
        assert_ne!(old, new);
        assert_eq!(store.handle(&id("bd")), Some(new));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn interpolation_at_boundaries_stays_in_region() {
        let mut store = SampleStore::new(1024);
        let data = [0.25, -0.5, 0.75, 1.0];
        let h = store.load(id("x"), &data).unwrap();
        let view = store.view(store.record(h).unwrap());

        assert_eq!(view.interpolate(0.0), 0.25);
        assert_eq!(view.interpolate(3.0), 1.0);
        // Fractional reads beside either edge use the guard frames.
        assert!(view.interpolate(0.5).is_finite());
        assert!(view.interpolate(2.999).is_finite());
        assert_eq!(view.interpolate(-4.0), 0.25);
        assert_eq!(view.interpolate(100.0), 1.0);
    }

    #[test]
    fn single_frame_sample() {
        let mut store = SampleStore::new(1024);
        let h = store.load(id("one"), &[0.5]).unwrap();
        let view = store.view(store.record(h).unwrap());
        assert_eq!(view.interpolate(0.0), 0.5);
        assert_eq!(view.interpolate_wrapped(7.0), 0.5);
    }

    #[test]
    fn wrapped_read_cycles() {
        let mut store = SampleStore::new(1024);
        let h = store.load(id("cyc"), &[0.0, 1.0, 0.0, -1.0]).unwrap();
        let view = store.view(store.record(h).unwrap());
        assert_eq!(view.interpolate_wrapped(5.0), 1.0);
        assert_eq!(view.interpolate_wrapped(-1.0), -1.0);
    }
}
