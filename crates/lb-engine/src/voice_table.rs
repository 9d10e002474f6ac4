//! VoiceTable: fixed slot storage for live voices keyed by instance id.

use lb_ir::AudioBuffer;

use crate::sample_store::SampleStore;
use crate::voice::Voice;

/// Identifier handed out for every materialized trigger. Never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub u64);

/// Where and when the block being rendered sits on the audio clock.
#[derive(Clone, Copy, Debug)]
pub struct BlockContext {
    /// Block start in seconds.
    pub start: f64,
    pub sample_rate: f64,
    pub frames: usize,
}

/// Output buses a voice mixes into.
pub struct Buses<'a> {
    pub dry: &'a mut AudioBuffer,
    pub reverb: &'a mut AudioBuffer,
    pub delay: &'a mut AudioBuffer,
}

/// Counts produced while rendering one block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BlockStats {
    pub late_starts: u64,
    pub finished: usize,
}

/// Slot storage for voices. Slots are allocated once; inserting into a full
/// table steals the oldest voice.
pub struct VoiceTable {
    slots: Vec<Option<Voice>>,
    next_id: u64,
    scratch: Vec<f32>,
}

impl VoiceTable {
    /// An empty table with no slots. Call [`allocate`](Self::allocate)
    /// before use.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            next_id: 0,
            scratch: Vec::new(),
        }
    }

    /// Preallocate `max_voices` slots and a mono scratch block.
    pub fn allocate(&mut self, max_voices: usize, block_size: usize) {
        self.slots = (0..max_voices).map(|_| None).collect();
        self.scratch = vec![0.0; block_size];
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Reserve the next instance id.
    pub fn next_id(&mut self) -> InstanceId {
        let id = InstanceId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Insert a voice. Returns the id of a stolen voice if the table was full.
    /// A table without slots drops the voice and reports it as stolen.
    pub fn insert(&mut self, voice: Voice) -> Option<InstanceId> {
        if let Some(slot) = self.slots.iter_mut().find(|s| s.is_none()) {
            *slot = Some(voice);
            return None;
        }
        let Some(victim) = self.oldest_slot() else {
            return Some(voice.id);
        };
        self.slots[victim].replace(voice).map(|old| old.id)
    }

    fn oldest_slot(&self) -> Option<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|v| (i, v.id)))
            .min_by_key(|(_, id)| *id)
            .map(|(i, _)| i)
    }

    pub fn get(&self, id: InstanceId) -> Option<&Voice> {
        self.slots.iter().flatten().find(|v| v.id == id)
    }

    /// Mix every voice whose start falls at or before the end of this block.
    ///
    /// A voice starts at `round((start - block.start) * sample_rate)` frames
    /// into the block; starts already in the past begin at frame 0.
    pub fn render(
        &mut self,
        store: &SampleStore,
        block: BlockContext,
        buses: Buses<'_>,
    ) -> BlockStats {
        let mut stats = BlockStats::default();
        let (dry_l, dry_r) = buses.dry.stereo_mut();
        let (rev_l, rev_r) = buses.reverb.stereo_mut();
        let (del_l, del_r) = buses.delay.stereo_mut();
        let frames = block.frames.min(self.scratch.len());

        for voice in self.slots.iter_mut().flatten() {
            if voice.finished {
                continue;
            }
            let offset = if voice.started {
                0
            } else {
                let offset = ((voice.start - block.start) * block.sample_rate).round();
                if offset >= frames as f64 {
                    continue;
                }
                voice.started = true;
                if offset < 0.0 {
                    stats.late_starts += 1;
                    0
                } else {
                    offset as usize
                }
            };

            let scratch = &mut self.scratch[offset..frames];
            let produced = voice.source.render(store, scratch);
            if produced < scratch.len() {
                voice.finished = true;
                stats.finished += 1;
            }

            let mix = voice.mix;
            let end = offset + produced;
            for (i, s) in self.scratch[offset..end].iter().enumerate() {
                let f = offset + i;
                let l = s * mix.left;
                let r = s * mix.right;
                dry_l[f] += l;
                dry_r[f] += r;
                if mix.reverb_send > 0.0 {
                    rev_l[f] += l * mix.reverb_send;
                    rev_r[f] += r * mix.reverb_send;
                }
                if mix.delay_send > 0.0 {
                    del_l[f] += l * mix.delay_send;
                    del_r[f] += r * mix.delay_send;
                }
            }
        }
        stats
    }

    /// Drop voices whose synthesis has completed.
    pub fn reap_finished(&mut self) {
        for slot in &mut self.slots {
            if slot.as_ref().is_some_and(|v| v.finished) {
                *slot = None;
            }
        }
    }

    /// Count of occupied slots.
    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

impl Default for VoiceTable {
    fn default() -> Self {
        Self::new()
    }
}
