//! Schroeder/Moorer reverb with the classic Freeverb tunings.

const COMB_TUNING: [usize; 8] = [1116, 1188, 1277, 1356, 1422, 1491, 1557, 1617];
const ALLPASS_TUNING: [usize; 4] = [556, 441, 341, 225];
const STEREO_SPREAD: usize = 23;
const TUNING_RATE: f32 = 44100.0;

const FIXED_GAIN: f32 = 0.015;
const SCALE_ROOM: f32 = 0.28;
const OFFSET_ROOM: f32 = 0.7;
const SCALE_DAMP: f32 = 0.4;
const ALLPASS_FEEDBACK: f32 = 0.5;

#[derive(Clone, Debug)]
struct Comb {
    buffer: Vec<f32>,
    index: usize,
    store: f32,
}

impl Comb {
    fn new(len: usize) -> Self {
        Self {
            buffer: vec![0.0; len.max(1)],
            index: 0,
            store: 0.0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32, feedback: f32, damp: f32) -> f32 {
        let output = self.buffer[self.index];
        self.store = output * (1.0 - damp) + self.store * damp;
        self.buffer[self.index] = input + self.store * feedback;
        self.index += 1;
        if self.index == self.buffer.len() {
            self.index = 0;
        }
        output
    }
}

#[derive(Clone, Debug)]
struct AllPass {
    buffer: Vec<f32>,
    index: usize,
}

impl AllPass {
    fn new(len: usize) -> Self {
        Self {
            buffer: vec![0.0; len.max(1)],
            index: 0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let delayed = self.buffer[self.index];
        self.buffer[self.index] = input + delayed * ALLPASS_FEEDBACK;
        self.index += 1;
        if self.index == self.buffer.len() {
            self.index = 0;
        }
        delayed - input
    }
}

#[derive(Clone, Debug)]
struct Channel {
    combs: [Comb; 8],
    allpasses: [AllPass; 4],
}

impl Channel {
    fn new(scale: f32, spread: usize) -> Self {
        let len = |tuning: usize| ((tuning + spread) as f32 * scale) as usize;
        Self {
            combs: COMB_TUNING.map(|t| Comb::new(len(t))),
            allpasses: ALLPASS_TUNING.map(|t| AllPass::new(len(t))),
        }
    }

    fn process(&mut self, input: f32, feedback: f32, damp: f32) -> f32 {
        let mut sum = 0.0;
        for comb in &mut self.combs {
            sum += comb.process(input, feedback, damp);
        }
        for allpass in &mut self.allpasses {
            sum = allpass.process(sum);
        }
        sum
    }
}

#[derive(Clone, Debug)]
pub struct Reverb {
    channels: [Channel; 2],
    feedback: f32,
    damp: f32,
}

impl Reverb {
    pub const DEFAULT_ROOMSIZE: f32 = 0.5;
    pub const DEFAULT_DAMPENING: f32 = 0.5;

    pub fn new(sample_rate: f32) -> Self {
        let scale = sample_rate / TUNING_RATE;
        let mut reverb = Self {
            channels: [Channel::new(scale, 0), Channel::new(scale, STEREO_SPREAD)],
            feedback: 0.0,
            damp: 0.0,
        };
        reverb.set_roomsize(Self::DEFAULT_ROOMSIZE);
        reverb.set_dampening(Self::DEFAULT_DAMPENING);
        reverb
    }

    /// Room size in `0..=1`.
    pub fn set_roomsize(&mut self, size: f32) {
        self.feedback = size.clamp(0.0, 1.0) * SCALE_ROOM + OFFSET_ROOM;
    }

    /// High-frequency dampening in `0..=1`.
    pub fn set_dampening(&mut self, damp: f32) {
        self.damp = damp.clamp(0.0, 1.0) * SCALE_DAMP;
    }

    /// Process one block of stereo send; `output` receives the wet signal.
    pub fn process(&mut self, input: [&[f32]; 2], output: [&mut [f32]; 2]) {
        let [in_l, in_r] = input;
        let [out_l, out_r] = output;
        let [left, right] = &mut self.channels;
        for i in 0..in_l.len() {
            let mono = (in_l[i] + in_r[i]) * FIXED_GAIN;
            out_l[i] = left.process(mono, self.feedback, self.damp);
            out_r[i] = right.process(mono, self.feedback, self.damp);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_input_stays_silent() {
        let mut reverb = Reverb::new(44100.0);
        let zeros = [0.0; 256];
        let mut l = [1.0; 256];
        let mut r = [1.0; 256];
        reverb.process([&zeros, &zeros], [&mut l, &mut r]);
        assert!(l.iter().chain(r.iter()).all(|s| *s == 0.0));
    }

    #[test]
    fn impulse_produces_decaying_tail() {
        let mut reverb = Reverb::new(44100.0);
        let mut impulse = [0.0; 128];
        impulse[0] = 1.0;
        let zeros = [0.0; 128];
        let mut l = [0.0; 128];
        let mut r = [0.0; 128];
        reverb.process([&impulse, &zeros], [&mut l, &mut r]);

        let mut energy = 0.0;
        for _ in 0..400 {
            reverb.process([&zeros, &zeros], [&mut l, &mut r]);
            energy += l.iter().map(|s| s * s).sum::<f32>();
        }
        assert!(energy > 0.0);
        assert!(l.iter().all(|s| s.is_finite() && s.abs() < 1.0));
    }
}
