//! Attack-sustain-release amplitude envelope.

/// Longest segment, in frames. Longer requests are cut to this.
pub const MAX_SEGMENT_FRAMES: u64 = u32::MAX as u64;

/// Linear ASR envelope counted in frames.
///
/// Segments are at most [`MAX_SEGMENT_FRAMES`] each, so their sum never
/// overflows.
#[derive(Clone, Debug)]
pub struct Asr {
    attack: u64,
    sustain: u64,
    release: u64,
    position: u64,
}

impl Asr {
    /// Segment lengths in seconds; negative and NaN values count as zero.
    pub fn new(sample_rate: f32, attack: f32, sustain: f32, release: f32) -> Self {
        let frames = |secs: f32| {
            let frames = (f64::from(secs.max(0.0)) * f64::from(sample_rate)).round();
            // `as` saturates, and NaN becomes 0.
            (frames as u64).min(MAX_SEGMENT_FRAMES)
        };
        Self {
            attack: frames(attack),
            sustain: frames(sustain),
            release: frames(release),
            position: 0,
        }
    }

    /// Total length in frames.
    pub fn length(&self) -> u64 {
        self.attack + self.sustain + self.release
    }

    pub fn is_finished(&self) -> bool {
        self.position >= self.length()
    }

    /// Gain for the current frame, then advance.
    pub fn next_gain(&mut self) -> f32 {
        let p = self.position;
        let gain = if p < self.attack {
            p as f32 / self.attack as f32
        } else if p < self.attack + self.sustain {
            1.0
        } else if p < self.length() {
            let into = p - self.attack - self.sustain;
            1.0 - into as f32 / self.release as f32
        } else {
            0.0
        };
        self.position = self.position.saturating_add(1);
        gain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments() {
        let mut env = Asr::new(10.0, 0.2, 0.3, 0.2);
        assert_eq!(env.length(), 7);
        let gains: Vec<f32> = (0..8).map(|_| env.next_gain()).collect();
        assert_eq!(gains, vec![0.0, 0.5, 1.0, 1.0, 1.0, 1.0, 0.5, 0.0]);
        assert!(env.is_finished());
    }

    #[test]
    fn zero_attack_starts_at_full_gain() {
        let mut env = Asr::new(100.0, 0.0, 0.02, 0.0);
        assert_eq!(env.next_gain(), 1.0);
        assert_eq!(env.next_gain(), 1.0);
        assert!(env.is_finished());
        assert_eq!(env.next_gain(), 0.0);
    }

    #[test]
    fn huge_segments_are_capped() {
        let mut env = Asr::new(44100.0, 0.0, 1e6, 0.1);
        assert_eq!(env.length(), MAX_SEGMENT_FRAMES + 4410);
        assert_eq!(env.next_gain(), 1.0);
        assert!(!env.is_finished());

        let env = Asr::new(44100.0, f32::MAX, f32::INFINITY, 1e30);
        assert_eq!(env.length(), 3 * MAX_SEGMENT_FRAMES);

        let env = Asr::new(44100.0, f32::NAN, -1.0, 0.0);
        assert_eq!(env.length(), 0);
        assert!(env.is_finished());
    }
}
