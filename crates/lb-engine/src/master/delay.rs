//! Stereo feedback delay with a one-pole dampener in the feedback path.

const TAU: f32 = std::f32::consts::TAU;

#[derive(Clone, Debug)]
struct Line {
    buffer: Vec<f32>,
    damp_state: f32,
}

#[derive(Clone, Debug)]
pub struct FeedbackDelay {
    lines: [Line; 2],
    write: usize,
    delay_frames: usize,
    feedback: f32,
    damp_coef: f32,
    sample_rate: f32,
}

impl FeedbackDelay {
    pub const DEFAULT_TIME: f32 = 0.256;
    pub const DEFAULT_FEEDBACK: f32 = 0.5;
    pub const DEFAULT_DAMPENING: f32 = 3000.0;

    pub fn new(sample_rate: f32, max_seconds: f32) -> Self {
        let capacity = ((sample_rate * max_seconds) as usize).max(2);
        let line = Line {
            buffer: vec![0.0; capacity],
            damp_state: 0.0,
        };
        let mut delay = Self {
            lines: [line.clone(), line],
            write: 0,
            delay_frames: 1,
            feedback: Self::DEFAULT_FEEDBACK,
            damp_coef: 1.0,
            sample_rate,
        };
        delay.set_time(Self::DEFAULT_TIME);
        delay.set_dampening(Self::DEFAULT_DAMPENING);
        delay
    }

    /// Delay time in seconds, clamped to the line length.
    pub fn set_time(&mut self, seconds: f32) {
        let capacity = self.lines[0].buffer.len();
        let frames = (seconds.max(0.0) * self.sample_rate) as usize;
        self.delay_frames = frames.clamp(1, capacity - 1);
    }

    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = feedback.clamp(0.0, 0.99);
    }

    /// Cutoff of the dampening low-pass in Hz.
    pub fn set_dampening(&mut self, cutoff: f32) {
        let nyquist = self.sample_rate * 0.5;
        let cutoff = cutoff.clamp(10.0, nyquist);
        self.damp_coef = 1.0 - (-TAU * cutoff / self.sample_rate).exp();
    }

    /// Process one stereo block; `output` receives the wet signal only.
    pub fn process(&mut self, input: [&[f32]; 2], output: [&mut [f32]; 2]) {
        let capacity = self.lines[0].buffer.len();
        let frames = input[0].len();
        let start = self.write;
        for (line, (inp, out)) in self.lines.iter_mut().zip(input.into_iter().zip(output)) {
            let mut write = start;
            for i in 0..frames {
                let read = (write + capacity - self.delay_frames) % capacity;
                let delayed = line.buffer[read];
                line.damp_state += self.damp_coef * (delayed - line.damp_state);
                line.buffer[write] = inp[i] + line.damp_state * self.feedback;
                out[i] = delayed;
                write = (write + 1) % capacity;
            }
        }
        self.write = (start + frames) % capacity;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn impulse_returns_after_delay_time() {
        let mut delay = FeedbackDelay::new(1000.0, 1.0);
        delay.set_time(0.005);
        delay.set_feedback(0.0);
        delay.set_dampening(500.0);

        let mut left = [0.0; 16];
        left[0] = 1.0;
        let right = [0.0; 16];
        let mut out_l = [0.0; 16];
        let mut out_r = [0.0; 16];
        delay.process([&left, &right], [&mut out_l, &mut out_r]);

        assert!(out_l[..5].iter().all(|s| *s == 0.0));
        assert_eq!(out_l[5], 1.0);
        assert!(out_r.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn silence_in_silence_out() {
        let mut delay = FeedbackDelay::new(44100.0, 2.0);
        let zeros = [0.0; 128];
        let mut l = [1.0; 128];
        let mut r = [1.0; 128];
        delay.process([&zeros, &zeros], [&mut l, &mut r]);
        assert!(l.iter().chain(r.iter()).all(|s| *s == 0.0));
    }
}
