//! Multichannel f32 audio buffer with planar layout.

use alloc::vec;
use alloc::vec::Vec;

/// Output channel count of the render bridge.
pub const STEREO: u16 = 2;

/// Frames rendered per block.
pub const DEFAULT_BLOCK_SIZE: usize = 128;

/// A multichannel f32 audio buffer in planar layout.
///
/// `data[ch * frames + frame]` gives the sample for channel `ch` at `frame`.
#[derive(Clone, Debug)]
pub struct AudioBuffer {
    data: Vec<f32>,
    channels: u16,
    frames: u16,
}

impl AudioBuffer {
    pub fn new(channels: u16, frames: u16) -> Self {
        Self {
            data: vec![0.0; channels as usize * frames as usize],
            channels,
            frames,
        }
    }

    pub fn silence(&mut self) {
        self.data.fill(0.0);
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn frames(&self) -> u16 {
        self.frames
    }

    pub fn channel(&self, ch: u16) -> &[f32] {
        let start = ch as usize * self.frames as usize;
        &self.data[start..start + self.frames as usize]
    }

    pub fn channel_mut(&mut self, ch: u16) -> &mut [f32] {
        let start = ch as usize * self.frames as usize;
        let len = self.frames as usize;
        &mut self.data[start..start + len]
    }

    /// Borrow the first two planes mutably at once.
    pub fn stereo_mut(&mut self) -> (&mut [f32], &mut [f32]) {
        let len = self.frames as usize;
        let (left, rest) = self.data.split_at_mut(len);
        (left, &mut rest[..len])
    }

    /// Add `source` into this buffer scaled by `gain`.
    pub fn mix_from_scaled(&mut self, source: &AudioBuffer, gain: f32) {
        let chs = self.channels.min(source.channels);
        let frs = self.frames.min(source.frames) as usize;
        for ch in 0..chs {
            let dst = self.channel_mut(ch);
            let src = source.channel(ch);
            for i in 0..frs {
                dst[i] += src[i] * gain;
            }
        }
    }

    /// Copy frames `0..n` into an interleaved slice of `channels * n` samples.
    pub fn write_interleaved(&self, out: &mut [f32]) {
        let chs = self.channels as usize;
        let n = (out.len() / chs.max(1)).min(self.frames as usize);
        for ch in 0..self.channels {
            let plane = self.channel(ch);
            for (i, s) in plane[..n].iter().enumerate() {
                out[i * chs + ch as usize] = *s;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_is_silent() {
        let buf = AudioBuffer::new(2, 4);
        assert_eq!(buf.channels(), 2);
        assert_eq!(buf.frames(), 4);
        assert!(buf.channel(0).iter().all(|&s| s == 0.0));
        assert!(buf.channel(1).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn stereo_mut_splits_planes() {
        let mut buf = AudioBuffer::new(2, 2);
        let (l, r) = buf.stereo_mut();
        l[0] = 1.0;
        r[1] = -0.5;
        assert_eq!(buf.channel(0), &[1.0, 0.0]);
        assert_eq!(buf.channel(1), &[0.0, -0.5]);
    }

    #[test]
    fn silence_clears_data() {
        let mut buf = AudioBuffer::new(1, 2);
        buf.channel_mut(0)[0] = 1.0;
        buf.silence();
        assert_eq!(buf.channel(0), &[0.0, 0.0]);
    }

    #[test]
    fn mix_from_scaled_applies_gain() {
        let mut dst = AudioBuffer::new(1, 2);
        let mut src = AudioBuffer::new(1, 2);
        src.channel_mut(0)[0] = 1.0;
        src.channel_mut(0)[1] = -1.0;

        dst.mix_from_scaled(&src, 0.5);
        assert!((dst.channel(0)[0] - 0.5).abs() < 1e-6);
        assert!((dst.channel(0)[1] - -0.5).abs() < 1e-6);
    }

    #[test]
    fn interleave_partial() {
        let mut buf = AudioBuffer::new(2, 4);
        buf.channel_mut(0).copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);
        buf.channel_mut(1).copy_from_slice(&[-1.0, -2.0, -3.0, -4.0]);
        let mut out = [0.0; 4];
        buf.write_interleaved(&mut out);
        assert_eq!(out, [1.0, -1.0, 2.0, -2.0]);
    }
}
