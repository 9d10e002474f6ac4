//! WAV export of rendered audio and sample import.

use std::fs::File;
use std::io::{BufWriter, Read, Seek, Write};
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

fn stereo_float(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    }
}

/// Write interleaved stereo as 32-bit float WAV.
pub fn write_wav(
    path: impl AsRef<Path>,
    interleaved: &[f32],
    sample_rate: u32,
) -> Result<(), hound::Error> {
    let file = BufWriter::new(File::create(path)?);
    encode_wav(file, interleaved, sample_rate)
}

/// Encode interleaved stereo as 32-bit float WAV into any seekable writer.
pub fn encode_wav<W: Write + Seek>(
    writer: W,
    interleaved: &[f32],
    sample_rate: u32,
) -> Result<(), hound::Error> {
    let mut writer = WavWriter::new(writer, stereo_float(sample_rate))?;
    for sample in interleaved {
        writer.write_sample(*sample)?;
    }
    writer.finalize()
}

/// Mono PCM decoded from a WAV file.
#[derive(Clone, Debug, PartialEq)]
pub struct MonoSample {
    pub frames: Vec<f32>,
    pub sample_rate: u32,
}

/// Read a WAV file and average its channels down to mono.
pub fn read_wav_mono(path: impl AsRef<Path>) -> Result<MonoSample, hound::Error> {
    decode_wav_mono(WavReader::open(path)?)
}

/// Average all channels of each frame. Integer formats are scaled to
/// `[-1, 1)`.
pub fn decode_wav_mono<R: Read>(mut reader: WavReader<R>) -> Result<MonoSample, hound::Error> {
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;
    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        SampleFormat::Int => {
            let scale = 1.0 / (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()?
        }
    };
    let frames = interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect();
    Ok(MonoSample {
        frames,
        sample_rate: spec.sample_rate,
    })
}
