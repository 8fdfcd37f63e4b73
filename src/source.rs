//! Audio source seam: decoded, mono buffers at the target sample rate.

use crate::error::{AssemblyError, Result};
use hound::{SampleFormat, WavReader};
use rubato::{FftFixedIn, Resampler};
use std::io::Read;
use std::path::Path;

/// Supplies decoded audio for originals and slices.
///
/// Implementations must return mono samples at the rate the assembly runs at;
/// the sequencer performs no conversion of its own.
pub trait AudioSource {
    /// Decode the file at `path`.
    fn load(&self, path: &Path) -> Result<Vec<f32>>;
}

/// WAV decoder backed by `hound`, with downmix and `rubato` resampling.
#[derive(Debug, Clone, Copy)]
pub struct WavSource {
    target_rate: u32,
}

impl WavSource {
    pub fn new(target_rate: u32) -> Self {
        Self { target_rate }
    }

    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }

    /// Decode WAV data from any reader. `path` is used for error reporting.
    pub fn decode<R: Read>(&self, reader: R, path: &Path) -> Result<Vec<f32>> {
        let decode_err = |source| AssemblyError::Decode {
            path: path.to_path_buf(),
            source,
        };
        let wav = WavReader::new(reader).map_err(decode_err)?;
        let spec = wav.spec();
        let interleaved = read_samples(wav, spec.sample_format, spec.bits_per_sample)
            .map_err(decode_err)?;
        let mono = downmix(&interleaved, spec.channels as usize);
        resample_mono(&mono, spec.sample_rate, self.target_rate).map_err(|message| {
            AssemblyError::Resample {
                path: path.to_path_buf(),
                message,
            }
        })
    }
}

impl AudioSource for WavSource {
    fn load(&self, path: &Path) -> Result<Vec<f32>> {
        let file = std::fs::File::open(path).map_err(|source| AssemblyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.decode(std::io::BufReader::new(file), path)
    }
}

fn read_samples<R: Read>(
    wav: WavReader<R>,
    format: SampleFormat,
    bits_per_sample: u16,
) -> std::result::Result<Vec<f32>, hound::Error> {
    match format {
        SampleFormat::Float => wav.into_samples::<f32>().collect(),
        SampleFormat::Int => {
            let scale = 1.0 / (1u64 << (bits_per_sample.saturating_sub(1))) as f32;
            wav.into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect()
        }
    }
}

/// Average interleaved channels down to one.
pub fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

const RESAMPLE_CHUNK: usize = 1024;
const RESAMPLE_SUB_CHUNKS: usize = 2;

/// Convert a mono buffer between sample rates.
///
/// The resampler's output delay is dropped from the front and the tail is
/// flushed with silence, so output frame `i` lines up with input time
/// `i / target_rate`. The result has exactly `ceil(len * target / source)`
/// frames.
pub fn resample_mono(
    samples: &[f32],
    source_rate: u32,
    target_rate: u32,
) -> std::result::Result<Vec<f32>, String> {
    if source_rate == target_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let mut resampler = FftFixedIn::<f32>::new(
        source_rate as usize,
        target_rate as usize,
        RESAMPLE_CHUNK,
        RESAMPLE_SUB_CHUNKS,
        1,
    )
    .map_err(|e| e.to_string())?;

    let expected = (samples.len() as f64 * target_rate as f64 / source_rate as f64).ceil() as usize;
    let delay = resampler.output_delay();
    let mut output = Vec::with_capacity(delay + expected + RESAMPLE_CHUNK);

    let mut pos = 0;
    while pos < samples.len() {
        let needed = resampler.input_frames_next();
        let take = needed.min(samples.len() - pos);
        let mut chunk = vec![0.0f32; needed];
        chunk[..take].copy_from_slice(&samples[pos..pos + take]);
        let input = vec![chunk];
        let out = resampler
            .process(&input, None)
            .map_err(|e| e.to_string())?;
        output.extend_from_slice(&out[0]);
        pos += take;
    }
    while output.len() < delay + expected {
        let out = resampler
            .process_partial::<Vec<f32>>(None, None)
            .map_err(|e| e.to_string())?;
        output.extend_from_slice(&out[0]);
    }

    output.drain(..delay);
    output.truncate(expected);
    Ok(output)
}
