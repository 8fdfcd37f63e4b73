//! Output sink seam and its WAV implementation.

use crate::error::{AssemblyError, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};

/// Receives the finished mono buffer.
pub trait OutputSink {
    fn write(&mut self, samples: &[f32], sample_rate: u32) -> Result<()>;
}

/// Writes a mono 32-bit float WAV file.
#[derive(Debug, Clone)]
pub struct WavSink {
    path: PathBuf,
}

impl WavSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OutputSink for WavSink {
    fn write(&mut self, samples: &[f32], sample_rate: u32) -> Result<()> {
        let writer = WavWriter::create(&self.path, mono_spec(sample_rate)).map_err(AssemblyError::Output)?;
        write_samples(writer, samples)?;
        tracing::info!(
            path = %self.path.display(),
            samples = samples.len(),
            sample_rate,
            "wrote arrangement"
        );
        Ok(())
    }
}

/// Encode mono samples as WAV bytes in memory.
pub fn encode_wav_mono(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    {
        let cursor = std::io::Cursor::new(&mut buffer);
        let writer = WavWriter::new(cursor, mono_spec(sample_rate)).map_err(AssemblyError::Output)?;
        write_samples(writer, samples)?;
    }
    Ok(buffer)
}

fn mono_spec(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    }
}

fn write_samples<W: Write + Seek>(mut writer: WavWriter<W>, samples: &[f32]) -> Result<()> {
    for &sample in samples {
        writer.write_sample(sample).map_err(AssemblyError::Output)?;
    }
    // Finalize writes the header lengths and flushes.
    writer.finalize().map_err(AssemblyError::Output)
}
