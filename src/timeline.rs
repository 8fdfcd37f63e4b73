//! Timeline module: bar arithmetic shared by slice authoring and segment extraction.

use crate::error::ConfigError;
use std::ops::Range;

/// Tempo of the source recordings.
pub const DEFAULT_BPM: f64 = 73.96;
/// Beats per bar of the source recordings.
pub const DEFAULT_BEATS_PER_BAR: u32 = 4;
/// Sample rate every buffer is converted to.
pub const TARGET_SAMPLE_RATE: u32 = 44_100;

/// Fixed musical tempo.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tempo {
    /// Beats per minute.
    pub bpm: f64,
    /// Beats in one bar.
    pub beats_per_bar: u32,
}

impl Tempo {
    /// Duration of one bar in seconds.
    pub fn seconds_per_bar(&self) -> f64 {
        60.0 / self.bpm * self.beats_per_bar as f64
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self {
            bpm: DEFAULT_BPM,
            beats_per_bar: DEFAULT_BEATS_PER_BAR,
        }
    }
}

/// Tempo plus sample rate: everything needed to place a bar in a buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timeline {
    pub tempo: Tempo,
    pub sample_rate: u32,
}

impl Timeline {
    pub fn new(tempo: Tempo, sample_rate: u32) -> Self {
        Self { tempo, sample_rate }
    }

    /// Reject tempos and rates that cannot place bars.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let Tempo { bpm, beats_per_bar } = self.tempo;
        if !(bpm.is_finite() && bpm > 0.0) || beats_per_bar == 0 {
            return Err(ConfigError::InvalidTempo { bpm, beats_per_bar });
        }
        if self.sample_rate == 0 {
            return Err(ConfigError::InvalidSampleRate);
        }
        Ok(())
    }

    pub fn seconds_per_bar(&self) -> f64 {
        self.tempo.seconds_per_bar()
    }

    /// First sample of `bar` (1-based): `round((bar - 1) * seconds_per_bar * rate)`.
    pub fn sample_offset(&self, bar: u32) -> usize {
        let bars_before = bar.saturating_sub(1) as f64;
        (bars_before * self.seconds_per_bar() * self.sample_rate as f64).round() as usize
    }

    /// Sample range of `bar` inside a recording of `len` samples.
    ///
    /// The final bar of a recording may be shorter than nominal; the range is
    /// clamped rather than padded.
    pub fn bar_span(&self, bar: u32, len: usize) -> Range<usize> {
        let start = self.sample_offset(bar).min(len);
        let end = self.sample_offset(bar + 1).min(len);
        start..end
    }

    /// Elapsed seconds represented by `samples` output samples.
    pub fn seconds(&self, samples: usize) -> f64 {
        samples as f64 / self.sample_rate as f64
    }
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new(Tempo::default(), TARGET_SAMPLE_RATE)
    }
}
