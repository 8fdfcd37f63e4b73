//! Error types for assembly setup and I/O.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced while building an assembly context or running one.
#[derive(Error, Debug)]
pub enum AssemblyError {
    /// A `slice*.wav` file whose name does not carry two bar numbers.
    #[error("malformed slice name '{file}': expected slice<tag>_bar<START>_bar<END>.wav")]
    MalformedSliceName {
        /// The offending file name.
        file: String,
    },

    /// The audio payload could not be decoded.
    #[error("failed to decode {}: {source}", path.display())]
    Decode {
        /// File being decoded.
        path: PathBuf,
        /// Underlying decoder error.
        #[source]
        source: hound::Error,
    },

    /// Sample rate conversion of a decoded file failed.
    #[error("failed to resample {}: {message}", path.display())]
    Resample {
        /// File being resampled.
        path: PathBuf,
        /// Resampler message.
        message: String,
    },

    /// Setup values rejected before any audio is produced.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(#[from] ConfigError),

    /// Directory listing or file access failed.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Writing the finished buffer failed.
    #[error("output error: {0}")]
    Output(#[source] hound::Error),
}

/// Configuration problems detected at setup.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("layout has no home branch")]
    MissingHomeBranch,

    #[error("branch '{0}' declared twice")]
    DuplicateBranch(String),

    #[error("branch '{0}' must have at least one bar")]
    ZeroBars(String),

    #[error("entry bar {bar} of branch '{branch}' lies outside home bars 1..={home_bars}")]
    EntryBarOutOfRange {
        branch: String,
        bar: u32,
        home_bars: u32,
    },

    #[error("resume bar {bar} of branch '{branch}' lies outside home bars 1..={home_bars}")]
    ResumeBarOutOfRange {
        branch: String,
        bar: u32,
        home_bars: u32,
    },

    #[error("home bar {bar} is already the entry of branch '{existing}'")]
    DuplicateEntryBar { bar: u32, existing: String },

    #[error("tempo must be positive and finite (bpm {bpm}, beats per bar {beats_per_bar})")]
    InvalidTempo { bpm: f64, beats_per_bar: u32 },

    #[error("sample rate must be positive")]
    InvalidSampleRate,

    #[error("odds {hits}/{out_of} are not a probability")]
    InvalidOdds { hits: u32, out_of: u32 },

    #[error("maximum consecutive excursion loops must be at least 1")]
    ZeroLoopLimit,

    #[error("reuse delay {0} is not a finite, non-negative number of seconds")]
    InvalidReuseDelay(f64),

    #[error("requested duration {0}s must be positive")]
    NonPositiveDuration(f64),

    #[error("slice '{slice}' spans bars {start}..{end}, outside branch '{branch}' (1..={total_bars})")]
    SliceOutOfRange {
        slice: String,
        branch: String,
        start: u32,
        end: u32,
        total_bars: u32,
    },

    #[error("recording of branch '{branch}' has {actual} samples, needs more than {needed}")]
    RecordingTooShort {
        branch: String,
        needed: usize,
        actual: usize,
    },

    #[error("layout has {expected} branches but {actual} were supplied")]
    BranchCountMismatch { expected: usize, actual: usize },

    #[error("no recording supplied for branch '{0}'")]
    MissingRecording(String),

    #[error("unknown branch '{0}'")]
    UnknownBranch(String),
}

/// Result type for assembly operations.
pub type Result<T> = std::result::Result<T, AssemblyError>;
