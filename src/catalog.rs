//! Slice catalog: pre-cut fragments of one branch, indexed by start bar.

use crate::error::{AssemblyError, ConfigError, Result};
use crate::policy::is_rested;
use crate::source::AudioSource;
use std::collections::BTreeMap;
use std::path::Path;

/// Position of a slice in its catalog's discovery order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SliceId(pub(crate) usize);

impl SliceId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A pre-rendered fragment covering bars `start_bar..end_bar` of a branch.
///
/// Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct Slice {
    name: String,
    start_bar: u32,
    end_bar: u32,
    samples: Vec<f32>,
}

impl Slice {
    pub fn new(name: impl Into<String>, start_bar: u32, end_bar: u32, samples: Vec<f32>) -> Self {
        Self {
            name: name.into(),
            start_bar,
            end_bar,
            samples,
        }
    }

    /// Identifier, normally the file name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start_bar(&self) -> u32 {
        self.start_bar
    }

    /// Bar playback continues from once the slice has played.
    pub fn end_bar(&self) -> u32 {
        self.end_bar
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }
}

/// Play record of one slice.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlayHistory {
    pub play_count: u32,
    /// Elapsed output seconds at the end of the last play.
    pub last_played: Option<f64>,
}

/// Parse `slice<tag>_bar<START>_bar<END>.wav` into its bar range.
///
/// Returns `Ok(None)` for files that are not slices at all.
pub fn parse_slice_name(file_name: &str) -> Result<Option<(u32, u32)>> {
    if !file_name.starts_with("slice") {
        return Ok(None);
    }
    let Some(stem) = file_name.strip_suffix(".wav") else {
        return Ok(None);
    };
    let malformed = || AssemblyError::MalformedSliceName {
        file: file_name.to_string(),
    };
    let parts: Vec<&str> = stem.split("_bar").collect();
    let [_, start, end] = parts.as_slice() else {
        return Err(malformed());
    };
    let start = start.parse::<u32>().map_err(|_| malformed())?;
    let end = end.parse::<u32>().map_err(|_| malformed())?;
    Ok(Some((start, end)))
}

/// Slices of one branch grouped by start bar, with per-slice play history.
#[derive(Debug, Clone, Default)]
pub struct SliceCatalog {
    slices: Vec<Slice>,
    history: Vec<PlayHistory>,
    by_start: BTreeMap<u32, Vec<SliceId>>,
}

impl SliceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog over `slices`, kept in the given order.
    pub fn from_slices(slices: impl IntoIterator<Item = Slice>) -> Self {
        let mut catalog = Self::new();
        for slice in slices {
            catalog.insert(slice);
        }
        catalog
    }

    /// Scan `dir` for slice files, decode them with `source` and index them.
    ///
    /// Files are visited in lexicographic order so discovery order, and with
    /// it every seeded run, is stable across platforms.
    pub fn build(dir: &Path, source: &dyn AudioSource) -> Result<Self> {
        let io_err = |source| AssemblyError::Io {
            path: dir.to_path_buf(),
            source,
        };
        let mut names = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            let file_name = entry.file_name();
            match file_name.to_str() {
                Some(name) => names.push(name.to_string()),
                None => {
                    let lossy = file_name.to_string_lossy();
                    if lossy.starts_with("slice") {
                        return Err(AssemblyError::MalformedSliceName {
                            file: lossy.into_owned(),
                        });
                    }
                    tracing::warn!(file = %lossy, dir = %dir.display(), "skipping non-UTF-8 file name");
                }
            }
        }
        names.sort();

        let mut catalog = Self::new();
        for name in names {
            let Some((start, end)) = parse_slice_name(&name)? else {
                continue;
            };
            let samples = source.load(&dir.join(&name))?;
            tracing::debug!(slice = %name, start, end, samples = samples.len(), "discovered slice");
            catalog.insert(Slice::new(name, start, end, samples));
        }
        Ok(catalog)
    }

    /// Add a slice with a fresh history.
    pub fn insert(&mut self, slice: Slice) -> SliceId {
        let id = SliceId(self.slices.len());
        self.by_start.entry(slice.start_bar).or_default().push(id);
        self.slices.push(slice);
        self.history.push(PlayHistory::default());
        id
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    pub fn slice(&self, id: SliceId) -> &Slice {
        &self.slices[id.0]
    }

    pub fn history(&self, id: SliceId) -> PlayHistory {
        self.history[id.0]
    }

    /// All slices in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = (SliceId, &Slice)> {
        self.slices.iter().enumerate().map(|(i, s)| (SliceId(i), s))
    }

    /// Slices starting at `bar` that have rested `reuse_delay_secs` by `now`,
    /// least played first, ties in discovery order.
    pub fn available_at(&self, bar: u32, now: f64, reuse_delay_secs: f64) -> Vec<SliceId> {
        let Some(ids) = self.by_start.get(&bar) else {
            return Vec::new();
        };
        let mut available: Vec<SliceId> = ids
            .iter()
            .copied()
            .filter(|id| is_rested(self.history[id.0].last_played, now, reuse_delay_secs))
            .collect();
        // Stable: equal play counts keep discovery order.
        available.sort_by_key(|id| self.history[id.0].play_count);
        available
    }

    /// Count a play of `id` ending at `now`.
    pub fn record_play(&mut self, id: SliceId, now: f64) {
        let entry = &mut self.history[id.0];
        entry.play_count += 1;
        entry.last_played = Some(now);
    }

    /// Forget all plays.
    pub fn reset_history(&mut self) {
        self.history.fill(PlayHistory::default());
    }

    /// True when no slice has been played.
    pub fn is_cold(&self) -> bool {
        self.history.iter().all(|h| *h == PlayHistory::default())
    }

    /// Check every slice lies inside a branch of `total_bars` bars.
    pub fn validate(&self, branch: &str, total_bars: u32) -> std::result::Result<(), ConfigError> {
        for slice in &self.slices {
            if slice.start_bar == 0 || slice.end_bar <= slice.start_bar || slice.end_bar > total_bars {
                return Err(ConfigError::SliceOutOfRange {
                    slice: slice.name.clone(),
                    branch: branch.to_string(),
                    start: slice.start_bar,
                    end: slice.end_bar,
                    total_bars,
                });
            }
        }
        Ok(())
    }
}
