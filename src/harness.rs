//! Fixture harness: synthetic recordings and layouts for tests, benches and demos.
//!
//! Recordings are "stepped": every sample of bar `b` equals
//! `level + b * BAR_STEP`, so a rendered buffer shows which bar it came from.

use crate::branch::{BranchMap, SongLayout};
use crate::builder::LayoutBuilder;
use crate::catalog::{Slice, SliceCatalog};
use crate::context::AssemblyContext;
use crate::error::Result;
use crate::policy::ReusePolicy;
use crate::timeline::{Tempo, Timeline};

/// Value added per bar in stepped recordings.
pub const BAR_STEP: f32 = 1.0e-3;

/// 120 BPM at 50 Hz: two seconds and 100 samples per bar.
pub fn fast_timeline() -> Timeline {
    Timeline::new(Tempo { bpm: 120.0, beats_per_bar: 4 }, 50)
}

/// branch1 (41 bars, home); branch2 (31 bars) entered at and resuming at 13;
/// branch3 (27 bars) entered at and resuming at 28.
pub fn reference_layout() -> SongLayout {
    LayoutBuilder::new()
        .home("branch1", 41)
        .excursion("branch2", 31, 13, 13)
        .excursion("branch3", 27, 28, 28)
        .build()
        .expect("reference layout is valid")
}

/// Full recording of `total_bars` bars, stepped per bar.
pub fn stepped_recording(timeline: &Timeline, total_bars: u32, level: f32) -> Vec<f32> {
    let mut samples = Vec::with_capacity(timeline.sample_offset(total_bars + 1));
    for bar in 1..=total_bars {
        let len = timeline.sample_offset(bar + 1) - timeline.sample_offset(bar);
        samples.extend(std::iter::repeat(level + bar as f32 * BAR_STEP).take(len));
    }
    samples
}

/// Slice covering `start..end` at a constant `level`.
pub fn flat_slice(timeline: &Timeline, name: &str, start: u32, end: u32, level: f32) -> Slice {
    let len = timeline.sample_offset(end) - timeline.sample_offset(start);
    Slice::new(name, start, end, vec![level; len])
}

/// Two alternate slices at every fourth bar, each spanning four bars (or up to
/// the final bar).
pub fn slice_grid(timeline: &Timeline, branch: &str, total_bars: u32) -> Vec<Slice> {
    let mut slices = Vec::new();
    let mut start = 1;
    while start < total_bars {
        let end = (start + 4).min(total_bars);
        for (alt, level) in [("a", -0.25), ("b", -0.5)] {
            let name = format!("slice{alt}_{branch}_bar{start}_bar{end}.wav");
            slices.push(flat_slice(timeline, &name, start, end, level));
        }
        start += 4;
    }
    slices
}

/// Reference layout with stepped recordings and, when `with_slices`, a slice
/// grid on every branch.
pub fn reference_context(timeline: Timeline, policy: ReusePolicy, with_slices: bool) -> Result<AssemblyContext> {
    let layout = reference_layout();
    let originals = BranchMap::from_fn(&layout, |id| {
        let level = match id {
            crate::branch::BranchId::Home => 0.0,
            crate::branch::BranchId::Excursion(x) => 0.1 * (x.index() + 1) as f32,
        };
        stepped_recording(&timeline, layout.total_bars(id), level)
    });
    let catalogs = BranchMap::from_fn(&layout, |id| {
        if with_slices {
            SliceCatalog::from_slices(slice_grid(&timeline, layout.name(id), layout.total_bars(id)))
        } else {
            SliceCatalog::new()
        }
    });
    AssemblyContext::new(layout, timeline, policy, originals, catalogs)
}
