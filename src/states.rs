//! Sequencer position state.

use crate::branch::BranchId;

/// Where the sequencer is between steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequencerState {
    /// Branch currently playing.
    pub branch: BranchId,
    /// Next bar to play, numbered within `branch`.
    pub bar: u32,
    /// Consecutive passes through excursion branches since the last return home.
    pub excursion_loops: u32,
}

impl Default for SequencerState {
    /// Home branch, bar 1.
    fn default() -> Self {
        Self {
            branch: BranchId::Home,
            bar: 1,
            excursion_loops: 0,
        }
    }
}
