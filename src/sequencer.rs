//! Sequencer: the bar-by-bar state machine that assembles the output.
//!
//! Each [`Sequencer::step`] appends exactly one unit of audio, either a slice
//! or one bar of the current branch's recording, then considers switching
//! into an excursion branch. [`Sequencer::run`] steps until the requested
//! duration is reached; the output overshoots by less than one unit.

use crate::branch::{BranchId, ExcursionId};
use crate::catalog::SliceId;
use crate::context::AssemblyContext;
use crate::error::{ConfigError, Result};
use crate::invariant_ppt::{
    assert_invariant, BAR_IN_RANGE, BRANCH_REST_RESPECTED, LOOP_LIMIT_BOUND, OUTPUT_MONOTONIC,
    SLICE_PLAY_RECORDED, SLICE_REST_RESPECTED, TERMINATION_BOUND,
};
use crate::states::SequencerState;
use rand::seq::SliceRandom;
use rand::Rng;

/// One scheduling decision, in play order.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayEvent {
    /// A slice was appended.
    Slice {
        branch: BranchId,
        slice: SliceId,
        start_bar: u32,
        end_bar: u32,
        /// Output seconds when the slice started.
        at_secs: f64,
    },
    /// One bar of the branch recording was appended.
    Segment {
        branch: BranchId,
        bar: u32,
        at_secs: f64,
    },
    /// The branch ended and playback wrapped to its bar 1.
    LoopBack { branch: BranchId, at_secs: f64 },
    /// Playback moved from the home branch into an excursion.
    BranchSwitch {
        to: ExcursionId,
        from_bar: u32,
        at_secs: f64,
    },
    /// An excursion handed back to the home branch.
    ReturnHome {
        from: ExcursionId,
        resume_bar: u32,
        at_secs: f64,
    },
}

/// Finished arrangement handed to an output sink.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub events: Vec<PlayEvent>,
}

impl Rendered {
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Excursions in the order they were entered.
    pub fn branch_play_order(&self) -> Vec<ExcursionId> {
        self.events
            .iter()
            .filter_map(|e| match e {
                PlayEvent::BranchSwitch { to, .. } => Some(*to),
                _ => None,
            })
            .collect()
    }

    /// Slices in the order they were played.
    pub fn slice_play_order(&self) -> Vec<(BranchId, SliceId)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                PlayEvent::Slice { branch, slice, .. } => Some((*branch, *slice)),
                _ => None,
            })
            .collect()
    }
}

/// The assembly state machine. Owns its context and output for one run.
#[derive(Debug)]
pub struct Sequencer<R> {
    ctx: AssemblyContext,
    rng: R,
    state: SequencerState,
    /// Entry time of each excursion, indexed like the layout's excursions.
    branch_last_played: Vec<Option<f64>>,
    output: Vec<f32>,
    events: Vec<PlayEvent>,
}

impl<R: Rng> Sequencer<R> {
    /// Start at home bar 1 with an empty output.
    pub fn new(ctx: AssemblyContext, rng: R) -> Self {
        let branch_last_played = vec![None; ctx.layout.excursions().len()];
        Self {
            ctx,
            rng,
            state: SequencerState::default(),
            branch_last_played,
            output: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn context(&self) -> &AssemblyContext {
        &self.ctx
    }

    pub fn output(&self) -> &[f32] {
        &self.output
    }

    pub fn events(&self) -> &[PlayEvent] {
        &self.events
    }

    /// Entry time of an excursion, if it has been entered.
    pub fn branch_last_played(&self, id: ExcursionId) -> Option<f64> {
        self.branch_last_played[id.index()]
    }

    /// Output length in seconds; the clock every reuse decision reads.
    pub fn elapsed_secs(&self) -> f64 {
        self.ctx.timeline.seconds(self.output.len())
    }

    /// Append one unit of audio and update position.
    pub fn step(&mut self) {
        let before = self.output.len();
        let now = self.elapsed_secs();
        let branch = self.state.branch;
        let available = self.ctx.catalogs.get(branch).available_at(
            self.state.bar,
            now,
            self.ctx.policy.slice_reuse_delay_secs,
        );

        if !available.is_empty() && self.ctx.policy.slice_odds.flip(&mut self.rng) {
            let chosen = self.pick_least_played(branch, &available);
            self.play_slice(chosen);
        } else {
            self.advance_bar();
        }
        self.consider_branch_switch();

        assert_invariant(
            OUTPUT_MONOTONIC,
            self.output.len() >= before,
            "output only grows",
            Some("step"),
        );
        let total = self.ctx.layout.total_bars(self.state.branch);
        assert_invariant(
            BAR_IN_RANGE,
            (1..=total).contains(&self.state.bar),
            "current bar within branch",
            Some("step"),
        );
        assert_invariant(
            LOOP_LIMIT_BOUND,
            self.state.excursion_loops <= self.ctx.policy.max_excursion_loops,
            "excursion loops within limit",
            Some("step"),
        );
    }

    /// Step until at least `duration_secs` of audio exists.
    pub fn run(mut self, duration_secs: f64) -> Result<Rendered> {
        if !(duration_secs.is_finite() && duration_secs > 0.0) {
            return Err(ConfigError::NonPositiveDuration(duration_secs).into());
        }
        tracing::info!(
            duration_secs,
            layout = %self.ctx.layout,
            "assembling arrangement"
        );

        while self.elapsed_secs() < duration_secs {
            self.step();
        }
        assert_invariant(
            TERMINATION_BOUND,
            self.elapsed_secs() >= duration_secs,
            "output covers the requested duration",
            Some("run"),
        );

        let order: Vec<&str> = self
            .events
            .iter()
            .filter_map(|e| match e {
                PlayEvent::BranchSwitch { to, .. } => {
                    Some(self.ctx.layout.name(BranchId::Excursion(*to)))
                }
                _ => None,
            })
            .collect();
        tracing::info!(?order, elapsed_secs = self.elapsed_secs(), "branch play order");

        Ok(Rendered {
            samples: self.output,
            sample_rate: self.ctx.timeline.sample_rate,
            events: self.events,
        })
    }

    /// Uniform choice among the eligible slices sharing the lowest play count.
    /// `available` is sorted least played first.
    fn pick_least_played(&mut self, branch: BranchId, available: &[SliceId]) -> SliceId {
        let catalog = self.ctx.catalogs.get(branch);
        let least = catalog.history(available[0]).play_count;
        let tied = available
            .iter()
            .take_while(|id| catalog.history(**id).play_count == least)
            .count();
        *available[..tied]
            .choose(&mut self.rng)
            .unwrap_or(&available[0])
    }

    fn play_slice(&mut self, id: SliceId) {
        let branch = self.state.branch;
        let started = self.elapsed_secs();
        let catalog = self.ctx.catalogs.get(branch);
        let history = catalog.history(id);
        assert_invariant(
            SLICE_REST_RESPECTED,
            self.ctx.policy.slice_rested(history.last_played, started),
            "slice rested before reuse",
            Some("play_slice"),
        );

        let slice = catalog.slice(id);
        let (start_bar, end_bar) = (slice.start_bar(), slice.end_bar());
        self.output.extend_from_slice(slice.samples());
        tracing::debug!(
            branch = self.ctx.layout.name(branch),
            slice = slice.name(),
            start_bar,
            end_bar,
            at_secs = started,
            "playing slice"
        );

        let now = self.elapsed_secs();
        let catalog = self.ctx.catalogs.get_mut(branch);
        catalog.record_play(id, now);
        assert_invariant(
            SLICE_PLAY_RECORDED,
            catalog.history(id).play_count == history.play_count + 1,
            "slice play counted once",
            Some("play_slice"),
        );

        self.events.push(PlayEvent::Slice {
            branch,
            slice: id,
            start_bar,
            end_bar,
            at_secs: started,
        });
        self.state.bar = end_bar;
        if !branch.is_home() && end_bar == self.ctx.layout.total_bars(branch) {
            self.state.excursion_loops += 1;
        }
    }

    fn advance_bar(&mut self) {
        let branch = self.state.branch;
        let bar = self.state.bar;
        let started = self.elapsed_secs();

        let recording = self.ctx.originals.get(branch);
        let span = self.ctx.timeline.bar_span(bar, recording.len());
        self.output.extend_from_slice(&recording[span]);
        tracing::debug!(
            branch = self.ctx.layout.name(branch),
            bar,
            at_secs = started,
            "playing original segment"
        );
        self.events.push(PlayEvent::Segment {
            branch,
            bar,
            at_secs: started,
        });

        let next = bar + 1;
        if next <= self.ctx.layout.total_bars(branch) {
            self.state.bar = next;
            return;
        }

        let now = self.elapsed_secs();
        match branch {
            BranchId::Home => {
                self.state.bar = 1;
                self.state.excursion_loops = 0;
                self.events.push(PlayEvent::LoopBack { branch, at_secs: now });
            }
            BranchId::Excursion(x) => {
                self.state.excursion_loops += 1;
                let all_visited = self.branch_last_played.iter().all(Option::is_some);
                if self
                    .ctx
                    .policy
                    .should_return_home(self.state.excursion_loops, all_visited)
                {
                    let resume_bar = self.ctx.layout.excursion(x).resume_bar;
                    self.state = SequencerState {
                        branch: BranchId::Home,
                        bar: resume_bar,
                        excursion_loops: 0,
                    };
                    tracing::info!(
                        from = self.ctx.layout.name(branch),
                        resume_bar,
                        at_secs = now,
                        "returning to home branch"
                    );
                    self.events.push(PlayEvent::ReturnHome {
                        from: x,
                        resume_bar,
                        at_secs: now,
                    });
                } else {
                    self.state.bar = 1;
                    self.events.push(PlayEvent::LoopBack { branch, at_secs: now });
                }
            }
        }
    }

    fn consider_branch_switch(&mut self) {
        if !self.state.branch.is_home() {
            return;
        }
        let Some(x) = self.ctx.layout.excursion_entered_at(self.state.bar) else {
            return;
        };
        if !self.ctx.policy.switch_gate.open(&mut self.rng) {
            return;
        }
        let now = self.elapsed_secs();
        let last = self.branch_last_played[x.index()];
        if !self.ctx.policy.branch_rested(last, now) {
            return;
        }
        assert_invariant(
            BRANCH_REST_RESPECTED,
            last.map_or(true, |t| now - t >= self.ctx.policy.branch_reuse_delay_secs),
            "branch rested before re-entry",
            Some("consider_branch_switch"),
        );

        let from_bar = self.state.bar;
        self.state = SequencerState {
            branch: BranchId::Excursion(x),
            bar: 1,
            excursion_loops: 0,
        };
        self.branch_last_played[x.index()] = Some(now);
        tracing::info!(
            to = self.ctx.layout.name(BranchId::Excursion(x)),
            from_bar,
            at_secs = now,
            "switching branch"
        );
        self.events.push(PlayEvent::BranchSwitch {
            to: x,
            from_bar,
            at_secs: now,
        });
    }
}

/// Assemble `duration_secs` of audio from `ctx`.
pub fn assemble<R: Rng>(ctx: AssemblyContext, rng: R, duration_secs: f64) -> Result<Rendered> {
    Sequencer::new(ctx, rng).run(duration_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branch::BranchMap;
    use crate::builder::LayoutBuilder;
    use crate::catalog::{Slice, SliceCatalog};
    use crate::policy::{HomeReturn, Odds, ReusePolicy, SwitchGate};
    use crate::timeline::{Tempo, Timeline};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    // 120 BPM at 100 Hz: 200 samples per bar.
    fn timeline() -> Timeline {
        Timeline::new(Tempo { bpm: 120.0, beats_per_bar: 4 }, 100)
    }

    fn home_only(bars: u32, slices: Vec<Slice>, policy: ReusePolicy) -> AssemblyContext {
        let layout = LayoutBuilder::new().home("home", bars).build().unwrap();
        let originals = BranchMap::from_fn(&layout, |_| vec![0.25; 200 * bars as usize]);
        let mut pool = Some(slices);
        let catalogs = BranchMap::from_fn(&layout, |_| {
            SliceCatalog::from_slices(pool.take().unwrap_or_default())
        });
        AssemblyContext::new(layout, timeline(), policy, originals, catalogs).unwrap()
    }

    #[test]
    fn raw_steps_walk_and_wrap() {
        let ctx = home_only(3, vec![], ReusePolicy::default());
        let mut seq = Sequencer::new(ctx, StdRng::seed_from_u64(0));
        let bars: Vec<u32> = (0..4)
            .map(|_| {
                seq.step();
                seq.state().bar
            })
            .collect();
        assert_eq!(bars, vec![2, 3, 1, 2]);
        assert_eq!(seq.output().len(), 4 * 200);
        assert!(seq
            .events()
            .iter()
            .any(|e| matches!(e, PlayEvent::LoopBack { branch: BranchId::Home, .. })));
    }

    #[test]
    fn slice_jumps_to_end_bar() {
        let policy = ReusePolicy {
            slice_odds: Odds::ALWAYS,
            ..ReusePolicy::default()
        };
        let ctx = home_only(8, vec![Slice::new("slice_bar1_bar6.wav", 1, 6, vec![0.5; 1000])], policy);
        let mut seq = Sequencer::new(ctx, StdRng::seed_from_u64(0));
        seq.step();
        assert_eq!(seq.state().bar, 6);
        assert_eq!(seq.output().len(), 1000);
        let history = seq.context().catalog(BranchId::Home).history(SliceId(0));
        assert_eq!(history.play_count, 1);
        assert_eq!(history.last_played, Some(10.0));
    }

    #[test]
    fn least_played_ties_are_broken_randomly() {
        let policy = ReusePolicy {
            slice_odds: Odds::ALWAYS,
            slice_reuse_delay_secs: 0.0,
            ..ReusePolicy::default()
        };
        let slices = vec![
            Slice::new("slice_a_bar1_bar2.wav", 1, 2, vec![0.1; 200]),
            Slice::new("slice_b_bar1_bar2.wav", 1, 2, vec![0.2; 200]),
        ];
        let ctx = home_only(4, slices, policy);
        let mut firsts = [0usize; 2];
        for seed in 0..64 {
            let mut seq = Sequencer::new(ctx.clone(), StdRng::seed_from_u64(seed));
            seq.step();
            match seq.events()[0] {
                PlayEvent::Slice { slice, .. } => firsts[slice.index()] += 1,
                ref other => panic!("expected a slice, got {other:?}"),
            }
        }
        assert!(firsts[0] > 0 && firsts[1] > 0, "{firsts:?}");
    }

    #[test]
    fn slice_reaching_excursion_end_counts_a_loop() {
        let layout = LayoutBuilder::new()
            .home("home", 4)
            .excursion("away", 3, 2, 3)
            .build()
            .unwrap();
        let originals = BranchMap::from_fn(&layout, |id| vec![0.0; 200 * layout.total_bars(id) as usize]);
        let catalogs = BranchMap::from_fn(&layout, |id| {
            if id.is_home() {
                SliceCatalog::new()
            } else {
                SliceCatalog::from_slices([Slice::new("slice_bar1_bar3.wav", 1, 3, vec![0.5; 400])])
            }
        });
        let policy = ReusePolicy {
            slice_odds: Odds::ALWAYS,
            max_excursion_loops: 2,
            home_return: HomeReturn::LoopLimit,
            ..ReusePolicy::default()
        };
        let ctx = AssemblyContext::new(layout, timeline(), policy, originals, catalogs).unwrap();
        let mut seq = Sequencer::new(ctx, StdRng::seed_from_u64(0));

        // home bar 1, then the switch at bar 2
        seq.step();
        assert!(!seq.state().branch.is_home());
        // slice over bars 1..3 ends on the excursion's last bar
        seq.step();
        assert_eq!(seq.state().bar, 3);
        assert_eq!(seq.state().excursion_loops, 1);
        // the final bar completes the second pass
        seq.step();

        assert_eq!(seq.state().branch, BranchId::Home);
        assert_eq!(seq.state().bar, 3);
        assert!(seq.events().iter().all(|e| !matches!(e, PlayEvent::LoopBack { .. })));
        assert!(matches!(
            seq.events().last(),
            Some(PlayEvent::ReturnHome { resume_bar: 3, .. })
        ));
    }

    #[test]
    fn gated_switch_can_be_refused() {
        let layout = LayoutBuilder::new()
            .home("home", 4)
            .excursion("away", 2, 2, 2)
            .build()
            .unwrap();
        let originals = BranchMap::from_fn(&layout, |id| vec![0.0; 200 * layout.total_bars(id) as usize]);
        let catalogs = BranchMap::from_fn(&layout, |_| SliceCatalog::new());
        let policy = ReusePolicy {
            switch_gate: SwitchGate::Coin(Odds::NEVER),
            ..ReusePolicy::default()
        };
        let ctx = AssemblyContext::new(layout, timeline(), policy, originals, catalogs).unwrap();
        let rendered = assemble(ctx, StdRng::seed_from_u64(3), 60.0).unwrap();
        assert!(rendered.branch_play_order().is_empty());
    }
}
