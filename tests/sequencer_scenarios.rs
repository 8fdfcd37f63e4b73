use ramify::branch::{BranchId, BranchMap};
use ramify::builder::LayoutBuilder;
use ramify::catalog::SliceCatalog;
use ramify::context::AssemblyContext;
use ramify::harness::{fast_timeline, flat_slice, reference_context, stepped_recording};
use ramify::policy::{HomeReturn, Odds, ReusePolicy};
use ramify::{assemble, AssemblyError, ConfigError, PlayEvent, Sequencer};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

/// Route sequencer logs through the test harness; `RUST_LOG=debug` shows every unit.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn raw_only_policy() -> ReusePolicy {
    ReusePolicy {
        slice_odds: Odds::NEVER,
        ..ReusePolicy::default()
    }
}

fn excursion_stint(events: &[PlayEvent], nth: usize) -> &[PlayEvent] {
    let switches: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| matches!(e, PlayEvent::BranchSwitch { .. }))
        .map(|(i, _)| i)
        .collect();
    let start = switches[nth];
    let end = events[start..]
        .iter()
        .position(|e| matches!(e, PlayEvent::ReturnHome { .. }))
        .map(|p| start + p)
        .expect("excursion returns home");
    &events[start..=end]
}

#[test]
fn raw_walk_to_entry_bar_then_switch() {
    init_tracing();
    let ctx = reference_context(fast_timeline(), raw_only_policy(), true).unwrap();
    let home_recording = ctx.original(BranchId::Home).to_vec();
    let mut seq = Sequencer::new(ctx, StdRng::seed_from_u64(11));

    for _ in 0..12 {
        seq.step();
    }

    let events = seq.events();
    for (i, event) in events[..12].iter().enumerate() {
        match event {
            PlayEvent::Segment { branch, bar, .. } => {
                assert_eq!(*branch, BranchId::Home);
                assert_eq!(*bar, i as u32 + 1);
            }
            other => panic!("expected raw segment, got {other:?}"),
        }
    }
    let branch2 = seq.context().layout().find("branch2").unwrap();
    match &events[12] {
        PlayEvent::BranchSwitch { to, from_bar, .. } => {
            assert_eq!(BranchId::Excursion(*to), branch2);
            assert_eq!(*from_bar, 13);
        }
        other => panic!("expected branch switch, got {other:?}"),
    }
    assert_eq!(seq.state().branch, branch2);
    assert_eq!(seq.state().bar, 1);
    assert_eq!(seq.output(), &home_recording[..12 * 100]);
}

#[test]
fn empty_catalog_falls_back_to_raw_segments() {
    let ctx = reference_context(fast_timeline(), ReusePolicy::default(), false).unwrap();
    let rendered = assemble(ctx, StdRng::seed_from_u64(5), 600.0).unwrap();
    assert!(rendered.duration_secs() >= 600.0);
    assert!(rendered
        .events
        .iter()
        .all(|e| !matches!(e, PlayEvent::Slice { .. })));
    assert!(rendered
        .events
        .iter()
        .any(|e| matches!(e, PlayEvent::Segment { .. })));
}

#[test]
fn zero_duration_is_rejected() {
    for duration in [0.0, -1.0, f64::NAN] {
        let ctx = reference_context(fast_timeline(), ReusePolicy::default(), true).unwrap();
        let err = assemble(ctx, StdRng::seed_from_u64(0), duration).unwrap_err();
        assert!(matches!(
            err,
            AssemblyError::InvalidConfiguration(ConfigError::NonPositiveDuration(_))
        ));
    }
}

#[test]
fn same_seed_same_output() {
    init_tracing();
    let ctx = reference_context(fast_timeline(), ReusePolicy::default(), true).unwrap();
    let a = assemble(ctx.clone(), StdRng::seed_from_u64(1234), 1_800.0).unwrap();
    let b = assemble(ctx.clone(), StdRng::seed_from_u64(1234), 1_800.0).unwrap();
    assert_eq!(a.samples, b.samples);
    assert_eq!(a.events, b.events);

    let c = assemble(ctx, StdRng::seed_from_u64(4321), 1_800.0).unwrap();
    assert_ne!(a.events, c.events);
}

#[test]
fn excursion_returns_to_resume_bar() {
    let ctx = reference_context(fast_timeline(), raw_only_policy(), false).unwrap();
    let rendered = assemble(ctx, StdRng::seed_from_u64(0), 300.0).unwrap();
    let stint = excursion_stint(&rendered.events, 0);

    let segments = stint
        .iter()
        .filter(|e| matches!(e, PlayEvent::Segment { .. }))
        .count();
    assert_eq!(segments, 31, "one full pass through branch2");
    match stint.last() {
        Some(PlayEvent::ReturnHome { resume_bar, .. }) => assert_eq!(*resume_bar, 13),
        other => panic!("expected return home, got {other:?}"),
    }

    // Back home at bar 13, the rested check refuses an immediate re-entry.
    let after = rendered
        .events
        .iter()
        .skip_while(|e| !matches!(e, PlayEvent::ReturnHome { .. }))
        .nth(1);
    assert!(matches!(
        after,
        Some(PlayEvent::Segment { branch: BranchId::Home, bar: 13, .. })
    ));
}

#[test]
fn loop_limit_allows_repeat_passes() {
    let policy = ReusePolicy {
        max_excursion_loops: 2,
        home_return: HomeReturn::LoopLimit,
        ..raw_only_policy()
    };
    let ctx = reference_context(fast_timeline(), policy, false).unwrap();
    let rendered = assemble(ctx, StdRng::seed_from_u64(0), 400.0).unwrap();
    let stint = excursion_stint(&rendered.events, 0);
    let loop_backs = stint
        .iter()
        .filter(|e| matches!(e, PlayEvent::LoopBack { .. }))
        .count();
    assert_eq!(loop_backs, 1);
}

#[test]
fn visiting_every_excursion_forces_early_return() {
    init_tracing();
    let policy = ReusePolicy {
        max_excursion_loops: 3,
        home_return: HomeReturn::LoopLimitOrAllVisited,
        ..raw_only_policy()
    };
    let ctx = reference_context(fast_timeline(), policy, false).unwrap();
    let rendered = assemble(ctx, StdRng::seed_from_u64(0), 600.0).unwrap();

    let count_loop_backs = |stint: &[PlayEvent]| {
        stint
            .iter()
            .filter(|e| matches!(e, PlayEvent::LoopBack { .. }))
            .count()
    };
    // branch2 first: branch3 never played, so it runs to the loop limit.
    assert_eq!(count_loop_backs(excursion_stint(&rendered.events, 0)), 2);
    // branch3 next: every excursion now has a timestamp, one pass only.
    let second = excursion_stint(&rendered.events, 1);
    assert_eq!(count_loop_backs(second), 0);
    match second.last() {
        Some(PlayEvent::ReturnHome { resume_bar, .. }) => assert_eq!(*resume_bar, 28),
        other => panic!("expected return home, got {other:?}"),
    }
}

#[test]
fn single_branch_layout_never_switches() {
    let timeline = fast_timeline();
    let layout = LayoutBuilder::new().home("original", 41).build().unwrap();
    let originals = BranchMap::from_fn(&layout, |_| stepped_recording(&timeline, 41, 0.0));
    let catalogs = BranchMap::from_fn(&layout, |_| {
        SliceCatalog::from_slices([
            flat_slice(&timeline, "slice_bar1_bar9.wav", 1, 9, 0.3),
            flat_slice(&timeline, "slice_bar20_bar41.wav", 20, 41, 0.4),
        ])
    });
    let policy = ReusePolicy {
        slice_reuse_delay_secs: 15.0 * 60.0,
        ..ReusePolicy::default()
    };
    let ctx = AssemblyContext::new(layout, timeline, policy, originals, catalogs).unwrap();
    let rendered = assemble(ctx, StdRng::seed_from_u64(9), 1_800.0).unwrap();

    assert!(rendered.branch_play_order().is_empty());
    assert!(rendered
        .events
        .iter()
        .any(|e| matches!(e, PlayEvent::LoopBack { branch: BranchId::Home, .. })));
    assert!(!rendered.slice_play_order().is_empty());
}
