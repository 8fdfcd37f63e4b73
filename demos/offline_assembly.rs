use ramify::harness::reference_context;
use ramify::policy::ReusePolicy;
use ramify::sink::{OutputSink, WavSink};
use ramify::timeline::Timeline;
use ramify::assemble;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

fn main() -> ramify::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Synthetic stepped recordings on the reference three-branch layout.
    let ctx = reference_context(Timeline::default(), ReusePolicy::default(), true)?;
    let layout = ctx.layout().clone();

    let rendered = assemble(ctx, StdRng::seed_from_u64(2024), 120.0)?;

    let path = std::env::temp_dir().join("ramify_offline_assembly.wav");
    WavSink::new(&path).write(&rendered.samples, rendered.sample_rate)?;

    let order: Vec<&str> = rendered
        .branch_play_order()
        .into_iter()
        .map(|x| layout.name(ramify::branch::BranchId::Excursion(x)))
        .collect();
    println!(
        "Offline assembly: {:.1} s, {} slices, branches {:?} -> {}",
        rendered.duration_secs(),
        rendered.slice_play_order().len(),
        order,
        path.display()
    );
    Ok(())
}
