use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use glam::{Vec2, Vec3};

use shoal::{
    ComputeBackend, CpuBackend, FixedClock, Flock, FlockingConfig, NullSink, PointerSample, Result,
    TargetInput, TargetSource, WgpuBackend,
};

/// Viewport the synthetic pointer sweeps across, in pixels.
const VIEWPORT: Vec2 = Vec2::new(1280.0, 720.0);

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BackendKind {
    Cpu,
    Gpu,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless boids flocking runner", long_about = None)]
struct Args {
    /// Flocking config as JSON; defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Compute backend
    #[arg(short, long, value_enum, default_value = "cpu")]
    backend: BackendKind,

    /// Number of fixed ticks to run
    #[arg(short, long, default_value_t = 500)]
    ticks: u64,

    /// Fixed timestep in seconds
    #[arg(long, default_value_t = shoal::clock::DEFAULT_FIXED_DELTA)]
    dt: f32,

    /// Override the agent count
    #[arg(short, long)]
    agents: Option<u32>,

    /// Override the seeding RNG seed
    #[arg(long)]
    seed: Option<u64>,

    /// Seek a fixed point "X,Y,Z" instead of the swept pointer
    #[arg(long, value_parser = parse_vec3)]
    tracked: Option<Vec3>,

    /// Pace ticks against wall time instead of running flat out
    #[arg(long)]
    realtime: bool,

    /// Write the effective config to this file before running
    #[arg(long)]
    save_config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn parse_vec3(s: &str) -> std::result::Result<Vec3, String> {
    let parts: Vec<f32> = s
        .split(',')
        .map(|p| p.trim().parse::<f32>().map_err(|e| format!("{p:?}: {e}")))
        .collect::<std::result::Result<_, _>>()?;
    match parts.as_slice() {
        &[x, y, z] => Ok(Vec3::new(x, y, z)),
        _ => Err(format!("expected X,Y,Z, got {s:?}")),
    }
}

/// Pointer circling the viewport center.
fn swept_pointer(tick: u64) -> PointerSample {
    let angle = tick as f32 * 0.01;
    let offset = Vec2::new(angle.cos(), angle.sin()) * VIEWPORT * 0.35;
    PointerSample::new(VIEWPORT * 0.5 + offset, VIEWPORT)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut config = match &args.config {
        Some(path) => {
            log::info!("Loading config from {}", path.display());
            FlockingConfig::load(path)?
        }
        None => FlockingConfig::default(),
    };
    if let Some(agents) = args.agents {
        config.set_agent_count(agents);
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if args.tracked.is_some() {
        config.target.source = TargetSource::Tracked;
    }
    config.validate()?;

    if let Some(path) = &args.save_config {
        config.save(path)?;
        log::info!("Saved config to {}", path.display());
    }

    match args.backend {
        BackendKind::Cpu => run(CpuBackend::new(), &config, &args),
        BackendKind::Gpu => run(WgpuBackend::new_blocking()?, &config, &args),
    }
}

fn run<B: ComputeBackend>(backend: B, config: &FlockingConfig, args: &Args) -> Result<()> {
    let mut flock = Flock::new(backend, config);
    let mut sink = NullSink;
    let count = flock.start(config, &mut sink)?;
    log::info!(
        "Running {} ticks of {} agents at dt={}s",
        args.ticks,
        count,
        args.dt
    );

    let mut clock = FixedClock::new(args.dt);
    let mut tick = 0;
    while tick < args.ticks {
        let due = if args.realtime {
            std::thread::sleep(Duration::from_secs_f32(clock.fixed_delta() * 0.5));
            clock.update()
        } else {
            clock.advance(clock.fixed_delta())
        };

        for _ in 0..due {
            if tick >= args.ticks {
                break;
            }
            let input = match args.tracked {
                Some(position) => TargetInput::tracked(position),
                None => TargetInput::pointer(swept_pointer(tick)),
            };
            flock.tick(clock.fixed_delta(), config, &input, &mut sink)?;
            tick += 1;
        }
    }

    let positions = flock.read_positions()?;
    let velocities = flock.read_velocities()?;
    let n = positions.len().max(1) as f32;
    let centroid = positions.iter().copied().sum::<Vec3>() / n;
    let mean_speed = velocities.iter().map(|v| v.length()).sum::<f32>() / n;
    let target = flock.last_target();

    let stats = flock.stats();
    log::info!(
        "Done: {} ticks, {} dispatches, {} skipped, {} resets",
        stats.ticks,
        stats.dispatches,
        stats.skipped,
        stats.resets
    );
    log::info!(
        "Mean speed {:.3}, centroid ({:.3}, {:.3}, {:.3}), {:.3} from target ({:.2}, {:.2}, {:.2})",
        mean_speed,
        centroid.x,
        centroid.y,
        centroid.z,
        centroid.distance(target),
        target.x,
        target.y,
        target.z
    );

    flock.release();
    Ok(())
}
