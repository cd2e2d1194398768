//! Headless simulation driver
//!
//! Usage: `fluid-sim <config.json> [frames]`
//!
//! Loads a configuration, runs the requested number of frames (or the
//! configuration's `max_frames`, or 600) and logs metrics as it goes.

use std::process::ExitCode;
use std::time::Instant;

use fluid_orchestrator::stepper::FIXED_FRAME_TIME;
use fluid_orchestrator::{build_orchestrator, SimulationConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FRAMES: u64 = 600;

fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "fluid_sim=info,fluid_orchestrator=info,fluid_kernel=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let config_path = args.next().ok_or("usage: fluid-sim <config.json> [frames]")?;
    let frames_arg = args
        .next()
        .map(|s| s.parse::<u64>())
        .transpose()
        .map_err(|e| format!("invalid frame count: {e}"))?;

    let config = SimulationConfig::load(&config_path)?;
    tracing::info!("Configuration loaded: {}", config.name);
    let frames = frames_arg.or(config.max_frames).unwrap_or(DEFAULT_FRAMES);

    let mut orchestrator = build_orchestrator(&config)?;
    let notifications = orchestrator.subscribe(1024);
    orchestrator.start();

    let start = Instant::now();
    let mut last_frame = Instant::now();
    let mut notified = 0usize;

    for frame in 1..=frames {
        let frame_time = if config.fixed_time_step {
            FIXED_FRAME_TIME
        } else {
            let now = Instant::now();
            let elapsed = now.duration_since(last_frame).as_secs_f32();
            last_frame = now;
            elapsed.min(fluid_orchestrator::runner::MAX_FRAME_TIME)
        };

        let report = orchestrator.run_frame(frame_time);
        notified += notifications.try_iter().count();

        if orchestrator.is_corrupted() {
            tracing::warn!(frame, non_finite = report.metrics.non_finite, "stopping: non-finite state");
            break;
        }
        if frame % 60 == 0 {
            tracing::info!(
                frame,
                sim_time = orchestrator.sim_time(),
                max_speed = report.metrics.max_speed,
                mean_density = report.metrics.mean_density,
                "progress"
            );
        }
    }

    let metrics = orchestrator.kernel().metrics();
    tracing::info!(
        frames = orchestrator.frame_count(),
        steps = orchestrator.step_count(),
        notified,
        dropped = orchestrator.dropped_notifications(),
        wall_time = start.elapsed().as_secs_f64(),
        "run complete"
    );
    println!("{}", serde_json::to_string_pretty(&metrics)?);
    Ok(())
}
