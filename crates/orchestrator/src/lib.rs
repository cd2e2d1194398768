//! Orchestration Layer
//!
//! This crate drives the fluid kernel, including:
//! - JSON configuration loading and validation
//! - Spawn generation (clustered or lattice, seeded)
//! - Frame sequencing with pause, single-step, reset and step notifications
//! - A background simulation runner with lifecycle management

#![warn(missing_docs)]

pub mod config;
pub mod runner;
pub mod spawn;
pub mod stepper;

pub use config::{ConfigError, SimulationConfig};
pub use runner::{ParticleSnapshot, RunnerOptions, RunnerState, SimulationRunner};
pub use spawn::{SpawnConfig, SpawnLayout};
pub use stepper::{FrameReport, FrameSettings, StepCompleted, StepOrchestrator, StepState};

use fluid_kernel::FluidKernel;

/// Create a complete simulation from a configuration file
///
/// This function performs the full simulation setup pipeline:
/// 1. Load and validate the configuration
/// 2. Generate the spawn state
/// 3. Create the fluid kernel
/// 4. Wrap it in a `StepOrchestrator` and a `SimulationRunner`
///
/// # Arguments
/// * `config_path` - Path to the JSON configuration file
///
/// # Returns
/// A `SimulationRunner` ready to be started, or an error if setup fails
///
/// # Example
/// ```no_run
/// use fluid_orchestrator::create_simulation;
///
/// let runner = create_simulation("configs/two_clusters.json")?;
/// runner.start();
/// // ... query status, pause, resume, etc.
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn create_simulation(config_path: &str) -> Result<SimulationRunner, Box<dyn std::error::Error>> {
    tracing::info!("Creating simulation from config: {}", config_path);

    let config = SimulationConfig::load(config_path)?;
    tracing::info!("Configuration loaded: {}", config.name);

    let orchestrator = build_orchestrator(&config)?;

    tracing::info!("Creating simulation runner...");
    let runner = SimulationRunner::new(orchestrator, RunnerOptions::from_config(&config));

    tracing::info!("Simulation ready to start");
    Ok(runner)
}

/// Build a kernel and its orchestrator from a validated configuration
pub fn build_orchestrator(
    config: &SimulationConfig,
) -> Result<StepOrchestrator, Box<dyn std::error::Error>> {
    let spawn = config.spawn.generate();
    tracing::info!("Spawned {} particles", spawn.len());

    let params = config.fluid_params()?;
    let kernel = FluidKernel::new(&spawn, params)?;

    Ok(StepOrchestrator::new(
        Box::new(kernel),
        FrameSettings::from_config(config),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_orchestrator_from_json() {
        let config = SimulationConfig::from_json(
            r#"{
                "name": "tiny",
                "iterations_per_frame": 2,
                "spawn": { "particles_per_axis": 3, "jitter_strength": 0.2, "seed": 5 }
            }"#,
        )
        .unwrap();
        let mut orchestrator = build_orchestrator(&config).unwrap();
        assert_eq!(orchestrator.kernel().particle_count(), 27);

        orchestrator.start();
        let report = orchestrator.run_frame(stepper::FIXED_FRAME_TIME);
        assert_eq!(report.steps_run, 2);
        assert!(report.metrics.is_finite());
    }

    #[test]
    fn test_create_simulation_missing_file() {
        assert!(create_simulation("/nonexistent/config.json").is_err());
    }
}
