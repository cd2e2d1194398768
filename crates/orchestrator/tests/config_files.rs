//! Shipped configuration files load, build and run a few frames.

use fluid_orchestrator::stepper::FIXED_FRAME_TIME;
use fluid_orchestrator::{build_orchestrator, SimulationConfig, SpawnLayout};

fn config_path(name: &str) -> String {
    format!("{}/../../configs/{name}", env!("CARGO_MANIFEST_DIR"))
}

#[test]
fn shipped_configs_are_valid() {
    let clusters = SimulationConfig::load(&config_path("two_clusters.json")).unwrap();
    assert_eq!(clusters.spawn.centres.len(), 2);
    assert_eq!(clusters.spawn.particle_count(), 24 * 24 * 24);

    let lattice = SimulationConfig::load(&config_path("lattice_block.json")).unwrap();
    assert_eq!(lattice.spawn.layout, SpawnLayout::Lattice { size: 1.7 });
    assert_eq!(lattice.time_scale, 1.0);
}

#[test]
fn lattice_config_runs() {
    let mut config = SimulationConfig::load(&config_path("lattice_block.json")).unwrap();
    config.spawn.particles_per_axis = 6;
    let mut orchestrator = build_orchestrator(&config).unwrap();
    orchestrator.start();
    for _ in 0..10 {
        orchestrator.run_frame(FIXED_FRAME_TIME);
    }
    assert_eq!(orchestrator.step_count(), 30);
    assert!(!orchestrator.is_corrupted());
}
