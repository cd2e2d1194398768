//! With gravity, pressure, near pressure and viscosity all zero, a step must
//! leave every velocity exactly unchanged.

use fluid_kernel::{FluidKernel, FluidParams, SimulationKernel, SpawnData};
use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

#[test]
fn velocities_unchanged_without_forces() {
    let mut rng = ChaCha8Rng::seed_from_u64(2024);
    let n = 400;
    let positions: Vec<Vec3> = (0..n)
        .map(|_| Vec3::new(rng.gen_range(-0.5..0.5), rng.gen_range(-0.5..0.5), rng.gen_range(-0.5..0.5)))
        .collect();
    let velocities: Vec<Vec3> = (0..n)
        .map(|_| Vec3::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)))
        .collect();

    let params = FluidParams {
        gravity: 0.0,
        pressure_multiplier: 0.0,
        near_pressure_multiplier: 0.0,
        viscosity_strength: 0.0,
        ..Default::default()
    };
    let mut kernel = FluidKernel::new(&SpawnData::new(positions.clone(), velocities.clone()), params).unwrap();

    let dt = 1.0 / 60.0;
    kernel.step(dt);

    assert_eq!(kernel.velocities(), velocities.as_slice());
    for (i, (&p, &v)) in positions.iter().zip(&velocities).enumerate() {
        let moved = kernel.positions()[i];
        assert!((moved - (p + v * dt)).length() < 1.0e-6, "particle {i} drifted");
    }
    assert!(kernel.densities().iter().all(|d| d.x > 0.0 && d.y > 0.0));
}
