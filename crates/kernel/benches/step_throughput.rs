//! Step throughput at increasing particle counts.
//!
//! Run with: cargo bench -p fluid_kernel --bench step_throughput

use std::time::Instant;

use fluid_kernel::{BoundingVolume, FluidKernel, FluidParams, PassKind, SimulationKernel, SpawnData};
use glam::Vec3;

/// Particle cube with spacing matched to the default target density.
fn create_particle_cube(target_count: usize) -> (SpawnData, FluidParams) {
    let n_per_axis = (target_count as f32).cbrt().ceil() as usize;
    let spacing = 0.11_f32;
    let side = spacing * n_per_axis as f32;

    let mut positions = Vec::with_capacity(n_per_axis.pow(3));
    for ix in 0..n_per_axis {
        for iy in 0..n_per_axis {
            for iz in 0..n_per_axis {
                let cell = Vec3::new(ix as f32, iy as f32, iz as f32) + Vec3::splat(0.5);
                positions.push(cell * spacing - Vec3::splat(side * 0.5));
            }
        }
    }

    let params = FluidParams {
        bounds: BoundingVolume::axis_aligned(Vec3::ZERO, Vec3::splat(side * 1.5)).unwrap(),
        ..Default::default()
    };
    (SpawnData::at_rest(positions), params)
}

fn main() {
    println!("=== CPU Step Throughput ===\n");

    // (target particles, steps) -- fewer steps at larger counts
    let configs = [(8_000, 30), (27_000, 15), (64_000, 8), (125_000, 4)];

    println!(
        "{:>10} {:>10} {:>10} {:>12} {:>12}",
        "Particles", "Steps", "Time (s)", "steps/s", "ms/step"
    );

    let dt = 1.0 / 180.0;
    for &(n, steps) in &configs {
        let (spawn, params) = create_particle_cube(n);
        let actual_n = spawn.len();
        let mut kernel = FluidKernel::new(&spawn, params).expect("valid bench setup");

        // Warmup
        for _ in 0..2 {
            kernel.step(dt);
        }

        let start = Instant::now();
        for _ in 0..steps {
            kernel.step(dt);
        }
        let elapsed = start.elapsed().as_secs_f64();

        println!(
            "{:>10} {:>10} {:>10.3} {:>12.1} {:>12.2}",
            actual_n,
            steps,
            elapsed,
            steps as f64 / elapsed,
            elapsed * 1000.0 / steps as f64
        );
    }

    println!("\n=== Per-pass breakdown (64k particles) ===\n");
    let (spawn, params) = create_particle_cube(64_000);
    let mut kernel = FluidKernel::new(&spawn, params).expect("valid bench setup");
    kernel.step(dt);

    let reps = 5;
    for kind in PassKind::PIPELINE {
        let start = Instant::now();
        for _ in 0..reps {
            kernel.run_pass(kind, dt);
        }
        let ms = start.elapsed().as_secs_f64() * 1000.0 / reps as f64;
        println!("{:>22} {:>10.3} ms", kind.label(), ms);
    }
}
