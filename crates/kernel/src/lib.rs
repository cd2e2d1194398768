//! SPH Fluid Simulation Kernel
//!
//! This crate provides the per-step core of a real-time particle-based
//! (Smoothed Particle Hydrodynamics) fluid solver. It owns the particle
//! buffers and advances them one step at a time; scheduling, configuration
//! files and spawning live in the orchestrator crate.
//!
//! # Modules
//! - [`particle`] -- Struct-of-arrays particle state and spawn input.
//! - [`sort`] -- Data-parallel bitonic sort of keyed records.
//! - [`spatial`] -- Hashed uniform-grid index and bucket offset table.
//! - [`kernels`] -- Spiky and poly6 smoothing kernels.
//! - [`sph`] -- External forces, density, pressure/viscosity and integration passes.
//! - [`pipeline`] -- `PassKind` and the table of pass functions.
//! - [`bounds`] -- Oriented bounding volume and collision response.
//! - [`params`] -- Fluid parameters and per-step snapshots.
//! - [`error`] -- `KernelError`.

#![warn(missing_docs)]

pub mod bounds;
pub mod error;
pub mod kernels;
pub mod params;
pub mod particle;
pub mod pipeline;
pub mod sort;
pub mod spatial;
pub mod sph;

use glam::{Vec2, Vec3};
use rayon::prelude::*;
use serde::Serialize;

pub use bounds::BoundingVolume;
pub use error::KernelError;
pub use kernels::{KernelCoefficients, EPSILON};
pub use params::{FluidParams, StepParams};
pub use particle::{ParticleState, SpawnData};
pub use pipeline::{PassKind, SimulationBuffers};
pub use sort::bitonic_sort;
pub use spatial::{SpatialEntry, SpatialIndex};

// ---------------------------------------------------------------------------
// SimulationKernel trait
// ---------------------------------------------------------------------------

/// Aggregate health metrics for a simulation snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FluidMetrics {
    /// Largest particle speed.
    pub max_speed: f32,
    /// Mean density over all particles.
    pub mean_density: f32,
    /// Largest density.
    pub max_density: f32,
    /// Particles with a NaN or infinite position, velocity or density.
    pub non_finite: usize,
}

impl FluidMetrics {
    /// Returns `true` if no particle holds a non-finite value.
    pub fn is_finite(&self) -> bool {
        self.non_finite == 0
    }
}

/// Trait implemented by simulation back-ends.
///
/// A `SimulationKernel` owns particle data and advances it through the
/// passes of [`PassKind::PIPELINE`] each time-step:
///
/// 1. External forces and position prediction
/// 2. Spatial hash, sort and offset table
/// 3. Density
/// 4. Pressure and viscosity
/// 5. Integration with boundary collision
pub trait SimulationKernel {
    /// Execute one simulation step of duration `dt` seconds.
    fn step(&mut self, dt: f32);

    /// Number of particles in the simulation.
    fn particle_count(&self) -> usize;

    /// Current positions.
    fn positions(&self) -> &[Vec3];

    /// Current velocities.
    fn velocities(&self) -> &[Vec3];

    /// `(density, near_density)` from the last step.
    fn densities(&self) -> &[Vec2];

    /// Restore the spawn state.
    fn reset(&mut self) -> Result<(), KernelError>;

    /// Get current health metrics.
    fn metrics(&self) -> FluidMetrics;
}

// ---------------------------------------------------------------------------
// FluidKernel
// ---------------------------------------------------------------------------

/// CPU implementation of the SPH kernel, parallelised with rayon.
#[derive(Debug)]
pub struct FluidKernel {
    /// Particle buffers and spatial index.
    buffers: SimulationBuffers,
    /// Current fluid parameters (always valid).
    params: FluidParams,
    /// Initial state restored by [`SimulationKernel::reset`].
    spawn: SpawnData,
    /// Steps run since construction or the last reset.
    steps: u64,
}

impl FluidKernel {
    /// Validate `params` and `spawn`, then allocate every buffer.
    pub fn new(spawn: &SpawnData, params: FluidParams) -> Result<Self, KernelError> {
        params.validate()?;
        let particles = ParticleState::from_spawn(spawn)?;
        let n = particles.len();
        let spatial = SpatialIndex::new(n, params.table_size(n))?;

        tracing::info!(
            particles = n,
            table_size = spatial.table_size(),
            smoothing_radius = params.smoothing_radius,
            "fluid kernel created"
        );

        Ok(Self {
            buffers: SimulationBuffers { particles, spatial },
            params,
            spawn: spawn.clone(),
            steps: 0,
        })
    }

    /// Run a single pass with timestep `dt`.
    pub fn run_pass(&mut self, kind: PassKind, dt: f32) {
        let step = StepParams::new(&self.params, dt);
        pipeline::dispatch(kind, &mut self.buffers, &step);
    }

    /// Current parameters.
    pub fn params(&self) -> &FluidParams {
        &self.params
    }

    /// Replace the parameters. They take effect from the next step.
    ///
    /// A different hash table size reallocates the spatial index.
    pub fn set_params(&mut self, params: FluidParams) -> Result<(), KernelError> {
        params.validate()?;
        let n = self.buffers.particles.len();
        let table_size = params.table_size(n);
        if table_size != self.buffers.spatial.table_size() {
            self.buffers.spatial = SpatialIndex::new(n, table_size)?;
            tracing::debug!(table_size, "spatial index reallocated");
        }
        self.params = params;
        Ok(())
    }

    /// Replace the stored spawn state and reset to it. The particle count
    /// must not change.
    pub fn reset_to(&mut self, spawn: SpawnData) -> Result<(), KernelError> {
        self.buffers.particles.reset(&spawn)?;
        self.spawn = spawn;
        self.steps = 0;
        tracing::info!(particles = self.spawn.len(), "fluid kernel reset");
        Ok(())
    }

    /// Spawn state used by [`SimulationKernel::reset`].
    pub fn spawn(&self) -> &SpawnData {
        &self.spawn
    }

    /// Steps run since construction or the last reset.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Full particle state.
    pub fn particles(&self) -> &ParticleState {
        &self.buffers.particles
    }

    /// Predicted positions from the last external-forces pass.
    pub fn predicted_positions(&self) -> &[Vec3] {
        &self.buffers.particles.predicted_position
    }

    /// Spatial hash entries in their current order.
    pub fn spatial_entries(&self) -> &[SpatialEntry] {
        self.buffers.spatial.entries()
    }

    /// Spatial index built in the last step.
    pub fn spatial(&self) -> &SpatialIndex {
        &self.buffers.spatial
    }

    /// Copy of the bucket offset table.
    pub fn offset_table(&self) -> Vec<u32> {
        self.buffers.spatial.offset_table()
    }

    /// Release every buffer except the particle state, which is returned.
    pub fn teardown(self) -> ParticleState {
        tracing::info!(steps = self.steps, "fluid kernel torn down");
        self.buffers.particles
    }
}

impl SimulationKernel for FluidKernel {
    fn step(&mut self, dt: f32) {
        let step = StepParams::new(&self.params, dt);
        pipeline::run_step(&mut self.buffers, &step);
        self.steps += 1;
        tracing::trace!(step = self.steps, dt, "step complete");
    }

    fn particle_count(&self) -> usize {
        self.buffers.particles.len()
    }

    fn positions(&self) -> &[Vec3] {
        &self.buffers.particles.position
    }

    fn velocities(&self) -> &[Vec3] {
        &self.buffers.particles.velocity
    }

    fn densities(&self) -> &[Vec2] {
        &self.buffers.particles.density
    }

    fn reset(&mut self) -> Result<(), KernelError> {
        self.buffers.particles.reset(&self.spawn)?;
        self.steps = 0;
        tracing::info!(particles = self.spawn.len(), "fluid kernel reset");
        Ok(())
    }

    fn metrics(&self) -> FluidMetrics {
        let p = &self.buffers.particles;
        let (max_speed, density_sum, max_density, non_finite) = p
            .position
            .par_iter()
            .zip(p.velocity.par_iter())
            .zip(p.density.par_iter())
            .map(|((pos, vel), dens)| {
                if pos.is_finite() && vel.is_finite() && dens.is_finite() {
                    (vel.length(), dens.x as f64, dens.x, 0usize)
                } else {
                    (0.0, 0.0, 0.0, 1)
                }
            })
            .reduce(
                || (0.0_f32, 0.0_f64, 0.0_f32, 0usize),
                |a, b| (a.0.max(b.0), a.1 + b.1, a.2.max(b.2), a.3 + b.3),
            );

        let finite = p.len() - non_finite;
        FluidMetrics {
            max_speed,
            mean_density: if finite > 0 {
                (density_sum / finite as f64) as f32
            } else {
                0.0
            },
            max_density,
            non_finite,
        }
    }
}
