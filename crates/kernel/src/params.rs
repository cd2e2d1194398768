//! Simulation parameters.
//!
//! [`FluidParams`] holds the user-facing tuning values and is validated
//! before any buffer is allocated. [`StepParams`] is the per-step snapshot
//! handed to every pass: the timestep plus everything derived from the
//! parameters that would otherwise be recomputed per particle.

use glam::Vec3;

use crate::bounds::BoundingVolume;
use crate::error::KernelError;
use crate::kernels::KernelCoefficients;

/// Tuning parameters of the fluid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FluidParams {
    /// Gravitational acceleration along the world Y axis (negative is down).
    pub gravity: f32,
    /// Fraction of the normal velocity lost on a wall hit, in `[0, 1]`.
    pub collision_damping: f32,
    /// Interaction cutoff and spatial hash cell size.
    pub smoothing_radius: f32,
    /// Density at which pressure is zero.
    pub target_density: f32,
    /// Stiffness of the density-error pressure.
    pub pressure_multiplier: f32,
    /// Stiffness of the near-density pressure that keeps particles apart.
    pub near_pressure_multiplier: f32,
    /// Strength of the velocity-smoothing viscosity.
    pub viscosity_strength: f32,
    /// Container volume.
    pub bounds: BoundingVolume,
    /// Number of spatial hash buckets. `None` uses the particle count.
    pub hash_table_size: Option<usize>,
}

impl Default for FluidParams {
    fn default() -> Self {
        Self {
            gravity: -10.0,
            collision_damping: 0.05,
            smoothing_radius: 0.2,
            target_density: 630.0,
            pressure_multiplier: 288.0,
            near_pressure_multiplier: 2.16,
            viscosity_strength: 0.001,
            bounds: BoundingVolume::default(),
            hash_table_size: None,
        }
    }
}

impl FluidParams {
    /// Check every parameter; the pipeline never runs with invalid values.
    pub fn validate(&self) -> Result<(), KernelError> {
        if !self.smoothing_radius.is_finite() || self.smoothing_radius <= 0.0 {
            return Err(KernelError::InvalidSmoothingRadius(self.smoothing_radius));
        }
        if !(0.0..=1.0).contains(&self.collision_damping) {
            return Err(KernelError::InvalidParameter {
                name: "collision_damping",
                value: self.collision_damping,
            });
        }
        for (name, value) in [
            ("gravity", self.gravity),
            ("target_density", self.target_density),
            ("pressure_multiplier", self.pressure_multiplier),
            ("near_pressure_multiplier", self.near_pressure_multiplier),
            ("viscosity_strength", self.viscosity_strength),
        ] {
            if !value.is_finite() {
                return Err(KernelError::InvalidParameter { name, value });
            }
        }
        if self.hash_table_size == Some(0) {
            return Err(KernelError::InvalidHashTableSize(0));
        }
        Ok(())
    }

    /// Bucket count of the spatial hash for `particle_count` particles.
    pub fn table_size(&self, particle_count: usize) -> usize {
        self.hash_table_size.unwrap_or(particle_count).max(1)
    }
}

/// Everything a pass needs for one step.
#[derive(Debug, Clone, Copy)]
pub struct StepParams {
    /// Timestep in seconds.
    pub dt: f32,
    /// Gravity as a vector.
    pub gravity: Vec3,
    /// Smoothing kernels for the current radius.
    pub kernels: KernelCoefficients,
    /// See [`FluidParams::target_density`].
    pub target_density: f32,
    /// See [`FluidParams::pressure_multiplier`].
    pub pressure_multiplier: f32,
    /// See [`FluidParams::near_pressure_multiplier`].
    pub near_pressure_multiplier: f32,
    /// See [`FluidParams::viscosity_strength`].
    pub viscosity_strength: f32,
    /// See [`FluidParams::collision_damping`].
    pub collision_damping: f32,
    /// See [`FluidParams::bounds`].
    pub bounds: BoundingVolume,
}

impl StepParams {
    /// Snapshot `params` for a step of length `dt`.
    pub fn new(params: &FluidParams, dt: f32) -> Self {
        Self {
            dt,
            gravity: Vec3::new(0.0, params.gravity, 0.0),
            kernels: KernelCoefficients::new(params.smoothing_radius),
            target_density: params.target_density,
            pressure_multiplier: params.pressure_multiplier,
            near_pressure_multiplier: params.near_pressure_multiplier,
            viscosity_strength: params.viscosity_strength,
            collision_damping: params.collision_damping,
            bounds: params.bounds,
        }
    }

    /// Pressure from the density error.
    #[inline]
    pub fn pressure(&self, density: f32) -> f32 {
        (density - self.target_density) * self.pressure_multiplier
    }

    /// Short-range repulsive pressure.
    #[inline]
    pub fn near_pressure(&self, near_density: f32) -> f32 {
        near_density * self.near_pressure_multiplier
    }
}
