//! Per-particle storage.
//!
//! Struct-of-arrays layout: index `i` across every array refers to the same
//! particle. All arrays are allocated once, sized by the spawn input, and
//! never change length afterwards.

use glam::{Vec2, Vec3};

use crate::error::KernelError;

/// Initial particle placement supplied by the caller.
///
/// Positions and velocities are paired by index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpawnData {
    /// Initial positions.
    pub positions: Vec<Vec3>,
    /// Initial velocities.
    pub velocities: Vec<Vec3>,
}

impl SpawnData {
    /// Pair up positions and velocities.
    pub fn new(positions: Vec<Vec3>, velocities: Vec<Vec3>) -> Self {
        Self { positions, velocities }
    }

    /// Particles at `positions`, all at rest.
    pub fn at_rest(positions: Vec<Vec3>) -> Self {
        let velocities = vec![Vec3::ZERO; positions.len()];
        Self { positions, velocities }
    }

    /// Number of particles.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Return `true` if there are no particles.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Check that the spawn data can seed a simulation.
    pub fn validate(&self) -> Result<(), KernelError> {
        if self.positions.len() != self.velocities.len() {
            return Err(KernelError::SpawnLengthMismatch {
                positions: self.positions.len(),
                velocities: self.velocities.len(),
            });
        }
        if self.positions.is_empty() {
            return Err(KernelError::EmptySpawn);
        }
        if u32::try_from(self.positions.len()).is_err() {
            return Err(KernelError::TooManyParticles(self.positions.len()));
        }
        Ok(())
    }
}

/// Struct-of-arrays particle state owned by the kernel.
#[derive(Debug, Clone)]
pub struct ParticleState {
    /// Authoritative positions; written only by the integrate pass.
    pub position: Vec<Vec3>,
    /// Look-ahead positions used for every neighbor query in a step.
    pub predicted_position: Vec<Vec3>,
    /// Velocities.
    pub velocity: Vec<Vec3>,
    /// `(density, near_density)` recomputed every step.
    pub density: Vec<Vec2>,
    /// Per-particle velocity change staged by the pressure/viscosity pass so
    /// that neighbors read pre-pass velocities.
    pub(crate) velocity_delta: Vec<Vec3>,
}

impl ParticleState {
    /// Allocate every buffer for `spawn.len()` particles and load the spawn
    /// state. Densities start at zero.
    pub fn from_spawn(spawn: &SpawnData) -> Result<Self, KernelError> {
        spawn.validate()?;
        let n = spawn.len();

        let mut state = Self {
            position: allocate("position", n)?,
            predicted_position: allocate("predicted_position", n)?,
            velocity: allocate("velocity", n)?,
            density: allocate("density", n)?,
            velocity_delta: allocate("velocity_delta", n)?,
        };
        state.position.extend_from_slice(&spawn.positions);
        state.predicted_position.extend_from_slice(&spawn.positions);
        state.velocity.extend_from_slice(&spawn.velocities);
        state.density.resize(n, Vec2::ZERO);
        state.velocity_delta.resize(n, Vec3::ZERO);
        Ok(state)
    }

    /// Overwrite positions, predicted positions and velocities in place from
    /// `spawn`, which must have the same particle count.
    pub fn reset(&mut self, spawn: &SpawnData) -> Result<(), KernelError> {
        spawn.validate()?;
        if spawn.len() != self.len() {
            return Err(KernelError::ParticleCountMismatch {
                expected: self.len(),
                actual: spawn.len(),
            });
        }
        self.position.copy_from_slice(&spawn.positions);
        self.predicted_position.copy_from_slice(&spawn.positions);
        self.velocity.copy_from_slice(&spawn.velocities);
        self.density.fill(Vec2::ZERO);
        self.velocity_delta.fill(Vec3::ZERO);
        Ok(())
    }

    /// Number of particles.
    pub fn len(&self) -> usize {
        self.position.len()
    }

    /// Return `true` if there are no particles.
    pub fn is_empty(&self) -> bool {
        self.position.is_empty()
    }
}

pub(crate) fn allocate<T>(buffer: &'static str, len: usize) -> Result<Vec<T>, KernelError> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|_| KernelError::Allocation { buffer, len })?;
    Ok(v)
}
