//! Ordered pass table for one simulation step.
//!
//! A step is the fixed sequence [`PassKind::PIPELINE`]. Each kind maps to a
//! plain function in [`PASS_TABLE`]; [`dispatch`] runs one entry and
//! [`run_step`] runs them all in order. Every pass returns only after all of
//! its parallel work has finished, so the next pass always sees complete
//! results.

use serde::Serialize;

use crate::params::StepParams;
use crate::particle::ParticleState;
use crate::spatial::SpatialIndex;
use crate::sph;

/// One stage of the step pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PassKind {
    /// Gravity and predicted positions.
    ExternalForces,
    /// Cell hash and bucket key per particle.
    SpatialHash,
    /// Bitonic sort of the spatial entries.
    Sort,
    /// Bucket offset table from the sorted entries.
    BuildOffsets,
    /// Density and near density.
    Density,
    /// Pressure and viscosity velocity update.
    PressureViscosity,
    /// Position update and boundary collision.
    IntegratePositions,
}

impl PassKind {
    /// Passes of one step in execution order.
    pub const PIPELINE: [PassKind; 7] = [
        PassKind::ExternalForces,
        PassKind::SpatialHash,
        PassKind::Sort,
        PassKind::BuildOffsets,
        PassKind::Density,
        PassKind::PressureViscosity,
        PassKind::IntegratePositions,
    ];

    /// Short name used in logs.
    pub fn label(self) -> &'static str {
        match self {
            PassKind::ExternalForces => "external_forces",
            PassKind::SpatialHash => "spatial_hash",
            PassKind::Sort => "sort",
            PassKind::BuildOffsets => "build_offsets",
            PassKind::Density => "density",
            PassKind::PressureViscosity => "pressure_viscosity",
            PassKind::IntegratePositions => "integrate_positions",
        }
    }
}

/// Every buffer a pass may touch.
#[derive(Debug)]
pub struct SimulationBuffers {
    /// Per-particle state.
    pub particles: ParticleState,
    /// Spatial hash entries and offset table.
    pub spatial: SpatialIndex,
}

/// Signature shared by all passes.
pub type PassFn = fn(&mut SimulationBuffers, &StepParams);

/// Pass functions indexed by `PassKind as usize`.
pub const PASS_TABLE: [PassFn; 7] = [
    external_forces_pass,
    spatial_hash_pass,
    sort_pass,
    build_offsets_pass,
    density_pass,
    pressure_viscosity_pass,
    integrate_positions_pass,
];

/// Run a single pass.
pub fn dispatch(kind: PassKind, buffers: &mut SimulationBuffers, step: &StepParams) {
    PASS_TABLE[kind as usize](buffers, step);
    tracing::trace!(pass = kind.label(), "pass complete");
}

/// Run every pass of one step in order.
pub fn run_step(buffers: &mut SimulationBuffers, step: &StepParams) {
    for kind in PassKind::PIPELINE {
        dispatch(kind, buffers, step);
    }
}

fn external_forces_pass(buffers: &mut SimulationBuffers, step: &StepParams) {
    sph::external_forces(&mut buffers.particles, step);
}

fn spatial_hash_pass(buffers: &mut SimulationBuffers, step: &StepParams) {
    buffers
        .spatial
        .compute_hashes(&buffers.particles.predicted_position, step.kernels.radius);
}

fn sort_pass(buffers: &mut SimulationBuffers, _step: &StepParams) {
    buffers.spatial.sort_entries();
}

fn build_offsets_pass(buffers: &mut SimulationBuffers, _step: &StepParams) {
    buffers.spatial.build_offsets();
}

fn density_pass(buffers: &mut SimulationBuffers, step: &StepParams) {
    sph::compute_density(&mut buffers.particles, &buffers.spatial, step);
}

fn pressure_viscosity_pass(buffers: &mut SimulationBuffers, step: &StepParams) {
    sph::pressure_viscosity(&mut buffers.particles, &buffers.spatial, step);
}

fn integrate_positions_pass(buffers: &mut SimulationBuffers, step: &StepParams) {
    sph::integrate_positions(&mut buffers.particles, step);
}
