//! Physics passes of one simulation step.
//!
//! Every pass is a single data-parallel sweep in which each task writes only
//! its own particle's slots. All neighbor queries use predicted positions and
//! the spatial index built from them in the same step.

use glam::{Vec2, Vec3};
use rayon::prelude::*;

use crate::kernels::EPSILON;
use crate::params::StepParams;
use crate::particle::ParticleState;
use crate::spatial::SpatialIndex;

// ---------------------------------------------------------------------------
// External forces
// ---------------------------------------------------------------------------

/// Apply gravity and predict where each particle is heading.
///
/// ```text
/// v_i += g * dt
/// predicted_i = x_i + v_i * dt
/// ```
pub fn external_forces(particles: &mut ParticleState, step: &StepParams) {
    let ParticleState {
        position,
        predicted_position,
        velocity,
        ..
    } = particles;
    let dv = step.gravity * step.dt;

    velocity
        .par_iter_mut()
        .zip(predicted_position.par_iter_mut())
        .zip(position.par_iter())
        .for_each(|((vel, predicted), &pos)| {
            *vel += dv;
            *predicted = pos + *vel * step.dt;
        });
}

// ---------------------------------------------------------------------------
// Density
// ---------------------------------------------------------------------------

/// Density and near density at every predicted position.
///
/// ```text
/// density_i      = sum_j spiky_pow2(|p_i - p_j|)
/// near_density_i = sum_j spiky_pow3(|p_i - p_j|)
/// ```
///
/// The sum runs over every particle within the smoothing radius, including
/// `i` itself, so an isolated particle still has a positive density.
pub fn compute_density(particles: &mut ParticleState, spatial: &SpatialIndex, step: &StepParams) {
    let predicted = &particles.predicted_position;
    let kernels = &step.kernels;

    particles
        .density
        .par_iter_mut()
        .enumerate()
        .for_each(|(i, out)| {
            let pos = predicted[i];
            let mut density = 0.0;
            let mut near_density = 0.0;

            spatial.for_each_candidate(pos, kernels.radius, |j| {
                let sqr_dst = (predicted[j] - pos).length_squared();
                if sqr_dst > kernels.radius_sq {
                    return;
                }
                let dst = sqr_dst.sqrt();
                density += kernels.spiky_pow2(dst);
                near_density += kernels.spiky_pow3(dst);
            });

            *out = Vec2::new(density, near_density);
        });
}

// ---------------------------------------------------------------------------
// Pressure and viscosity
// ---------------------------------------------------------------------------

/// Accumulate pressure and viscosity forces and update velocities.
///
/// Pressure between a pair uses the mean of both particles' pressures:
///
/// ```text
/// F_p  = sum_j dir_ij * W2'(d) * (P_i + P_j) / 2 / rho_j
///      + sum_j dir_ij * W3'(d) * (N_i + N_j) / 2 / near_j
/// F_v  = sum_j (v_j - v_i) * poly6(d)
/// v_i += (F_p / rho_i + F_v * viscosity_strength) * dt
/// ```
///
/// Velocity changes are staged in the scratch buffer and applied afterwards,
/// so every particle reads its neighbors' velocities from before the pass.
pub fn pressure_viscosity(
    particles: &mut ParticleState,
    spatial: &SpatialIndex,
    step: &StepParams,
) {
    let ParticleState {
        predicted_position,
        velocity,
        density,
        velocity_delta,
        ..
    } = particles;
    let predicted = &*predicted_position;
    let velocities = &*velocity;
    let densities = &*density;
    let kernels = &step.kernels;

    velocity_delta
        .par_iter_mut()
        .enumerate()
        .for_each(|(i, delta)| {
            let pos = predicted[i];
            let vel = velocities[i];
            let own = densities[i];
            let pressure = step.pressure(own.x);
            let near_pressure = step.near_pressure(own.y);

            let mut pressure_force = Vec3::ZERO;
            let mut viscosity_force = Vec3::ZERO;

            spatial.for_each_candidate(pos, kernels.radius, |j| {
                if j == i {
                    return;
                }
                let offset = predicted[j] - pos;
                let sqr_dst = offset.length_squared();
                if sqr_dst > kernels.radius_sq {
                    return;
                }
                let dst = sqr_dst.sqrt();
                let dir = if dst < EPSILON { Vec3::Y } else { offset / dst };

                let neighbor = densities[j];
                if neighbor.x >= EPSILON {
                    let shared = (pressure + step.pressure(neighbor.x)) * 0.5;
                    pressure_force += dir * kernels.spiky_pow2_derivative(dst) * shared / neighbor.x;
                }
                if neighbor.y >= EPSILON {
                    let shared = (near_pressure + step.near_pressure(neighbor.y)) * 0.5;
                    pressure_force += dir * kernels.spiky_pow3_derivative(dst) * shared / neighbor.y;
                }

                viscosity_force += (velocities[j] - vel) * kernels.poly6(dst);
            });

            let pressure_accel = if own.x >= EPSILON {
                pressure_force / own.x
            } else {
                Vec3::ZERO
            };
            *delta = (pressure_accel + viscosity_force * step.viscosity_strength) * step.dt;
        });

    velocity
        .par_iter_mut()
        .zip(velocity_delta.par_iter())
        .for_each(|(vel, &dv)| *vel += dv);
}

// ---------------------------------------------------------------------------
// Integration
// ---------------------------------------------------------------------------

/// Advance positions and resolve collisions with the bounding volume.
pub fn integrate_positions(particles: &mut ParticleState, step: &StepParams) {
    let ParticleState {
        position, velocity, ..
    } = particles;

    position
        .par_iter_mut()
        .zip(velocity.par_iter_mut())
        .for_each(|(pos, vel)| {
            *pos += *vel * step.dt;
            step.bounds
                .resolve_collision(pos, vel, step.collision_damping);
        });
}
