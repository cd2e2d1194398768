//! Oriented bounding volume that contains the fluid.
//!
//! The volume is a unit cube (half-extent 0.5) in its own local frame.
//! An affine local-to-world transform places, scales and orients it, so
//! collision tests run in local space where every face sits at `±0.5`.

use glam::{Affine3A, EulerRot, Quat, Vec3};

use crate::error::KernelError;

/// Half-extent of the container in its local frame.
pub const LOCAL_HALF_EXTENT: f32 = 0.5;

/// Container volume for the particles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingVolume {
    local_to_world: Affine3A,
    world_to_local: Affine3A,
}

impl BoundingVolume {
    /// Create a volume centered at `center` with full edge lengths `size`,
    /// rotated by `rotation`.
    pub fn new(center: Vec3, size: Vec3, rotation: Quat) -> Result<Self, KernelError> {
        if !center.is_finite() || !size.is_finite() || !rotation.is_finite() {
            return Err(KernelError::MalformedBounds(
                "center, size and rotation must be finite".into(),
            ));
        }
        if size.min_element() <= 0.0 {
            return Err(KernelError::MalformedBounds(format!(
                "size must be positive on every axis, got {size}"
            )));
        }
        if rotation.length_squared() < 1.0e-12 {
            return Err(KernelError::MalformedBounds("rotation quaternion is zero".into()));
        }
        Self::from_affine(Affine3A::from_scale_rotation_translation(
            size,
            rotation.normalize(),
            center,
        ))
    }

    /// Axis-aligned volume.
    pub fn axis_aligned(center: Vec3, size: Vec3) -> Result<Self, KernelError> {
        Self::new(center, size, Quat::IDENTITY)
    }

    /// Volume rotated by XYZ Euler angles given in degrees.
    pub fn from_euler_degrees(center: Vec3, size: Vec3, degrees: Vec3) -> Result<Self, KernelError> {
        let rotation = Quat::from_euler(
            EulerRot::XYZ,
            degrees.x.to_radians(),
            degrees.y.to_radians(),
            degrees.z.to_radians(),
        );
        Self::new(center, size, rotation)
    }

    /// Volume described by an arbitrary affine local-to-world transform.
    ///
    /// The transform must be finite and invertible.
    pub fn from_affine(local_to_world: Affine3A) -> Result<Self, KernelError> {
        let det = local_to_world.matrix3.determinant();
        if !det.is_finite() || det.abs() < 1.0e-12 || !local_to_world.translation.is_finite() {
            return Err(KernelError::MalformedBounds(format!(
                "local-to-world transform is not invertible (det = {det})"
            )));
        }
        Ok(Self {
            local_to_world,
            world_to_local: local_to_world.inverse(),
        })
    }

    /// Transform from the container's local frame to world space.
    pub fn local_to_world(&self) -> Affine3A {
        self.local_to_world
    }

    /// Transform from world space to the container's local frame.
    pub fn world_to_local(&self) -> Affine3A {
        self.world_to_local
    }

    /// Returns `true` if `position` lies inside or on the container.
    pub fn contains(&self, position: Vec3) -> bool {
        let local = self.world_to_local.transform_point3(position);
        local.abs().max_element() <= LOCAL_HALF_EXTENT
    }

    /// Clamp a particle that left the container back onto the violated face
    /// and reflect the matching velocity component, scaled by
    /// `1 - collision_damping`.
    ///
    /// Returns `true` if any axis was resolved.
    pub fn resolve_collision(
        &self,
        position: &mut Vec3,
        velocity: &mut Vec3,
        collision_damping: f32,
    ) -> bool {
        let mut local_pos = self.world_to_local.transform_point3(*position);
        let mut local_vel = self.world_to_local.transform_vector3(*velocity);
        let mut hit = false;

        for axis in 0..3 {
            if local_pos[axis].abs() > LOCAL_HALF_EXTENT {
                local_pos[axis] = LOCAL_HALF_EXTENT * local_pos[axis].signum();
                local_vel[axis] = -local_vel[axis] * (1.0 - collision_damping);
                hit = true;
            }
        }

        if hit {
            *position = self.local_to_world.transform_point3(local_pos);
            *velocity = self.local_to_world.transform_vector3(local_vel);
        }
        hit
    }
}

impl Default for BoundingVolume {
    /// Axis-aligned 4 x 4 x 4 box centered at the origin.
    fn default() -> Self {
        Self {
            local_to_world: Affine3A::from_scale(Vec3::splat(4.0)),
            world_to_local: Affine3A::from_scale(Vec3::splat(0.25)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_degenerate_size() {
        assert!(BoundingVolume::axis_aligned(Vec3::ZERO, Vec3::new(1.0, 0.0, 1.0)).is_err());
        assert!(BoundingVolume::axis_aligned(Vec3::ZERO, Vec3::splat(-1.0)).is_err());
        assert!(BoundingVolume::axis_aligned(Vec3::splat(f32::NAN), Vec3::ONE).is_err());
    }

    #[test]
    fn rejects_singular_affine() {
        let flat = Affine3A::from_scale(Vec3::new(1.0, 1.0, 0.0));
        assert!(BoundingVolume::from_affine(flat).is_err());
    }

    #[test]
    fn inside_particle_untouched() {
        let bounds = BoundingVolume::axis_aligned(Vec3::ZERO, Vec3::splat(2.0)).unwrap();
        let mut p = Vec3::new(0.5, -0.5, 0.9);
        let mut v = Vec3::new(1.0, 2.0, 3.0);
        assert!(!bounds.resolve_collision(&mut p, &mut v, 0.1));
        assert_eq!(p, Vec3::new(0.5, -0.5, 0.9));
        assert_eq!(v, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn floor_hit_reflects_y_only() {
        let bounds = BoundingVolume::axis_aligned(Vec3::new(0.0, 1.0, 0.0), Vec3::splat(2.0)).unwrap();
        let mut p = Vec3::new(0.2, -0.1, 0.0);
        let mut v = Vec3::new(0.5, -4.0, 0.0);
        assert!(bounds.resolve_collision(&mut p, &mut v, 0.25));
        assert!((p.y - 0.0).abs() < 1.0e-6, "clamped to floor, got {p}");
        assert!((p.x - 0.2).abs() < 1.0e-6);
        assert!((v.y - 3.0).abs() < 1.0e-5, "reflected and damped, got {v}");
        assert!((v.x - 0.5).abs() < 1.0e-6);
    }

    #[test]
    fn rotated_volume_contains() {
        let bounds = BoundingVolume::from_euler_degrees(
            Vec3::ZERO,
            Vec3::new(4.0, 1.0, 1.0),
            Vec3::new(0.0, 0.0, 90.0),
        )
        .unwrap();
        // Long axis now points along world Y.
        assert!(bounds.contains(Vec3::new(0.0, 1.9, 0.0)));
        assert!(!bounds.contains(Vec3::new(1.9, 0.0, 0.0)));
    }
}
