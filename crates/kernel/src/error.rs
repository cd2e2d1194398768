//! Errors raised while constructing or reconfiguring a [`FluidKernel`](crate::FluidKernel).
//!
//! Every variant is detected before the pipeline runs; a step itself has no
//! failure path.

/// Error returned when the kernel cannot be built from the given parameters
/// and spawn data.
#[derive(Debug, Clone, PartialEq)]
pub enum KernelError {
    /// The spawn input contained no particles.
    EmptySpawn,
    /// Spawn positions and velocities have different lengths.
    SpawnLengthMismatch {
        /// Number of spawn positions.
        positions: usize,
        /// Number of spawn velocities.
        velocities: usize,
    },
    /// Particle indices are stored as `u32`; larger spawns are rejected.
    TooManyParticles(usize),
    /// Smoothing radius must be finite and strictly positive.
    InvalidSmoothingRadius(f32),
    /// A scalar parameter is out of its allowed range.
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Offending value.
        value: f32,
    },
    /// The bounding volume has non-positive extents or a singular transform.
    MalformedBounds(String),
    /// The spatial hash table must have at least one bucket.
    InvalidHashTableSize(usize),
    /// Reset data must have the particle count fixed at construction.
    ParticleCountMismatch {
        /// Particle count the kernel was built with.
        expected: usize,
        /// Particle count supplied.
        actual: usize,
    },
    /// A per-particle buffer could not be allocated.
    Allocation {
        /// Buffer name.
        buffer: &'static str,
        /// Requested element count.
        len: usize,
    },
}

impl std::fmt::Display for KernelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptySpawn => write!(f, "spawn data contains no particles"),
            Self::SpawnLengthMismatch { positions, velocities } => write!(
                f,
                "spawn data has {positions} positions but {velocities} velocities"
            ),
            Self::TooManyParticles(n) => {
                write!(f, "{n} particles exceed the u32 index range")
            }
            Self::InvalidSmoothingRadius(r) => {
                write!(f, "smoothing radius must be positive and finite, got {r}")
            }
            Self::InvalidParameter { name, value } => {
                write!(f, "parameter `{name}` out of range: {value}")
            }
            Self::MalformedBounds(reason) => write!(f, "malformed bounding volume: {reason}"),
            Self::InvalidHashTableSize(size) => {
                write!(f, "hash table size must be at least 1, got {size}")
            }
            Self::ParticleCountMismatch { expected, actual } => write!(
                f,
                "particle count is fixed at {expected}, reset data has {actual}"
            ),
            Self::Allocation { buffer, len } => {
                write!(f, "failed to allocate `{buffer}` buffer for {len} elements")
            }
        }
    }
}

impl std::error::Error for KernelError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_problem() {
        let err = KernelError::InvalidSmoothingRadius(-1.0);
        assert!(err.to_string().contains("-1"));

        let err = KernelError::Allocation { buffer: "velocity", len: 42 };
        assert_eq!(err.to_string(), "failed to allocate `velocity` buffer for 42 elements");
    }
}
