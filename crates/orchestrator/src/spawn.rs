//! Initial particle placement.
//!
//! Particles are either scattered around one or more cluster centres or laid
//! out on a regular lattice, with optional random jitter inside a sphere.
//! Generation is seeded, so a configuration always produces the same spawn.

use fluid_kernel::SpawnData;
use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Largest `particles_per_axis` whose cube still fits a `u32` index.
pub const MAX_PARTICLES_PER_AXIS: u32 = 1625;

/// Spawn description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnConfig {
    /// The spawn holds `particles_per_axis^3` particles
    pub particles_per_axis: u32,
    /// Cluster centres; particles are split evenly between them
    #[serde(default = "default_centres")]
    pub centres: Vec<[f32; 3]>,
    /// Velocity given to every particle
    #[serde(default)]
    pub initial_velocity: [f32; 3],
    /// Radius of the random offset sphere
    #[serde(default = "default_jitter_strength")]
    pub jitter_strength: f32,
    /// Placement strategy
    #[serde(default)]
    pub layout: SpawnLayout,
    /// Random seed
    #[serde(default)]
    pub seed: u64,
}

/// How particles are arranged
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum SpawnLayout {
    /// Jittered clouds around each centre
    #[default]
    Clusters,
    /// Regular cube of edge `size` around the first centre
    Lattice {
        /// Edge length of the lattice
        size: f32,
    },
}

fn default_centres() -> Vec<[f32; 3]> {
    vec![[0.0, 0.0, 0.0]]
}

fn default_jitter_strength() -> f32 {
    0.5
}

impl SpawnConfig {
    /// Total particle count
    pub fn particle_count(&self) -> usize {
        (self.particles_per_axis as usize).pow(3)
    }

    /// Check the spawn description
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.particles_per_axis == 0 || self.particles_per_axis > MAX_PARTICLES_PER_AXIS {
            return Err(ConfigError::Invalid(format!(
                "particles_per_axis must be in 1..={MAX_PARTICLES_PER_AXIS}, got {}",
                self.particles_per_axis
            )));
        }
        if self.centres.is_empty() {
            return Err(ConfigError::Invalid("spawn needs at least one centre".to_string()));
        }
        let finite = self
            .centres
            .iter()
            .chain(std::iter::once(&self.initial_velocity))
            .all(|v| v.iter().all(|c| c.is_finite()));
        if !finite {
            return Err(ConfigError::Invalid(
                "spawn centres and velocity must be finite".to_string(),
            ));
        }
        if !self.jitter_strength.is_finite() || self.jitter_strength < 0.0 {
            return Err(ConfigError::Invalid(
                "jitter_strength must be finite and non-negative".to_string(),
            ));
        }
        if let SpawnLayout::Lattice { size } = self.layout {
            if !size.is_finite() || size < 0.0 {
                return Err(ConfigError::Invalid(
                    "lattice size must be finite and non-negative".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Generate particle positions and velocities
    pub fn generate(&self) -> SpawnData {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let count = self.particle_count();
        let jitter = self.jitter_strength;

        let positions: Vec<Vec3> = match self.layout {
            SpawnLayout::Clusters => {
                let groups = self.centres.len();
                let mut positions = Vec::with_capacity(count);
                for (g, centre) in self.centres.iter().enumerate() {
                    let start = count * g / groups;
                    let end = count * (g + 1) / groups;
                    let centre = Vec3::from(*centre);
                    for _ in start..end {
                        positions.push(centre + random_in_unit_sphere(&mut rng) * jitter);
                    }
                }
                positions
            }
            SpawnLayout::Lattice { size } => {
                let n = self.particles_per_axis;
                let centre = Vec3::from(self.centres[0]);
                let mut positions = Vec::with_capacity(count);
                for x in 0..n {
                    for y in 0..n {
                        for z in 0..n {
                            let t = Vec3::new(
                                lattice_coord(x, n),
                                lattice_coord(y, n),
                                lattice_coord(z, n),
                            );
                            let p = (t - Vec3::splat(0.5)) * size + centre;
                            positions.push(p + random_in_unit_sphere(&mut rng) * jitter);
                        }
                    }
                }
                positions
            }
        };

        let velocities = vec![Vec3::from(self.initial_velocity); positions.len()];
        tracing::debug!(
            particles = positions.len(),
            layout = ?self.layout,
            seed = self.seed,
            "spawn generated"
        );
        SpawnData::new(positions, velocities)
    }
}

/// Normalised lattice coordinate in [0, 1]; a single sample sits at 0.5.
fn lattice_coord(i: u32, n: u32) -> f32 {
    if n > 1 {
        i as f32 / (n - 1) as f32
    } else {
        0.5
    }
}

/// Uniform sample inside the unit sphere (rejection sampling).
fn random_in_unit_sphere(rng: &mut impl Rng) -> Vec3 {
    loop {
        let v = Vec3::new(
            rng.gen_range(-1.0..=1.0),
            rng.gen_range(-1.0..=1.0),
            rng.gen_range(-1.0..=1.0),
        );
        if v.length_squared() <= 1.0 {
            return v;
        }
    }
}
