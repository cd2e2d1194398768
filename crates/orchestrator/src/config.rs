//! Configuration parsing and validation for fluid simulations

use fluid_kernel::{BoundingVolume, FluidParams, KernelError};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;

use crate::spawn::SpawnConfig;

/// Main simulation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Human-readable simulation name
    pub name: String,
    /// Multiplier applied to every frame time
    #[serde(default = "default_time_scale")]
    pub time_scale: f32,
    /// Simulation steps per frame
    #[serde(default = "default_iterations_per_frame")]
    pub iterations_per_frame: u32,
    /// Use fixed 1/60 s frames instead of measured wall time
    #[serde(default)]
    pub fixed_time_step: bool,
    /// Gravitational acceleration along Y
    #[serde(default = "default_gravity")]
    pub gravity: f32,
    /// Fraction of normal velocity lost on a wall hit, in [0, 1]
    #[serde(default = "default_collision_damping")]
    pub collision_damping: f32,
    /// Interaction radius
    #[serde(default = "default_smoothing_radius")]
    pub smoothing_radius: f32,
    /// Density at which pressure vanishes
    #[serde(default = "default_target_density")]
    pub target_density: f32,
    /// Pressure stiffness
    #[serde(default = "default_pressure_multiplier")]
    pub pressure_multiplier: f32,
    /// Near-pressure stiffness
    #[serde(default = "default_near_pressure_multiplier")]
    pub near_pressure_multiplier: f32,
    /// Viscosity strength
    #[serde(default = "default_viscosity_strength")]
    pub viscosity_strength: f32,
    /// Container volume
    #[serde(default)]
    pub bounds: BoundsConfig,
    /// Spatial hash bucket count (defaults to the particle count)
    #[serde(default)]
    pub hash_table_size: Option<usize>,
    /// Stop the runner after this many frames
    #[serde(default)]
    pub max_frames: Option<u64>,
    /// Initial particle placement
    pub spawn: SpawnConfig,
}

/// Oriented container box
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundsConfig {
    /// Center [x, y, z]
    pub center: [f32; 3],
    /// Full edge lengths [x, y, z]
    pub size: [f32; 3],
    /// Euler angles in degrees, applied in XYZ order
    #[serde(default)]
    pub rotation: [f32; 3],
}

impl Default for BoundsConfig {
    fn default() -> Self {
        Self {
            center: [0.0; 3],
            size: [4.0; 3],
            rotation: [0.0; 3],
        }
    }
}

impl BoundsConfig {
    /// Build the kernel's bounding volume.
    pub fn to_volume(&self) -> Result<BoundingVolume, KernelError> {
        BoundingVolume::from_euler_degrees(
            Vec3::from(self.center),
            Vec3::from(self.size),
            Vec3::from(self.rotation),
        )
    }
}

// Default values
fn default_time_scale() -> f32 {
    1.0
}

fn default_iterations_per_frame() -> u32 {
    3
}

fn default_gravity() -> f32 {
    -10.0
}

fn default_collision_damping() -> f32 {
    0.05
}

fn default_smoothing_radius() -> f32 {
    0.2
}

fn default_target_density() -> f32 {
    630.0
}

fn default_pressure_multiplier() -> f32 {
    288.0
}

fn default_near_pressure_multiplier() -> f32 {
    2.16
}

fn default_viscosity_strength() -> f32 {
    0.001
}

/// Error loading or validating a configuration
#[derive(Debug)]
pub enum ConfigError {
    /// The file could not be read
    Io {
        /// Path that failed
        path: String,
        /// Underlying error
        source: std::io::Error,
    },
    /// The file is not valid configuration JSON
    Parse(serde_json::Error),
    /// A value is out of range
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "failed to read config file {path}: {source}"),
            Self::Parse(e) => write!(f, "failed to parse config JSON: {e}"),
            Self::Invalid(msg) => write!(f, "invalid configuration: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(e) => Some(e),
            Self::Invalid(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e)
    }
}

impl From<KernelError> for ConfigError {
    fn from(e: KernelError) -> Self {
        Self::Invalid(e.to_string())
    }
}

impl SimulationConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        Self::from_json(&contents)
    }

    /// Parse and validate configuration JSON
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: SimulationConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.time_scale.is_finite() || self.time_scale < 0.0 {
            return Err(ConfigError::Invalid(
                "time_scale must be finite and non-negative".to_string(),
            ));
        }
        if self.iterations_per_frame == 0 {
            return Err(ConfigError::Invalid(
                "iterations_per_frame must be at least 1".to_string(),
            ));
        }
        if self.max_frames == Some(0) {
            return Err(ConfigError::Invalid("max_frames must be positive".to_string()));
        }

        self.spawn.validate()?;
        self.fluid_params()?.validate()?;
        Ok(())
    }

    /// Kernel parameters described by this configuration
    pub fn fluid_params(&self) -> Result<FluidParams, ConfigError> {
        Ok(FluidParams {
            gravity: self.gravity,
            collision_damping: self.collision_damping,
            smoothing_radius: self.smoothing_radius,
            target_density: self.target_density,
            pressure_multiplier: self.pressure_multiplier,
            near_pressure_multiplier: self.near_pressure_multiplier,
            viscosity_strength: self.viscosity_strength,
            bounds: self.bounds.to_volume()?,
            hash_table_size: self.hash_table_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spawn::SpawnLayout;

    const MINIMAL: &str = r#"{
        "name": "minimal",
        "spawn": { "particles_per_axis": 4 }
    }"#;

    fn create_test_config() -> SimulationConfig {
        SimulationConfig {
            name: "Test".to_string(),
            time_scale: 1.0,
            iterations_per_frame: 3,
            fixed_time_step: true,
            gravity: -10.0,
            collision_damping: 0.05,
            smoothing_radius: 0.2,
            target_density: 630.0,
            pressure_multiplier: 288.0,
            near_pressure_multiplier: 2.16,
            viscosity_strength: 0.001,
            bounds: BoundsConfig::default(),
            hash_table_size: None,
            max_frames: Some(10),
            spawn: SpawnConfig {
                particles_per_axis: 4,
                centres: vec![[0.0, 0.0, 0.0]],
                initial_velocity: [0.0; 3],
                jitter_strength: 0.1,
                layout: SpawnLayout::Clusters,
                seed: 1,
            },
        }
    }

    #[test]
    fn test_minimal_json_uses_defaults() {
        let config = SimulationConfig::from_json(MINIMAL).unwrap();
        assert_eq!(config.name, "minimal");
        assert_eq!(config.time_scale, 1.0);
        assert_eq!(config.iterations_per_frame, 3);
        assert!(!config.fixed_time_step);
        assert_eq!(config.gravity, -10.0);
        assert_eq!(config.collision_damping, 0.05);
        assert_eq!(config.smoothing_radius, 0.2);
        assert_eq!(config.bounds, BoundsConfig::default());
        assert_eq!(config.hash_table_size, None);
        assert_eq!(config.max_frames, None);
    }

    #[test]
    fn test_valid_config() {
        let config = create_test_config();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_iterations() {
        let mut config = create_test_config();
        config.iterations_per_frame = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_invalid_kernel_params() {
        let mut config = create_test_config();
        config.smoothing_radius = -1.0;
        assert!(config.validate().is_err());

        let mut config = create_test_config();
        config.collision_damping = 2.0;
        assert!(config.validate().is_err());

        let mut config = create_test_config();
        config.hash_table_size = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_bounds() {
        let mut config = create_test_config();
        config.bounds.size = [1.0, 0.0, 1.0];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("bounding volume"), "{err}");
    }

    #[test]
    fn test_rotated_bounds() {
        let mut config = create_test_config();
        config.bounds = BoundsConfig {
            center: [0.0, 1.0, 0.0],
            size: [6.0, 2.0, 2.0],
            rotation: [0.0, 0.0, 90.0],
        };
        let params = config.fluid_params().unwrap();
        assert!(params.bounds.contains(Vec3::new(0.0, 3.5, 0.0)));
        assert!(!params.bounds.contains(Vec3::new(2.5, 1.0, 0.0)));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            SimulationConfig::from_json("{ not json"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            SimulationConfig::load("/nonexistent/fluid.json"),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_roundtrip_through_json() {
        let config = create_test_config();
        let json = serde_json::to_string(&config).unwrap();
        let parsed = SimulationConfig::from_json(&json).unwrap();
        assert_eq!(parsed.max_frames, Some(10));
        assert_eq!(parsed.spawn.particles_per_axis, 4);
    }
}
