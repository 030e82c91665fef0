//! Configuration parsing and validation for droplet impact runs

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use kernel::fluid::{
    AIR_DENSITY, AIR_VISCOSITY, WATER_AIR_SURFACE_TENSION, WATER_DENSITY, WATER_VISCOSITY,
};
use kernel::{FluidProperties, ViewParams, MAX_LEVEL_LIMIT};

/// Fewest cells at the finest level across the droplet diameter.
pub const MIN_CELLS_PER_DIAMETER: f64 = 4.0;

/// Errors raised while loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// File that was requested
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Config file is not valid JSON for this structure
    #[error("failed to parse config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// A quantity that must be strictly positive is not
    #[error("{name} must be positive, got {value}")]
    NonPositive {
        /// Setting name
        name: &'static str,
        /// Offending value
        value: f64,
    },

    /// Base resolution is not a power of two
    #[error("base resolution must be a power of two, got {0}")]
    BaseResolution(u32),

    /// Maximum refinement level below the base grid level
    #[error("max level {max_level} is below the base grid level {base_level}")]
    LevelOrder {
        /// Level of the base grid
        base_level: u8,
        /// Requested maximum level
        max_level: u8,
    },

    /// Maximum refinement level beyond what the grid supports
    #[error("max level {0} exceeds the supported limit {limit}", limit = MAX_LEVEL_LIMIT)]
    LevelLimit(u8),

    /// Droplet at least as large as the domain
    #[error("droplet diameter {diameter} must be smaller than the box length {box_length}")]
    DropExceedsDomain {
        /// Droplet diameter (m)
        diameter: f64,
        /// Box length (m)
        box_length: f64,
    },

    /// Pre-refinement circle does not fit in the domain
    #[error(
        "refinement circle of radius {radius} around (0, {height}) leaves the domain of size {box_length}"
    )]
    RefinementOutsideDomain {
        /// Refinement radius (m)
        radius: f64,
        /// Droplet centre height (m)
        height: f64,
        /// Box length (m)
        box_length: f64,
    },

    /// Finest cells too coarse to carry the interface
    #[error(
        "max level {max_level} gives {cells:.2} cells across the droplet, at least {min} required",
        min = MIN_CELLS_PER_DIAMETER
    )]
    UnresolvedInterface {
        /// Requested maximum level
        max_level: u8,
        /// Cells across the diameter at that level
        cells: f64,
    },

    /// Base cells larger than the droplet, so pre-refinement cannot find it
    #[error("base cell size {cell_size} exceeds the droplet diameter {diameter}")]
    CoarseBaseGrid {
        /// Base cell size (m)
        cell_size: f64,
        /// Droplet diameter (m)
        diameter: f64,
    },

    /// Log interval of zero iterations
    #[error("log_every must be at least 1")]
    LogInterval,

    /// Iteration cap of zero
    #[error("max_iterations must be at least 1")]
    IterationCap,

    /// CFL number outside (0, 1]
    #[error("CFL number must be in range (0, 1], got {0}")]
    CflNumber(f64),

    /// Zero-sized frame
    #[error("frame size must be non-zero, got {width}x{height}")]
    FrameSize {
        /// Width in pixels
        width: u32,
        /// Height in pixels
        height: u32,
    },
}

/// Material constants of one phase
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FluidPhase {
    /// Density (kg/m^3)
    pub density: f64,
    /// Dynamic viscosity (Pa s)
    pub viscosity: f64,
}

/// Wavelet error thresholds, one per adapted field
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptTolerances {
    /// Volume fraction
    pub fraction: f64,
    /// Pressure
    pub pressure: f64,
    /// Horizontal velocity
    pub velocity_x: f64,
    /// Vertical velocity
    pub velocity_y: f64,
}

impl Default for AdaptTolerances {
    fn default() -> Self {
        Self {
            fraction: 0.01,
            pressure: 0.01,
            velocity_x: 0.01,
            velocity_y: 0.01,
        }
    }
}

impl AdaptTolerances {
    /// Tolerances in adaptation order: f, p, u.x, u.y.
    pub fn as_array(&self) -> [f64; 4] {
        [self.fraction, self.pressure, self.velocity_x, self.velocity_y]
    }
}

/// Camera and colour settings of the movie frames
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameSettings {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Horizontal camera offset from the domain centre, in box lengths
    pub tx: f64,
    /// Vertical camera offset from the domain centre, in box lengths
    pub ty: f64,
    /// Magnification
    pub zoom: f64,
    /// Heatmap colour range in standard deviations around the mean
    pub spread: f64,
}

impl Default for FrameSettings {
    fn default() -> Self {
        Self {
            width: 800,
            height: 800,
            tx: 0.0,
            ty: 0.0,
            zoom: 1.0,
            spread: 10.0,
        }
    }
}

impl FrameSettings {
    /// Renderer view for these settings.
    pub fn view(&self) -> ViewParams {
        ViewParams {
            tx: self.tx,
            ty: self.ty,
            zoom: self.zoom,
            width: self.width,
            height: self.height,
        }
    }
}

/// Main simulation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Edge length of the square domain (m)
    pub box_length: f64,
    /// Cells per side of the base grid (power of two)
    pub base_resolution: u32,
    /// Finest refinement level
    pub max_level: u8,
    /// Droplet diameter (m)
    pub drop_diameter: f64,
    /// Height of the droplet centre above the bottom wall (m)
    pub start_height: f64,
    /// Downward impact velocity (m/s)
    pub impact_velocity: f64,
    /// Liquid phase (f = 1)
    pub liquid: FluidPhase,
    /// Gas phase (f = 0)
    pub gas: FluidPhase,
    /// Surface tension coefficient (N/m)
    pub surface_tension: f64,
    /// Adaptation thresholds
    pub tolerances: AdaptTolerances,
    /// Simulated end time (s)
    pub end_time: f64,
    /// Simulated time between movie frames (s)
    pub frame_interval: f64,
    /// Iterations between step log lines
    pub log_every: u64,
    /// Solver CFL number
    pub cfl_number: f64,
    /// Safety stop on the iteration count
    pub max_iterations: Option<u64>,
    /// Directory under which the run directory is created
    pub output_root: PathBuf,
    /// Movie frame settings
    pub frame: FrameSettings,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            box_length: 30e-3,
            base_resolution: 64,
            max_level: 8,
            drop_diameter: 1e-3,
            start_height: 5e-3,
            impact_velocity: 1.0,
            liquid: FluidPhase {
                density: WATER_DENSITY,
                viscosity: WATER_VISCOSITY,
            },
            gas: FluidPhase {
                density: AIR_DENSITY,
                viscosity: AIR_VISCOSITY,
            },
            surface_tension: WATER_AIR_SURFACE_TENSION,
            tolerances: AdaptTolerances::default(),
            end_time: 0.03,
            frame_interval: 1e-4,
            log_every: 1,
            cfl_number: 0.5,
            max_iterations: None,
            output_root: PathBuf::from("."),
            frame: FrameSettings::default(),
        }
    }
}

impl SimulationConfig {
    /// Load configuration from a JSON file; missing keys take default values
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: SimulationConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positives = [
            ("box_length", self.box_length),
            ("drop_diameter", self.drop_diameter),
            ("start_height", self.start_height),
            ("impact_velocity", self.impact_velocity),
            ("liquid.density", self.liquid.density),
            ("liquid.viscosity", self.liquid.viscosity),
            ("gas.density", self.gas.density),
            ("gas.viscosity", self.gas.viscosity),
            ("surface_tension", self.surface_tension),
            ("tolerances.fraction", self.tolerances.fraction),
            ("tolerances.pressure", self.tolerances.pressure),
            ("tolerances.velocity_x", self.tolerances.velocity_x),
            ("tolerances.velocity_y", self.tolerances.velocity_y),
            ("end_time", self.end_time),
            ("frame_interval", self.frame_interval),
            ("frame.zoom", self.frame.zoom),
        ];
        for (name, value) in positives {
            // NaN fails this test too
            if !(value > 0.0) || !value.is_finite() {
                return Err(ConfigError::NonPositive { name, value });
            }
        }

        if !(self.cfl_number > 0.0 && self.cfl_number <= 1.0) {
            return Err(ConfigError::CflNumber(self.cfl_number));
        }
        if self.log_every == 0 {
            return Err(ConfigError::LogInterval);
        }
        if self.max_iterations == Some(0) {
            return Err(ConfigError::IterationCap);
        }
        if self.frame.width == 0 || self.frame.height == 0 {
            return Err(ConfigError::FrameSize {
                width: self.frame.width,
                height: self.frame.height,
            });
        }

        // Levels
        if !self.base_resolution.is_power_of_two() {
            return Err(ConfigError::BaseResolution(self.base_resolution));
        }
        let base_level = self.base_level();
        if self.max_level < base_level {
            return Err(ConfigError::LevelOrder {
                base_level,
                max_level: self.max_level,
            });
        }
        if self.max_level > MAX_LEVEL_LIMIT {
            return Err(ConfigError::LevelLimit(self.max_level));
        }

        // Geometry
        if self.drop_diameter >= self.box_length {
            return Err(ConfigError::DropExceedsDomain {
                diameter: self.drop_diameter,
                box_length: self.box_length,
            });
        }
        let radius = self.refinement_radius();
        if self.start_height - radius < 0.0
            || self.start_height + radius > self.box_length
            || radius > 0.5 * self.box_length
        {
            return Err(ConfigError::RefinementOutsideDomain {
                radius,
                height: self.start_height,
                box_length: self.box_length,
            });
        }

        let base_cell = self.box_length / self.base_resolution as f64;
        if base_cell > self.drop_diameter {
            return Err(ConfigError::CoarseBaseGrid {
                cell_size: base_cell,
                diameter: self.drop_diameter,
            });
        }
        let finest = self.box_length / (1u64 << self.max_level) as f64;
        let cells = self.drop_diameter / finest;
        if cells < MIN_CELLS_PER_DIAMETER {
            return Err(ConfigError::UnresolvedInterface {
                max_level: self.max_level,
                cells,
            });
        }

        Ok(())
    }

    /// Level of the base grid (`log2(base_resolution)`)
    pub fn base_level(&self) -> u8 {
        self.base_resolution.trailing_zeros() as u8
    }

    /// Radius of the one-shot pre-refinement circle, `sqrt(2) * D / 2`
    pub fn refinement_radius(&self) -> f64 {
        std::f64::consts::SQRT_2 * 0.5 * self.drop_diameter
    }

    /// Material constants handed to the flow solver
    pub fn fluid_properties(&self) -> FluidProperties {
        FluidProperties {
            rho1: self.liquid.density,
            rho2: self.gas.density,
            mu1: self.liquid.viscosity,
            mu2: self.gas.viscosity,
            sigma: self.surface_tension,
        }
    }
}

/// Dimensionless groups of the impact, computed once at start-up
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedNumbers {
    /// Reynolds number `rho_l * U0 * D / mu_l`
    pub reynolds: f64,
    /// Weber number `rho_l * D * U0^2 / sigma`
    pub weber: f64,
}

impl DerivedNumbers {
    /// Compute Re and We from the liquid properties
    pub fn from_config(config: &SimulationConfig) -> Self {
        let rho = config.liquid.density;
        let u0 = config.impact_velocity;
        let d = config.drop_diameter;
        Self {
            reynolds: rho * u0 * d / config.liquid.viscosity,
            weber: rho * d * u0 * u0 / config.surface_tension,
        }
    }

    /// Re and We rounded to the nearest integer
    pub fn rounded(&self) -> (i64, i64) {
        (self.reynolds.round() as i64, self.weber.round() as i64)
    }

    /// Start/end banner line
    pub fn banner(&self) -> String {
        let (re, we) = self.rounded();
        format!("Re: {}, We:{}", re, we)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.base_level(), 6);
    }

    #[test]
    fn test_derived_numbers() {
        let numbers = DerivedNumbers::from_config(&SimulationConfig::default());
        assert_eq!(numbers.rounded(), (1120, 14));
        assert_eq!(numbers.banner(), "Re: 1120, We:14");
    }

    #[test]
    fn test_validation_rejects_non_positive() {
        let mut config = SimulationConfig::default();
        config.surface_tension = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositive { name: "surface_tension", .. })
        ));

        config.surface_tension = WATER_AIR_SURFACE_TENSION;
        config.tolerances.pressure = f64::NAN;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositive { name: "tolerances.pressure", .. })
        ));
    }

    #[test]
    fn test_validation_levels() {
        let mut config = SimulationConfig::default();
        config.base_resolution = 48;
        assert!(matches!(config.validate(), Err(ConfigError::BaseResolution(48))));

        config.base_resolution = 64;
        config.max_level = 5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::LevelOrder { base_level: 6, max_level: 5 })
        ));

        config.max_level = MAX_LEVEL_LIMIT + 1;
        assert!(matches!(config.validate(), Err(ConfigError::LevelLimit(_))));
    }

    #[test]
    fn test_validation_degenerate_geometry() {
        let mut config = SimulationConfig::default();
        config.drop_diameter = config.box_length;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DropExceedsDomain { .. })
        ));

        let mut config = SimulationConfig::default();
        config.start_height = 0.5e-3;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::RefinementOutsideDomain { .. })
        ));

        let mut config = SimulationConfig::default();
        config.base_resolution = 16;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::CoarseBaseGrid { .. })
        ));
    }

    #[test]
    fn test_validation_unresolved_interface() {
        let mut config = SimulationConfig::default();
        config.base_resolution = 32;
        config.max_level = 5;
        config.drop_diameter = 1e-3;
        // 30 mm / 32 cells ~ 0.94 mm: a single cell across the drop
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnresolvedInterface { max_level: 5, .. })
        ));
    }

    #[test]
    fn test_load_fills_missing_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("impact.json");
        fs::write(&path, r#"{ "impact_velocity": 2.0, "frame": { "width": 64 } }"#).unwrap();

        let config = SimulationConfig::load(&path).unwrap();
        assert_eq!(config.impact_velocity, 2.0);
        assert_eq!(config.frame.width, 64);
        assert_eq!(config.frame.height, 800);
        assert_eq!(config.drop_diameter, 1e-3);
    }

    #[test]
    fn test_load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = SimulationConfig::load(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
