//! Orchestration Layer
//!
//! This crate provides the driver of a droplet impact run, including:
//! - Configuration loading and validation, Reynolds / Weber numbers
//! - Domain and field registry on the adaptive grid
//! - Initial condition (refined droplet interface, impact velocity)
//! - Per-step adaptive refinement control
//! - Event scheduling by time, time interval and iteration interval
//! - Step log and movie frame output
//! - Simulation runner tying the above to a flow solver and a renderer

#![warn(missing_docs)]

pub mod config;
pub mod domain;
pub mod initial;
pub mod output;
pub mod refine;
pub mod runner;
pub mod schedule;

pub use config::{ConfigError, DerivedNumbers, SimulationConfig};
pub use runner::{RunSummary, RunnerState, SimulationRunner};
pub use schedule::{ScheduleError, Scheduler, Trigger};

use kernel::{CpuSolver, RasterRenderer, SolverError};
use std::path::Path;
use thiserror::Error;

/// Errors that stop a run
#[derive(Debug, Error)]
pub enum DriverError {
    /// Invalid configuration, detected before any allocation
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The flow solver failed; the run is halted
    #[error("solver error: {0}")]
    Solver(#[from] SolverError),

    /// An event could not be registered
    #[error("schedule error: {0}")]
    Schedule(#[from] ScheduleError),

    /// `run` was called on a runner that has already run
    #[error("simulation has already been started")]
    AlreadyStarted,
}

/// Create a simulation from a configuration, with the reference CPU solver
/// and the PNG raster renderer.
///
/// # Example
/// ```no_run
/// use orchestrator::{create_simulation, SimulationConfig};
///
/// let mut runner = create_simulation(SimulationConfig::default())?;
/// let summary = runner.run()?;
/// println!("{} frames", summary.frames_written);
/// # Ok::<(), orchestrator::DriverError>(())
/// ```
pub fn create_simulation(config: SimulationConfig) -> Result<SimulationRunner, DriverError> {
    config.validate()?;

    let numbers = DerivedNumbers::from_config(&config);
    tracing::info!(
        "Creating simulation: D = {} m, U0 = {} m/s, Re = {:.1}, We = {:.2}",
        config.drop_diameter,
        config.impact_velocity,
        numbers.reynolds,
        numbers.weber
    );

    let solver = Box::new(CpuSolver::new(config.cfl_number));
    let renderer = Box::new(RasterRenderer::new(config.frame.view()));
    SimulationRunner::new(config, solver, renderer)
}

/// Create a simulation from a JSON configuration file
pub fn load_simulation(config_path: impl AsRef<Path>) -> Result<SimulationRunner, DriverError> {
    let config_path = config_path.as_ref();
    tracing::info!("Loading config: {}", config_path.display());
    let config = SimulationConfig::load(config_path)?;
    create_simulation(config)
}
