//! Flow solver contract and the reference CPU implementation.
//!
//! The driver treats the solver as a black box: it hands over the grid, the
//! handles of the flow fields and the clock, plus an optional upper bound on
//! the step so that scheduled time deadlines are landed on rather than
//! skipped. The solver picks its own stable step, advances the fields, and
//! then advances the clock by exactly one iteration.

use thiserror::Error;

use crate::fluid::FluidProperties;
use crate::grid::{FieldId, QuadGrid};

/// Smallest step the solver will take before reporting a collapse (s).
pub const MIN_DT: f64 = 1.0e-15;

/// Largest step the solver will take regardless of the stability limits (s).
pub const MAX_DT: f64 = 1.0;

/// Speeds below this are treated as rest when evaluating the CFL limit (m/s).
const SPEED_FLOOR: f64 = 1.0e-12;

const FACE_DIRS: [[i8; 2]; 4] = [[1, 0], [-1, 0], [0, 1], [0, -1]];

/// Iteration counter and simulation time.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RunClock {
    /// Completed solver steps
    pub iteration: u64,
    /// Simulation time (s)
    pub time: f64,
}

impl RunClock {
    /// Clock at `i = 0`, `t = 0`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed step of length `dt`.
    pub fn advance(&mut self, dt: f64) {
        self.iteration += 1;
        self.time += dt;
    }
}

/// Handles of the fields the solver reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowFields {
    /// Liquid volume fraction
    pub fraction: FieldId,
    /// Velocity components (x, y)
    pub velocity: [FieldId; 2],
    /// Pressure
    pub pressure: FieldId,
}

/// What one step did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    /// Step length taken (s)
    pub dt: f64,
    /// Largest speed on the grid before the step (m/s)
    pub max_speed: f64,
}

/// Fatal solver failures. Any of these halts the run.
#[derive(Debug, Error)]
pub enum SolverError {
    /// A field picked up NaN or infinity.
    #[error("field {field} became non-finite at iteration {iteration}")]
    NonFinite {
        /// Name of the offending field
        field: String,
        /// Iteration at which it was detected
        iteration: u64,
    },
    /// The stable step fell below [`MIN_DT`].
    #[error("time step collapsed to {dt:e} s at t = {time}")]
    TimestepCollapse {
        /// Step that would have been taken
        dt: f64,
        /// Simulation time at the failure
        time: f64,
    },
}

/// Black-box integrator advanced once per loop iteration.
pub trait FlowSolver {
    /// Set densities, viscosities and surface tension. Called once before the run.
    fn set_fluid_properties(&mut self, properties: FluidProperties);

    /// Currently configured material constants.
    fn fluid_properties(&self) -> FluidProperties;

    /// Advance velocity, pressure and volume fraction by one step, then the clock.
    ///
    /// `max_dt`, when given, bounds the step length from above.
    fn advance_one_step(
        &mut self,
        grid: &mut QuadGrid,
        fields: &FlowFields,
        clock: &mut RunClock,
        max_dt: Option<f64>,
    ) -> Result<StepReport, SolverError>;
}

/// Largest speed over all leaves.
pub fn max_speed(grid: &QuadGrid, fields: &FlowFields) -> f64 {
    let ux = grid.values(fields.velocity[0]);
    let uy = grid.values(fields.velocity[1]);
    ux.iter()
        .zip(uy)
        .map(|(a, b)| (a * a + b * b).sqrt())
        .fold(0.0, f64::max)
}

/// Stable step from the advective, capillary and viscous limits.
///
/// - advective: `cfl * h / |u|` per cell
/// - capillary: `sqrt(rho_mean * h_min^3 / (pi * sigma))`
/// - viscous: `h_min^2 / (4 * nu_max)`
pub fn compute_timestep(
    grid: &QuadGrid,
    fields: &FlowFields,
    properties: &FluidProperties,
    cfl_number: f64,
) -> f64 {
    let ux = grid.values(fields.velocity[0]);
    let uy = grid.values(fields.velocity[1]);

    let mut dt = MAX_DT;
    for (n, key) in grid.leaves().iter().enumerate() {
        let speed = (ux[n] * ux[n] + uy[n] * uy[n]).sqrt();
        if speed > SPEED_FLOOR {
            dt = dt.min(cfl_number * grid.cell_size(key.level) / speed);
        }
    }

    let h = grid.min_cell_size();
    if properties.sigma > 0.0 {
        let dt_capillary =
            (properties.mean_density() * h * h * h / (std::f64::consts::PI * properties.sigma)).sqrt();
        dt = dt.min(dt_capillary);
    }
    let nu = properties.max_kinematic_viscosity();
    if nu > 0.0 {
        dt = dt.min(0.25 * h * h / nu);
    }
    dt
}

/// Fit a stable step `dt` to the time left before the next deadline.
///
/// If the deadline is within one step it is hit exactly; if it is within two
/// steps the remaining interval is split in half, so that no tiny sliver of a
/// step is left over before the deadline.
pub fn dtnext(dt: f64, remaining: Option<f64>) -> f64 {
    match remaining {
        Some(r) if r <= dt => r,
        Some(r) if r < 2.0 * dt => 0.5 * r,
        _ => dt,
    }
}

/// Reference CPU solver.
///
/// A kinematic stand-in for a full Navier-Stokes solver: semi-Lagrangian
/// transport of volume fraction and velocity with a limited linear
/// reconstruction, explicit viscous diffusion with the mixture viscosity,
/// and the dynamic pressure `0.5 * rho(f) * |u|^2` written to the pressure
/// field. Surface tension enters only through the capillary step limit.
#[derive(Debug, Clone)]
pub struct CpuSolver {
    properties: FluidProperties,
    cfl_number: f64,
}

impl CpuSolver {
    /// Create a solver with water/air properties and the given CFL number,
    /// expected in (0, 1].
    pub fn new(cfl_number: f64) -> Self {
        debug_assert!(
            cfl_number > 0.0 && cfl_number <= 1.0,
            "CFL number must be in (0, 1]"
        );
        Self {
            properties: FluidProperties::water_air(),
            cfl_number,
        }
    }

    /// CFL number used for the advective limit.
    pub fn cfl_number(&self) -> f64 {
        self.cfl_number
    }
}

impl FlowSolver for CpuSolver {
    fn set_fluid_properties(&mut self, properties: FluidProperties) {
        self.properties = properties;
    }

    fn fluid_properties(&self) -> FluidProperties {
        self.properties
    }

    fn advance_one_step(
        &mut self,
        grid: &mut QuadGrid,
        fields: &FlowFields,
        clock: &mut RunClock,
        max_dt: Option<f64>,
    ) -> Result<StepReport, SolverError> {
        let speed = max_speed(grid, fields);
        let dt = dtnext(
            compute_timestep(grid, fields, &self.properties, self.cfl_number),
            max_dt,
        );
        if dt.is_nan() || dt < MIN_DT {
            return Err(SolverError::TimestepCollapse {
                dt,
                time: clock.time,
            });
        }

        let [ux_id, uy_id] = fields.velocity;
        let n = grid.len();
        let mut f_new = Vec::with_capacity(n);
        let mut ux_new = Vec::with_capacity(n);
        let mut uy_new = Vec::with_capacity(n);

        // Transport: trace each cell centre back along the velocity.
        {
            let ux = grid.values(ux_id);
            let uy = grid.values(uy_id);
            for (idx, &key) in grid.leaves().iter().enumerate() {
                let c = grid.center(key);
                let departure = [c[0] - dt * ux[idx], c[1] - dt * uy[idx]];
                f_new.push(grid.sample_linear(fields.fraction, departure).clamp(0.0, 1.0));
                ux_new.push(grid.sample_linear(ux_id, departure));
                uy_new.push(grid.sample_linear(uy_id, departure));
            }
        }
        grid.values_mut(fields.fraction).copy_from_slice(&f_new);
        grid.values_mut(ux_id).copy_from_slice(&ux_new);
        grid.values_mut(uy_id).copy_from_slice(&uy_new);

        // Viscous diffusion on the transported velocity.
        for id in [ux_id, uy_id] {
            let diffused: Vec<f64> = (0..n)
                .map(|idx| {
                    let h = grid.cell_size(grid.leaves()[idx].level);
                    let v = grid.values(id)[idx];
                    let laplacian = FACE_DIRS
                        .iter()
                        .map(|&d| grid.neighbor_value(id, idx, d) - v)
                        .sum::<f64>()
                        / (h * h);
                    v + dt * self.properties.kinematic_viscosity(f_new[idx]) * laplacian
                })
                .collect();
            grid.values_mut(id).copy_from_slice(&diffused);
        }

        // Dynamic pressure diagnostic.
        let pressure: Vec<f64> = {
            let ux = grid.values(ux_id);
            let uy = grid.values(uy_id);
            (0..n)
                .map(|idx| {
                    0.5 * self.properties.density(f_new[idx])
                        * (ux[idx] * ux[idx] + uy[idx] * uy[idx])
                })
                .collect()
        };
        grid.values_mut(fields.pressure).copy_from_slice(&pressure);

        for id in [fields.fraction, ux_id, uy_id, fields.pressure] {
            if grid.values(id).iter().any(|v| !v.is_finite()) {
                return Err(SolverError::NonFinite {
                    field: grid.field_name(id).to_string(),
                    iteration: clock.iteration + 1,
                });
            }
        }

        clock.advance(dt);
        Ok(StepReport {
            dt,
            max_speed: speed,
        })
    }
}
