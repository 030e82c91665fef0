//! Simulation runner with lifecycle management
//!
//! This module provides the `SimulationRunner`, which owns the solver and
//! the renderer, builds the run context and the event schedule, and drives
//! the single-threaded loop: evaluate due events, stop on the end event,
//! otherwise advance the solver by one step and repeat.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use kernel::{AdaptStats, FlowSolver, Renderer, RunClock};

use crate::config::{DerivedNumbers, SimulationConfig};
use crate::domain::{impact_domain, Domain, ImpactFields};
use crate::initial::{seed, SeedReport};
use crate::output::ArtifactWriter;
use crate::refine::RefinementController;
use crate::schedule::{ScheduleError, Scheduler, Trigger};
use crate::DriverError;

/// Runner state enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    /// Simulation created but not yet started
    Created,
    /// Simulation loop in progress
    Running,
    /// Simulation reached its end time or iteration cap
    Finished,
    /// Simulation halted on an error
    Error,
}

/// Mutable state of one run, handed to every scheduled event
pub struct RunContext {
    /// Re and We
    pub derived: DerivedNumbers,
    /// Iteration and simulation time
    pub clock: RunClock,
    /// Mesh and fields
    pub domain: Domain,
    /// Field handles
    pub fields: ImpactFields,
    /// Per-step adaptation
    pub refinement: RefinementController,
    /// Step log and frames
    pub artifacts: ArtifactWriter,
    /// Frame renderer
    pub renderer: Box<dyn Renderer>,
    /// Outcome of the most recent adaptation pass
    pub last_adapt: AdaptStats,
}

/// Register the driver events in firing priority order:
/// start banner, step log, adaptation, movie frame, end.
pub fn build_schedule(
    config: &SimulationConfig,
) -> Result<Scheduler<RunContext>, ScheduleError> {
    let mut scheduler = Scheduler::new();

    scheduler.register("init", Trigger::Once { time: 0.0 }, |ctx: &mut RunContext| {
        ctx.artifacts.announce(&ctx.derived);
    })?;

    scheduler.register(
        "log_status",
        Trigger::EveryIteration {
            interval: config.log_every,
        },
        |ctx: &mut RunContext| {
            ctx.artifacts.append_step(ctx.clock);
        },
    )?;

    scheduler.register(
        "adapt",
        Trigger::EveryIteration { interval: 1 },
        |ctx: &mut RunContext| {
            ctx.last_adapt = ctx.refinement.adapt_step(ctx.domain.grid_mut());
        },
    )?;

    scheduler.register(
        "movie",
        Trigger::EveryTime {
            interval: config.frame_interval,
        },
        |ctx: &mut RunContext| {
            ctx.artifacts
                .write_frame(ctx.renderer.as_mut(), ctx.domain.grid(), ctx.clock);
        },
    )?;

    scheduler.register(
        "end",
        Trigger::AtEnd {
            time: config.end_time,
        },
        |ctx: &mut RunContext| {
            ctx.artifacts.announce(&ctx.derived);
        },
    )?;

    Ok(scheduler)
}

/// What a finished run produced
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Solver steps taken
    pub iterations: u64,
    /// Final simulation time (s)
    pub final_time: f64,
    /// False when the iteration cap stopped the run before the end time
    pub reached_end: bool,
    /// Frames saved
    pub frames_written: u64,
    /// Frames that failed to render or save
    pub frames_failed: u64,
    /// Step log lines written
    pub log_lines: u64,
    /// Smallest step taken (s), 0 if none
    pub min_dt: f64,
    /// Largest step taken (s), 0 if none
    pub max_dt: f64,
    /// Leaves at the end of the run
    pub cells: usize,
    /// Leaves per refinement level at the end of the run, coarsest first
    pub levels: Vec<(u8, usize)>,
    /// Initial interface report
    pub seed: SeedReport,
    /// Directory holding the artifacts
    pub run_dir: PathBuf,
    /// Wall-clock duration of the run
    pub wall_time: Duration,
}

/// Driver for one droplet impact run
pub struct SimulationRunner {
    config: SimulationConfig,
    solver: Box<dyn FlowSolver>,
    renderer: Option<Box<dyn Renderer>>,
    state: RunnerState,
}

impl SimulationRunner {
    /// Create a runner. The configuration is validated before anything is
    /// allocated.
    pub fn new(
        config: SimulationConfig,
        solver: Box<dyn FlowSolver>,
        renderer: Box<dyn Renderer>,
    ) -> Result<Self, DriverError> {
        config.validate()?;
        Ok(Self {
            config,
            solver,
            renderer: Some(renderer),
            state: RunnerState::Created,
        })
    }

    /// Get current runner state
    pub fn state(&self) -> RunnerState {
        self.state
    }

    /// Configuration of this run
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Run to the end time. A runner can run once.
    pub fn run(&mut self) -> Result<RunSummary, DriverError> {
        let renderer = match (self.state, self.renderer.take()) {
            (RunnerState::Created, Some(renderer)) => renderer,
            _ => return Err(DriverError::AlreadyStarted),
        };
        self.state = RunnerState::Running;

        let result = self.run_loop(renderer);
        self.state = match result {
            Ok(_) => RunnerState::Finished,
            Err(_) => RunnerState::Error,
        };
        result
    }

    fn run_loop(&mut self, renderer: Box<dyn Renderer>) -> Result<RunSummary, DriverError> {
        let start_wall_time = Instant::now();
        let config = &self.config;

        let derived = DerivedNumbers::from_config(config);
        let mut scheduler = build_schedule(config)?;
        self.solver.set_fluid_properties(config.fluid_properties());

        let (mut domain, fields) = impact_domain(config);
        let seed_report = seed(&mut domain, &fields, config);
        let refinement = RefinementController::for_impact(&fields, config);
        let artifacts = ArtifactWriter::prepare(config);

        let mut ctx = RunContext {
            derived,
            clock: RunClock::new(),
            domain,
            fields,
            refinement,
            artifacts,
            renderer,
            last_adapt: AdaptStats::default(),
        };
        let flow = fields.flow();

        tracing::info!(
            "Starting run: t_end = {} s, frame every {} s, max level {}",
            config.end_time,
            config.frame_interval,
            config.max_level
        );

        let mut min_dt = f64::INFINITY;
        let mut max_dt = 0.0_f64;
        let mut reached_end = true;
        loop {
            if scheduler.tick(ctx.clock, &mut ctx).terminate {
                break;
            }

            if let Some(cap) = config.max_iterations {
                if ctx.clock.iteration >= cap {
                    tracing::warn!(
                        "Stopping at iteration cap {} before t_end (t = {})",
                        cap,
                        ctx.clock.time
                    );
                    reached_end = false;
                    break;
                }
            }

            let max_step = scheduler
                .next_deadline(ctx.clock.time)
                .map(|deadline| deadline - ctx.clock.time);
            let report = self
                .solver
                .advance_one_step(ctx.domain.grid_mut(), &flow, &mut ctx.clock, max_step)
                .inspect_err(|e| tracing::error!("Solver failed: {}", e))?;

            min_dt = min_dt.min(report.dt);
            max_dt = max_dt.max(report.dt);

            if ctx.clock.iteration % 100 == 0 {
                tracing::debug!(
                    "Step {}: t = {:.6} s, dt = {:.3e} s, |u|max = {:.3} m/s, cells = {}",
                    ctx.clock.iteration,
                    ctx.clock.time,
                    report.dt,
                    report.max_speed,
                    ctx.last_adapt.cells
                );
            }
        }

        let summary = RunSummary {
            iterations: ctx.clock.iteration,
            final_time: ctx.clock.time,
            reached_end,
            frames_written: ctx.artifacts.frames_written(),
            frames_failed: ctx.artifacts.frames_failed(),
            log_lines: ctx.artifacts.log_lines(),
            min_dt: if min_dt.is_finite() { min_dt } else { 0.0 },
            max_dt,
            cells: ctx.domain.grid().len(),
            levels: ctx.domain.grid().level_histogram(),
            seed: seed_report,
            run_dir: ctx.artifacts.run_dir().to_path_buf(),
            wall_time: start_wall_time.elapsed(),
        };

        tracing::info!(
            "Run finished: {} steps, t = {} s, {} frames ({} failed), {} log lines, dt in [{:.3e}, {:.3e}], {:.2} s wall",
            summary.iterations,
            summary.final_time,
            summary.frames_written,
            summary.frames_failed,
            summary.log_lines,
            summary.min_dt,
            summary.max_dt,
            summary.wall_time.as_secs_f64()
        );
        tracing::debug!("Final mesh (level, cells): {:?}", summary.levels);

        Ok(summary)
    }
}
