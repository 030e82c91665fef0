//! Two-Phase Flow Kernel
//!
//! This crate provides the numerical collaborators of the droplet-impact
//! driver: an adaptive quadtree grid with per-field boundary conditions, the
//! refinement engine, volume-fraction seeding, a flow solver and a frame
//! renderer. It knows nothing about droplets or events; the orchestrator
//! crate composes these pieces into a run.
//!
//! # Modules
//! - [`grid`] -- Leaf-only quadtree storage, fields, sampling and gradients.
//! - [`boundary`] -- Per-side Dirichlet / Neumann conditions and ghost values.
//! - [`adapt`] -- Predicate refinement and wavelet-style adaptation.
//! - [`vof`] -- Volume fraction from a level-set function.
//! - [`fluid`] -- Two-phase material constants and mixture rules.
//! - [`solver`] -- `FlowSolver` trait, run clock, time-step control and the CPU solver.
//! - [`render`] -- `Renderer` trait and a PNG raster implementation.

#![warn(missing_docs)]

pub mod adapt;
pub mod boundary;
pub mod fluid;
pub mod grid;
pub mod render;
pub mod solver;
pub mod vof;

pub use adapt::{adapt_wavelet, refine_where, AdaptStats, CellInfo};
pub use boundary::{Boundary, BoundarySet, Side};
pub use fluid::FluidProperties;
pub use grid::{CellKey, FieldId, Prolongation, QuadGrid, MAX_LEVEL_LIMIT};
pub use render::{HeatmapOptions, RasterRenderer, RenderError, Renderer, ViewParams};
pub use solver::{
    compute_timestep, dtnext, CpuSolver, FlowFields, FlowSolver, RunClock, SolverError,
    StepReport,
};
pub use vof::fraction;
