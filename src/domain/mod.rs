//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - trajectories (measured kymographs and simulated ones)
//! - the diffusion model parameters handed to the stepper
//! - fit outputs (`FitResult`, `ResidualMatrix`, `CellSummary`, `FitFile`)
//! - run configuration (`FitConfig`)

pub mod types;

pub use types::*;
