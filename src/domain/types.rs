//! Shared domain types.
//!
//! These types are intentionally kept lightweight and transient: every cell is
//! processed in its own fit-and-simulate cycle and nothing here outlives it.
//!
//! Units:
//! - `dx` is stored in micrometres (as written by the acquisition tooling)
//! - the diffusion coefficient is in m²/s
//! - timestamps are in seconds, re-based so the first one is 0

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Seed for the least-squares search, typical of membrane protein diffusion (m²/s).
pub const DEFAULT_INITIAL_COEFFICIENT: f64 = 1e-13;

/// Number of leading time differences ignored when picking the high-res Δt.
pub const DEFAULT_DISCARD_LEADING: usize = 5;

/// Micrometres per metre; `dx` is converted with this before stepping.
pub const MICRONS_PER_METER: f64 = 1e6;

/// One intensity profile along the line, sampled at uniform `dx`.
pub type Profile = Vec<f64>;

/// An ordered sequence of `(timestamp, profile)` pairs on a uniform grid.
///
/// Used both for measured kymographs and for model output.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    /// Spatial step in micrometres.
    pub dx: f64,
    pub timestamps: Vec<f64>,
    pub profiles: Vec<Profile>,
}

/// A trajectory produced entirely by the model.
pub type SimulationResult = Trajectory;

impl Trajectory {
    /// Build a trajectory and check its shape invariants.
    pub fn new(dx: f64, timestamps: Vec<f64>, profiles: Vec<Profile>) -> Result<Self, CoreError> {
        let trajectory = Self {
            dx,
            timestamps,
            profiles,
        };
        trajectory.validate()?;
        Ok(trajectory)
    }

    /// Number of time points (`M`).
    pub fn n_times(&self) -> usize {
        self.profiles.len()
    }

    /// Number of spatial samples per profile (`N`).
    pub fn n_positions(&self) -> usize {
        self.profiles.first().map_or(0, Vec::len)
    }

    pub fn initial_profile(&self) -> &[f64] {
        self.profiles.first().map_or(&[], Vec::as_slice)
    }

    /// Row-major concatenation of every profile.
    pub fn flatten(&self) -> Vec<f64> {
        crate::math::flatten(&self.profiles)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if !(self.dx.is_finite() && self.dx > 0.0) {
            return Err(CoreError::input_shape(format!(
                "spatial step must be finite and > 0, got {}",
                self.dx
            )));
        }
        if self.timestamps.len() != self.profiles.len() {
            return Err(CoreError::input_shape(format!(
                "{} timestamps but {} profiles",
                self.timestamps.len(),
                self.profiles.len()
            )));
        }
        if self.timestamps.len() < 2 {
            return Err(CoreError::input_shape(format!(
                "need at least 2 timestamps, got {}",
                self.timestamps.len()
            )));
        }
        let n = self.n_positions();
        if n < 2 {
            return Err(CoreError::input_shape(format!(
                "profiles need at least 2 positions, got {n}"
            )));
        }
        if let Some((row, p)) = self.profiles.iter().enumerate().find(|(_, p)| p.len() != n) {
            return Err(CoreError::input_shape(format!(
                "row {row} has {} values, expected {n}",
                p.len()
            )));
        }
        if self.profiles.iter().flatten().any(|v| !v.is_finite()) {
            return Err(CoreError::input_shape("profiles contain non-finite values"));
        }
        for pair in self.timestamps.windows(2) {
            if !(pair[1] > pair[0]) {
                return Err(CoreError::input_shape(format!(
                    "timestamps must be strictly increasing ({} then {})",
                    pair[0], pair[1]
                )));
            }
        }
        Ok(())
    }
}

/// Physical parameters driving the stepper.
///
/// The boundary policy is fixed: reflecting (no-flux) at both ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiffusionModel {
    /// Diffusion coefficient (m²/s).
    pub coefficient: f64,
    /// Spatial step (µm).
    pub dx: f64,
}

impl DiffusionModel {
    pub fn new(coefficient: f64, dx: f64) -> Self {
        Self { coefficient, dx }
    }

    /// Spatial step in metres.
    pub fn dx_meters(&self) -> f64 {
        self.dx / MICRONS_PER_METER
    }

    /// Same physics on a grid twice as dense.
    pub fn refined(&self) -> Self {
        Self {
            coefficient: self.coefficient,
            dx: self.dx / 2.0,
        }
    }
}

/// Estimated coefficient plus fit diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    /// Best-fit diffusion coefficient (m²/s).
    pub coefficient: f64,
    /// One-sigma standard error of `coefficient`.
    pub std_error: f64,
    pub iterations: usize,
    pub sse: f64,
    pub n_obs: usize,
}

/// Element-wise `measured - simulated`, same shape as its inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct ResidualMatrix {
    pub rows: Vec<Profile>,
}

impl ResidualMatrix {
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }
}

/// Settings for one fit-and-simulate cycle.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct FitConfig {
    /// Seed value for the coefficient search (m²/s).
    pub initial_coefficient: f64,
    /// Iteration cap for the Levenberg–Marquardt search.
    pub max_iterations: usize,
    /// Relative step tolerance.
    pub xtol: f64,
    /// Relative cost-reduction tolerance.
    pub ftol: f64,
    /// Leading time differences ignored by the high-res Δt rule.
    pub discard_leading: usize,
    /// Run the refined (`dx/2`) replay.
    pub high_res: bool,
    /// Write a `-fit.json` next to the output tables.
    pub export_fit_json: bool,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            initial_coefficient: DEFAULT_INITIAL_COEFFICIENT,
            max_iterations: 200,
            xtol: 1e-10,
            ftol: 1e-10,
            discard_leading: DEFAULT_DISCARD_LEADING,
            high_res: true,
            export_fit_json: false,
        }
    }
}

/// One row of the batch summary table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellSummary {
    pub cell_id: String,
    pub diffusion_coefficient: f64,
    pub diffusion_coefficient_error: f64,
    pub simulation: PathBuf,
    pub residuals: PathBuf,
    pub high_res: Option<PathBuf>,
    pub high_res_delta_x: Option<f64>,
    pub high_res_delta_t: Option<f64>,
}

/// A saved fit file (JSON).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitFile {
    pub tool: String,
    pub cell_id: String,
    pub source: PathBuf,
    pub dx_um: f64,
    pub n_times: usize,
    pub n_positions: usize,
    pub fit: FitResult,
    pub high_res_delta_x: Option<f64>,
    pub high_res_delta_t: Option<f64>,
}
