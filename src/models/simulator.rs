//! Forward model: replay diffusion across an irregular time axis.
//!
//! Each call is self-contained; the returned profiles never alias the input
//! or any buffer kept between calls, so the estimator can evaluate it as a
//! pure function `D ↦ flattened prediction`.

use crate::domain::{DiffusionModel, SimulationResult};
use crate::error::CoreError;
use crate::math::{diffs, to_matrix};
use crate::models::crank_nicolson_step;

/// Simulate one profile per timestamp, starting from `initial`.
///
/// The first output profile is a copy of `initial`; each later one advances
/// the previous by the gap to the next timestamp.
pub fn simulate(
    initial: &[f64],
    model: &DiffusionModel,
    timestamps: &[f64],
) -> Result<SimulationResult, CoreError> {
    if timestamps.is_empty() {
        return Err(CoreError::input_shape("simulation needs at least one timestamp"));
    }
    if initial.len() < 2 {
        return Err(CoreError::input_shape(format!(
            "initial profile needs at least 2 samples, got {}",
            initial.len()
        )));
    }

    let flat = simulate_flat(initial, model, timestamps)?;
    Ok(SimulationResult {
        dx: model.dx,
        timestamps: timestamps.to_vec(),
        profiles: to_matrix(&flat, initial.len())?,
    })
}

/// Same as [`simulate`] but returns the row-major concatenation directly.
pub fn simulate_flat(
    initial: &[f64],
    model: &DiffusionModel,
    timestamps: &[f64],
) -> Result<Vec<f64>, CoreError> {
    if timestamps.is_empty() {
        return Err(CoreError::input_shape("simulation needs at least one timestamp"));
    }

    let dx_m = model.dx_meters();
    let mut out = Vec::with_capacity(initial.len() * timestamps.len());
    let mut current = initial.to_vec();
    out.extend_from_slice(&current);

    for delta_t in diffs(timestamps) {
        current = crank_nicolson_step(&current, dx_m, delta_t, model.coefficient)?;
        out.extend_from_slice(&current);
    }
    Ok(out)
}
