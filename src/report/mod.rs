//! Reporting utilities: residuals and formatted terminal output.

pub mod format;

pub use format::*;

use crate::domain::{Profile, ResidualMatrix};
use crate::error::CoreError;

/// Element-wise `measured - simulated` for two matrices of the same shape.
pub fn compute_residuals(
    measured: &[Profile],
    simulated: &[Profile],
) -> Result<ResidualMatrix, CoreError> {
    if measured.len() != simulated.len() {
        return Err(CoreError::input_shape(format!(
            "residuals need matching row counts ({} measured, {} simulated)",
            measured.len(),
            simulated.len()
        )));
    }

    let mut rows = Vec::with_capacity(measured.len());
    for (i, (m, s)) in measured.iter().zip(simulated.iter()).enumerate() {
        if m.len() != s.len() {
            return Err(CoreError::input_shape(format!(
                "row {i}: {} measured values vs {} simulated",
                m.len(),
                s.len()
            )));
        }
        rows.push(m.iter().zip(s.iter()).map(|(a, b)| a - b).collect());
    }
    Ok(ResidualMatrix { rows })
}

/// Sum of squared residuals.
pub fn residual_sse(residuals: &ResidualMatrix) -> f64 {
    residuals.rows.iter().flatten().map(|r| r * r).sum()
}
