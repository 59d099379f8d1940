//! Diffusion coefficient estimation.
//!
//! The forward model is the trajectory simulator, started from the first
//! measured profile and evaluated on the measured timestamps. The search runs
//! over `D` alone; the measured matrix is flattened row-major so that every
//! sample of every time point contributes one residual.

use crate::domain::{DiffusionModel, FitConfig, FitResult, Trajectory};
use crate::error::CoreError;
use crate::fit::levenberg::{LmOptions, levenberg_marquardt};
use crate::models::simulate_flat;

/// Fit `D` to a measured trajectory.
pub fn fit_diffusion(measured: &Trajectory, config: &FitConfig) -> Result<FitResult, CoreError> {
    measured.validate()?;
    if !(config.initial_coefficient.is_finite() && config.initial_coefficient > 0.0) {
        return Err(CoreError::input_shape(format!(
            "initial coefficient must be finite and > 0, got {:e}",
            config.initial_coefficient
        )));
    }

    let observed = measured.flatten();
    let initial = measured.initial_profile();
    let timestamps = measured.timestamps.as_slice();
    let dx = measured.dx;

    let forward = |params: &[f64]| -> Result<Vec<f64>, CoreError> {
        simulate_flat(initial, &DiffusionModel::new(params[0], dx), timestamps)
    };
    let non_negative = |params: &[f64]| params[0] >= 0.0;

    let opts = LmOptions {
        max_iterations: config.max_iterations,
        xtol: config.xtol,
        ftol: config.ftol,
        ..LmOptions::default()
    };

    let report = levenberg_marquardt(
        forward,
        &observed,
        &[config.initial_coefficient],
        non_negative,
        &opts,
    )?;

    let std_error = report.std_errors()[0];
    Ok(FitResult {
        coefficient: report.params[0],
        std_error,
        iterations: report.iterations,
        sse: report.sse,
        n_obs: report.n_obs,
    })
}
