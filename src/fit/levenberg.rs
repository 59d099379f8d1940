//! Levenberg–Marquardt least squares for small parameter vectors.
//!
//! Given a forward model `f(θ) -> ŷ` and observations `y`, we minimise
//!
//! ```text
//! S(θ) = Σ (y_i - ŷ_i(θ))²
//! ```
//!
//! Each iteration:
//! 1. build the Jacobian by forward differences (one model call per parameter)
//! 2. solve `(JᵀJ + λ·diag(JᵀJ)) δ = Jᵀr` (Marquardt scaling, so parameters of
//!    very different magnitudes, such as D ~ 1e-13 m²/s, need no rescaling)
//! 3. accept the step if `S` decreases (λ shrinks), otherwise grow λ and retry
//!
//! The routine stops when the step or the relative decrease of `S` falls
//! below tolerance. Step sizes are measured against the parameter's own
//! magnitude (or the seed's, near zero). A small step before any accepted
//! one only counts if the gradient is negligible too. Anything else (iteration
//! cap, λ blow-up, a Jacobian column at roundoff level) is reported as
//! [`CoreError::NonConvergence`] with the last estimate attached.

use nalgebra::{DMatrix, DVector};

use crate::error::CoreError;

/// Damping above this means no descent direction is left.
const LAMBDA_MAX: f64 = 1e16;

/// A finite-difference change below `FLAT_RESPONSE · ε · ‖f(θ)‖` is roundoff.
const FLAT_RESPONSE: f64 = 1e3;

/// Cosine between residual and every Jacobian column below which the
/// gradient counts as zero.
const GTOL: f64 = 1e-8;

/// Tuning knobs for [`levenberg_marquardt`].
#[derive(Debug, Clone)]
pub struct LmOptions {
    /// Maximum number of trial steps.
    pub max_iterations: usize,
    /// Relative step tolerance.
    pub xtol: f64,
    /// Relative cost-reduction tolerance.
    pub ftol: f64,
    pub lambda_init: f64,
    pub lambda_up: f64,
    pub lambda_down: f64,
    /// Relative forward-difference step.
    pub fd_step: f64,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            xtol: 1e-10,
            ftol: 1e-10,
            lambda_init: 1e-3,
            lambda_up: 10.0,
            lambda_down: 0.1,
            fd_step: f64::EPSILON.sqrt(),
        }
    }
}

/// Result of a converged search.
#[derive(Debug, Clone)]
pub struct LmReport {
    pub params: Vec<f64>,
    /// Parameter covariance `(JᵀJ)⁻¹ · S/(m-p)`; `None` if it cannot be formed.
    pub covariance: Option<DMatrix<f64>>,
    pub sse: f64,
    pub iterations: usize,
    pub n_obs: usize,
}

impl LmReport {
    /// One-sigma errors (square roots of the covariance diagonal).
    ///
    /// Parameters without a usable covariance get `f64::INFINITY`.
    pub fn std_errors(&self) -> Vec<f64> {
        match &self.covariance {
            Some(cov) => (0..self.params.len())
                .map(|i| {
                    let v = cov[(i, i)];
                    if v.is_finite() && v >= 0.0 { v.sqrt() } else { f64::INFINITY }
                })
                .collect(),
            None => vec![f64::INFINITY; self.params.len()],
        }
    }
}

/// Minimise the squared distance between `model(θ)` and `observed`.
///
/// `feasible` rejects trial parameters outside the model's domain; such trials
/// count as failed steps rather than errors.
pub fn levenberg_marquardt<F, C>(
    model: F,
    observed: &[f64],
    initial: &[f64],
    feasible: C,
    opts: &LmOptions,
) -> Result<LmReport, CoreError>
where
    F: Fn(&[f64]) -> Result<Vec<f64>, CoreError>,
    C: Fn(&[f64]) -> bool,
{
    let p = initial.len();
    let m = observed.len();
    if p == 0 {
        return Err(CoreError::input_shape("no parameters to fit"));
    }
    if m == 0 {
        return Err(CoreError::input_shape("no observations to fit"));
    }

    let y = DVector::from_column_slice(observed);
    let scale: Vec<f64> = initial.iter().map(|v| v.abs().max(f64::MIN_POSITIVE)).collect();

    let mut x = DVector::from_column_slice(initial);
    let mut pred = evaluate(&model, x.as_slice(), m)?;
    let mut resid = &y - &pred;
    let mut cost = resid.norm_squared();

    let mut lambda = opts.lambda_init;
    let mut converged = cost == 0.0;
    let mut iterations = 0;
    let mut accepted = 0usize;

    let mut jacobian = DMatrix::<f64>::zeros(m, p);
    let mut jac_stale = true;

    while !converged && iterations < opts.max_iterations {
        iterations += 1;

        if jac_stale {
            jacobian = forward_jacobian(&model, x.as_slice(), &pred, &scale, opts.fd_step)?;
            jac_stale = false;
        }
        let jtj = jacobian.transpose() * &jacobian;
        let grad = jacobian.transpose() * &resid;

        if (0..p).any(|i| !(jtj[(i, i)].is_finite() && jtj[(i, i)] > 0.0)) {
            return Err(non_convergence(
                "singular Jacobian (the model does not respond to a parameter)",
                x.as_slice(),
                cost,
                iterations,
            ));
        }

        let mut damped = jtj.clone();
        for i in 0..p {
            damped[(i, i)] += lambda * jtj[(i, i)];
        }

        let Some(delta) = damped.cholesky().map(|c| c.solve(&grad)) else {
            lambda *= opts.lambda_up;
            if lambda > LAMBDA_MAX {
                break;
            }
            continue;
        };

        if step_is_small(&delta, &x, &scale, opts.xtol)
            && (accepted > 0 || gradient_is_negligible(&jacobian, &resid))
        {
            converged = true;
            break;
        }

        let trial = &x + &delta;
        if !feasible(trial.as_slice()) {
            log::debug!("lm iter {iterations}: infeasible trial {:?}, lambda={lambda:e}", trial.as_slice());
            lambda *= opts.lambda_up;
            if lambda > LAMBDA_MAX {
                break;
            }
            continue;
        }

        let trial_pred = evaluate(&model, trial.as_slice(), m)?;
        let trial_resid = &y - &trial_pred;
        let trial_cost = trial_resid.norm_squared();

        if trial_cost < cost {
            let rel_decrease = (cost - trial_cost) / cost;
            log::debug!(
                "lm iter {iterations}: accepted {:?}, cost {cost:e} -> {trial_cost:e}, lambda={lambda:e}",
                trial.as_slice()
            );
            x = trial;
            pred = trial_pred;
            resid = trial_resid;
            cost = trial_cost;
            lambda = (lambda * opts.lambda_down).max(f64::MIN_POSITIVE);
            jac_stale = true;
            accepted += 1;

            // A tiny decrease under heavy damping only means the step was throttled.
            if cost == 0.0 || (rel_decrease <= opts.ftol && lambda <= opts.lambda_init) {
                converged = true;
            }
        } else {
            log::debug!("lm iter {iterations}: rejected, cost {trial_cost:e} >= {cost:e}, lambda={lambda:e}");
            lambda *= opts.lambda_up;
            if lambda > LAMBDA_MAX {
                break;
            }
        }
    }

    if !converged {
        let reason = if iterations >= opts.max_iterations {
            format!("iteration cap of {} reached", opts.max_iterations)
        } else {
            "no decrease in residual for any damping".to_string()
        };
        return Err(non_convergence(&reason, x.as_slice(), cost, iterations));
    }

    if jac_stale {
        jacobian = forward_jacobian(&model, x.as_slice(), &pred, &scale, opts.fd_step)?;
    }
    let covariance = covariance(&jacobian, cost, m, p);

    Ok(LmReport {
        params: x.iter().copied().collect(),
        covariance,
        sse: cost,
        iterations,
        n_obs: m,
    })
}

fn evaluate<F>(model: &F, params: &[f64], m: usize) -> Result<DVector<f64>, CoreError>
where
    F: Fn(&[f64]) -> Result<Vec<f64>, CoreError>,
{
    let pred = model(params)?;
    if pred.len() != m {
        return Err(CoreError::input_shape(format!(
            "model produced {} values for {m} observations",
            pred.len()
        )));
    }
    if pred.iter().any(|v| !v.is_finite()) {
        return Err(CoreError::singular("model produced non-finite values"));
    }
    Ok(DVector::from_vec(pred))
}

fn forward_jacobian<F>(
    model: &F,
    x: &[f64],
    base: &DVector<f64>,
    scale: &[f64],
    fd_step: f64,
) -> Result<DMatrix<f64>, CoreError>
where
    F: Fn(&[f64]) -> Result<Vec<f64>, CoreError>,
{
    let m = base.len();
    let mut jac = DMatrix::<f64>::zeros(m, x.len());
    for j in 0..x.len() {
        // Step upwards so a parameter sitting on a lower bound stays feasible.
        let h = fd_step * x[j].abs().max(scale[j]);
        let mut shifted = x.to_vec();
        shifted[j] += h;
        let pred = evaluate(model, &shifted, m)?;
        let change = &pred - base;
        if change.norm() <= FLAT_RESPONSE * f64::EPSILON * base.norm() {
            // Column stays zero: the model does not respond to this parameter.
            continue;
        }
        for i in 0..m {
            jac[(i, j)] = change[i] / h;
        }
    }
    Ok(jac)
}

fn step_is_small(delta: &DVector<f64>, x: &DVector<f64>, scale: &[f64], xtol: f64) -> bool {
    delta
        .iter()
        .zip(x.iter())
        .zip(scale.iter())
        .all(|((d, xi), s)| d.abs() <= xtol * xi.abs().max(*s))
}

fn gradient_is_negligible(jacobian: &DMatrix<f64>, resid: &DVector<f64>) -> bool {
    let r_norm = resid.norm();
    jacobian
        .column_iter()
        .all(|col| col.dot(resid).abs() <= GTOL * col.norm() * r_norm)
}

fn covariance(jacobian: &DMatrix<f64>, sse: f64, m: usize, p: usize) -> Option<DMatrix<f64>> {
    if m <= p {
        log::warn!("covariance undefined: {m} observations for {p} parameters");
        return None;
    }
    let jtj = jacobian.transpose() * jacobian;
    let Some(inv) = jtj.try_inverse() else {
        log::warn!("covariance undefined: JᵀJ is not invertible");
        return None;
    };
    Some(inv * (sse / (m - p) as f64))
}

fn non_convergence(message: &str, x: &[f64], cost: f64, iterations: usize) -> CoreError {
    CoreError::NonConvergence {
        message: message.to_string(),
        last_coefficient: x.first().copied().unwrap_or(f64::NAN),
        last_sse: cost,
        iterations,
    }
}
