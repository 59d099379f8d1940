//! Crank–Nicolson step for 1-D diffusion with reflecting ends.
//!
//! With `r = D·Δt / Δx²` the step solves `A·x' = B·x` where
//!
//! ```text
//! A: diag 1+r, off-diagonals -r/2      B: diag 1-r, off-diagonals r/2
//! ```
//!
//! At both boundary rows the coupling towards the interior is doubled
//! (`A[0][1] = A[N-1][N-2] = -r`, `B[0][1] = B[N-1][N-2] = r`), which is the
//! ghost-point form of a zero-flux (Neumann) condition.
//!
//! The scheme conserves the trapezoidal integral of the profile (end samples
//! weighted by 1/2), not the plain sum: the doubled couplings move mass as if
//! the boundary cells were half-width. See [`total_intensity`].

use crate::domain::Profile;
use crate::error::CoreError;
use crate::math::Tridiagonal;

/// Advance `profile` by one implicit step.
///
/// `dx` is in metres (callers convert from µm), `delta_t` in seconds and
/// `coefficient` in m²/s. For `coefficient = 0` the profile is returned
/// unchanged.
pub fn crank_nicolson_step(
    profile: &[f64],
    dx: f64,
    delta_t: f64,
    coefficient: f64,
) -> Result<Profile, CoreError> {
    let n = profile.len();
    if n < 2 {
        return Err(CoreError::input_shape(format!(
            "profile needs at least 2 samples, got {n}"
        )));
    }
    if !(delta_t.is_finite() && delta_t > 0.0) {
        return Err(CoreError::input_shape(format!(
            "time step must be finite and > 0, got {delta_t}"
        )));
    }
    if !(dx.is_finite() && dx > 0.0) {
        return Err(CoreError::singular(format!(
            "degenerate spatial step {dx}"
        )));
    }
    if !(coefficient.is_finite() && coefficient >= 0.0) {
        return Err(CoreError::singular(format!(
            "diffusion coefficient must be finite and >= 0, got {coefficient:e}"
        )));
    }

    let r = coefficient * delta_t / (dx * dx);
    if !r.is_finite() {
        return Err(CoreError::singular(format!(
            "mesh ratio overflowed (D={coefficient:e}, dt={delta_t}, dx={dx:e})"
        )));
    }

    let system = implicit_matrix(n, r);
    let rhs = explicit_rhs(profile, r);
    system.solve(&rhs)
}

/// Left-hand side `A` of the Crank–Nicolson system.
pub fn implicit_matrix(n: usize, r: f64) -> Tridiagonal {
    let mut a = Tridiagonal::constant(n, -r / 2.0, 1.0 + r, -r / 2.0);
    if n >= 2 {
        a.upper[0] *= 2.0;
        a.lower[n - 1] *= 2.0;
    }
    a
}

/// Right-hand side `B·x`, built directly from the current profile.
pub fn explicit_rhs(x: &[f64], r: f64) -> Vec<f64> {
    let n = x.len();
    let mut b = vec![0.0; n];
    for i in 1..n - 1 {
        b[i] = r / 2.0 * x[i - 1] + (1.0 - r) * x[i] + r / 2.0 * x[i + 1];
    }
    b[0] = (1.0 - r) * x[0] + r * x[1];
    b[n - 1] = (1.0 - r) * x[n - 1] + r * x[n - 2];
    b
}

/// Trapezoidal integral of a profile in units of `dx`.
///
/// This is the quantity the reflecting scheme conserves exactly.
pub fn total_intensity(profile: &[f64]) -> f64 {
    let n = profile.len();
    match n {
        0 => 0.0,
        1 => profile[0],
        _ => profile.iter().sum::<f64>() - 0.5 * (profile[0] + profile[n - 1]),
    }
}

/// Spread of a profile about its mean, using the same trapezoidal weights
/// as [`total_intensity`].
pub fn weighted_variance(profile: &[f64]) -> f64 {
    let n = profile.len();
    if n < 2 {
        return 0.0;
    }
    let weight = |i: usize| if i == 0 || i == n - 1 { 0.5 } else { 1.0 };
    let total_weight = (n - 1) as f64;
    let mean = total_intensity(profile) / total_weight;
    profile
        .iter()
        .enumerate()
        .map(|(i, v)| weight(i) * (v - mean) * (v - mean))
        .sum::<f64>()
        / total_weight
}

#[cfg(test)]
mod tests {
    use super::*;

    fn population_variance(p: &[f64]) -> f64 {
        let mean = p.iter().sum::<f64>() / p.len() as f64;
        p.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / p.len() as f64
    }

    fn sample_profiles() -> Vec<Vec<f64>> {
        vec![
            vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0],
            vec![1.0, 0.0, 0.0, 0.0],
            vec![0.2, 0.9],
            vec![3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0],
            (0..25).map(|i| 1.0 - (-((i as f64 - 12.0) / 3.0).powi(2)).exp()).collect(),
        ]
    }

    #[test]
    fn zero_diffusion_is_identity() {
        for p in sample_profiles() {
            for &(dx, dt) in &[(1e-6, 0.5), (2.5e-7, 3.0), (1.0, 1e-3)] {
                let next = crank_nicolson_step(&p, dx, dt, 0.0).unwrap();
                for (a, b) in p.iter().zip(next.iter()) {
                    assert!((a - b).abs() < 1e-15, "expected {a}, got {b}");
                }
            }
        }
    }

    #[test]
    fn reflecting_ends_conserve_integral() {
        for p in sample_profiles() {
            for &(d, dt) in &[(1e-13, 1.0), (2e-13, 0.3), (5e-12, 7.0)] {
                let next = crank_nicolson_step(&p, 1e-6, dt, d).unwrap();
                let before = total_intensity(&p);
                let after = total_intensity(&next);
                let rel = (after - before).abs() / before.abs().max(1e-300);
                assert!(rel < 1e-9, "integral drifted: {before} -> {after}");
            }
        }
    }

    #[test]
    fn diffusion_never_sharpens() {
        for p in sample_profiles() {
            for &d in &[1e-14, 2e-13, 3e-12] {
                let next = crank_nicolson_step(&p, 1e-6, 1.0, d).unwrap();
                assert!(
                    weighted_variance(&next) <= weighted_variance(&p) + 1e-15,
                    "variance grew for {p:?}"
                );
            }
        }
    }

    #[test]
    fn central_peak_spreads_symmetrically() {
        let p = vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0];
        let next = crank_nicolson_step(&p, 1e-6, 1.0, 2e-13).unwrap();
        assert!(population_variance(&next) < population_variance(&p));
        assert!(next[3] < 1.0);
        for i in 0..3 {
            assert!((next[i] - next[6 - i]).abs() < 1e-14);
        }
    }

    #[test]
    fn hand_computed_three_point_step() {
        // r = 1: A = [[2,-1,0],[-.5,2,-.5],[0,-1,2]], B·x = [0, .5, 0].
        let next = crank_nicolson_step(&[1.0, 0.0, 0.0], 1.0, 1.0, 1.0).unwrap();
        let expected = [1.0 / 6.0, 1.0 / 3.0, 1.0 / 6.0];
        for (a, b) in next.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-14);
        }
        // Plain sum drifts (1 -> 2/3); only the trapezoidal integral is kept.
        assert!((next.iter().sum::<f64>() - 2.0 / 3.0).abs() < 1e-14);
        assert!((total_intensity(&next) - total_intensity(&[1.0, 0.0, 0.0])).abs() < 1e-14);
    }

    #[test]
    fn boundary_couplings_are_doubled() {
        let a = implicit_matrix(5, 0.4);
        assert!((a.upper[0] + 0.4).abs() < 1e-15);
        assert!((a.lower[4] + 0.4).abs() < 1e-15);
        assert!((a.upper[1] + 0.2).abs() < 1e-15);
        assert!((a.lower[1] + 0.2).abs() < 1e-15);
        assert!((a.diag[2] - 1.4).abs() < 1e-15);
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        assert!(matches!(
            crank_nicolson_step(&[1.0], 1.0, 1.0, 1.0),
            Err(CoreError::InputShape { .. })
        ));
        assert!(matches!(
            crank_nicolson_step(&[1.0, 2.0], 1.0, 0.0, 1.0),
            Err(CoreError::InputShape { .. })
        ));
        assert!(matches!(
            crank_nicolson_step(&[1.0, 2.0], 0.0, 1.0, 1.0),
            Err(CoreError::SingularSystem { .. })
        ));
        assert!(matches!(
            crank_nicolson_step(&[1.0, 2.0], 1.0, 1.0, -1e-13),
            Err(CoreError::SingularSystem { .. })
        ));
    }
}
