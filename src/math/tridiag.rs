//! Tridiagonal systems and their O(N) solve (Thomas algorithm).
//!
//! The implicit diffusion step produces a strictly diagonally dominant
//! tridiagonal matrix for every `r >= 0`, so elimination without pivoting is
//! stable. We still check each pivot and report a singular system instead of
//! dividing by zero.

use crate::error::CoreError;

/// Pivots smaller than this (in absolute value) are treated as singular.
const PIVOT_EPS: f64 = 1e-300;

/// A tridiagonal matrix stored as three bands.
///
/// - `lower[i]` is `A[i][i-1]` (`lower[0]` is unused and kept at 0)
/// - `diag[i]` is `A[i][i]`
/// - `upper[i]` is `A[i][i+1]` (`upper[n-1]` is unused and kept at 0)
#[derive(Debug, Clone, PartialEq)]
pub struct Tridiagonal {
    pub lower: Vec<f64>,
    pub diag: Vec<f64>,
    pub upper: Vec<f64>,
}

impl Tridiagonal {
    /// Constant-band matrix of size `n`.
    pub fn constant(n: usize, lower: f64, diag: f64, upper: f64) -> Self {
        let mut lower_band = vec![lower; n];
        let mut upper_band = vec![upper; n];
        if n > 0 {
            lower_band[0] = 0.0;
            upper_band[n - 1] = 0.0;
        }
        Self {
            lower: lower_band,
            diag: vec![diag; n],
            upper: upper_band,
        }
    }

    pub fn len(&self) -> usize {
        self.diag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diag.is_empty()
    }

    /// Compute `A·x`.
    pub fn mul_vec(&self, x: &[f64]) -> Vec<f64> {
        let n = self.len();
        (0..n)
            .map(|i| {
                let mut v = self.diag[i] * x[i];
                if i > 0 {
                    v += self.lower[i] * x[i - 1];
                }
                if i + 1 < n {
                    v += self.upper[i] * x[i + 1];
                }
                v
            })
            .collect()
    }

    /// Solve `A·x = rhs`.
    pub fn solve(&self, rhs: &[f64]) -> Result<Vec<f64>, CoreError> {
        let n = self.len();
        if n == 0 {
            return Err(CoreError::singular("empty tridiagonal system"));
        }
        if self.lower.len() != n || self.upper.len() != n || rhs.len() != n {
            return Err(CoreError::singular(format!(
                "band/rhs length mismatch (lower={}, diag={n}, upper={}, rhs={})",
                self.lower.len(),
                self.upper.len(),
                rhs.len()
            )));
        }

        let mut c_prime = vec![0.0; n];
        let mut d_prime = vec![0.0; n];

        // Forward sweep
        let pivot = check_pivot(self.diag[0], 0)?;
        c_prime[0] = self.upper[0] / pivot;
        d_prime[0] = rhs[0] / pivot;

        for i in 1..n {
            let den = check_pivot(self.diag[i] - self.lower[i] * c_prime[i - 1], i)?;
            if i < n - 1 {
                c_prime[i] = self.upper[i] / den;
            }
            d_prime[i] = (rhs[i] - self.lower[i] * d_prime[i - 1]) / den;
        }

        // Back substitution
        let mut x = vec![0.0; n];
        x[n - 1] = d_prime[n - 1];
        for i in (0..n - 1).rev() {
            x[i] = d_prime[i] - c_prime[i] * x[i + 1];
        }

        if x.iter().any(|v| !v.is_finite()) {
            return Err(CoreError::singular("tridiagonal solve produced non-finite values"));
        }
        Ok(x)
    }
}

fn check_pivot(pivot: f64, row: usize) -> Result<f64, CoreError> {
    if !pivot.is_finite() || pivot.abs() < PIVOT_EPS {
        return Err(CoreError::singular(format!("zero pivot at row {row}")));
    }
    Ok(pivot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{DMatrix, DVector};

    fn to_dense(a: &Tridiagonal) -> DMatrix<f64> {
        let n = a.len();
        let mut m = DMatrix::<f64>::zeros(n, n);
        for i in 0..n {
            m[(i, i)] = a.diag[i];
            if i > 0 {
                m[(i, i - 1)] = a.lower[i];
            }
            if i + 1 < n {
                m[(i, i + 1)] = a.upper[i];
            }
        }
        m
    }

    #[test]
    fn identity_solve_returns_rhs() {
        let a = Tridiagonal::constant(5, 0.0, 1.0, 0.0);
        let d = [1.0, 2.0, 3.0, 4.0, 5.0];
        let x = a.solve(&d).unwrap();
        for i in 0..5 {
            assert!((x[i] - d[i]).abs() < 1e-12, "x[{i}] should equal d[{i}]");
        }
    }

    #[test]
    fn matches_dense_lu_solve() {
        // Crank–Nicolson shape with doubled boundary couplings.
        let r = 0.7;
        let mut a = Tridiagonal::constant(8, -r / 2.0, 1.0 + r, -r / 2.0);
        a.upper[0] *= 2.0;
        a.lower[7] *= 2.0;
        let d: Vec<f64> = (0..8).map(|i| (i as f64 * 0.37).sin() + 1.0).collect();

        let x = a.solve(&d).unwrap();
        let dense = to_dense(&a)
            .lu()
            .solve(&DVector::from_row_slice(&d))
            .unwrap();
        for i in 0..8 {
            assert!((x[i] - dense[i]).abs() < 1e-12, "x[{i}]={} dense={}", x[i], dense[i]);
        }

        let ax = a.mul_vec(&x);
        for i in 0..8 {
            assert!((ax[i] - d[i]).abs() < 1e-12);
        }
    }

    #[test]
    fn zero_pivot_is_singular() {
        let a = Tridiagonal::constant(3, 1.0, 0.0, 1.0);
        let err = a.solve(&[1.0, 1.0, 1.0]).unwrap_err();
        assert!(matches!(err, CoreError::SingularSystem { .. }));
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let a = Tridiagonal::constant(3, -0.1, 1.2, -0.1);
        assert!(a.solve(&[1.0, 2.0]).is_err());
    }
}
