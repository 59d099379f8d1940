//! Numerical utilities: tridiagonal solve and matrix flattening.

pub mod matrix;
pub mod tridiag;

pub use matrix::*;
pub use tridiag::*;
