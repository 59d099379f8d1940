//! Coefficient fitting.
//!
//! Responsibilities:
//!
//! - a generic Levenberg–Marquardt search over a forward model (`levenberg`)
//! - the diffusion estimator that plugs the trajectory simulator into it (`estimator`)

pub mod estimator;
pub mod levenberg;

pub use estimator::*;
pub use levenberg::*;
