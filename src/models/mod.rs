//! Diffusion model implementations.
//!
//! The stepper, simulator, upsampler and refined replay are small, pure
//! functions so that the estimator and the pipeline can stay generic over them.

pub mod refine;
pub mod simulator;
pub mod stepper;
pub mod upsample;

pub use refine::*;
pub use simulator::*;
pub use stepper::*;
pub use upsample::*;
