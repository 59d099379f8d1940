//! Synthetic data generation (for trying the pipeline without a microscope).

pub mod synth;

pub use synth::*;
