//! Input/output helpers.
//!
//! - kymograph CSV ingest + validation (`ingest`)
//! - simulated/residual tables and batch summary (`export`)
//! - per-cell fit JSON read/write (`fit_file`)

pub mod export;
pub mod fit_file;
pub mod ingest;

pub use export::*;
pub use fit_file::*;
pub use ingest::*;
