//! Command-line parsing for the FRAP diffusion fitter.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! numerical code and from command dispatch (`crate::app`).

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{DEFAULT_DISCARD_LEADING, DEFAULT_INITIAL_COEFFICIENT};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "frap",
    version,
    about = "Estimate diffusion coefficients from FRAP kymographs"
)]
pub struct Cli {
    /// More log output (debug level). Overridden by RUST_LOG.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only warnings and errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit one kymograph, print diagnostics, and write simulated/residual tables next to it.
    Fit(FitArgs),
    /// Fit every `*-values.csv` under a directory and write a summary table.
    Batch(BatchArgs),
    /// Write a synthetic kymograph with a known diffusion coefficient.
    Synth(SynthArgs),
}

/// Options shared by `fit` and `batch`.
#[derive(Debug, Args, Clone)]
pub struct FitOpts {
    /// Seed value for the coefficient search (m^2/s).
    #[arg(long, default_value_t = DEFAULT_INITIAL_COEFFICIENT)]
    pub initial_d: f64,

    /// Iteration cap for the least-squares search.
    #[arg(long, default_value_t = 200)]
    pub max_iterations: usize,

    /// Relative step tolerance.
    #[arg(long, default_value_t = 1e-10)]
    pub xtol: f64,

    /// Relative cost-reduction tolerance.
    #[arg(long, default_value_t = 1e-10)]
    pub ftol: f64,

    /// Leading frame gaps ignored when picking the high-res time step.
    #[arg(long, default_value_t = DEFAULT_DISCARD_LEADING)]
    pub discard_leading: usize,

    /// Skip the refined (dx/2) replay.
    #[arg(long)]
    pub no_high_res: bool,

    /// Also write `<cell>-fit.json`.
    #[arg(long)]
    pub export_fit_json: bool,
}

#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    /// Kymograph file (`<cell>-values.csv`).
    #[arg(value_name = "VALUES_CSV")]
    pub input: PathBuf,

    #[command(flatten)]
    pub opts: FitOpts,
}

#[derive(Debug, Args, Clone)]
pub struct BatchArgs {
    /// Directory searched recursively for `*-values.csv`.
    #[arg(value_name = "ROOT")]
    pub root: PathBuf,

    /// Worker threads (0 = one per core).
    #[arg(short = 'j', long, default_value_t = 0)]
    pub jobs: usize,

    /// Summary CSV path (default: `<ROOT>/diffusion-coefficients.csv`).
    #[arg(long, value_name = "CSV")]
    pub summary: Option<PathBuf>,

    #[command(flatten)]
    pub opts: FitOpts,
}

#[derive(Debug, Args, Clone)]
pub struct SynthArgs {
    /// Output kymograph path.
    #[arg(value_name = "OUT_CSV")]
    pub output: PathBuf,

    /// True diffusion coefficient (m^2/s).
    #[arg(long, default_value_t = 1e-13)]
    pub coefficient: f64,

    /// Samples along the line.
    #[arg(long, default_value_t = 31)]
    pub positions: usize,

    /// Spatial step (um).
    #[arg(long, default_value_t = 0.1)]
    pub dx: f64,

    /// Number of frames.
    #[arg(long, default_value_t = 40)]
    pub frames: usize,

    /// Nominal frame interval (s).
    #[arg(long, default_value_t = 0.5)]
    pub interval: f64,

    /// Relative jitter of frame gaps.
    #[arg(long, default_value_t = 0.2)]
    pub jitter: f64,

    /// Fractional intensity removed at the bleach centre.
    #[arg(long, default_value_t = 0.7)]
    pub depth: f64,

    /// Gaussian width of the bleach spot (um).
    #[arg(long, default_value_t = 0.4)]
    pub width: f64,

    /// Standard deviation of additive noise.
    #[arg(long, default_value_t = 0.0)]
    pub noise: f64,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}
