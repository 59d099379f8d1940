//! Synthetic FRAP kymographs.
//!
//! A Gaussian bleach spot is carved out of a flat profile, the recovery is
//! replayed with the trajectory simulator at a chosen coefficient, and
//! optional Gaussian read noise is added. Frame gaps can be jittered to mimic
//! the irregular timestamps of real acquisitions.
//!
//! Output is deterministic for a given seed.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{DiffusionModel, Profile, Trajectory};
use crate::error::AppError;
use crate::models::simulate;

/// Parameters of a synthetic acquisition.
#[derive(Debug, Clone)]
pub struct SynthParams {
    /// Samples along the line.
    pub n_positions: usize,
    /// Spatial step (µm).
    pub dx: f64,
    /// Frames including the first post-bleach one.
    pub n_frames: usize,
    /// Nominal gap between frames (s).
    pub frame_interval: f64,
    /// Relative jitter of each gap, uniform in `±jitter/2`.
    pub interval_jitter: f64,
    /// True diffusion coefficient (m²/s).
    pub coefficient: f64,
    /// Fractional intensity removed at the bleach centre (0..1).
    pub bleach_depth: f64,
    /// Gaussian width of the bleach spot (µm).
    pub bleach_width: f64,
    /// Standard deviation of additive noise.
    pub noise_sigma: f64,
    pub seed: u64,
}

impl Default for SynthParams {
    fn default() -> Self {
        Self {
            n_positions: 31,
            dx: 0.1,
            n_frames: 40,
            frame_interval: 0.5,
            interval_jitter: 0.2,
            coefficient: 1e-13,
            bleach_depth: 0.7,
            bleach_width: 0.4,
            noise_sigma: 0.0,
            seed: 42,
        }
    }
}

/// Generate a synthetic kymograph.
pub fn generate_kymograph(params: &SynthParams) -> Result<Trajectory, AppError> {
    if params.n_positions < 2 {
        return Err(AppError::new(2, "Synthetic profiles need at least 2 positions."));
    }
    if params.n_frames < 2 {
        return Err(AppError::new(2, "Synthetic kymographs need at least 2 frames."));
    }
    if !(params.dx.is_finite() && params.dx > 0.0) {
        return Err(AppError::new(2, "Spatial step must be finite and > 0."));
    }
    if !(params.frame_interval.is_finite() && params.frame_interval > 0.0) {
        return Err(AppError::new(2, "Frame interval must be finite and > 0."));
    }
    if !(0.0..2.0).contains(&params.interval_jitter) {
        return Err(AppError::new(2, "Interval jitter must be in [0, 2)."));
    }
    if !(0.0..=1.0).contains(&params.bleach_depth) {
        return Err(AppError::new(2, "Bleach depth must be in [0, 1]."));
    }
    if !(params.bleach_width.is_finite() && params.bleach_width > 0.0) {
        return Err(AppError::new(2, "Bleach width must be finite and > 0."));
    }
    if !(params.noise_sigma.is_finite() && params.noise_sigma >= 0.0) {
        return Err(AppError::new(2, "Noise sigma must be finite and >= 0."));
    }

    let mut rng = StdRng::seed_from_u64(params.seed);
    let timestamps = jittered_timestamps(&mut rng, params);
    let initial = bleach_profile(params);

    let clean = simulate(&initial, &DiffusionModel::new(params.coefficient, params.dx), &timestamps)?;
    let profiles = if params.noise_sigma > 0.0 {
        let normal = Normal::new(0.0, params.noise_sigma)
            .map_err(|e| AppError::new(4, format!("Noise distribution error: {e}")))?;
        clean
            .profiles
            .into_iter()
            .map(|row| row.into_iter().map(|v| v + normal.sample(&mut rng)).collect())
            .collect()
    } else {
        clean.profiles
    };

    Ok(Trajectory::new(params.dx, timestamps, profiles)?)
}

/// Flat unit profile with a Gaussian dip at the centre of the line.
pub fn bleach_profile(params: &SynthParams) -> Profile {
    let center = (params.n_positions - 1) as f64 * params.dx / 2.0;
    (0..params.n_positions)
        .map(|i| {
            let x = i as f64 * params.dx - center;
            1.0 - params.bleach_depth * (-(x / params.bleach_width).powi(2)).exp()
        })
        .collect()
}

fn jittered_timestamps(rng: &mut StdRng, params: &SynthParams) -> Vec<f64> {
    let half = params.interval_jitter / 2.0;
    let mut t = 0.0;
    let mut out = Vec::with_capacity(params.n_frames);
    out.push(t);
    for _ in 1..params.n_frames {
        let factor = if half > 0.0 { 1.0 + rng.gen_range(-half..half) } else { 1.0 };
        t += params.frame_interval * factor;
        out.push(t);
    }
    out
}
