//! Refined replay on a grid twice as dense.
//!
//! After fitting, the measured initial profile is upsampled to `dx/2` and
//! replayed with the fitted coefficient on a uniform time axis. The time step
//! of that axis is a representative gap between measured frames: the upper
//! median of all gaps after the first `discard` of them.

use crate::domain::{DiffusionModel, SimulationResult, Trajectory};
use crate::error::CoreError;
use crate::math::{diffs, upper_median};
use crate::models::{simulate, upsample};

/// Grid and time axis for the refined replay.
#[derive(Debug, Clone, PartialEq)]
pub struct HighResPlan {
    /// Spatial step (µm), half the measured one.
    pub dx: f64,
    pub delta_t: f64,
    /// `i · delta_t` for every measured frame `i`.
    pub timestamps: Vec<f64>,
}

/// Representative time step for the refined replay.
///
/// Gaps are `t[i+1] - t[i]`; the first `discard` are dropped, the rest sorted
/// and the element at index `len / 2` returned. If dropping leaves nothing,
/// all gaps are used.
pub fn high_res_delta_t(timestamps: &[f64], discard: usize) -> Result<f64, CoreError> {
    let gaps = diffs(timestamps);
    if gaps.is_empty() {
        return Err(CoreError::input_shape(
            "need at least 2 timestamps to pick a high-res time step",
        ));
    }

    let kept = if gaps.len() > discard {
        &gaps[discard..]
    } else {
        log::warn!(
            "only {} time gaps, cannot discard {discard}; using all of them",
            gaps.len()
        );
        &gaps[..]
    };

    upper_median(kept).ok_or_else(|| CoreError::input_shape("no time gaps left"))
}

/// Work out the refined grid for a measured trajectory.
pub fn plan_high_res(measured: &Trajectory, discard: usize) -> Result<HighResPlan, CoreError> {
    let delta_t = high_res_delta_t(&measured.timestamps, discard)?;
    let timestamps = (0..measured.n_times()).map(|i| i as f64 * delta_t).collect();
    Ok(HighResPlan {
        dx: measured.dx / 2.0,
        delta_t,
        timestamps,
    })
}

/// Replay the fitted process on the refined grid.
pub fn simulate_high_res(
    measured: &Trajectory,
    coefficient: f64,
    discard: usize,
) -> Result<(HighResPlan, SimulationResult), CoreError> {
    let plan = plan_high_res(measured, discard)?;
    let model = DiffusionModel::new(coefficient, measured.dx).refined();
    let initial = upsample(measured.initial_profile());
    let sim = simulate(&initial, &model, &plan.timestamps)?;
    Ok((plan, sim))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cumulative(gaps: &[f64]) -> Vec<f64> {
        let mut t = vec![0.0];
        for g in gaps {
            let last = *t.last().unwrap();
            t.push(last + g);
        }
        t
    }

    #[test]
    fn discards_leading_gaps_then_takes_median() {
        let ts = cumulative(&[1.0, 1.0, 1.0, 1.0, 1.0, 2.0, 4.0, 3.0, 5.0, 9.0]);
        assert_eq!(high_res_delta_t(&ts, 5).unwrap(), 4.0);
    }

    #[test]
    fn discard_is_configurable() {
        let ts = cumulative(&[1.0, 1.0, 1.0, 1.0, 1.0, 2.0, 4.0, 3.0, 5.0, 9.0]);
        // All ten gaps sorted: [1,1,1,1,1,2,3,4,5,9], index 5.
        assert_eq!(high_res_delta_t(&ts, 0).unwrap(), 2.0);
    }

    #[test]
    fn short_series_falls_back_to_all_gaps() {
        // Gaps [1,1,1,2,3]: nothing left after dropping 5, so all are used.
        let ts = [0.0, 1.0, 2.0, 3.0, 5.0, 8.0];
        assert_eq!(high_res_delta_t(&ts, 5).unwrap(), 1.0);
        assert_eq!(high_res_delta_t(&ts, 2).unwrap(), 2.0);
    }

    #[test]
    fn single_timestamp_is_rejected() {
        assert!(high_res_delta_t(&[0.0], 5).is_err());
    }

    #[test]
    fn refined_replay_shape() {
        let measured = Trajectory::new(
            0.5,
            vec![0.0, 1.0, 2.0, 4.0],
            vec![vec![0.0, 1.0, 0.0]; 4],
        )
        .unwrap();
        let (plan, sim) = simulate_high_res(&measured, 1e-13, 5).unwrap();
        assert_eq!(plan.dx, 0.25);
        assert_eq!(plan.delta_t, 1.0);
        assert_eq!(plan.timestamps, vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(sim.n_times(), 4);
        assert_eq!(sim.n_positions(), 5);
        assert_eq!(sim.profiles[0], vec![0.0, 0.5, 1.0, 0.5, 0.0]);
        assert_eq!(sim.dx, 0.25);
    }
}
