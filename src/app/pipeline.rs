//! Shared per-cell pipeline used by the `fit` and `batch` commands.
//!
//! One cell goes through:
//! ingest -> fit D -> native replay -> residuals -> refined replay -> refined residuals -> write
//!
//! `run_cell` is the pure core (no filesystem); `process_file` wraps it with
//! ingest and export, and `run_batch` fans `process_file` out over a bounded
//! worker pool.

use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::domain::{
    CellSummary, DiffusionModel, FitConfig, FitFile, FitResult, ResidualMatrix, SimulationResult,
    Trajectory,
};
use crate::error::{AppError, CoreError};
use crate::io::{
    OutputPaths, VALUES_SUFFIX, cell_id_from_path, load_kymograph, write_fit_json,
    write_kymograph_csv,
};
use crate::models::{HighResPlan, simulate, simulate_high_res, upsample_rows};
use crate::report::compute_residuals;

/// Refined replay and its residuals against the upsampled measurement.
#[derive(Debug, Clone)]
pub struct HighResOutput {
    pub plan: HighResPlan,
    pub simulation: SimulationResult,
    pub residuals: ResidualMatrix,
}

/// Everything computed for one cell.
#[derive(Debug, Clone)]
pub struct CellRun {
    pub fit: FitResult,
    pub simulation: SimulationResult,
    pub residuals: ResidualMatrix,
    pub high_res: Option<HighResOutput>,
}

/// Result of one cell inside a batch.
#[derive(Debug, Clone)]
pub enum CellOutcome {
    Done(CellSummary),
    Failed {
        cell_id: String,
        source: PathBuf,
        error: AppError,
    },
}

impl CellOutcome {
    pub fn summary(&self) -> Option<&CellSummary> {
        match self {
            CellOutcome::Done(summary) => Some(summary),
            CellOutcome::Failed { .. } => None,
        }
    }
}

/// Fit, replay, and compute residuals for a measured trajectory.
pub fn run_cell(measured: &Trajectory, config: &FitConfig) -> Result<CellRun, CoreError> {
    let fit = crate::fit::fit_diffusion(measured, config)?;

    let model = DiffusionModel::new(fit.coefficient, measured.dx);
    let simulation = simulate(measured.initial_profile(), &model, &measured.timestamps)?;
    let residuals = compute_residuals(&measured.profiles, &simulation.profiles)?;

    let high_res = if config.high_res {
        let (plan, simulation) =
            simulate_high_res(measured, fit.coefficient, config.discard_leading)?;
        // The refined replay runs on its own time axis; residuals are taken
        // row by row against the upsampled measurement.
        let residuals = compute_residuals(&upsample_rows(&measured.profiles), &simulation.profiles)?;
        Some(HighResOutput {
            plan,
            simulation,
            residuals,
        })
    } else {
        None
    };

    Ok(CellRun {
        fit,
        simulation,
        residuals,
        high_res,
    })
}

/// Process one kymograph file end to end and write its outputs next to it.
pub fn process_file(path: &Path, config: &FitConfig) -> Result<CellSummary, AppError> {
    let cell_id = cell_id_from_path(path);
    let measured = load_kymograph(path)?;
    log::info!(
        "{cell_id}: {} frames x {} positions, dx={} um",
        measured.n_times(),
        measured.n_positions(),
        measured.dx
    );

    let run = run_cell(&measured, config).map_err(|e| {
        let code = AppError::from(e.clone()).exit_code();
        AppError::new(code, format!("{cell_id}: {e}"))
    })?;
    log::info!(
        "{cell_id}: D={:e} m^2/s (+/- {:e}) after {} iterations",
        run.fit.coefficient,
        run.fit.std_error,
        run.fit.iterations
    );

    write_cell_outputs(path, &measured, &run, config)
}

/// Write a cell's tables (and optional fit JSON) next to its source file.
pub fn write_cell_outputs(
    path: &Path,
    measured: &Trajectory,
    run: &CellRun,
    config: &FitConfig,
) -> Result<CellSummary, AppError> {
    let cell_id = cell_id_from_path(path);
    let paths = OutputPaths::for_source(path);
    write_kymograph_csv(
        &paths.simulation,
        measured.dx,
        &run.simulation.timestamps,
        &run.simulation.profiles,
    )?;
    write_kymograph_csv(
        &paths.residuals,
        measured.dx,
        &measured.timestamps,
        &run.residuals.rows,
    )?;

    if let Some(high) = &run.high_res {
        write_kymograph_csv(
            &paths.high_res_simulation,
            high.plan.dx,
            &high.simulation.timestamps,
            &high.simulation.profiles,
        )?;
        write_kymograph_csv(
            &paths.high_res_residuals,
            high.plan.dx,
            &high.plan.timestamps,
            &high.residuals.rows,
        )?;
        log::debug!(
            "{cell_id}: high-res replay dx={} um, dt={} s",
            high.plan.dx,
            high.plan.delta_t
        );
    }

    let high_res_delta_x = run.high_res.as_ref().map(|h| h.plan.dx);
    let high_res_delta_t = run.high_res.as_ref().map(|h| h.plan.delta_t);

    if config.export_fit_json {
        let fit_file = FitFile {
            tool: env!("CARGO_PKG_NAME").to_string(),
            cell_id: cell_id.clone(),
            source: path.to_path_buf(),
            dx_um: measured.dx,
            n_times: measured.n_times(),
            n_positions: measured.n_positions(),
            fit: run.fit,
            high_res_delta_x,
            high_res_delta_t,
        };
        write_fit_json(&paths.fit_json, &fit_file)?;
    }

    Ok(CellSummary {
        cell_id,
        diffusion_coefficient: run.fit.coefficient,
        diffusion_coefficient_error: run.fit.std_error,
        simulation: paths.simulation,
        residuals: paths.residuals,
        high_res: run.high_res.as_ref().map(|_| paths.high_res_simulation),
        high_res_delta_x,
        high_res_delta_t,
    })
}

/// Every `*-values.csv` under `root`, sorted.
pub fn discover_cells(root: &Path) -> Result<Vec<PathBuf>, AppError> {
    if !root.is_dir() {
        return Err(AppError::new(
            2,
            format!("Batch root '{}' is not a directory", root.display()),
        ));
    }
    // The root is literal text; only the suffix part is a pattern.
    let pattern = format!(
        "{}/**/*{VALUES_SUFFIX}",
        glob::Pattern::escape(&root.to_string_lossy())
    );
    let entries = glob::glob(&pattern)
        .map_err(|e| AppError::new(2, format!("Invalid search pattern '{pattern}': {e}")))?;

    let mut paths = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) if path.is_file() => paths.push(path),
            Ok(_) => {}
            Err(e) => log::warn!("skipping unreadable path: {e}"),
        }
    }
    paths.sort();
    Ok(paths)
}

/// Process every cell on a pool of `jobs` workers (0 = one per core).
///
/// A failing cell is logged and reported in its outcome; it never aborts the
/// others. Outcomes are returned in input order.
pub fn run_batch(
    paths: &[PathBuf],
    config: &FitConfig,
    jobs: usize,
) -> Result<Vec<CellOutcome>, AppError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .map_err(|e| AppError::new(2, format!("Failed to start worker pool: {e}")))?;

    let outcomes: Vec<CellOutcome> = pool.install(|| {
        paths
            .par_iter()
            .map(|path| match process_file(path, config) {
                Ok(summary) => CellOutcome::Done(summary),
                Err(error) => {
                    log::warn!("{}: {error}", path.display());
                    CellOutcome::Failed {
                        cell_id: cell_id_from_path(path),
                        source: path.clone(),
                        error,
                    }
                }
            })
            .collect()
    });
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("frap-pipeline-{}-{name}", std::process::id()));
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn synthetic_cell(coefficient: f64) -> Trajectory {
        let dx = 0.2;
        let initial: Vec<f64> = (0..9)
            .map(|i| {
                let x = (i as f64 - 4.0) * dx;
                1.0 - 0.6 * (-(x / 0.3).powi(2)).exp()
            })
            .collect();
        let timestamps: Vec<f64> = (0..10).map(|i| i as f64 * 0.1).collect();
        simulate(&initial, &DiffusionModel::new(coefficient, dx), &timestamps).unwrap()
    }

    #[test]
    fn run_cell_recovers_coefficient_and_shapes() {
        let measured = synthetic_cell(3e-14);
        let run = run_cell(&measured, &FitConfig::default()).unwrap();

        assert!((run.fit.coefficient - 3e-14).abs() / 3e-14 < 1e-6);
        assert_eq!(run.residuals.n_rows(), 10);
        assert_eq!(run.residuals.n_cols(), 9);
        assert!(run.residuals.rows.iter().flatten().all(|r| r.abs() < 1e-6));

        let high = run.high_res.unwrap();
        assert_eq!(high.simulation.n_times(), 10);
        assert_eq!(high.simulation.n_positions(), 17);
        assert_eq!(high.residuals.n_cols(), 17);
        assert!((high.plan.dx - 0.1).abs() < 1e-15);
    }

    #[test]
    fn high_res_can_be_disabled() {
        let config = FitConfig {
            high_res: false,
            ..FitConfig::default()
        };
        let run = run_cell(&synthetic_cell(3e-14), &config).unwrap();
        assert!(run.high_res.is_none());
    }

    #[test]
    fn process_file_writes_all_tables() {
        let dir = scratch_dir("single");
        let measured = synthetic_cell(3e-14);
        let source = dir.join("cell_01-values.csv");
        write_kymograph_csv(&source, measured.dx, &measured.timestamps, &measured.profiles).unwrap();

        let config = FitConfig {
            export_fit_json: true,
            ..FitConfig::default()
        };
        let summary = process_file(&source, &config).unwrap();
        assert_eq!(summary.cell_id, "cell_01");
        assert!(summary.simulation.is_file());
        assert!(summary.residuals.is_file());
        assert!(summary.high_res.as_ref().is_some_and(|p| p.is_file()));
        assert!(dir.join("cell_01-residuals-high-res.csv").is_file());
        assert!(dir.join("cell_01-fit.json").is_file());
        assert!(summary.high_res_delta_t.is_some_and(|dt| (dt - 0.1).abs() < 1e-9));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn batch_isolates_broken_cells() {
        let dir = scratch_dir("batch");
        let nested = dir.join("2018-06-01");
        std::fs::create_dir_all(&nested).unwrap();

        let measured = synthetic_cell(5e-14);
        write_kymograph_csv(
            &nested.join("good-values.csv"),
            measured.dx,
            &measured.timestamps,
            &measured.profiles,
        )
        .unwrap();
        std::fs::write(dir.join("broken-values.csv"), "time,0,0.2\n0,1,2\n1,1\n").unwrap();
        std::fs::write(dir.join("notes.csv"), "not a kymograph\n").unwrap();

        let paths = discover_cells(&dir).unwrap();
        assert_eq!(paths.len(), 2);

        let outcomes = run_batch(&paths, &FitConfig::default(), 2).unwrap();
        assert_eq!(outcomes.len(), 2);
        let done: Vec<_> = outcomes.iter().filter_map(CellOutcome::summary).collect();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].cell_id, "good");
        assert!(outcomes.iter().any(|o| matches!(
            o,
            CellOutcome::Failed { cell_id, error, .. } if cell_id == "broken" && error.exit_code() == 3
        )));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn root_with_pattern_characters_is_taken_literally() {
        let dir = scratch_dir("literal").join("run[1]*?");
        std::fs::create_dir_all(dir.join("day2")).unwrap();
        std::fs::write(dir.join("a-values.csv"), "time,0,1\n0,1,2\n1,1,2\n").unwrap();
        std::fs::write(dir.join("day2").join("b-values.csv"), "time,0,1\n0,1,2\n1,1,2\n").unwrap();

        let paths = discover_cells(&dir).unwrap();
        assert_eq!(paths, vec![dir.join("a-values.csv"), dir.join("day2").join("b-values.csv")]);

        std::fs::remove_dir_all(dir.parent().unwrap()).ok();
    }

    #[test]
    fn missing_root_is_an_error() {
        assert!(discover_cells(Path::new("/nonexistent/frap-root")).is_err());
    }
}
