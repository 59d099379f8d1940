//! Formatted terminal output.
//!
//! Formatting lives here so the numerical code stays free of presentation
//! and output changes stay localized.

use std::path::Path;

use crate::app::pipeline::{CellOutcome, CellRun};
use crate::domain::{FitConfig, Trajectory};
use crate::report::residual_sse;

/// Summary of a single-cell fit.
pub fn format_cell_report(
    source: &Path,
    measured: &Trajectory,
    run: &CellRun,
    config: &FitConfig,
) -> String {
    let mut out = String::new();

    out.push_str("=== frap - FRAP diffusion fit ===\n");
    out.push_str(&format!("Source: {}\n", source.display()));
    out.push_str(&format!(
        "Grid: {} frames x {} positions | dx={}um | t=[{:.3}, {:.3}]s\n",
        measured.n_times(),
        measured.n_positions(),
        measured.dx,
        measured.timestamps.first().copied().unwrap_or(0.0),
        measured.timestamps.last().copied().unwrap_or(0.0),
    ));

    out.push_str("\nFit:\n");
    out.push_str(&format!("- D     : {:.5e} m^2/s\n", run.fit.coefficient));
    out.push_str(&format!("- error : {}\n", fmt_error(run.fit.std_error)));
    out.push_str(&format!(
        "- search: {} iterations from D0={:e} | SSE={:.6e} over {} samples\n",
        run.fit.iterations, config.initial_coefficient, run.fit.sse, run.fit.n_obs
    ));
    out.push_str(&format!(
        "- residual RMS: {:.6e}\n",
        rms(residual_sse(&run.residuals), run.fit.n_obs)
    ));

    match &run.high_res {
        Some(high) => {
            out.push_str("\nHigh-res replay:\n");
            out.push_str(&format!(
                "- dx={}um | dt={}s | {} frames x {} positions\n",
                high.plan.dx,
                high.plan.delta_t,
                high.simulation.n_times(),
                high.simulation.n_positions()
            ));
            let n = high.residuals.n_rows() * high.residuals.n_cols();
            out.push_str(&format!(
                "- residual RMS vs upsampled data: {:.6e}\n",
                rms(residual_sse(&high.residuals), n)
            ));
        }
        None => out.push_str("\nHigh-res replay: disabled\n"),
    }

    out
}

/// Per-cell table for a batch run.
pub fn format_batch_outcomes(outcomes: &[CellOutcome]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<28} {:>12} {:>12} {:>10} {:<40}\n",
            "cell", "D [m^2/s]", "error", "dt_hr [s]", "status"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:-<28} {:-<12} {:-<12} {:-<10} {:-<40}\n",
            "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for outcome in outcomes {
        let line = match outcome {
            CellOutcome::Done(s) => format!(
                "{:<28} {:>12} {:>12} {:>10} {:<40}\n",
                truncate(&s.cell_id, 28),
                format!("{:.4e}", s.diffusion_coefficient),
                fmt_error(s.diffusion_coefficient_error),
                s.high_res_delta_t.map(|v| format!("{v:.3}")).unwrap_or_else(|| "-".to_string()),
                "ok",
            ),
            CellOutcome::Failed { cell_id, error, .. } => format!(
                "{:<28} {:>12} {:>12} {:>10} {:<40}\n",
                truncate(cell_id, 28),
                "-",
                "-",
                "-",
                truncate(&format!("failed: {}", first_line(error.message())), 40),
            ),
        };
        out.push_str(line.trim_end());
        out.push('\n');
    }

    let ok = outcomes.iter().filter(|o| o.summary().is_some()).count();
    out.push_str(&format!("\n{ok}/{} cells fitted\n", outcomes.len()));
    out
}

fn fmt_error(v: f64) -> String {
    if v.is_finite() { format!("{v:.4e}") } else { "n/a".to_string() }
}

fn rms(sse: f64, n: usize) -> f64 {
    if n == 0 { 0.0 } else { (sse / n as f64).sqrt() }
}

fn first_line(s: &str) -> &str {
    s.lines().next().unwrap_or("")
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CellSummary;
    use crate::error::AppError;
    use std::path::PathBuf;

    #[test]
    fn truncate_marks_cut_names() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd.");
    }

    #[test]
    fn batch_table_lists_every_cell() {
        let outcomes = vec![
            CellOutcome::Done(CellSummary {
                cell_id: "cell_01".to_string(),
                diffusion_coefficient: 2.5e-13,
                diffusion_coefficient_error: f64::INFINITY,
                simulation: PathBuf::from("cell_01-simulated.csv"),
                residuals: PathBuf::from("cell_01-residuals.csv"),
                high_res: None,
                high_res_delta_x: None,
                high_res_delta_t: None,
            }),
            CellOutcome::Failed {
                cell_id: "cell_02".to_string(),
                source: PathBuf::from("cell_02-values.csv"),
                error: AppError::new(3, "input shape error: ragged\nmore"),
            },
        ];
        let text = format_batch_outcomes(&outcomes);
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("cell"));
        assert!(lines[2].starts_with("cell_01"));
        assert!(lines[2].contains("2.5000e-13"));
        assert!(lines[2].contains("n/a"));
        assert!(lines[3].starts_with("cell_02"));
        assert!(lines[3].contains("failed: input shape error: ragged"));
        assert!(text.ends_with("1/2 cells fitted\n"));
        assert!(lines.iter().all(|l| l.trim_end() == *l));
    }
}
