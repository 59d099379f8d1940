//! Write simulated/residual tables and the batch summary to CSV.
//!
//! Tables use the same layout as the kymograph inputs (`time, x_0, x_1, ...`
//! header, one row per frame) so they can be re-ingested or plotted by the
//! same downstream scripts.

use std::fs::File;
use std::path::{Path, PathBuf};

use crate::domain::{CellSummary, Profile};
use crate::error::AppError;
use crate::io::ingest::VALUES_SUFFIX;

/// Name of the batch summary written at the root of a batch run.
pub const SUMMARY_FILE_NAME: &str = "diffusion-coefficients.csv";

/// Where one cell's outputs go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub simulation: PathBuf,
    pub residuals: PathBuf,
    pub high_res_simulation: PathBuf,
    pub high_res_residuals: PathBuf,
    pub fit_json: PathBuf,
}

impl OutputPaths {
    /// Derive output paths next to `source`, replacing its `-values.csv` suffix.
    pub fn for_source(source: &Path) -> Self {
        let text = source.to_string_lossy();
        let base = text.strip_suffix(VALUES_SUFFIX).or_else(|| text.strip_suffix(".csv"));
        let base = base.unwrap_or(&text).to_string();
        Self {
            simulation: PathBuf::from(format!("{base}-simulated.csv")),
            residuals: PathBuf::from(format!("{base}-residuals.csv")),
            high_res_simulation: PathBuf::from(format!("{base}-simulated-high-res.csv")),
            high_res_residuals: PathBuf::from(format!("{base}-residuals-high-res.csv")),
            fit_json: PathBuf::from(format!("{base}-fit.json")),
        }
    }
}

/// Write a `time × space` table with a `time, dx*0, dx*1, ...` header.
pub fn write_kymograph_csv(
    path: &Path,
    dx: f64,
    timestamps: &[f64],
    rows: &[Profile],
) -> Result<(), AppError> {
    if timestamps.len() != rows.len() {
        return Err(AppError::new(
            2,
            format!(
                "Cannot write '{}': {} timestamps for {} rows",
                path.display(),
                timestamps.len(),
                rows.len()
            ),
        ));
    }

    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create '{}': {e}", path.display())))?;
    let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(file);

    let width = rows.first().map_or(0, Vec::len);
    let mut header = Vec::with_capacity(width + 1);
    header.push("time".to_string());
    header.extend((0..width).map(|i| fmt_num(dx * i as f64)));
    writer
        .write_record(&header)
        .map_err(|e| AppError::new(2, format!("Failed to write header of '{}': {e}", path.display())))?;

    for (t, row) in timestamps.iter().zip(rows.iter()) {
        let mut record = Vec::with_capacity(row.len() + 1);
        record.push(fmt_num(*t));
        record.extend(row.iter().map(|v| fmt_num(*v)));
        writer
            .write_record(&record)
            .map_err(|e| AppError::new(2, format!("Failed to write row of '{}': {e}", path.display())))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush '{}': {e}", path.display())))?;
    Ok(())
}

/// Write the batch summary: one row per successfully processed cell.
pub fn write_summary_csv(path: &Path, cells: &[CellSummary]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create summary '{}': {e}", path.display())))?;
    let mut writer = csv::Writer::from_writer(file);

    writer
        .write_record([
            "cell_id",
            "diffusion_coefficient",
            "diffusion_coefficient_error",
            "simulation",
            "residuals",
            "high_res",
            "high_res_delta_x",
            "high_res_delta_t",
        ])
        .map_err(|e| AppError::new(2, format!("Failed to write summary header: {e}")))?;

    for cell in cells {
        writer
            .write_record([
                cell.cell_id.clone(),
                fmt_sci(cell.diffusion_coefficient),
                fmt_sci(cell.diffusion_coefficient_error),
                cell.simulation.display().to_string(),
                cell.residuals.display().to_string(),
                cell.high_res.as_ref().map(|p| p.display().to_string()).unwrap_or_default(),
                cell.high_res_delta_x.map(fmt_num).unwrap_or_default(),
                cell.high_res_delta_t.map(fmt_num).unwrap_or_default(),
            ])
            .map_err(|e| AppError::new(2, format!("Failed to write summary row: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush summary '{}': {e}", path.display())))?;
    Ok(())
}

/// Shortest round-trip representation (`0.5`, `12`, `1e-7`).
fn fmt_num(v: f64) -> String {
    format!("{v}")
}

/// Scientific notation for coefficients, six significant digits.
fn fmt_sci(v: f64) -> String {
    if v.is_finite() { format!("{v:.5e}") } else { format!("{v}") }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::ingest::read_kymograph;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("frap-export-{}-{name}", std::process::id()))
    }

    #[test]
    fn output_paths_replace_values_suffix() {
        let paths = OutputPaths::for_source(Path::new("/data/cell_07-values.csv"));
        assert_eq!(paths.simulation, PathBuf::from("/data/cell_07-simulated.csv"));
        assert_eq!(paths.residuals, PathBuf::from("/data/cell_07-residuals.csv"));
        assert_eq!(
            paths.high_res_simulation,
            PathBuf::from("/data/cell_07-simulated-high-res.csv")
        );
        assert_eq!(
            paths.high_res_residuals,
            PathBuf::from("/data/cell_07-residuals-high-res.csv")
        );
        assert_eq!(paths.fit_json, PathBuf::from("/data/cell_07-fit.json"));
    }

    #[test]
    fn table_layout_and_reingest() {
        let path = temp_path("table.csv");
        let rows = vec![vec![1.0, 0.5, 0.25], vec![0.75, 0.5, 0.5]];
        write_kymograph_csv(&path, 0.5, &[0.0, 2.0], &rows).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("time,0,0.5,1"));
        assert_eq!(lines.next(), Some("0,1,0.5,0.25"));
        assert_eq!(lines.next(), Some("2,0.75,0.5,0.5"));

        let back = read_kymograph(text.as_bytes()).unwrap();
        assert_eq!(back.dx, 0.5);
        assert_eq!(back.profiles, rows);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn mismatched_rows_are_rejected() {
        let path = temp_path("mismatch.csv");
        assert!(write_kymograph_csv(&path, 1.0, &[0.0], &[vec![1.0], vec![2.0]]).is_err());
    }

    #[test]
    fn summary_has_header_and_one_row_per_cell() {
        let path = temp_path("summary.csv");
        let cells = vec![CellSummary {
            cell_id: "cell_01".to_string(),
            diffusion_coefficient: 2.0e-13,
            diffusion_coefficient_error: 1.5e-15,
            simulation: PathBuf::from("a-simulated.csv"),
            residuals: PathBuf::from("a-residuals.csv"),
            high_res: Some(PathBuf::from("a-simulated-high-res.csv")),
            high_res_delta_x: Some(0.05),
            high_res_delta_t: Some(4.0),
        }];
        write_summary_csv(&path, &cells).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("cell_id,diffusion_coefficient,diffusion_coefficient_error"));
        assert_eq!(
            lines[1],
            "cell_01,2.00000e-13,1.50000e-15,a-simulated.csv,a-residuals.csv,a-simulated-high-res.csv,0.05,4"
        );
        std::fs::remove_file(&path).ok();
    }
}
