//! Kymograph CSV ingest.
//!
//! The acquisition tooling writes one file per cell:
//!
//! ```text
//! time,0.000000,0.103000,0.206000,...
//! 12.500000,0.91,0.88,...
//! 13.250000,0.93,0.90,...
//! ```
//!
//! The header holds sample positions in µm; `dx` is read from the third field
//! (the position of the second sample). Every following row is
//! `timestamp, value_1, ..., value_N`.
//!
//! Design goals:
//! - **Strict shape**: ragged rows or too few frames are rejected, never patched
//! - **Deterministic**: no hidden filtering or reordering
//! - **Separation of concerns**: no fitting logic here

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use crate::domain::Trajectory;
use crate::error::{AppError, CoreError};

/// Suffix that marks a kymograph file.
pub const VALUES_SUFFIX: &str = "-values.csv";

/// Load a kymograph file and re-base its timestamps to start at 0.
pub fn load_kymograph(path: &Path) -> Result<Trajectory, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::new(2, format!("Failed to open kymograph '{}': {e}", path.display()))
    })?;
    read_kymograph(file).map_err(|e| {
        AppError::new(e.exit_code(), format!("{}: {}", path.display(), e.message()))
    })
}

/// Parse a kymograph from any reader.
pub fn read_kymograph<R: Read>(reader: R) -> Result<Trajectory, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = reader.records();

    let header = match records.next() {
        Some(Ok(record)) => record,
        Some(Err(e)) => return Err(AppError::new(2, format!("Failed to read header row: {e}"))),
        None => return Err(CoreError::input_shape("file is empty").into()),
    };
    let dx = parse_dx(&header)?;

    let mut timestamps = Vec::new();
    let mut profiles = Vec::new();

    for (idx, result) in records.enumerate() {
        // +2: 1-based line numbers, header on line 1.
        let line = idx + 2;
        let record =
            result.map_err(|e| AppError::new(2, format!("CSV parse error on line {line}: {e}")))?;
        let fields = data_fields(&record);
        if fields.is_empty() {
            continue;
        }

        let mut values = Vec::with_capacity(fields.len());
        for (col, field) in fields.iter().enumerate() {
            let v = parse_f64(field).ok_or_else(|| {
                AppError::from(CoreError::input_shape(format!(
                    "line {line}, column {}: '{field}' is not a finite number",
                    col + 1
                )))
            })?;
            values.push(v);
        }

        timestamps.push(values[0]);
        profiles.push(values.split_off(1));
    }

    let Some(&t0) = timestamps.first() else {
        return Err(CoreError::input_shape("no data rows after the header").into());
    };
    for t in timestamps.iter_mut() {
        *t -= t0;
    }

    Ok(Trajectory::new(dx, timestamps, profiles)?)
}

/// Cell identifier: the file name without its `-values.csv` suffix.
pub fn cell_id_from_path(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.strip_suffix(VALUES_SUFFIX) {
        Some(stem) => stem.to_string(),
        None => path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or(name),
    }
}

fn parse_dx(header: &StringRecord) -> Result<f64, AppError> {
    let field = header.get(2).ok_or_else(|| {
        AppError::from(CoreError::input_shape(format!(
            "header has {} fields; dx is read from the third",
            header.len()
        )))
    })?;
    let dx = parse_f64(field).ok_or_else(|| {
        AppError::from(CoreError::input_shape(format!("header dx '{field}' is not a number")))
    })?;
    if dx <= 0.0 {
        return Err(CoreError::input_shape(format!("dx must be > 0, got {dx}")).into());
    }
    Ok(dx)
}

/// Record fields with a single trailing empty cell (trailing comma) dropped.
fn data_fields(record: &StringRecord) -> Vec<&str> {
    let mut fields: Vec<&str> = record.iter().collect();
    if fields.last().is_some_and(|f| f.is_empty()) {
        fields.pop();
    }
    if fields.iter().all(|f| f.is_empty()) {
        fields.clear();
    }
    fields
}

fn parse_f64(s: &str) -> Option<f64> {
    // Excel-style exports may prefix the first cell with a UTF-8 BOM.
    let s = s.trim().trim_start_matches('\u{feff}');
    let v = s.parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}
