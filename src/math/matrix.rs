//! Row-major flattening helpers.
//!
//! The estimator works on a single vector (all profiles concatenated in time
//! order); exports and residuals work on `time × space` matrices.

use crate::error::CoreError;

/// Concatenate rows in order.
pub fn flatten(rows: &[Vec<f64>]) -> Vec<f64> {
    let total = rows.iter().map(Vec::len).sum();
    let mut out = Vec::with_capacity(total);
    for row in rows {
        out.extend_from_slice(row);
    }
    out
}

/// Split a flat vector back into rows of `width` values.
pub fn to_matrix(flat: &[f64], width: usize) -> Result<Vec<Vec<f64>>, CoreError> {
    if width == 0 {
        return Err(CoreError::input_shape("row width must be > 0"));
    }
    if flat.len() % width != 0 {
        return Err(CoreError::input_shape(format!(
            "{} values do not split into rows of {width}",
            flat.len()
        )));
    }
    Ok(flat.chunks(width).map(<[f64]>::to_vec).collect())
}

/// Consecutive differences `t[i+1] - t[i]`.
pub fn diffs(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Upper median: sort ascending and take index `len / 2`.
///
/// For even lengths this picks the upper of the two middle values rather
/// than averaging them.
pub fn upper_median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    Some(sorted[sorted.len() / 2])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_then_reshape_keeps_rows() {
        let rows = vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]];
        let flat = flatten(&rows);
        assert_eq!(flat, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(to_matrix(&flat, 3).unwrap(), rows);
    }

    #[test]
    fn reshape_rejects_partial_rows() {
        assert!(to_matrix(&[1.0, 2.0, 3.0], 2).is_err());
        assert!(to_matrix(&[1.0], 0).is_err());
    }

    #[test]
    fn upper_median_odd_and_even() {
        assert_eq!(upper_median(&[5.0, 1.0, 3.0]), Some(3.0));
        assert_eq!(upper_median(&[4.0, 1.0, 3.0, 2.0]), Some(3.0));
        assert_eq!(upper_median(&[]), None);
    }

    #[test]
    fn diffs_of_timestamps() {
        assert_eq!(diffs(&[0.0, 1.0, 3.0, 6.0]), vec![1.0, 2.0, 3.0]);
        assert!(diffs(&[2.0]).is_empty());
    }
}
