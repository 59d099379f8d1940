//! Midpoint upsampling of a profile (`N` samples -> `2N-1` samples).
//!
//! `[1, 2, 3, 6]` becomes `[1, 1.5, 2, 2.5, 3, 4.5, 6]`.

use crate::domain::Profile;

/// Double the spatial density by inserting the mean of each neighbouring pair.
pub fn upsample(profile: &[f64]) -> Profile {
    let Some(&last) = profile.last() else {
        return Vec::new();
    };

    let mut out = Vec::with_capacity(2 * profile.len() - 1);
    for pair in profile.windows(2) {
        out.push(pair[0]);
        out.push((pair[0] + pair[1]) / 2.0);
    }
    out.push(last);
    out
}

/// Upsample every row of a `time × space` matrix.
pub fn upsample_rows(rows: &[Profile]) -> Vec<Profile> {
    rows.iter().map(|row| upsample(row)).collect()
}
