//! Lossy numeric conversions in one place.
//!
//! Counts and sampled integers in this crate stay far below `2^52`, so the
//! conversions here are exact in practice.

/// A sampled integer as a float.
#[allow(clippy::cast_precision_loss)]
pub(crate) const fn int_to_f64(k: i64) -> f64 {
    k as f64
}

/// A count as a float.
#[allow(clippy::cast_precision_loss)]
pub(crate) const fn count_to_f64(n: usize) -> f64 {
    n as f64
}

/// Round a non-negative float down to a count; negative or NaN map to 0.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn floor_to_count(x: f64) -> usize {
    if x.is_nan() || x <= 0.0 {
        0
    } else {
        x.floor() as usize
    }
}

/// Mean of `values`, `0` for an empty slice.
pub(crate) fn mean(values: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, n) = values
        .into_iter()
        .fold((0.0, 0usize), |(s, n), v| (s + v, n.saturating_add(1)));
    if n == 0 { 0.0 } else { sum / count_to_f64(n) }
}
