//! Cross-sectional normalization.

/// Mean and sample standard deviation of the finite values in `values`.
///
/// Returns `None` when fewer than two finite values exist. A column whose
/// finite values are all equal has a standard deviation of exactly 0.
pub fn mean_std(values: &[f64]) -> Option<(f64, f64)> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let first = *finite.first()?;
    if finite.len() < 2 {
        return None;
    }
    // Summation error would otherwise leave a tiny nonzero spread
    if finite.iter().all(|v| *v == first) {
        return Some((first, 0.0));
    }

    let n = finite.len() as f64;
    let mean = finite.iter().sum::<f64>() / n;
    let variance = finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);

    Some((mean, variance.sqrt()))
}

/// Standardize a column: `(x - mean) / stddev`.
///
/// Non-finite inputs are left out of the mean/stddev pass and come back as 0.
/// When the standard deviation is zero or undefined (a single security, or
/// all values identical) every z-score is 0.
///
/// # Example
///
/// ```rust
/// use ksei_flow::analysis::z_scores;
///
/// let z = z_scores(&[10.0, 20.0, 30.0]);
/// assert_eq!(z, vec![-1.0, 0.0, 1.0]);
///
/// assert_eq!(z_scores(&[5.0, 5.0]), vec![0.0, 0.0]);
/// ```
pub fn z_scores(values: &[f64]) -> Vec<f64> {
    let (mean, std) = match mean_std(values) {
        Some((mean, std)) if std > 0.0 && std.is_finite() => (mean, std),
        _ => return vec![0.0; values.len()],
    };

    values
        .iter()
        .map(|v| {
            let z = (v - mean) / std;
            if z.is_finite() {
                z
            } else {
                0.0
            }
        })
        .collect()
}
