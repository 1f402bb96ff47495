//! Least-squares slope estimation.
//!
//! Fits a regression line through a value sequence using synthetic
//! x-coordinates 0..n-1, so the slope is expressed in price units per step.

/// Compute the least-squares slope of an ordered value sequence.
///
/// Returns 0.0 for sequences of length 0 or 1, where no slope is defined.
pub fn compute_slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n <= 1 {
        return 0.0;
    }

    // For x values 0, 1, ..., n-1 the mean is (n-1)/2.
    let x_mean = (n as f64 - 1.0) / 2.0;
    let y_mean = values.iter().sum::<f64>() / n as f64;

    let mut numerator = 0.0;
    let mut denominator = 0.0;

    for (i, &y) in values.iter().enumerate() {
        let x_diff = i as f64 - x_mean;
        numerator += x_diff * (y - y_mean);
        denominator += x_diff * x_diff;
    }

    // Cannot happen with integer x-steps and n > 1, but keeps the function total.
    if denominator == 0.0 {
        return 0.0;
    }

    numerator / denominator
}
