//! Scale-free window feature extraction.
//!
//! Every classification decision is made from four descriptors computed over a
//! fixed-size price window:
//! - chop: net movement / total path length (0 = oscillating, 1 = monotonic)
//! - range_norm: (max - min) / median
//! - slope_norm: |regression slope| / median
//! - cross_rate: frequency of mean crossings
//!
//! All four are normalized by the window's own price level, so thresholds
//! transfer between a 50gp item and a 2m gp item without rescaling.

use serde::{Deserialize, Serialize};

use super::regression::compute_slope;

/// Guard against 0/0 in ratio features.
pub const EPSILON: f64 = 1e-10;

/// Features computed from a single price window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowFeatures {
    /// Net movement over total path length, in [0, 1].
    pub chop: f64,
    /// (max - min) / median, >= 0.
    pub range_norm: f64,
    /// |slope| / median, >= 0.
    pub slope_norm: f64,
    /// Mean-crossing frequency, in [0, 1].
    pub cross_rate: f64,
    /// Unnormalized regression slope, in price units per step.
    pub raw_slope: f64,
}

impl WindowFeatures {
    /// Arithmetic mean of a set of feature vectors.
    ///
    /// Returns all-zero features for an empty slice.
    pub fn average(features: &[WindowFeatures]) -> WindowFeatures {
        if features.is_empty() {
            return WindowFeatures::default();
        }

        let n = features.len() as f64;
        let mut sum = WindowFeatures::default();
        for f in features {
            sum.chop += f.chop;
            sum.range_norm += f.range_norm;
            sum.slope_norm += f.slope_norm;
            sum.cross_rate += f.cross_rate;
            sum.raw_slope += f.raw_slope;
        }

        WindowFeatures {
            chop: sum.chop / n,
            range_norm: sum.range_norm / n,
            slope_norm: sum.slope_norm / n,
            cross_rate: sum.cross_rate / n,
            raw_slope: sum.raw_slope / n,
        }
    }
}

/// Compute the median of a value slice.
///
/// Even-length slices average the two middle sorted elements; an empty slice
/// yields 0.
pub fn compute_median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;

    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Compute scale-free features from a price window.
///
/// Windows of fewer than two prices carry no information and yield all-zero
/// features rather than an error.
pub fn compute_window_features(prices: &[f64]) -> WindowFeatures {
    let n = prices.len();
    if n <= 1 {
        return WindowFeatures::default();
    }

    let median = compute_median(prices);
    let mean = prices.iter().sum::<f64>() / n as f64;
    let min = prices.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = prices.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    // Net movement over total path length.
    let net_movement = (prices[n - 1] - prices[0]).abs();
    let total_movement: f64 = prices.windows(2).map(|w| (w[1] - w[0]).abs()).sum();
    let chop = net_movement / (total_movement + EPSILON);

    let range_norm = (max - min) / (median + EPSILON);

    let raw_slope = compute_slope(prices);
    let slope_norm = raw_slope.abs() / (median + EPSILON);

    // Sign changes of the deviation from the window mean.
    let mut crossings = 0usize;
    let mut prev_dev = prices[0] - mean;
    for &p in &prices[1..] {
        let dev = p - mean;
        if prev_dev * dev < 0.0 {
            crossings += 1;
        }
        prev_dev = dev;
    }
    let cross_rate = crossings as f64 / n as f64;

    WindowFeatures {
        chop,
        range_norm,
        slope_norm,
        cross_rate,
        raw_slope,
    }
}
