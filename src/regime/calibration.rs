//! Threshold auto-calibration.
//!
//! Pools window features across many historical price series and suggests
//! thresholds from empirical quartiles: the "typical quiet market" p25 of the
//! three maxima and the p75 of the crossing rate become the classification
//! boundary. Pure aggregation; sampling which items feed it is the caller's
//! concern.

use serde::{Deserialize, Serialize};

use super::features::compute_window_features;

/// Empirical distribution summary for one feature.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DistributionStats {
    pub min: f64,
    pub max: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
}

/// Suggested thresholds plus the distributions they were derived from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestedThresholds {
    /// Suggested chop_max (25th percentile of observed chop).
    pub chop_max: f64,
    /// Suggested range_norm_max (25th percentile).
    pub range_norm_max: f64,
    /// Suggested slope_norm_max (25th percentile).
    pub slope_norm_max: f64,
    /// Suggested cross_rate_min (75th percentile).
    pub cross_rate_min: f64,
    pub chop_stats: DistributionStats,
    pub range_norm_stats: DistributionStats,
    pub slope_norm_stats: DistributionStats,
    pub cross_rate_stats: DistributionStats,
    /// Total number of windows analyzed across all input series.
    pub window_count: usize,
}

/// Linear-interpolation percentile of an ascending-sorted slice.
///
/// Empty input yields 0.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }

    let index = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = index.floor() as usize;
    let upper = index.ceil() as usize;

    if lower == upper {
        return sorted[lower];
    }

    let weight = index - lower as f64;
    sorted[lower] * (1.0 - weight) + sorted[upper] * weight
}

/// Distribution summary of an unsorted value pool.
fn calculate_stats(values: &[f64]) -> DistributionStats {
    if values.is_empty() {
        return DistributionStats::default();
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    DistributionStats {
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        p25: percentile(&sorted, 25.0),
        p50: percentile(&sorted, 50.0),
        p75: percentile(&sorted, 75.0),
    }
}

/// Suggest thresholds from the feature distributions of historical series.
///
/// Every series long enough for at least one window contributes features for
/// all of its window positions (step 1); shorter series are skipped.
pub fn auto_calibrate_thresholds(
    all_prices: &[Vec<f64>],
    window_size: usize,
) -> SuggestedThresholds {
    let mut chop_values = Vec::new();
    let mut range_norm_values = Vec::new();
    let mut slope_norm_values = Vec::new();
    let mut cross_rate_values = Vec::new();

    for prices in all_prices {
        if window_size == 0 || prices.len() < window_size {
            continue;
        }

        for window in prices.windows(window_size) {
            let features = compute_window_features(window);
            chop_values.push(features.chop);
            range_norm_values.push(features.range_norm);
            slope_norm_values.push(features.slope_norm);
            cross_rate_values.push(features.cross_rate);
        }
    }

    let chop_stats = calculate_stats(&chop_values);
    let range_norm_stats = calculate_stats(&range_norm_values);
    let slope_norm_stats = calculate_stats(&slope_norm_values);
    let cross_rate_stats = calculate_stats(&cross_rate_values);

    SuggestedThresholds {
        chop_max: chop_stats.p25,
        range_norm_max: range_norm_stats.p25,
        slope_norm_max: slope_norm_stats.p25,
        cross_rate_min: cross_rate_stats.p75,
        chop_stats,
        range_norm_stats,
        slope_norm_stats,
        cross_rate_stats,
        window_count: chop_values.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_interpolation() {
        let sorted = [10.0, 20.0, 30.0, 40.0];
        // index = 0.25 * 3 = 0.75: between 10 and 20.
        assert!((percentile(&sorted, 25.0) - 17.5).abs() < 1e-9);
        assert!((percentile(&sorted, 50.0) - 25.0).abs() < 1e-9);
        assert!((percentile(&sorted, 75.0) - 32.5).abs() < 1e-9);
        assert_eq!(percentile(&sorted, 0.0), 10.0);
        assert_eq!(percentile(&sorted, 100.0), 40.0);
    }

    #[test]
    fn test_percentile_of_empty_slice() {
        assert_eq!(percentile(&[], 50.0), 0.0);
    }

    #[test]
    fn test_stats_of_single_value() {
        let stats = calculate_stats(&[5.0]);
        assert_eq!(stats.min, 5.0);
        assert_eq!(stats.max, 5.0);
        assert_eq!(stats.p50, 5.0);
    }

    #[test]
    fn test_window_count_across_series() {
        // Two series of length 10 with window 5 contribute 6 windows each;
        // the too-short third series contributes none.
        let series = vec![vec![100.0; 10], vec![200.0; 10], vec![50.0; 3]];
        let suggested = auto_calibrate_thresholds(&series, 5);
        assert_eq!(suggested.window_count, 12);
    }

    #[test]
    fn test_empty_corpus() {
        let suggested = auto_calibrate_thresholds(&[], 5);
        assert_eq!(suggested.window_count, 0);
        assert_eq!(suggested.chop_max, 0.0);
        assert_eq!(suggested.cross_rate_min, 0.0);
    }

    #[test]
    fn test_oscillating_corpus_percentile_sanity() {
        // A corpus of purely oscillating series: suggested cross_rate_min sits
        // at the p75 of observed cross rates, chop_max at the chop p25.
        let mut corpus = Vec::new();
        for amplitude in 1..=10 {
            let series: Vec<f64> = (0..50)
                .map(|i| {
                    if i % 2 == 0 {
                        100.0 + amplitude as f64
                    } else {
                        100.0 - amplitude as f64
                    }
                })
                .collect();
            corpus.push(series);
        }

        let suggested = auto_calibrate_thresholds(&corpus, 5);

        assert!(suggested.window_count > 0);
        assert_eq!(suggested.cross_rate_min, suggested.cross_rate_stats.p75);
        assert!(suggested.cross_rate_min <= suggested.cross_rate_stats.max);
        assert_eq!(suggested.chop_max, suggested.chop_stats.p25);
        assert!(suggested.chop_max >= 0.0);
        // Oscillating windows cross the mean constantly and go nowhere.
        assert!(suggested.cross_rate_stats.p50 > 0.5);
        assert!(suggested.chop_stats.p50 < 0.3);
    }

    #[test]
    fn test_trending_corpus_suggests_higher_chop() {
        let trending: Vec<Vec<f64>> = (1..=5)
            .map(|k| (0..30).map(|i| 100.0 + (k * i) as f64).collect())
            .collect();
        let suggested = auto_calibrate_thresholds(&trending, 5);

        // Monotonic series have chop ~1 and never cross their window mean
        // more than once.
        assert!(suggested.chop_stats.p25 > 0.9);
        assert!(suggested.cross_rate_stats.p75 < 0.3);
    }
}
