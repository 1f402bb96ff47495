//! Window classification.
//!
//! Maps window features to a regime label and slides the classification
//! across a full price series. A window is RANGE_BOUND only when all four
//! criteria hold; any single failure makes it TRENDING.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::PricePoint;

use super::features::{compute_window_features, WindowFeatures};

/// Regime classification label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegimeLabel {
    /// Price confined to a narrow band, favorable for buy-low/sell-high.
    RangeBound,
    /// Sustained directional movement.
    Trending,
}

impl RegimeLabel {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "RANGE_BOUND" => Some(Self::RangeBound),
            "TRENDING" => Some(Self::Trending),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RangeBound => "RANGE_BOUND",
            Self::Trending => "TRENDING",
        }
    }
}

/// Classification thresholds for a single window decision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Maximum chop ratio for RANGE_BOUND.
    pub chop_max: f64,
    /// Maximum normalized range for RANGE_BOUND.
    pub range_norm_max: f64,
    /// Maximum normalized slope for RANGE_BOUND.
    pub slope_norm_max: f64,
    /// Minimum mean-crossing rate for RANGE_BOUND.
    pub cross_rate_min: f64,
}

/// One classified window position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowLabel {
    /// Index of the first point, from the point's stored series position.
    pub start_idx: i64,
    /// Index of the last point.
    pub end_idx: i64,
    pub start_ts: DateTime<Utc>,
    pub end_ts: DateTime<Utc>,
    pub label: RegimeLabel,
    pub features: WindowFeatures,
}

/// Classify a single window from its features.
///
/// All comparisons are strict: a feature exactly at its threshold classifies
/// as TRENDING.
pub fn classify_window(features: &WindowFeatures, thresholds: &Thresholds) -> RegimeLabel {
    let is_range_bound = features.chop < thresholds.chop_max
        && features.range_norm < thresholds.range_norm_max
        && features.slope_norm < thresholds.slope_norm_max
        && features.cross_rate > thresholds.cross_rate_min;

    if is_range_bound {
        RegimeLabel::RangeBound
    } else {
        RegimeLabel::Trending
    }
}

/// Slide a classification window across a price series.
///
/// Produces one `WindowLabel` per window position. Window boundaries carry the
/// stored `index`/`timestamp` of the underlying points, not loop offsets, so
/// gaps in the series survive into the output. A series shorter than the
/// window yields no labels.
pub fn classify_regime(
    series: &[PricePoint],
    window_size: usize,
    step_size: usize,
    thresholds: &Thresholds,
) -> Vec<WindowLabel> {
    if window_size == 0 || series.len() < window_size {
        return Vec::new();
    }

    let step = step_size.max(1);
    let mut labels = Vec::with_capacity((series.len() - window_size) / step + 1);

    let mut i = 0;
    while i + window_size <= series.len() {
        let window = &series[i..i + window_size];
        let prices: Vec<f64> = window.iter().map(|p| p.price).collect();
        let features = compute_window_features(&prices);
        let label = classify_window(&features, thresholds);

        let first = &window[0];
        let last = &window[window_size - 1];
        labels.push(WindowLabel {
            start_idx: first.index,
            end_idx: last.index,
            start_ts: first.timestamp,
            end_ts: last.timestamp,
            label,
            features,
        });

        i += step;
    }

    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn default_thresholds() -> Thresholds {
        Thresholds {
            chop_max: 0.25,
            range_norm_max: 0.02,
            slope_norm_max: 0.0005,
            cross_rate_min: 0.08,
        }
    }

    fn price_points(prices: &[f64]) -> Vec<PricePoint> {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        prices
            .iter()
            .enumerate()
            .map(|(i, &price)| PricePoint {
                price,
                timestamp: base + chrono::Duration::hours(i as i64),
                index: i as i64,
            })
            .collect()
    }

    #[test]
    fn test_range_bound_when_all_criteria_met() {
        let features = WindowFeatures {
            chop: 0.1,
            range_norm: 0.01,
            slope_norm: 0.0001,
            cross_rate: 0.2,
            raw_slope: 0.0,
        };
        assert_eq!(
            classify_window(&features, &default_thresholds()),
            RegimeLabel::RangeBound
        );
    }

    #[test]
    fn test_trending_when_any_criterion_fails() {
        let base = WindowFeatures {
            chop: 0.1,
            range_norm: 0.01,
            slope_norm: 0.0001,
            cross_rate: 0.2,
            raw_slope: 0.0,
        };
        let thresholds = default_thresholds();

        let high_chop = WindowFeatures { chop: 0.5, ..base };
        assert_eq!(classify_window(&high_chop, &thresholds), RegimeLabel::Trending);

        let wide_range = WindowFeatures {
            range_norm: 0.05,
            ..base
        };
        assert_eq!(classify_window(&wide_range, &thresholds), RegimeLabel::Trending);

        let steep_slope = WindowFeatures {
            slope_norm: 0.001,
            ..base
        };
        assert_eq!(classify_window(&steep_slope, &thresholds), RegimeLabel::Trending);

        let few_crossings = WindowFeatures {
            cross_rate: 0.05,
            ..base
        };
        assert_eq!(
            classify_window(&few_crossings, &thresholds),
            RegimeLabel::Trending
        );
    }

    #[test]
    fn test_exact_threshold_values_classify_trending() {
        // Strict inequalities: sitting exactly on every threshold fails them all.
        let features = WindowFeatures {
            chop: 0.25,
            range_norm: 0.02,
            slope_norm: 0.0005,
            cross_rate: 0.08,
            raw_slope: 0.0,
        };
        assert_eq!(
            classify_window(&features, &default_thresholds()),
            RegimeLabel::Trending
        );
    }

    #[test]
    fn test_linear_trend_classifies_trending() {
        let series = price_points(&[
            100.0, 110.0, 120.0, 130.0, 140.0, 150.0, 160.0, 170.0, 180.0, 190.0,
        ]);
        let labels = classify_regime(&series, 5, 1, &default_thresholds());

        assert!(!labels.is_empty());
        let trending = labels
            .iter()
            .filter(|l| l.label == RegimeLabel::Trending)
            .count();
        assert!(trending as f64 / labels.len() as f64 > 0.5);
    }

    #[test]
    fn test_empty_and_short_series_yield_no_windows() {
        let thresholds = default_thresholds();
        assert!(classify_regime(&[], 5, 1, &thresholds).is_empty());

        let series = price_points(&[100.0, 101.0, 102.0]);
        assert!(classify_regime(&series, 5, 1, &thresholds).is_empty());
    }

    #[test]
    fn test_window_count_law() {
        // L=7, W=5, step 1 gives exactly L-W+1 = 3 windows.
        let series = price_points(&[100.0, 101.0, 102.0, 103.0, 104.0, 105.0, 106.0]);
        let labels = classify_regime(&series, 5, 1, &default_thresholds());
        assert_eq!(labels.len(), 3);
    }

    #[test]
    fn test_window_boundaries_come_from_stored_points() {
        let series = price_points(&[100.0, 101.0, 102.0, 103.0, 104.0]);
        let labels = classify_regime(&series, 3, 1, &default_thresholds());

        assert_eq!(labels.len(), 3);
        assert_eq!(labels[0].start_idx, 0);
        assert_eq!(labels[0].end_idx, 2);
        assert_eq!(labels[1].start_idx, 1);
        assert_eq!(labels[1].end_idx, 3);
        assert_eq!(labels[0].start_ts, series[0].timestamp);
        assert_eq!(labels[0].end_ts, series[2].timestamp);
    }

    #[test]
    fn test_step_size_skips_positions() {
        let series = price_points(&[100.0, 101.0, 102.0, 103.0, 104.0, 105.0, 106.0]);
        let labels = classify_regime(&series, 3, 2, &default_thresholds());

        assert_eq!(labels.len(), 3);
        assert_eq!(labels[0].start_idx, 0);
        assert_eq!(labels[1].start_idx, 2);
        assert_eq!(labels[2].start_idx, 4);
    }

    #[test]
    fn test_label_serialization_strings() {
        assert_eq!(RegimeLabel::RangeBound.as_str(), "RANGE_BOUND");
        assert_eq!(RegimeLabel::Trending.as_str(), "TRENDING");
        assert_eq!(
            serde_json::to_string(&RegimeLabel::RangeBound).unwrap(),
            "\"RANGE_BOUND\""
        );
        assert_eq!(RegimeLabel::from_str("TRENDING"), Some(RegimeLabel::Trending));
        assert_eq!(RegimeLabel::from_str("SIDEWAYS"), None);
    }
}
