//! Segment merging.
//!
//! Collapses consecutive same-label windows into contiguous segments with
//! averaged features, a confidence score, band metrics for range-bound
//! segments, and a slope direction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::classifier::{RegimeLabel, Thresholds, WindowLabel};
use super::features::{compute_median, WindowFeatures};

/// Reference thresholds for confidence-score normalization.
///
/// Batch-built segments score against this fixed baseline rather than the
/// live configured thresholds, so stored confidence scores stay comparable
/// across threshold changes. Matches the seeded default configuration.
pub const CONFIDENCE_BASELINE: Thresholds = Thresholds {
    chop_max: 0.25,
    range_norm_max: 0.02,
    slope_norm_max: 0.0005,
    cross_rate_min: 0.08,
};

/// Dead zone below which a normalized slope counts as flat.
const SLOPE_FLAT_THRESHOLD: f64 = 1e-4;

/// A merged run of consecutive windows with the same regime label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeSegment {
    /// Start index in the underlying price series.
    pub start_idx: i64,
    /// End index in the underlying price series.
    pub end_idx: i64,
    pub start_ts: DateTime<Utc>,
    pub end_ts: DateTime<Utc>,
    pub label: RegimeLabel,
    /// Median price over the segment (RANGE_BOUND only).
    pub band_midpoint: Option<f64>,
    /// (max - min) / midpoint * 100 (RANGE_BOUND only).
    pub band_width_pct: Option<f64>,
    /// How decisively the averaged features satisfy (or violate) the
    /// classification criteria, in [0, 1].
    pub confidence_score: Option<f64>,
    /// Arithmetic mean of the member windows' features.
    pub avg_features: WindowFeatures,
    /// -1 = down, 0 = flat, 1 = up.
    pub slope_direction: i8,
}

/// Score how far averaged features sit from the classification boundary.
///
/// RANGE_BOUND confidence is the mean of four margins, one per criterion, so
/// it rewards balance. TRENDING confidence is the max of four excess terms:
/// one strongly violated criterion is enough.
pub(crate) fn confidence_score(
    label: RegimeLabel,
    features: &WindowFeatures,
    thresholds: &Thresholds,
) -> f64 {
    match label {
        RegimeLabel::RangeBound => {
            let chop_margin = (1.0 - features.chop / thresholds.chop_max).max(0.0);
            let range_margin = (1.0 - features.range_norm / thresholds.range_norm_max).max(0.0);
            let slope_margin = (1.0 - features.slope_norm / thresholds.slope_norm_max).max(0.0);
            let cross_margin = ((features.cross_rate - thresholds.cross_rate_min)
                / (1.0 - thresholds.cross_rate_min))
                .clamp(0.0, 1.0);

            (chop_margin + range_margin + slope_margin + cross_margin) / 4.0
        }
        RegimeLabel::Trending => {
            let chop_excess =
                ((features.chop - thresholds.chop_max) / (1.0 - thresholds.chop_max)).clamp(0.0, 1.0);
            let range_excess =
                (features.range_norm / thresholds.range_norm_max - 1.0).clamp(0.0, 1.0);
            let slope_excess =
                (features.slope_norm / thresholds.slope_norm_max - 1.0).clamp(0.0, 1.0);
            let cross_deficit = (1.0 - features.cross_rate / thresholds.cross_rate_min).max(0.0);

            chop_excess
                .max(range_excess)
                .max(slope_excess)
                .max(cross_deficit)
        }
    }
}

/// Direction of the average raw slope, normalized by the segment's median
/// price to keep the dead zone scale-free.
pub(crate) fn slope_direction(avg_raw_slope: f64, median_price: f64) -> i8 {
    let normalized = if median_price > 0.0 {
        avg_raw_slope / median_price
    } else {
        0.0
    };

    if normalized > SLOPE_FLAT_THRESHOLD {
        1
    } else if normalized < -SLOPE_FLAT_THRESHOLD {
        -1
    } else {
        0
    }
}

/// Merge consecutive same-label windows into segments.
///
/// `prices` must be the raw price values of the series the labels were
/// computed from (indices in the labels address into it, for band metrics).
pub fn build_segments(labels: &[WindowLabel], prices: &[f64]) -> Vec<RegimeSegment> {
    if labels.is_empty() {
        return Vec::new();
    }

    let mut segments = Vec::new();
    let mut run_start = 0;

    for i in 1..labels.len() {
        if labels[i].label != labels[run_start].label {
            segments.push(finalize_segment(&labels[run_start..i], prices));
            run_start = i;
        }
    }
    segments.push(finalize_segment(&labels[run_start..], prices));

    segments
}

/// Finalize one maximal run of same-label windows into a segment.
fn finalize_segment(run: &[WindowLabel], prices: &[f64]) -> RegimeSegment {
    let first = &run[0];
    let last = &run[run.len() - 1];
    let label = first.label;

    let all_features: Vec<WindowFeatures> = run.iter().map(|wl| wl.features).collect();
    let avg_features = WindowFeatures::average(&all_features);
    let confidence = confidence_score(label, &avg_features, &CONFIDENCE_BASELINE);

    // Slice the raw prices covered by this run, inclusive of the end index.
    let start = first.start_idx.max(0) as usize;
    let end = ((last.end_idx + 1).max(0) as usize).min(prices.len());
    let segment_prices: &[f64] = if start < end { &prices[start..end] } else { &[] };

    let mut band_midpoint = None;
    let mut band_width_pct = None;

    if label == RegimeLabel::RangeBound && !segment_prices.is_empty() {
        let midpoint = compute_median(segment_prices);
        band_midpoint = Some(midpoint);

        if midpoint > 0.0 {
            let min = segment_prices.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = segment_prices
                .iter()
                .cloned()
                .fold(f64::NEG_INFINITY, f64::max);
            band_width_pct = Some((max - min) / midpoint * 100.0);
        }
    }

    let median_price = if segment_prices.is_empty() {
        0.0
    } else {
        compute_median(segment_prices)
    };

    RegimeSegment {
        start_idx: first.start_idx,
        end_idx: last.end_idx,
        start_ts: first.start_ts,
        end_ts: last.end_ts,
        label,
        band_midpoint,
        band_width_pct,
        confidence_score: Some(confidence),
        avg_features,
        slope_direction: slope_direction(avg_features.raw_slope, median_price),
    }
}
