//! Incremental regime classification.
//!
//! The online dual of the batch classifier + segment builder: a bounded
//! rolling buffer is reclassified on every new price point, and a finished
//! segment is emitted exactly when the label flips. State is threaded
//! functionally: every update reads a state and returns a fresh one, so
//! replaying a price sequence is deterministic and callers can run one
//! stream per tracked item without sharing anything.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::data::PricePoint;

use super::classifier::{classify_window, RegimeLabel, Thresholds};
use super::features::{compute_median, compute_window_features, WindowFeatures};
use super::segments::{confidence_score, slope_direction, RegimeSegment};

/// Rolling classification state for a single item.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamState {
    pub window_size: usize,
    pub thresholds: Thresholds,
    /// Most recent points, oldest first, at most `window_size` entries.
    pub price_buffer: VecDeque<PricePoint>,
    /// Features of the latest full window, if one has been seen.
    pub current_features: Option<WindowFeatures>,
    /// Label of the open segment, if classification has started.
    pub current_label: Option<RegimeLabel>,
    pub segment_start_ts: Option<DateTime<Utc>>,
    pub segment_start_idx: Option<i64>,
    /// Per-window features accumulated over the open segment, for averaging.
    pub segment_features: Vec<WindowFeatures>,
}

/// Result of feeding one price point into a stream.
#[derive(Debug, Clone)]
pub struct StreamUpdate {
    pub state: StreamState,
    /// True when this point flipped the label and closed a segment.
    pub label_changed: bool,
    /// The finished segment, present exactly when `label_changed` is true.
    pub segment: Option<RegimeSegment>,
}

/// Create an empty stream for the given window size and thresholds.
pub fn init_stream_state(window_size: usize, thresholds: Thresholds) -> StreamState {
    StreamState {
        window_size,
        thresholds,
        price_buffer: VecDeque::with_capacity(window_size),
        current_features: None,
        current_label: None,
        segment_start_ts: None,
        segment_start_idx: None,
        segment_features: Vec::new(),
    }
}

/// Advance a stream by one price point.
///
/// Until the buffer holds `window_size` points, no classification happens.
/// The first classification opens a segment at the buffer's oldest point but
/// does not report a change. A label flip finalizes the previous segment with
/// the most recent pre-flip point as its end boundary and opens a new segment
/// at the incoming point.
pub fn update_stream(state: &StreamState, new_price: PricePoint) -> StreamUpdate {
    let mut next = state.clone();
    next.price_buffer.push_back(new_price);
    while next.price_buffer.len() > state.window_size {
        next.price_buffer.pop_front();
    }

    if next.price_buffer.len() < state.window_size {
        return StreamUpdate {
            state: next,
            label_changed: false,
            segment: None,
        };
    }

    let prices: Vec<f64> = next.price_buffer.iter().map(|p| p.price).collect();
    let features = compute_window_features(&prices);
    next.current_features = Some(features);

    let new_label = classify_window(&features, &state.thresholds);

    match state.current_label {
        // First full window: open a segment, a fresh start is not a change.
        None => {
            next.current_label = Some(new_label);
            next.segment_start_ts = Some(next.price_buffer[0].timestamp);
            next.segment_start_idx = Some(next.price_buffer[0].index);
            next.segment_features = vec![features];

            StreamUpdate {
                state: next,
                label_changed: false,
                segment: None,
            }
        }
        Some(current) if current == new_label => {
            next.current_label = Some(new_label);
            next.segment_features.push(features);

            StreamUpdate {
                state: next,
                label_changed: false,
                segment: None,
            }
        }
        Some(_) => {
            // Close out the previous segment against the outgoing buffer,
            // ending at the last point before the differently-labeled one.
            let segment = finalize_segment(state);

            next.current_label = Some(new_label);
            next.segment_start_ts = Some(new_price.timestamp);
            next.segment_start_idx = Some(new_price.index);
            next.segment_features = vec![features];

            StreamUpdate {
                state: next,
                label_changed: true,
                segment,
            }
        }
    }
}

/// Build the finished segment from the pre-update state.
fn finalize_segment(state: &StreamState) -> Option<RegimeSegment> {
    let label = state.current_label?;
    let end = state.price_buffer.back()?;
    let start_idx = state.segment_start_idx?;
    let start_ts = state.segment_start_ts?;

    let avg_features = WindowFeatures::average(&state.segment_features);
    // Streaming scores against the live thresholds the stream was opened with.
    let confidence = confidence_score(label, &avg_features, &state.thresholds);

    let prices: Vec<f64> = state.price_buffer.iter().map(|p| p.price).collect();

    let mut band_midpoint = None;
    let mut band_width_pct = None;

    if label == RegimeLabel::RangeBound && !prices.is_empty() {
        let midpoint = compute_median(&prices);
        band_midpoint = Some(midpoint);

        if midpoint > 0.0 {
            let min = prices.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = prices.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            band_width_pct = Some((max - min) / midpoint * 100.0);
        }
    }

    let median_price = if prices.is_empty() {
        0.0
    } else {
        compute_median(&prices)
    };

    Some(RegimeSegment {
        start_idx,
        end_idx: end.index,
        start_ts,
        end_ts: end.timestamp,
        label,
        band_midpoint,
        band_width_pct,
        confidence_score: Some(confidence),
        avg_features,
        slope_direction: slope_direction(avg_features.raw_slope, median_price),
    })
}
