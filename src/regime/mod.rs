//! Price-regime classification core.
//!
//! Pure computation from raw prices to merged segments:
//! - window features: chop, normalized range, normalized slope, crossing rate
//! - threshold classification: RANGE_BOUND vs TRENDING
//! - batch sliding-window pass and segment merging
//! - incremental streaming classification with functional state
//! - percentile-based threshold auto-calibration

pub mod calibration;
pub mod classifier;
pub mod features;
pub mod regression;
pub mod segments;
pub mod streaming;

pub use calibration::{auto_calibrate_thresholds, DistributionStats, SuggestedThresholds};
pub use classifier::{classify_regime, classify_window, RegimeLabel, Thresholds, WindowLabel};
pub use features::{compute_median, compute_window_features, WindowFeatures};
pub use regression::compute_slope;
pub use segments::{build_segments, RegimeSegment, CONFIDENCE_BASELINE};
pub use streaming::{init_stream_state, update_stream, StreamState, StreamUpdate};
