pub mod data;
pub mod regime;
pub mod service;

// Re-export commonly used types
pub use data::{PriceHistoryLoader, PricePoint, PriceRecord, ThresholdConfig, ThresholdUpdate};
pub use data::{
    InMemoryItemStore, InMemorySegmentStore, InMemoryThresholdStore, ItemStore, SegmentStore,
    ThresholdStore,
};
pub use regime::{
    auto_calibrate_thresholds, build_segments, classify_regime, init_stream_state, update_stream,
    RegimeLabel, RegimeSegment, StreamState, SuggestedThresholds, Thresholds, WindowFeatures,
    WindowLabel,
};
pub use service::{ClassificationService, RecalculateSummary, ServiceError};
