pub mod loader;
pub mod store;
pub mod types;

pub use loader::{LoaderError, PriceHistoryLoader, EXPECTED_COLUMNS};
pub use store::{
    InMemoryItemStore, InMemorySegmentStore, InMemoryThresholdStore, ItemStore, SegmentStore,
    StoreError, ThresholdStore,
};
pub use types::{PricePoint, PriceRecord, ThresholdConfig, ThresholdUpdate};
