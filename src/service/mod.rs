//! Orchestration layer.
//!
//! Everything that coordinates the pure classification core with the store
//! collaborators lives here; the core itself never performs I/O.

pub mod classification;

pub use classification::{ClassificationService, ItemFailure, RecalculateSummary, ServiceError};
