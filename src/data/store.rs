//! Store contracts for thresholds, segments, and item state.
//!
//! The classification core never touches persistence; these traits are the
//! narrow seam it orchestrates through. The in-memory implementations back
//! the CLI and tests; a database-backed implementation satisfies the same
//! contracts.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::regime::{RegimeLabel, RegimeSegment};

use super::types::{ThresholdConfig, ThresholdUpdate};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("no threshold configuration found; seed the store first")]
    MissingThresholds,

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Access to the single global threshold configuration row.
pub trait ThresholdStore {
    fn get_global(&self) -> Result<ThresholdConfig, StoreError>;

    /// Merge the provided fields into the global row and return the result.
    fn update_global(&mut self, updates: &ThresholdUpdate) -> Result<ThresholdConfig, StoreError>;
}

/// Persistence for computed regime segments.
pub trait SegmentStore {
    fn delete_by_item(&mut self, item_id: i64) -> Result<(), StoreError>;

    fn insert_many(&mut self, item_id: i64, segments: &[RegimeSegment]) -> Result<(), StoreError>;

    /// Segments for an item ordered by `start_ts` ascending, optionally
    /// restricted to those starting and ending inside `[from, to]`.
    fn query_by_item(
        &self,
        item_id: i64,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<Vec<RegimeSegment>, StoreError>;

    /// Full-replace semantics: every recalculation deletes the prior set and
    /// inserts the new one, so no stale segment can survive.
    fn replace_all(&mut self, item_id: i64, segments: &[RegimeSegment]) -> Result<(), StoreError> {
        self.delete_by_item(item_id)?;
        self.insert_many(item_id, segments)
    }
}

/// Per-item regime state.
pub trait ItemStore {
    fn set_current_regime(&mut self, item_id: i64, label: RegimeLabel) -> Result<(), StoreError>;

    fn current_regime(&self, item_id: i64) -> Result<Option<RegimeLabel>, StoreError>;
}

/// In-memory threshold store holding the single global row.
#[derive(Debug, Default)]
pub struct InMemoryThresholdStore {
    config: Option<ThresholdConfig>,
}

impl InMemoryThresholdStore {
    /// A store seeded with the default configuration.
    pub fn seeded() -> Self {
        Self {
            config: Some(ThresholdConfig::default()),
        }
    }

    pub fn with_config(config: ThresholdConfig) -> Self {
        Self {
            config: Some(config),
        }
    }
}

impl ThresholdStore for InMemoryThresholdStore {
    fn get_global(&self) -> Result<ThresholdConfig, StoreError> {
        self.config.ok_or(StoreError::MissingThresholds)
    }

    fn update_global(&mut self, updates: &ThresholdUpdate) -> Result<ThresholdConfig, StoreError> {
        let mut config = self.get_global()?;
        updates.apply(&mut config);
        self.config = Some(config);
        Ok(config)
    }
}

/// In-memory segment store keyed by item.
#[derive(Debug, Default)]
pub struct InMemorySegmentStore {
    segments: HashMap<i64, Vec<RegimeSegment>>,
}

impl InMemorySegmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Item ids with at least one stored segment.
    pub fn item_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .segments
            .iter()
            .filter(|(_, segs)| !segs.is_empty())
            .map(|(&id, _)| id)
            .collect();
        ids.sort();
        ids
    }
}

impl SegmentStore for InMemorySegmentStore {
    fn delete_by_item(&mut self, item_id: i64) -> Result<(), StoreError> {
        self.segments.remove(&item_id);
        Ok(())
    }

    fn insert_many(&mut self, item_id: i64, segments: &[RegimeSegment]) -> Result<(), StoreError> {
        self.segments
            .entry(item_id)
            .or_default()
            .extend_from_slice(segments);
        Ok(())
    }

    fn query_by_item(
        &self,
        item_id: i64,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<Vec<RegimeSegment>, StoreError> {
        let mut result: Vec<RegimeSegment> = match self.segments.get(&item_id) {
            Some(segments) => segments
                .iter()
                .filter(|s| match range {
                    Some((from, to)) => s.start_ts >= from && s.end_ts <= to,
                    None => true,
                })
                .cloned()
                .collect(),
            None => Vec::new(),
        };
        result.sort_by_key(|s| s.start_ts);
        Ok(result)
    }
}

/// In-memory item state store.
#[derive(Debug, Default)]
pub struct InMemoryItemStore {
    current: HashMap<i64, RegimeLabel>,
}

impl InMemoryItemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ItemStore for InMemoryItemStore {
    fn set_current_regime(&mut self, item_id: i64, label: RegimeLabel) -> Result<(), StoreError> {
        self.current.insert(item_id, label);
        Ok(())
    }

    fn current_regime(&self, item_id: i64) -> Result<Option<RegimeLabel>, StoreError> {
        Ok(self.current.get(&item_id).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regime::WindowFeatures;
    use chrono::TimeZone;

    fn segment(start_idx: i64, end_idx: i64, label: RegimeLabel) -> RegimeSegment {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        RegimeSegment {
            start_idx,
            end_idx,
            start_ts: base + chrono::Duration::hours(start_idx),
            end_ts: base + chrono::Duration::hours(end_idx),
            label,
            band_midpoint: None,
            band_width_pct: None,
            confidence_score: Some(0.5),
            avg_features: WindowFeatures::default(),
            slope_direction: 0,
        }
    }

    #[test]
    fn test_unseeded_threshold_store_errors() {
        let store = InMemoryThresholdStore::default();
        assert!(matches!(
            store.get_global(),
            Err(StoreError::MissingThresholds)
        ));
    }

    #[test]
    fn test_threshold_update_merges_partial_fields() {
        let mut store = InMemoryThresholdStore::seeded();
        let updated = store
            .update_global(&ThresholdUpdate {
                chop_max: Some(0.4),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(updated.chop_max, 0.4);
        assert_eq!(updated.window_size, 24);
        assert_eq!(store.get_global().unwrap().chop_max, 0.4);
    }

    #[test]
    fn test_replace_all_removes_prior_segments() {
        let mut store = InMemorySegmentStore::new();
        store
            .insert_many(1, &[segment(0, 10, RegimeLabel::Trending)])
            .unwrap();

        let replacement = [
            segment(0, 5, RegimeLabel::RangeBound),
            segment(6, 12, RegimeLabel::Trending),
        ];
        store.replace_all(1, &replacement).unwrap();

        let stored = store.query_by_item(1, None).unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].label, RegimeLabel::RangeBound);
    }

    #[test]
    fn test_query_orders_by_start_ts() {
        let mut store = InMemorySegmentStore::new();
        store
            .insert_many(
                1,
                &[
                    segment(20, 30, RegimeLabel::Trending),
                    segment(0, 10, RegimeLabel::RangeBound),
                ],
            )
            .unwrap();

        let stored = store.query_by_item(1, None).unwrap();
        assert_eq!(stored[0].start_idx, 0);
        assert_eq!(stored[1].start_idx, 20);
    }

    #[test]
    fn test_query_filters_by_time_range() {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut store = InMemorySegmentStore::new();
        store
            .insert_many(
                1,
                &[
                    segment(0, 10, RegimeLabel::RangeBound),
                    segment(11, 30, RegimeLabel::Trending),
                ],
            )
            .unwrap();

        let range = Some((base, base + chrono::Duration::hours(10)));
        let stored = store.query_by_item(1, range).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].end_idx, 10);
    }

    #[test]
    fn test_query_unknown_item_returns_empty() {
        let store = InMemorySegmentStore::new();
        assert!(store.query_by_item(99, None).unwrap().is_empty());
    }

    #[test]
    fn test_item_store_tracks_current_regime() {
        let mut store = InMemoryItemStore::new();
        assert_eq!(store.current_regime(1).unwrap(), None);

        store.set_current_regime(1, RegimeLabel::Trending).unwrap();
        assert_eq!(
            store.current_regime(1).unwrap(),
            Some(RegimeLabel::Trending)
        );

        store
            .set_current_regime(1, RegimeLabel::RangeBound)
            .unwrap();
        assert_eq!(
            store.current_regime(1).unwrap(),
            Some(RegimeLabel::RangeBound)
        );
    }
}
