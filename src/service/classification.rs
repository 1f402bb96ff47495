//! Classification orchestration.
//!
//! The only layer that touches the stores. Reads the global thresholds, runs
//! the batch classifier and segment builder over an item's price history, and
//! persists the result with full-replace semantics. Multi-item
//! recalculation isolates per-item failures: one bad item must never block
//! regime updates for the rest of the portfolio.

use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::data::{
    ItemStore, PricePoint, SegmentStore, StoreError, ThresholdConfig, ThresholdStore,
    ThresholdUpdate,
};
use crate::regime::{build_segments, classify_regime, RegimeSegment};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// A per-item failure recorded during batch recalculation.
#[derive(Debug, Clone, Serialize)]
pub struct ItemFailure {
    pub item_id: i64,
    pub error: String,
}

/// Outcome of a multi-item recalculation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RecalculateSummary {
    /// Items classified and saved without error.
    pub items_processed: usize,
    /// Total segments written across all items.
    pub segments_created: usize,
    /// Items skipped for having fewer prices than one window.
    pub items_skipped: usize,
    pub failures: Vec<ItemFailure>,
}

/// Orchestrates the classification pipeline against store collaborators.
pub struct ClassificationService<T, S, I> {
    thresholds: T,
    segments: S,
    items: I,
}

impl<T, S, I> ClassificationService<T, S, I>
where
    T: ThresholdStore,
    S: SegmentStore,
    I: ItemStore,
{
    pub fn new(thresholds: T, segments: S, items: I) -> Self {
        Self {
            thresholds,
            segments,
            items,
        }
    }

    pub fn threshold_store(&self) -> &T {
        &self.thresholds
    }

    pub fn segment_store(&self) -> &S {
        &self.segments
    }

    pub fn item_store(&self) -> &I {
        &self.items
    }

    /// Merge a partial update into the global threshold configuration.
    ///
    /// The update must already be validated at the call boundary.
    pub fn update_thresholds(
        &mut self,
        updates: &ThresholdUpdate,
    ) -> Result<ThresholdConfig, ServiceError> {
        Ok(self.thresholds.update_global(updates)?)
    }

    /// Classify an item's price history into regime segments.
    ///
    /// Reads the current global thresholds, slides the classification window
    /// with step 1, and merges same-label runs. Does not persist.
    pub fn classify_item(
        &self,
        _item_id: i64,
        prices: &[PricePoint],
    ) -> Result<Vec<RegimeSegment>, ServiceError> {
        let config = self.thresholds.get_global()?;

        let labels = classify_regime(prices, config.window_size, 1, &config.thresholds());

        let values: Vec<f64> = prices.iter().map(|p| p.price).collect();
        Ok(build_segments(&labels, &values))
    }

    /// Persist an item's segments, replacing any previously stored set, and
    /// update the item's current regime to the latest segment's label.
    ///
    /// On equal end timestamps the first-seen segment wins, so the choice is
    /// stable for a given segment order.
    pub fn save_segments(
        &mut self,
        item_id: i64,
        segments: &[RegimeSegment],
    ) -> Result<(), ServiceError> {
        self.segments.replace_all(item_id, segments)?;

        let most_recent = segments
            .iter()
            .reduce(|latest, seg| if seg.end_ts > latest.end_ts { seg } else { latest });

        if let Some(segment) = most_recent {
            self.items.set_current_regime(item_id, segment.label)?;
        }

        Ok(())
    }

    /// Reclassify many items from their price histories.
    ///
    /// Classification is pure and fans out across items; store writes stay
    /// sequential, one item at a time, so each item's delete+insert remains
    /// atomic on its own. A failing save is logged and recorded, and the
    /// batch moves on.
    pub fn recalculate(
        &mut self,
        histories: &[(i64, Vec<PricePoint>)],
    ) -> Result<RecalculateSummary, ServiceError> {
        let config = self.thresholds.get_global()?;
        let thresholds = config.thresholds();

        let computed: Vec<(i64, Vec<RegimeSegment>)> = histories
            .par_iter()
            .filter(|(_, prices)| prices.len() >= config.window_size)
            .map(|(item_id, prices)| {
                let labels = classify_regime(prices, config.window_size, 1, &thresholds);
                let values: Vec<f64> = prices.iter().map(|p| p.price).collect();
                (*item_id, build_segments(&labels, &values))
            })
            .collect();

        let mut summary = RecalculateSummary {
            items_skipped: histories.len() - computed.len(),
            ..Default::default()
        };

        for (item_id, segments) in &computed {
            if segments.is_empty() {
                summary.items_processed += 1;
                continue;
            }

            match self.save_segments(*item_id, segments) {
                Ok(()) => {
                    summary.items_processed += 1;
                    summary.segments_created += segments.len();
                }
                Err(e) => {
                    warn!("recalculation failed for item {}: {}", item_id, e);
                    summary.failures.push(ItemFailure {
                        item_id: *item_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            "recalculated {} items ({} segments, {} skipped, {} failed)",
            summary.items_processed,
            summary.segments_created,
            summary.items_skipped,
            summary.failures.len()
        );

        Ok(summary)
    }
}
