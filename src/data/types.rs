//! Core data types for regime classification.
//!
//! These types carry the price history and threshold configuration shared by
//! the classification core, the stores, and the CLI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::regime::Thresholds;

/// A single point in an item's price history.
///
/// `index` is the point's position in the full historical series, so segment
/// boundaries stay meaningful independent of any array slicing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub price: f64,
    pub timestamp: DateTime<Utc>,
    pub index: i64,
}

/// A raw market sample as delivered by the price feed.
///
/// High and low are both optional; the effective price convention is high,
/// falling back to low, falling back to 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub item_id: i64,
    pub high_price: Option<f64>,
    pub low_price: Option<f64>,
    pub synced_at: DateTime<Utc>,
}

impl PriceRecord {
    /// High price, falling back to low price, falling back to 0.
    pub fn effective_price(&self) -> f64 {
        self.high_price.or(self.low_price).unwrap_or(0.0)
    }

    /// Convert to a classification point at the given series position.
    pub fn to_point(&self, index: i64) -> PricePoint {
        PricePoint {
            price: self.effective_price(),
            timestamp: self.synced_at,
            index,
        }
    }
}

/// The single global threshold configuration row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    pub chop_max: f64,
    pub range_norm_max: f64,
    pub slope_norm_max: f64,
    pub cross_rate_min: f64,
    /// Number of consecutive prices per classification window, >= 2.
    pub window_size: usize,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            chop_max: 0.25,
            range_norm_max: 0.02,
            slope_norm_max: 0.0005,
            cross_rate_min: 0.08,
            window_size: 24,
        }
    }
}

impl ThresholdConfig {
    /// The per-window classification thresholds, without the window size.
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            chop_max: self.chop_max,
            range_norm_max: self.range_norm_max,
            slope_norm_max: self.slope_norm_max,
            cross_rate_min: self.cross_rate_min,
        }
    }
}

/// A partial threshold update; only provided fields are merged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdUpdate {
    pub chop_max: Option<f64>,
    pub range_norm_max: Option<f64>,
    pub slope_norm_max: Option<f64>,
    pub cross_rate_min: Option<f64>,
    pub window_size: Option<usize>,
}

impl ThresholdUpdate {
    pub fn is_empty(&self) -> bool {
        self.chop_max.is_none()
            && self.range_norm_max.is_none()
            && self.slope_norm_max.is_none()
            && self.cross_rate_min.is_none()
            && self.window_size.is_none()
    }

    /// Validate numeric ranges before any store write.
    ///
    /// The pure classification components assume already-checked thresholds;
    /// this is the orchestration-boundary check. Returns one message per
    /// invalid field.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if let Some(v) = self.chop_max {
            if !v.is_finite() || v <= 0.0 || v > 1.0 {
                errors.push("chop_max must be a number between 0 and 1".to_string());
            }
        }
        if let Some(v) = self.range_norm_max {
            if !v.is_finite() || v <= 0.0 {
                errors.push("range_norm_max must be a positive number".to_string());
            }
        }
        if let Some(v) = self.slope_norm_max {
            if !v.is_finite() || v <= 0.0 {
                errors.push("slope_norm_max must be a positive number".to_string());
            }
        }
        if let Some(v) = self.cross_rate_min {
            if !v.is_finite() || v <= 0.0 || v > 1.0 {
                errors.push("cross_rate_min must be a number between 0 and 1".to_string());
            }
        }
        if let Some(v) = self.window_size {
            if v < 2 {
                errors.push("window_size must be an integer of at least 2".to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Merge the provided fields into a configuration.
    pub fn apply(&self, config: &mut ThresholdConfig) {
        if let Some(v) = self.chop_max {
            config.chop_max = v;
        }
        if let Some(v) = self.range_norm_max {
            config.range_norm_max = v;
        }
        if let Some(v) = self.slope_norm_max {
            config.slope_norm_max = v;
        }
        if let Some(v) = self.cross_rate_min {
            config.cross_rate_min = v;
        }
        if let Some(v) = self.window_size {
            config.window_size = v;
        }
    }
}
