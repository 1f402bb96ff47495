//! Price-history loader for per-item parquet files.
//!
//! Reads stored market samples from `<data_dir>/prices/<item_id>.parquet`
//! into chronologically ordered price points. Each file holds one item's
//! history with the following schema:
//! - item_id (i64)
//! - high_price (f64, nullable)
//! - low_price (f64, nullable)
//! - synced_at (i64, epoch seconds)

use std::path::Path;

use chrono::{TimeZone, Utc};
use polars::prelude::*;
use thiserror::Error;

use super::types::{PricePoint, PriceRecord};

/// Expected columns in a price-history parquet file.
pub const EXPECTED_COLUMNS: &[&str] = &["item_id", "high_price", "low_price", "synced_at"];

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Parquet loader for per-item price histories.
pub struct PriceHistoryLoader {
    data_dir: String,
}

impl PriceHistoryLoader {
    /// Create a loader pointing at the price data directory.
    pub fn new(data_dir: &str) -> Self {
        Self {
            data_dir: data_dir.to_string(),
        }
    }

    /// Path to an item's parquet file.
    fn parquet_path(&self, item_id: i64) -> String {
        format!("{}/prices/{}.parquet", self.data_dir, item_id)
    }

    /// List the item ids with stored price history.
    pub fn available_items(&self) -> Result<Vec<i64>, LoaderError> {
        let dir_path = format!("{}/prices", self.data_dir);
        let path = Path::new(&dir_path);

        if !path.exists() {
            return Ok(vec![]);
        }

        let mut items = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let name = file_name.to_string_lossy();
            if let Some(stem) = name.strip_suffix(".parquet") {
                if let Ok(item_id) = stem.parse::<i64>() {
                    items.push(item_id);
                }
            }
        }
        items.sort();
        Ok(items)
    }

    /// Load an item's raw history as a LazyFrame.
    pub fn load_lazy(&self, item_id: i64) -> Result<LazyFrame, LoaderError> {
        let path = self.parquet_path(item_id);
        if !Path::new(&path).exists() {
            return Err(LoaderError::FileNotFound(path));
        }
        let lf = LazyFrame::scan_parquet(&path, ScanArgsParquet::default())?;
        Ok(lf)
    }

    /// Load an item's full history as chronologically ordered price points.
    ///
    /// Rows without a timestamp are dropped; price selection follows the
    /// high-then-low-then-zero convention.
    pub fn load_history(&self, item_id: i64) -> Result<Vec<PricePoint>, LoaderError> {
        let df = self.load_lazy(item_id)?.collect()?;

        let high = df.column("high_price")?.f64()?;
        let low = df.column("low_price")?.f64()?;
        let synced = df.column("synced_at")?.i64()?;

        let mut records: Vec<PriceRecord> = Vec::with_capacity(df.height());
        for ((high_price, low_price), secs) in
            high.into_iter().zip(low.into_iter()).zip(synced.into_iter())
        {
            if let Some(secs) = secs {
                let synced_at = Utc.timestamp_opt(secs, 0).single().ok_or_else(|| {
                    LoaderError::InvalidData(format!("invalid epoch timestamp {}", secs))
                })?;
                records.push(PriceRecord {
                    item_id,
                    high_price,
                    low_price,
                    synced_at,
                });
            }
        }

        records.sort_by_key(|r| r.synced_at);

        Ok(records
            .iter()
            .enumerate()
            .map(|(index, record)| record.to_point(index as i64))
            .collect())
    }

    /// Load every available item's price values, for calibration.
    ///
    /// Items whose history fails to load are skipped; the caller only needs
    /// the usable series.
    pub fn load_all_price_values(&self) -> Result<Vec<(i64, Vec<f64>)>, LoaderError> {
        let mut all = Vec::new();
        for item_id in self.available_items()? {
            match self.load_history(item_id) {
                Ok(points) => {
                    all.push((item_id, points.iter().map(|p| p.price).collect()));
                }
                Err(LoaderError::FileNotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_reported() {
        let loader = PriceHistoryLoader::new("/nonexistent-bandwatch-data");
        match loader.load_lazy(42) {
            Err(LoaderError::FileNotFound(path)) => {
                assert!(path.ends_with("prices/42.parquet"));
            }
            other => panic!("expected FileNotFound, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_missing_directory_yields_no_items() {
        let loader = PriceHistoryLoader::new("/nonexistent-bandwatch-data");
        assert!(loader.available_items().unwrap().is_empty());
    }
}
