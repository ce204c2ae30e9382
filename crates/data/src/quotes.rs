//! Quote snapshot loading.

use anyhow::{Context, Result};
use std::path::Path;

use crate::models::{quotes_from_frame, LoadStats, QuoteRecord};
use crate::parquet_storage::ParquetStorage;

/// Loads resolved quote snapshots.
pub struct QuoteLoader;

impl QuoteLoader {
    /// Reads a parquet snapshot, dropping unresolved and incomplete rows.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or lacks a required column.
    pub fn from_parquet(path: impl AsRef<Path>) -> Result<(Vec<QuoteRecord>, LoadStats)> {
        let path = path.as_ref();
        let frame = ParquetStorage::read_frame(path)?;
        let (quotes, stats) = quotes_from_frame(&frame)
            .with_context(|| format!("Invalid quote snapshot: {}", path.display()))?;

        if stats.unresolved > 0 || stats.incomplete > 0 {
            tracing::warn!("Dropped rows from {}: {}", path.display(), stats.summary());
        }
        tracing::info!("Loaded {} quotes from {}", stats.rows_kept, path.display());

        Ok((quotes, stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use crate::models::Outcome;
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn quotes_survive_parquet_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.parquet");
        let start = Utc.with_ymd_and_hms(2025, 10, 5, 17, 0, 0).unwrap();

        let quotes = vec![
            QuoteRecord::new("KX-A", start, start + Duration::minutes(1), Some(93.0), Outcome::Yes),
            QuoteRecord::new("KX-B", start, start + Duration::minutes(2), Some(7.0), Outcome::No)
                .with_bid(Some(5.0)),
        ];

        ParquetStorage::write_quotes(&path, &quotes).unwrap();
        let (back, stats) = QuoteLoader::from_parquet(&path).unwrap();

        assert_eq!(back, quotes);
        assert_eq!(stats.rows_read, 2);
        assert_eq!(stats.rows_kept, 2);
    }

    #[test]
    fn unresolved_rows_are_counted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.parquet");
        let start = Utc.with_ymd_and_hms(2025, 10, 5, 17, 0, 0).unwrap();

        let frame = Frame::new()
            .with_timestamp("end_period_ts", vec![Some(start), Some(start)])
            .with_text("ticker", vec![Some("A".to_string()), Some("B".to_string())])
            .with_float("yes_ask_close", vec![Some(50.0), Some(60.0)])
            .with_timestamp("game_start_time_utc", vec![Some(start), Some(start)])
            .with_text("result", vec![Some("no".to_string()), Some("scalar".to_string())]);
        ParquetStorage::write_frame(&path, &frame).unwrap();

        let (quotes, stats) = QuoteLoader::from_parquet(&path).unwrap();
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].result, Outcome::No);
        assert_eq!(stats.unresolved, 1);
    }

    #[test]
    fn missing_column_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.parquet");
        let frame = Frame::new().with_text("ticker", vec![Some("A".to_string())]);
        ParquetStorage::write_frame(&path, &frame).unwrap();

        let err = QuoteLoader::from_parquet(&path).unwrap_err();
        assert!(format!("{err:#}").contains("end_period_ts"));
    }
}
