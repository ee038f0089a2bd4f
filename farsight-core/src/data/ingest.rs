//! CSV import of daily OHLCV history.
//!
//! Offline fallback for when the live provider is unavailable: rows are
//! parsed, validated, sorted, and written through the price cache so the
//! rest of the pipeline is source-agnostic.
//!
//! Expected header: `date,open,high,low,close,volume` with ISO dates.

use super::cache::PriceCache;
use super::provider::DataError;
use crate::domain::Bar;
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct CsvRow {
    date: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: u64,
}

/// Parse a CSV file into bars, ascending by date.
pub fn read_csv(path: &Path) -> Result<Vec<Bar>, DataError> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| DataError::Other(format!("failed to open {}: {e}", path.display())))?;

    let mut bars = Vec::new();
    for (i, row) in reader.deserialize::<CsvRow>().enumerate() {
        let row = row.map_err(|e| DataError::ValidationError(format!("row {}: {e}", i + 2)))?;
        let bar = Bar {
            date: row.date,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        };
        if !bar.is_sane() {
            return Err(DataError::ValidationError(format!(
                "row {}: implausible OHLC values for {}",
                i + 2,
                bar.date
            )));
        }
        bars.push(bar);
    }

    if bars.is_empty() {
        return Err(DataError::ValidationError("no data rows in CSV".into()));
    }

    bars.sort_by_key(|b| b.date);
    bars.dedup_by_key(|b| b.date);
    Ok(bars)
}

/// Import a CSV file into the price cache under the given ticker.
///
/// Returns the number of bars imported.
pub fn import_csv(path: &Path, ticker: &str, cache: &PriceCache) -> Result<usize, DataError> {
    let bars = read_csv(path)?;
    cache.write(ticker, &bars)?;
    Ok(bars.len())
}
