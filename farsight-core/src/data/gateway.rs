//! Cache-first history loading — the gateway operation the pipeline calls.
//!
//! Tries the price cache first (when fresh), falls back to the provider, and
//! writes provider results back through the cache. Provider retry policy
//! lives inside the provider; this layer only decides cache vs. network.

use super::cache::PriceCache;
use super::provider::{DataError, MarketDataProvider};
use crate::domain::{PriceSeries, SeriesError};
use chrono::{Datelike, NaiveDate};

/// How many calendar years of history a forecast run requests.
pub const HISTORY_YEARS: i32 = 10;

impl From<SeriesError> for DataError {
    fn from(e: SeriesError) -> Self {
        DataError::ValidationError(e.to_string())
    }
}

/// Load the full price history for a ticker, cache-first.
///
/// A cache write failure after a successful fetch is not fatal — the fetched
/// data is still returned and the failure surfaces on the next run.
pub fn load_history(
    ticker: &str,
    cache: &PriceCache,
    provider: &dyn MarketDataProvider,
    today: NaiveDate,
) -> Result<PriceSeries, DataError> {
    let now = chrono::Local::now().naive_local();
    if cache.is_fresh(ticker, now) {
        if let Ok(bars) = cache.load(ticker) {
            return Ok(PriceSeries::new(ticker, bars)?);
        }
    }

    let start = today
        .with_year(today.year() - HISTORY_YEARS)
        .unwrap_or(today);
    let bars = provider.fetch(ticker, start, today)?;

    if let Err(e) = cache.write(ticker, &bars) {
        eprintln!("WARNING: cache write failed for {ticker}: {e}");
    }

    Ok(PriceSeries::new(ticker, bars)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Bar;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_cache_dir() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = std::env::temp_dir().join(format!(
            "farsight_gateway_{}_{id}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn make_bars(n: usize) -> Vec<Bar> {
        let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        (0..n)
            .map(|i| Bar {
                date: base + chrono::Duration::days(i as i64),
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.0 + i as f64 * 0.1,
                volume: 1000,
            })
            .collect()
    }

    struct CountingProvider {
        calls: AtomicUsize,
        result: Vec<Bar>,
    }

    impl MarketDataProvider for CountingProvider {
        fn name(&self) -> &str {
            "counting"
        }

        fn fetch(
            &self,
            ticker: &str,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<Vec<Bar>, DataError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            if self.result.is_empty() {
                Err(DataError::NoData {
                    ticker: ticker.to_string(),
                })
            } else {
                Ok(self.result.clone())
            }
        }
    }

    #[test]
    fn fetches_and_caches_on_miss() {
        let dir = temp_cache_dir();
        let cache = PriceCache::new(&dir);
        let provider = CountingProvider {
            calls: AtomicUsize::new(0),
            result: make_bars(5),
        };
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();

        let series = load_history("SPY", &cache, &provider, today).unwrap();
        assert_eq!(series.len(), 5);
        assert_eq!(provider.calls.load(Ordering::Relaxed), 1);

        // Second call is served from the now-fresh cache
        let series2 = load_history("SPY", &cache, &provider, today).unwrap();
        assert_eq!(series2.len(), 5);
        assert_eq!(provider.calls.load(Ordering::Relaxed), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn provider_failure_propagates() {
        let dir = temp_cache_dir();
        let cache = PriceCache::new(&dir);
        let provider = CountingProvider {
            calls: AtomicUsize::new(0),
            result: vec![],
        };
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();

        let err = load_history("SPY", &cache, &provider, today).unwrap_err();
        assert!(matches!(err, DataError::NoData { .. }));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
