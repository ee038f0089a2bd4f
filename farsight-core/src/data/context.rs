//! Auxiliary market-context series: broad index, volatility index, and a
//! reference interest rate.
//!
//! Context series are close-only and may trade on a different calendar than
//! the target ticker, so they are forward-filled onto the ticker's date axis.
//! Forward-fill is acceptable here because these are context inputs, never
//! the tradable series itself.

use super::provider::{DataError, MarketDataProvider};
use chrono::NaiveDate;

/// Ticker symbols for the three context series.
pub const INDEX_TICKER: &str = "^GSPC";
pub const VOLATILITY_TICKER: &str = "^VIX";
pub const RATE_TICKER: &str = "^TNX";

/// A close-only series for one context instrument, ascending by date.
#[derive(Debug, Clone)]
pub struct ContextSeries {
    pub points: Vec<(NaiveDate, f64)>,
}

impl ContextSeries {
    /// Forward-fill levels onto a target date axis.
    ///
    /// Dates before the first context observation get NaN (no backfill —
    /// that would leak nothing, but fabricating a level is worse than an
    /// explicit warmup gap).
    pub fn levels_on(&self, dates: &[NaiveDate]) -> Vec<f64> {
        let mut out = Vec::with_capacity(dates.len());
        let mut idx = 0usize;
        let mut last = f64::NAN;
        for &date in dates {
            while idx < self.points.len() && self.points[idx].0 <= date {
                last = self.points[idx].1;
                idx += 1;
            }
            out.push(last);
        }
        out
    }
}

/// The full market context used by the feature engine.
#[derive(Debug, Clone)]
pub struct MarketContext {
    pub index: ContextSeries,
    pub volatility: ContextSeries,
    pub rate: ContextSeries,
}

impl MarketContext {
    /// Fetch all three context series over a window.
    ///
    /// Returns `None` when any series cannot be fetched: the pipeline then
    /// runs on the indicator-only feature schema rather than fabricating
    /// context levels. Individual failures are reported via the returned
    /// error list so callers can surface them.
    pub fn fetch(
        provider: &dyn MarketDataProvider,
        start: NaiveDate,
        end: NaiveDate,
    ) -> (Option<MarketContext>, Vec<DataError>) {
        let mut errors = Vec::new();
        let mut fetch_one = |ticker: &str| -> Option<ContextSeries> {
            match provider.fetch(ticker, start, end) {
                Ok(bars) => Some(ContextSeries {
                    points: bars.into_iter().map(|b| (b.date, b.close)).collect(),
                }),
                Err(e) => {
                    errors.push(e);
                    None
                }
            }
        };

        let index = fetch_one(INDEX_TICKER);
        let volatility = fetch_one(VOLATILITY_TICKER);
        let rate = fetch_one(RATE_TICKER);

        match (index, volatility, rate) {
            (Some(index), Some(volatility), Some(rate)) => (
                Some(MarketContext {
                    index,
                    volatility,
                    rate,
                }),
                errors,
            ),
            _ => (None, errors),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn forward_fill_over_gaps() {
        let series = ContextSeries {
            points: vec![(d("2024-01-02"), 10.0), (d("2024-01-05"), 12.0)],
        };
        let levels = series.levels_on(&[
            d("2024-01-02"),
            d("2024-01-03"),
            d("2024-01-05"),
            d("2024-01-08"),
        ]);
        assert_eq!(levels, vec![10.0, 10.0, 12.0, 12.0]);
    }

    #[test]
    fn dates_before_first_observation_are_nan() {
        let series = ContextSeries {
            points: vec![(d("2024-01-05"), 12.0)],
        };
        let levels = series.levels_on(&[d("2024-01-02"), d("2024-01-05")]);
        assert!(levels[0].is_nan());
        assert_eq!(levels[1], 12.0);
    }
}
