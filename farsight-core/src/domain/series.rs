//! PriceSeries — validated, immutable daily price history.
//!
//! Dates are strictly increasing; trading-calendar gaps (weekends, holidays)
//! are valid and are not treated as missing data.

use super::bar::Bar;
use thiserror::Error;

/// Validation errors for price series construction.
#[derive(Debug, Error)]
pub enum SeriesError {
    #[error("empty series")]
    Empty,

    #[error("dates not strictly increasing at index {index}")]
    OutOfOrder { index: usize },

    #[error("non-finite close at index {index}")]
    NonFiniteClose { index: usize },
}

/// Ordered daily OHLCV history for one ticker.
///
/// Immutable once constructed; the forecasting pipeline owns one instance
/// per run and discards it after the forecast is produced.
#[derive(Debug, Clone)]
pub struct PriceSeries {
    ticker: String,
    bars: Vec<Bar>,
}

impl PriceSeries {
    /// Validate and wrap a bar sequence.
    ///
    /// Rejects empty input, duplicate or out-of-order dates, and non-finite
    /// closes. Calendar gaps between consecutive dates are accepted.
    pub fn new(ticker: impl Into<String>, bars: Vec<Bar>) -> Result<Self, SeriesError> {
        if bars.is_empty() {
            return Err(SeriesError::Empty);
        }
        for (i, bar) in bars.iter().enumerate() {
            if !bar.close.is_finite() {
                return Err(SeriesError::NonFiniteClose { index: i });
            }
            if i > 0 && bars[i - 1].date >= bar.date {
                return Err(SeriesError::OutOfOrder { index: i });
            }
        }
        Ok(Self {
            ticker: ticker.into(),
            bars,
        })
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Closing prices in date order.
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Dates in order.
    pub fn dates(&self) -> Vec<chrono::NaiveDate> {
        self.bars.iter().map(|b| b.date).collect()
    }

    /// Last observed close.
    pub fn last_close(&self) -> f64 {
        self.bars.last().map(|b| b.close).unwrap_or(f64::NAN)
    }

    /// Last observed date.
    pub fn last_date(&self) -> chrono::NaiveDate {
        self.bars
            .last()
            .map(|b| b.date)
            .expect("PriceSeries is never empty")
    }

    /// One-day log returns (length = len() - 1).
    pub fn log_returns(&self) -> Vec<f64> {
        self.bars
            .windows(2)
            .map(|w| (w[1].close / w[0].close).ln())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bar(date: &str, close: f64) -> Bar {
        Bar {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            open: close - 1.0,
            high: close + 1.0,
            low: close - 2.0,
            close,
            volume: 1000,
        }
    }

    #[test]
    fn accepts_calendar_gaps() {
        // Friday then Monday — a weekend gap is not an error
        let series = PriceSeries::new(
            "SPY",
            vec![bar("2024-01-05", 100.0), bar("2024-01-08", 101.0)],
        )
        .unwrap();
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn rejects_empty() {
        assert!(matches!(
            PriceSeries::new("SPY", vec![]),
            Err(SeriesError::Empty)
        ));
    }

    #[test]
    fn rejects_duplicate_dates() {
        let result = PriceSeries::new(
            "SPY",
            vec![bar("2024-01-05", 100.0), bar("2024-01-05", 101.0)],
        );
        assert!(matches!(result, Err(SeriesError::OutOfOrder { index: 1 })));
    }

    #[test]
    fn rejects_out_of_order_dates() {
        let result = PriceSeries::new(
            "SPY",
            vec![bar("2024-01-08", 100.0), bar("2024-01-05", 101.0)],
        );
        assert!(matches!(result, Err(SeriesError::OutOfOrder { .. })));
    }

    #[test]
    fn rejects_non_finite_close() {
        let mut b = bar("2024-01-05", 100.0);
        b.close = f64::INFINITY;
        assert!(matches!(
            PriceSeries::new("SPY", vec![b]),
            Err(SeriesError::NonFiniteClose { index: 0 })
        ));
    }

    #[test]
    fn log_returns_length() {
        let series = PriceSeries::new(
            "SPY",
            vec![
                bar("2024-01-02", 100.0),
                bar("2024-01-03", 102.0),
                bar("2024-01-04", 101.0),
            ],
        )
        .unwrap();
        let returns = series.log_returns();
        assert_eq!(returns.len(), 2);
        assert!((returns[0] - (102.0_f64 / 100.0).ln()).abs() < 1e-12);
    }
}
