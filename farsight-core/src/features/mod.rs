//! Feature engine — fixed-schema technical indicators plus market context.
//!
//! `build_features` is a pure transform: identical inputs always produce an
//! identical FeatureFrame. Warmup rows (where any indicator still lacks full
//! history) are dropped, never zero-filled, so neither training nor inference
//! ever sees fabricated values.

pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod indicator;
pub mod macd;
pub mod obv;
pub mod returns;
pub mod roc;
pub mod rsi;
pub mod sma;

pub use atr::Atr;
pub use bollinger::BollingerWidth;
pub use ema::Ema;
pub use indicator::Indicator;
pub use macd::Macd;
pub use obv::Obv;
pub use returns::{RealizedVol, Returns};
pub use roc::Roc;
pub use rsi::Rsi;
pub use sma::Sma;

use crate::data::context::MarketContext;
use crate::domain::PriceSeries;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from feature construction.
#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("insufficient history: {rows} rows, need at least {min_rows} for full indicator warmup")]
    InsufficientHistory { rows: usize, min_rows: usize },

    #[error("non-finite value in column '{column}' at row {row} after warmup")]
    NonFinite { column: String, row: usize },
}

/// Indicator parameter set defining the feature schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub sma_windows: Vec<usize>,
    pub ema_windows: Vec<usize>,
    pub rsi_period: usize,
    /// (fast, slow, signal)
    pub macd: (usize, usize, usize),
    /// (period, stddev multiplier)
    pub bollinger: (usize, f64),
    pub atr_period: usize,
    pub roc_period: usize,
    pub return_periods: Vec<usize>,
    pub volatility_period: usize,
}

impl Default for FeatureSpec {
    fn default() -> Self {
        Self {
            sma_windows: vec![5, 20, 50, 200],
            ema_windows: vec![5, 20, 50, 200],
            rsi_period: 14,
            macd: (12, 26, 9),
            bollinger: (20, 2.0),
            atr_period: 14,
            roc_period: 10,
            return_periods: vec![1, 5, 20],
            volatility_period: 20,
        }
    }
}

impl FeatureSpec {
    /// Instantiate the indicator set in schema order.
    fn indicators(&self) -> Vec<Box<dyn Indicator>> {
        let mut out: Vec<Box<dyn Indicator>> = Vec::new();
        for &w in &self.sma_windows {
            out.push(Box::new(Sma::new(w)));
        }
        for &w in &self.ema_windows {
            out.push(Box::new(Ema::new(w)));
        }
        out.push(Box::new(Rsi::new(self.rsi_period)));
        let (fast, slow, signal) = self.macd;
        out.push(Box::new(Macd::line(fast, slow, signal)));
        out.push(Box::new(Macd::signal(fast, slow, signal)));
        out.push(Box::new(Macd::histogram(fast, slow, signal)));
        let (bb_period, bb_mult) = self.bollinger;
        out.push(Box::new(BollingerWidth::new(bb_period, bb_mult)));
        out.push(Box::new(Atr::new(self.atr_period)));
        out.push(Box::new(Obv::new()));
        out.push(Box::new(Roc::new(self.roc_period)));
        for &p in &self.return_periods {
            out.push(Box::new(Returns::new(p)));
        }
        out.push(Box::new(RealizedVol::new(self.volatility_period)));
        out
    }

    /// Column names for this schema, with or without context columns.
    pub fn column_names(&self, with_context: bool) -> Vec<String> {
        let mut names: Vec<String> = self
            .indicators()
            .iter()
            .map(|i| i.name().to_string())
            .collect();
        if with_context {
            names.push("index_return_1d".to_string());
            names.push("vix_level".to_string());
            names.push("rate_level".to_string());
        }
        names
    }

    /// Fingerprint of the ordered column name list.
    ///
    /// Residual-model artifacts are tagged with this; a mismatch between an
    /// artifact and the live schema surfaces as ModelNotReady.
    pub fn fingerprint(&self, with_context: bool) -> String {
        let joined = self.column_names(with_context).join(",");
        blake3::hash(joined.as_bytes()).to_hex().to_string()
    }
}

/// Row-per-date feature matrix, aligned to the tail of the price series
/// that has full indicator history.
#[derive(Debug, Clone)]
pub struct FeatureFrame {
    pub dates: Vec<NaiveDate>,
    pub columns: Vec<String>,
    /// `rows.len() == dates.len()`; each row has `columns.len()` entries.
    pub rows: Vec<Vec<f64>>,
    /// Closes aligned 1:1 with `dates`, kept for residual targets.
    pub closes: Vec<f64>,
    schema_fingerprint: String,
}

impl FeatureFrame {
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn schema_fingerprint(&self) -> &str {
        &self.schema_fingerprint
    }

    /// Index of a named column.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Assemble a frame from precomputed parts. Internal: model unit tests
    /// need frames that bypass indicator warmup.
    pub(crate) fn from_parts(
        dates: Vec<NaiveDate>,
        columns: Vec<String>,
        rows: Vec<Vec<f64>>,
        closes: Vec<f64>,
        schema_fingerprint: String,
    ) -> Self {
        Self {
            dates,
            columns,
            rows,
            closes,
            schema_fingerprint,
        }
    }
}

/// Build the feature frame for a price series.
///
/// Every column is computed over the full series, then the longest warmup
/// prefix is dropped so all remaining rows are fully populated. Context
/// columns, when present, are forward-filled levels — context only, never
/// the tradable series.
pub fn build_features(
    series: &PriceSeries,
    context: Option<&MarketContext>,
    spec: &FeatureSpec,
) -> Result<FeatureFrame, FeatureError> {
    let bars = series.bars();
    let n = bars.len();
    let dates = series.dates();

    let indicators = spec.indicators();
    let mut columns: Vec<(String, Vec<f64>)> = indicators
        .iter()
        .map(|ind| (ind.name().to_string(), ind.compute(bars)))
        .collect();

    if let Some(ctx) = context {
        let index_levels = ctx.index.levels_on(&dates);
        let mut index_returns = vec![f64::NAN; n];
        for i in 1..n {
            if index_levels[i - 1].is_finite() && index_levels[i - 1] != 0.0 {
                index_returns[i] = index_levels[i] / index_levels[i - 1] - 1.0;
            }
        }
        columns.push(("index_return_1d".to_string(), index_returns));
        columns.push(("vix_level".to_string(), ctx.volatility.levels_on(&dates)));
        columns.push(("rate_level".to_string(), ctx.rate.levels_on(&dates)));
    }

    // First row where every column is finite
    let start = (0..n)
        .find(|&i| columns.iter().all(|(_, col)| col[i].is_finite()))
        .ok_or_else(|| {
            let min_rows = indicators.iter().map(|ind| ind.lookback()).max().unwrap_or(0) + 1;
            FeatureError::InsufficientHistory { rows: n, min_rows }
        })?;

    // Everything after the warmup boundary must be finite
    for (name, col) in &columns {
        if let Some(bad) = (start..n).find(|&i| !col[i].is_finite()) {
            return Err(FeatureError::NonFinite {
                column: name.clone(),
                row: bad,
            });
        }
    }

    let column_names: Vec<String> = columns.iter().map(|(name, _)| name.clone()).collect();
    let rows: Vec<Vec<f64>> = (start..n)
        .map(|i| columns.iter().map(|(_, col)| col[i]).collect())
        .collect();

    Ok(FeatureFrame {
        dates: dates[start..].to_vec(),
        closes: series.closes()[start..].to_vec(),
        schema_fingerprint: spec.fingerprint(context.is_some()),
        columns: column_names,
        rows,
    })
}

/// Create synthetic bars from close prices for testing.
///
/// Generates plausible OHLV: open = prev_close (or close for first bar),
/// high = max(open,close) + 1.0, low = min(open,close) - 1.0, volume = 1000.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<crate::domain::Bar> {
    use crate::domain::Bar;
    let base_date = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            let high = open.max(close) + 1.0;
            let low = open.min(close) - 1.0;
            Bar {
                date: base_date + chrono::Duration::days(i as i64),
                open,
                high,
                low,
                close,
                volume: 1000,
            }
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::context::ContextSeries;
    use crate::domain::PriceSeries;

    fn synthetic_series(n: usize) -> PriceSeries {
        let closes: Vec<f64> = (0..n)
            .map(|i| 100.0 + (i as f64 * 0.1).sin() * 5.0 + i as f64 * 0.05)
            .collect();
        PriceSeries::new("TEST", make_bars(&closes)).unwrap()
    }

    fn small_spec() -> FeatureSpec {
        // Compact windows so tests run on short series
        FeatureSpec {
            sma_windows: vec![3, 5],
            ema_windows: vec![3, 5],
            rsi_period: 5,
            macd: (3, 6, 3),
            bollinger: (5, 2.0),
            atr_period: 5,
            roc_period: 3,
            return_periods: vec![1, 3],
            volatility_period: 5,
        }
    }

    #[test]
    fn warmup_rows_are_dropped() {
        let series = synthetic_series(300);
        let frame = build_features(&series, None, &FeatureSpec::default()).unwrap();
        // SMA-200 dominates the warmup: 199 leading rows lack full history
        assert_eq!(frame.n_rows(), 300 - 199);
        assert!(frame.rows.iter().flatten().all(|v| v.is_finite()));
    }

    #[test]
    fn too_short_series_is_rejected() {
        let series = synthetic_series(50);
        let err = build_features(&series, None, &FeatureSpec::default()).unwrap_err();
        assert!(matches!(err, FeatureError::InsufficientHistory { .. }));
    }

    #[test]
    fn deterministic_output() {
        let series = synthetic_series(250);
        let a = build_features(&series, None, &FeatureSpec::default()).unwrap();
        let b = build_features(&series, None, &FeatureSpec::default()).unwrap();
        assert_eq!(a.rows, b.rows);
        assert_eq!(a.dates, b.dates);
    }

    #[test]
    fn no_lookahead_truncation_property() {
        // Rows computed from a truncated series must equal the corresponding
        // rows from the full series: no feature may read future data.
        let series = synthetic_series(120);
        let spec = small_spec();
        let full = build_features(&series, None, &spec).unwrap();

        let truncated_bars = series.bars()[..100].to_vec();
        let truncated = PriceSeries::new("TEST", truncated_bars).unwrap();
        let partial = build_features(&truncated, None, &spec).unwrap();

        for (i, row) in partial.rows.iter().enumerate() {
            for (j, v) in row.iter().enumerate() {
                assert!(
                    (v - full.rows[i][j]).abs() < 1e-12,
                    "lookahead detected in column '{}' at row {i}",
                    full.columns[j]
                );
            }
        }
    }

    #[test]
    fn context_columns_present_and_filled() {
        let series = synthetic_series(60);
        let dates = series.dates();
        let flat = |level: f64| ContextSeries {
            points: dates.iter().map(|&d| (d, level)).collect(),
        };
        let ctx = MarketContext {
            index: flat(4000.0),
            volatility: flat(18.0),
            rate: flat(4.2),
        };

        let spec = small_spec();
        let frame = build_features(&series, Some(&ctx), &spec).unwrap();
        let vix_col = frame.column_index("vix_level").unwrap();
        assert!(frame.rows.iter().all(|r| (r[vix_col] - 18.0).abs() < 1e-12));
    }

    #[test]
    fn fingerprint_distinguishes_schemas() {
        let spec = FeatureSpec::default();
        assert_ne!(spec.fingerprint(true), spec.fingerprint(false));

        let other = FeatureSpec {
            rsi_period: 21,
            ..FeatureSpec::default()
        };
        assert_ne!(spec.fingerprint(false), other.fingerprint(false));
    }

    #[test]
    fn frame_output_never_longer_than_input() {
        let series = synthetic_series(260);
        let frame = build_features(&series, None, &FeatureSpec::default()).unwrap();
        assert!(frame.n_rows() <= series.len());
    }
}
