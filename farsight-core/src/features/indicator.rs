//! Indicator trait.
//!
//! Indicators are pure functions: bar history in, numeric series out, same
//! length as the input. The first `lookback()` values are `f64::NAN`
//! (warmup); the feature frame builder drops warmup rows rather than
//! zero-filling them.
//!
//! # Look-ahead contamination guard
//! No indicator value at bar t may depend on price data from bar t+1 or
//! later. Every indicator must pass the truncated-vs-full series test in the
//! feature module.

use crate::domain::Bar;

pub trait Indicator: Send + Sync {
    /// Column name in the feature schema (e.g., "sma_20", "rsi_14").
    fn name(&self) -> &str;

    /// Number of leading bars without valid output.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the entire bar series.
    ///
    /// Returns a `Vec<f64>` of the same length as `bars`, with the first
    /// `lookback()` values NaN.
    fn compute(&self, bars: &[Bar]) -> Vec<f64>;
}
