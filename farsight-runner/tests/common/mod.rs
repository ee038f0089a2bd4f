//! Shared test support: synthetic providers and a fast pipeline config.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use farsight_core::data::{DataError, MarketDataProvider};
use farsight_core::domain::Bar;
use farsight_core::features::FeatureSpec;
use farsight_core::models::{ResidualConfig, ScenarioConfig};
use farsight_runner::{DataConfig, PipelineConfig};
use std::path::PathBuf;

/// Deterministic weekday bars ending at `end`, newest last.
pub fn synthetic_bars(ticker: &str, n: usize, end: NaiveDate) -> Vec<Bar> {
    // Ticker-dependent phase so different symbols produce different series
    let phase = ticker.bytes().map(|b| b as u64).sum::<u64>() as f64 * 0.1;

    let mut dates = Vec::with_capacity(n);
    let mut d = end;
    while dates.len() < n {
        if !matches!(d.weekday(), Weekday::Sat | Weekday::Sun) {
            dates.push(d);
        }
        d -= Duration::days(1);
    }
    dates.reverse();

    dates
        .into_iter()
        .enumerate()
        .map(|(i, date)| {
            let t = i as f64;
            let close = 100.0 + t * 0.05 + (t * 0.21 + phase).sin() * 4.0;
            Bar {
                date,
                open: close - 0.4,
                high: close + 1.2,
                low: close - 1.3,
                close,
                volume: 1_000_000 + (i as u64 % 7) * 10_000,
            }
        })
        .collect()
}

/// Provider that serves `n` synthetic bars for any requested symbol.
pub struct SyntheticProvider {
    pub bars: usize,
}

impl MarketDataProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch(
        &self,
        ticker: &str,
        _start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>, DataError> {
        Ok(synthetic_bars(ticker, self.bars, end))
    }
}

/// Provider that fails every request, as if retries were exhausted.
pub struct UnavailableProvider;

impl MarketDataProvider for UnavailableProvider {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn fetch(
        &self,
        _ticker: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<Bar>, DataError> {
        Err(DataError::NetworkUnreachable(
            "connection timed out after retries".into(),
        ))
    }
}

/// Pipeline config with small windows and a short training budget so
/// integration tests stay fast while exercising every stage.
pub fn fast_config(cache_dir: PathBuf) -> PipelineConfig {
    PipelineConfig {
        data: DataConfig {
            cache_dir,
            ..DataConfig::default()
        },
        features: FeatureSpec {
            sma_windows: vec![5, 10],
            ema_windows: vec![5, 10],
            rsi_period: 7,
            macd: (5, 10, 4),
            bollinger: (10, 2.0),
            atr_period: 7,
            roc_period: 5,
            return_periods: vec![1, 5],
            volatility_period: 10,
        },
        residual: ResidualConfig {
            sequence_length: 15,
            hidden_size: 6,
            max_epochs: 3,
            patience: 2,
            min_train_sequences: 8,
            ..ResidualConfig::default()
        },
        scenario: ScenarioConfig {
            n_paths: 300,
            ..ScenarioConfig::default()
        },
        seed: 42,
        ..PipelineConfig::default()
    }
}
