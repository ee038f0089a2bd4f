//! Bollinger band width.
//!
//! Width = (upper - lower) / middle, where middle = SMA(close, period) and
//! upper/lower = middle ± mult * stddev(close, period). Population stddev
//! (divide by N). The width is the single scalar the feature schema carries;
//! the individual bands are not separate features.
//! Lookback: period - 1.

use super::indicator::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct BollingerWidth {
    period: usize,
    multiplier: f64,
    name: String,
}

impl BollingerWidth {
    pub fn new(period: usize, multiplier: f64) -> Self {
        assert!(period >= 1, "Bollinger period must be >= 1");
        Self {
            period,
            multiplier,
            name: format!("bb_width_{period}"),
        }
    }
}

impl Indicator for BollingerWidth {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let mut result = vec![f64::NAN; n];

        if n < self.period {
            return result;
        }

        for i in (self.period - 1)..n {
            let window = &bars[i + 1 - self.period..=i];
            let mean: f64 = window.iter().map(|b| b.close).sum::<f64>() / self.period as f64;
            let var: f64 = window
                .iter()
                .map(|b| (b.close - mean).powi(2))
                .sum::<f64>()
                / self.period as f64;
            let sd = var.sqrt();

            if mean != 0.0 {
                result[i] = 2.0 * self.multiplier * sd / mean;
            }
        }

        result
    }
}
