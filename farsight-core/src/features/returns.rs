//! Simple returns over a lookback and rolling realized volatility.

use super::indicator::Indicator;
use crate::domain::Bar;

/// k-day simple return: close[t] / close[t-k] - 1.
#[derive(Debug, Clone)]
pub struct Returns {
    period: usize,
    name: String,
}

impl Returns {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "return period must be >= 1");
        Self {
            period,
            name: format!("return_{period}d"),
        }
    }
}

impl Indicator for Returns {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let mut result = vec![f64::NAN; n];

        for i in self.period..n {
            let prev = bars[i - self.period].close;
            if prev != 0.0 {
                result[i] = bars[i].close / prev - 1.0;
            }
        }

        result
    }
}

/// Annualized rolling volatility of one-day returns.
///
/// Sample stddev of the trailing `period` one-day returns, scaled by
/// sqrt(252). Lookback: period (needs period returns, i.e. period+1 closes
/// — the first valid output is at index period).
#[derive(Debug, Clone)]
pub struct RealizedVol {
    period: usize,
    name: String,
}

impl RealizedVol {
    pub fn new(period: usize) -> Self {
        assert!(period >= 2, "volatility period must be >= 2");
        Self {
            period,
            name: format!("volatility_{period}d"),
        }
    }
}

impl Indicator for RealizedVol {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let mut result = vec![f64::NAN; n];

        if n < self.period + 1 {
            return result;
        }

        let returns: Vec<f64> = bars
            .windows(2)
            .map(|w| {
                if w[0].close != 0.0 {
                    w[1].close / w[0].close - 1.0
                } else {
                    f64::NAN
                }
            })
            .collect();

        for i in self.period..n {
            // returns[i-1] is the return ending at bar i
            let window = &returns[i - self.period..i];
            let mean = window.iter().sum::<f64>() / self.period as f64;
            let var = window.iter().map(|r| (r - mean).powi(2)).sum::<f64>()
                / (self.period as f64 - 1.0);
            result[i] = var.sqrt() * (252.0_f64).sqrt();
        }

        result
    }
}
