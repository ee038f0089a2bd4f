//! Exponential Moving Average (EMA).
//!
//! Recursive: EMA[t] = alpha * close[t] + (1 - alpha) * EMA[t-1],
//! alpha = 2 / (period + 1). Seed: SMA of the first `period` closes.
//! Lookback: period - 1.

use super::indicator::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    name: String,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "EMA period must be >= 1");
        Self {
            period,
            name: format!("ema_{period}"),
        }
    }
}

impl Indicator for Ema {
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

        let alpha = 2.0 / (self.period as f64 + 1.0);

        let seed: f64 =
            bars.iter().take(self.period).map(|b| b.close).sum::<f64>() / self.period as f64;
        result[self.period - 1] = seed;

        let mut prev = seed;
        for i in self.period..n {
            let ema = alpha * bars[i].close + (1.0 - alpha) * prev;
            result[i] = ema;
            prev = ema;
        }

        result
    }
}

/// EMA over a raw value series (used by MACD for its signal line).
pub(crate) fn ema_series(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];

    // Seed at the first window of `period` consecutive finite values
    let Some(start) = values
        .windows(period)
        .position(|w| w.iter().all(|v| v.is_finite()))
    else {
        return result;
    };

    let alpha = 2.0 / (period as f64 + 1.0);
    let seed: f64 = values[start..start + period].iter().sum::<f64>() / period as f64;
    let seed_idx = start + period - 1;
    result[seed_idx] = seed;

    let mut prev = seed;
    for i in (seed_idx + 1)..n {
        if !values[i].is_finite() {
            return result;
        }
        let ema = alpha * values[i] + (1.0 - alpha) * prev;
        result[i] = ema;
        prev = ema;
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{assert_approx, make_bars};

    #[test]
    fn ema_seed_is_sma() {
        let bars = make_bars(&[1.0, 2.0, 3.0, 4.0]);
        let result = Ema::new(3).compute(&bars);
        assert_approx(result[2], 2.0, 1e-10);
        // alpha = 0.5: 0.5*4 + 0.5*2 = 3
        assert_approx(result[3], 3.0, 1e-10);
    }

    #[test]
    fn ema_tracks_constant_series() {
        let bars = make_bars(&[5.0; 10]);
        let result = Ema::new(4).compute(&bars);
        for v in result.iter().skip(3) {
            assert_approx(*v, 5.0, 1e-10);
        }
    }

    #[test]
    fn ema_series_skips_leading_nans() {
        let values = [f64::NAN, f64::NAN, 1.0, 2.0, 3.0, 4.0];
        let result = ema_series(&values, 3);
        assert!(result[3].is_nan());
        assert_approx(result[4], 2.0, 1e-10);
    }
}
