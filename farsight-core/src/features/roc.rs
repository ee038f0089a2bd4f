//! Rate of Change (ROC).
//!
//! Percentage price change over N bars.
//! ROC[t] = (close[t] - close[t-period]) / close[t-period] * 100
//! Lookback: period.

use super::indicator::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Roc {
    period: usize,
    name: String,
}

impl Roc {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ROC period must be >= 1");
        Self {
            period,
            name: format!("roc_{period}"),
        }
    }
}

impl Indicator for Roc {
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
                result[i] = (bars[i].close - prev) / prev * 100.0;
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{assert_approx, make_bars};

    #[test]
    fn roc_basic() {
        let bars = make_bars(&[100.0, 102.0, 105.0, 110.0]);
        let result = Roc::new(2).compute(&bars);
        assert!(result[1].is_nan());
        assert_approx(result[2], 5.0, 1e-10);
        assert_approx(result[3], (110.0 - 102.0) / 102.0 * 100.0, 1e-10);
    }
}
