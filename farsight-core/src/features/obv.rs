//! On-Balance Volume (OBV).
//!
//! Cumulative volume: add volume on up-closes, subtract on down-closes,
//! unchanged on flat closes. Starts at 0 on the first bar.
//! Lookback: 0 — the raw magnitude depends on series start, which is fine
//! because the residual model scales features per training window.

use super::indicator::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Obv {
    name: String,
}

impl Obv {
    pub fn new() -> Self {
        Self {
            name: "obv".to_string(),
        }
    }
}

impl Default for Obv {
    fn default() -> Self {
        Self::new()
    }
}

impl Indicator for Obv {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        0
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let mut result = vec![f64::NAN; n];

        if n == 0 {
            return result;
        }

        let mut obv = 0.0;
        result[0] = obv;

        for i in 1..n {
            let change = bars[i].close - bars[i - 1].close;
            if change > 0.0 {
                obv += bars[i].volume as f64;
            } else if change < 0.0 {
                obv -= bars[i].volume as f64;
            }
            result[i] = obv;
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{assert_approx, make_bars};

    #[test]
    fn obv_accumulates_signed_volume() {
        // make_bars assigns volume 1000 to every bar
        let bars = make_bars(&[100.0, 101.0, 100.5, 100.5, 102.0]);
        let result = Obv::new().compute(&bars);
        assert_approx(result[0], 0.0, 1e-10);
        assert_approx(result[1], 1000.0, 1e-10); // up
        assert_approx(result[2], 0.0, 1e-10); // down
        assert_approx(result[3], 0.0, 1e-10); // flat
        assert_approx(result[4], 1000.0, 1e-10); // up
    }
}
