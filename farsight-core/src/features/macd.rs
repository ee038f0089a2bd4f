//! Moving Average Convergence Divergence (MACD).
//!
//! MACD line = EMA(fast) - EMA(slow); signal = EMA(MACD, signal_period);
//! histogram = MACD - signal. The three outputs are separate named
//! Indicator instances so the single-series trait stays unchanged.
//! Lookback: slow + signal - 2 for the signal/histogram outputs.

use super::ema::{ema_series, Ema};
use super::indicator::Indicator;
use crate::domain::Bar;

/// Which MACD output series to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacdOutput {
    Line,
    Signal,
    Histogram,
}

#[derive(Debug, Clone)]
pub struct Macd {
    fast: usize,
    slow: usize,
    signal: usize,
    output: MacdOutput,
    name: String,
}

impl Macd {
    pub fn line(fast: usize, slow: usize, signal: usize) -> Self {
        Self::new(fast, slow, signal, MacdOutput::Line, "macd")
    }

    pub fn signal(fast: usize, slow: usize, signal: usize) -> Self {
        Self::new(fast, slow, signal, MacdOutput::Signal, "macd_signal")
    }

    pub fn histogram(fast: usize, slow: usize, signal: usize) -> Self {
        Self::new(fast, slow, signal, MacdOutput::Histogram, "macd_hist")
    }

    fn new(fast: usize, slow: usize, signal: usize, output: MacdOutput, name: &str) -> Self {
        assert!(fast >= 1 && slow > fast, "MACD requires slow > fast >= 1");
        assert!(signal >= 1, "MACD signal period must be >= 1");
        Self {
            fast,
            slow,
            signal,
            output,
            name: name.to_string(),
        }
    }

    fn macd_line(&self, bars: &[Bar]) -> Vec<f64> {
        let fast = Ema::new(self.fast).compute(bars);
        let slow = Ema::new(self.slow).compute(bars);
        fast.iter().zip(&slow).map(|(f, s)| f - s).collect()
    }
}

impl Indicator for Macd {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        match self.output {
            MacdOutput::Line => self.slow - 1,
            MacdOutput::Signal | MacdOutput::Histogram => self.slow + self.signal - 2,
        }
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let line = self.macd_line(bars);
        match self.output {
            MacdOutput::Line => line,
            MacdOutput::Signal => ema_series(&line, self.signal),
            MacdOutput::Histogram => {
                let signal = ema_series(&line, self.signal);
                line.iter().zip(&signal).map(|(l, s)| l - s).collect()
            }
        }
    }
}
