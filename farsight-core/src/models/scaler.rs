//! Min-max feature scaling.
//!
//! Fit on the training split only; the same parameters scale validation and
//! inference inputs so no statistics leak across the time boundary.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

const DEGENERATE_RANGE: f64 = 1e-12;

/// Per-column min-max scaler mapping observed ranges to [0, 1].
///
/// A degenerate column (max == min) scales to 0.5 and inverts to its
/// constant value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinMaxScaler {
    mins: Vec<f64>,
    maxs: Vec<f64>,
}

impl MinMaxScaler {
    /// Fit column-wise bounds on a (rows × cols) matrix.
    pub fn fit(data: ArrayView2<f64>) -> Self {
        let cols = data.ncols();
        let mut mins = vec![f64::INFINITY; cols];
        let mut maxs = vec![f64::NEG_INFINITY; cols];

        for row in data.rows() {
            for (j, &v) in row.iter().enumerate() {
                mins[j] = mins[j].min(v);
                maxs[j] = maxs[j].max(v);
            }
        }

        Self { mins, maxs }
    }

    /// Fit on a single series (one-column matrix semantics).
    pub fn fit_series(values: &[f64]) -> Self {
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Self {
            mins: vec![min],
            maxs: vec![max],
        }
    }

    pub fn n_cols(&self) -> usize {
        self.mins.len()
    }

    /// Scale a single value in column `col`.
    pub fn scale_value(&self, col: usize, v: f64) -> f64 {
        let range = self.maxs[col] - self.mins[col];
        if range.abs() < DEGENERATE_RANGE {
            0.5
        } else {
            (v - self.mins[col]) / range
        }
    }

    /// Invert a scaled value in column `col`.
    pub fn unscale_value(&self, col: usize, v: f64) -> f64 {
        let range = self.maxs[col] - self.mins[col];
        if range.abs() < DEGENERATE_RANGE {
            self.mins[col]
        } else {
            v * range + self.mins[col]
        }
    }

    /// Range of column `col` (0 for degenerate columns).
    pub fn range(&self, col: usize) -> f64 {
        let range = self.maxs[col] - self.mins[col];
        if range.abs() < DEGENERATE_RANGE {
            0.0
        } else {
            range
        }
    }

    /// Scale a full matrix column-wise.
    pub fn transform(&self, data: ArrayView2<f64>) -> Array2<f64> {
        let mut out = data.to_owned();
        for mut row in out.rows_mut() {
            for (j, v) in row.iter_mut().enumerate() {
                *v = self.scale_value(j, *v);
            }
        }
        out
    }

    /// Scale a single row.
    pub fn transform_row(&self, row: ArrayView1<f64>) -> Array1<f64> {
        Array1::from_iter(row.iter().enumerate().map(|(j, &v)| self.scale_value(j, v)))
    }
}
