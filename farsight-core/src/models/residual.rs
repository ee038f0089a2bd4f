//! Residual sequence model.
//!
//! A GRU consumes a fixed-length trailing window of scaled feature rows and
//! predicts the next-step residual increment (residual[t] - residual[t-1],
//! residual = actual close - trend model's retrospective prediction).
//!
//! Training is strictly forward in time: the validation fold is the final
//! slice of sequences, scalers are fit on the training fold only, and
//! sequences are visited in chronological order. Early stopping watches
//! validation MSE and restores the best weights.
//!
//! Multi-step inference is an explicit bounded fold (cap = horizon trading
//! days): each predicted increment updates the synthetic return entry of the
//! next window row, and the model's validation RMSE grows the error estimate
//! as sqrt(step).

use super::gru::{Gru, GruWeights};
use super::scaler::MinMaxScaler;
use super::ModelError;
use crate::domain::{ResidualForecast, ResidualStep};
use crate::features::FeatureFrame;
use ndarray::{s, Array2};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;

/// Residual model hyperparameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResidualConfig {
    /// Trailing window length in trading sessions.
    pub sequence_length: usize,
    /// GRU hidden state size.
    pub hidden_size: usize,
    pub max_epochs: usize,
    pub learning_rate: f64,
    pub grad_clip: f64,
    /// Early-stopping patience in epochs.
    pub patience: usize,
    /// Fraction of sequences held out as the forward-in-time validation fold.
    pub validation_fraction: f64,
    /// Minimum training sequences required to attempt a fit.
    pub min_train_sequences: usize,
}

impl Default for ResidualConfig {
    fn default() -> Self {
        Self {
            sequence_length: 60,
            hidden_size: 16,
            max_epochs: 40,
            learning_rate: 0.05,
            grad_clip: 1.0,
            patience: 5,
            validation_fraction: 0.1,
            min_train_sequences: 10,
        }
    }
}

/// Serializable artifact: weights, scalers, and the feature schema they
/// were trained against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResidualArtifact {
    pub schema_fingerprint: String,
    pub sequence_length: usize,
    pub step_rmse: f64,
    pub feature_scaler: MinMaxScaler,
    pub target_scaler: MinMaxScaler,
    pub weights: GruWeights,
}

/// Trained residual corrector.
#[derive(Debug, Clone)]
pub struct ResidualModel {
    gru: Gru,
    feature_scaler: MinMaxScaler,
    target_scaler: MinMaxScaler,
    schema_fingerprint: String,
    sequence_length: usize,
    step_rmse: f64,
}

impl ResidualModel {
    /// Train on a feature frame and aligned residual series.
    ///
    /// `residuals[i]` is the residual for `frame` row i. Fails with
    /// `NotReady` when there are too few sequences to form a training and
    /// validation fold.
    pub fn train(
        frame: &FeatureFrame,
        residuals: &[f64],
        config: &ResidualConfig,
        rng: &mut StdRng,
    ) -> Result<Self, ModelError> {
        let n = frame.n_rows();
        if residuals.len() != n {
            return Err(ModelError::Numeric(format!(
                "residual series length {} does not match frame rows {n}",
                residuals.len()
            )));
        }

        let seq_len = config.sequence_length;
        // delta[j] = residuals[j+1] - residuals[j]; predicting delta[j] may
        // only read feature rows up to j (close[j+1] is still unknown).
        let n_samples = n.saturating_sub(seq_len);
        if n_samples < config.min_train_sequences + 1 {
            return Err(ModelError::NotReady(format!(
                "{n_samples} sequences available, need at least {}",
                config.min_train_sequences + 1
            )));
        }

        let deltas: Vec<f64> = residuals.windows(2).map(|w| w[1] - w[0]).collect();

        let n_val = ((n_samples as f64 * config.validation_fraction).round() as usize).max(1);
        let n_train = n_samples - n_val;
        if n_train < config.min_train_sequences {
            return Err(ModelError::NotReady(format!(
                "{n_train} training sequences after validation split, need {}",
                config.min_train_sequences
            )));
        }

        // Sample s (0-based) targets delta[seq_len - 1 + s] with window
        // rows [s, s + seq_len). The last training window ends before any
        // validation target, so scaler statistics cannot leak forward.
        let last_train_row = seq_len - 1 + (n_train - 1);
        let train_rows = matrix_from_rows(&frame.rows[..=last_train_row]);
        let feature_scaler = MinMaxScaler::fit(train_rows.view());

        let train_targets: Vec<f64> = (0..n_train)
            .map(|s| deltas[seq_len - 1 + s])
            .collect();
        let target_scaler = MinMaxScaler::fit_series(&train_targets);

        let all_rows = matrix_from_rows(&frame.rows);
        let scaled = feature_scaler.transform(all_rows.view());

        let mut gru = Gru::new(frame.n_cols(), config.hidden_size, rng);
        let mut best = gru.clone();
        let mut best_val = f64::INFINITY;
        let mut stale_epochs = 0usize;

        for _epoch in 0..config.max_epochs {
            // Chronological order; no shuffling across time
            for s_idx in 0..n_train {
                let window = scaled.slice(s![s_idx..s_idx + seq_len, ..]);
                let target = target_scaler.scale_value(0, deltas[seq_len - 1 + s_idx]);
                gru.train_step(window, target, config.learning_rate, config.grad_clip);
            }

            let mut val_sq = 0.0;
            for s_idx in n_train..n_samples {
                let window = scaled.slice(s![s_idx..s_idx + seq_len, ..]);
                let target = target_scaler.scale_value(0, deltas[seq_len - 1 + s_idx]);
                let err = gru.forward(window) - target;
                val_sq += err * err;
            }
            let val_mse = val_sq / n_val as f64;

            if !val_mse.is_finite() {
                return Err(ModelError::Numeric(
                    "validation loss diverged to non-finite".into(),
                ));
            }

            if val_mse < best_val {
                best_val = val_mse;
                best = gru.clone();
                stale_epochs = 0;
            } else {
                stale_epochs += 1;
                if stale_epochs >= config.patience {
                    break;
                }
            }
        }

        // Validation RMSE back in residual units
        let step_rmse = best_val.sqrt() * target_scaler.range(0).max(1e-12);

        Ok(Self {
            gru: best,
            feature_scaler,
            target_scaler,
            schema_fingerprint: frame.schema_fingerprint().to_string(),
            sequence_length: seq_len,
            step_rmse,
        })
    }

    /// Single-step validation RMSE in residual (price) units.
    pub fn step_rmse(&self) -> f64 {
        self.step_rmse
    }

    pub fn schema_fingerprint(&self) -> &str {
        &self.schema_fingerprint
    }

    /// Verify the model was trained against this frame's schema.
    pub fn ensure_schema(&self, frame: &FeatureFrame) -> Result<(), ModelError> {
        if frame.schema_fingerprint() != self.schema_fingerprint {
            return Err(ModelError::NotReady(format!(
                "artifact schema {} does not match live feature schema {}",
                &self.schema_fingerprint[..12.min(self.schema_fingerprint.len())],
                &frame.schema_fingerprint()[..12.min(frame.schema_fingerprint().len())]
            )));
        }
        Ok(())
    }

    /// Autoregressive rollout of residual increments over `days` steps.
    ///
    /// Each step feeds the predicted increment back as the synthetic
    /// one-day-return entry of the next window row; every other feature
    /// entry is carried forward (partial state update). The error estimate
    /// grows as step_rmse * sqrt(k), treating step errors as independent.
    pub fn rollout(
        &self,
        frame: &FeatureFrame,
        last_close: f64,
        days: usize,
    ) -> Result<ResidualForecast, ModelError> {
        self.ensure_schema(frame)?;

        let n = frame.n_rows();
        if n < self.sequence_length {
            return Err(ModelError::NotReady(format!(
                "{n} feature rows available, rollout window needs {}",
                self.sequence_length
            )));
        }

        let return_col = frame.column_index("return_1d");

        let mut window: VecDeque<Vec<f64>> = frame.rows[n - self.sequence_length..]
            .iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .map(|(j, &v)| self.feature_scaler.scale_value(j, v))
                    .collect()
            })
            .collect();

        let mut steps = Vec::with_capacity(days);
        let mut synthetic_close = last_close;

        for k in 1..=days {
            let matrix = matrix_from_rows(window.make_contiguous());
            let y_scaled = self.gru.forward(matrix.view());
            let increment = self.target_scaler.unscale_value(0, y_scaled);

            if !increment.is_finite() {
                return Err(ModelError::Numeric(format!(
                    "non-finite residual increment at rollout step {k}"
                )));
            }

            steps.push(ResidualStep {
                increment,
                error: self.step_rmse * (k as f64).sqrt(),
            });

            let mut next_row = window.back().cloned().unwrap_or_default();
            if let Some(j) = return_col {
                let implied_return = if synthetic_close.abs() > 1e-9 {
                    increment / synthetic_close
                } else {
                    0.0
                };
                next_row[j] = self.feature_scaler.scale_value(j, implied_return);
            }
            synthetic_close += increment;

            window.pop_front();
            window.push_back(next_row);
        }

        Ok(ResidualForecast {
            steps,
            step_rmse: self.step_rmse,
        })
    }

    pub fn to_artifact(&self) -> ResidualArtifact {
        ResidualArtifact {
            schema_fingerprint: self.schema_fingerprint.clone(),
            sequence_length: self.sequence_length,
            step_rmse: self.step_rmse,
            feature_scaler: self.feature_scaler.clone(),
            target_scaler: self.target_scaler.clone(),
            weights: self.gru.to_weights(),
        }
    }

    /// Rebuild from an artifact, verifying it matches the live schema.
    pub fn from_artifact(
        artifact: ResidualArtifact,
        expected_fingerprint: &str,
    ) -> Result<Self, ModelError> {
        if artifact.schema_fingerprint != expected_fingerprint {
            return Err(ModelError::NotReady(
                "artifact feature schema does not match live schema".into(),
            ));
        }
        let gru = Gru::from_weights(&artifact.weights)
            .ok_or_else(|| ModelError::NotReady("artifact weights are inconsistent".into()))?;
        Ok(Self {
            gru,
            feature_scaler: artifact.feature_scaler,
            target_scaler: artifact.target_scaler,
            schema_fingerprint: artifact.schema_fingerprint,
            sequence_length: artifact.sequence_length,
            step_rmse: artifact.step_rmse,
        })
    }

    /// Persist the artifact as JSON.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string(&self.to_artifact())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }

    /// Load an artifact; a missing file or schema mismatch is `NotReady`.
    pub fn load(path: &Path, expected_fingerprint: &str) -> Result<Self, ModelError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ModelError::NotReady(format!("no model artifact at {}: {e}", path.display()))
        })?;
        let artifact: ResidualArtifact = serde_json::from_str(&content)
            .map_err(|e| ModelError::NotReady(format!("unreadable model artifact: {e}")))?;
        Self::from_artifact(artifact, expected_fingerprint)
    }
}

fn matrix_from_rows(rows: &[Vec<f64>]) -> Array2<f64> {
    let n = rows.len();
    let cols = rows.first().map(|r| r.len()).unwrap_or(0);
    Array2::from_shape_fn((n, cols), |(i, j)| rows[i][j])
}
