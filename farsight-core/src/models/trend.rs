//! Trend + seasonality baseline model.
//!
//! Additive decomposition fit on log closing prices: piecewise-linear trend
//! (hinge basis at evenly spaced changepoints over the first 80% of the
//! training window) plus yearly and weekly Fourier harmonics. The fit is
//! ridge-regularized least squares solved by Cholesky decomposition.
//!
//! The native uncertainty interval comes from the model's own in-sample
//! log-residual dispersion and widens with forecast distance; it is not
//! recalibrated downstream.

use super::ModelError;
use crate::domain::TrendForecast;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Trend model hyperparameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendConfig {
    /// Minimum observations required to fit.
    pub min_observations: usize,
    /// Number of trend changepoints, evenly spaced over the first 80%.
    pub n_changepoints: usize,
    /// Yearly Fourier order.
    pub yearly_order: usize,
    /// Weekly Fourier order.
    pub weekly_order: usize,
    /// Ridge regularization strength.
    pub ridge: f64,
    /// Interval half-width in sigmas (1.282 ≈ 80% coverage).
    pub interval_z: f64,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            min_observations: 90,
            n_changepoints: 10,
            yearly_order: 3,
            weekly_order: 2,
            ridge: 1e-3,
            interval_z: 1.282,
        }
    }
}

/// One point of a trend forecast path.
#[derive(Debug, Clone)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub point: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Fitted trend + seasonality model.
#[derive(Debug, Clone)]
pub struct TrendModel {
    config: TrendConfig,
    beta: Array1<f64>,
    changepoints: Vec<f64>,
    first_date: NaiveDate,
    last_date: NaiveDate,
    span_days: f64,
    sigma_log: f64,
}

impl TrendModel {
    /// Fit the decomposition to a close series.
    pub fn fit(
        dates: &[NaiveDate],
        closes: &[f64],
        config: &TrendConfig,
    ) -> Result<Self, ModelError> {
        let n = closes.len();
        if n < config.min_observations {
            return Err(ModelError::InsufficientHistory {
                got: n,
                min: config.min_observations,
            });
        }
        debug_assert_eq!(dates.len(), n);

        if closes.iter().any(|&c| c <= 0.0 || !c.is_finite()) {
            return Err(ModelError::Numeric(
                "non-positive or non-finite close in training data".into(),
            ));
        }

        let first_date = dates[0];
        let last_date = dates[n - 1];
        let span_days = ((last_date - first_date).num_days() as f64).max(1.0);

        // Changepoints at even fractions of the first 80% of the window
        let changepoints: Vec<f64> = (1..=config.n_changepoints)
            .map(|j| 0.8 * j as f64 / (config.n_changepoints as f64 + 1.0))
            .collect();

        let dim = basis_dim(config);
        let mut x = Array2::<f64>::zeros((n, dim));
        for (i, &date) in dates.iter().enumerate() {
            let row = basis_row(date, first_date, span_days, &changepoints, config);
            for (j, v) in row.iter().enumerate() {
                x[[i, j]] = *v;
            }
        }

        let y = Array1::from_iter(closes.iter().map(|&c| c.ln()));

        // Ridge normal equations: (XᵀX + λI) β = Xᵀy
        let xt = x.t();
        let a = xt.dot(&x);
        let b = xt.dot(&y);

        let mut lambda = config.ridge;
        let beta = loop {
            let mut a_reg = a.clone();
            for j in 0..dim {
                a_reg[[j, j]] += lambda;
            }
            match cholesky_solve(&a_reg, &b) {
                Some(beta) => break beta,
                None => {
                    lambda *= 10.0;
                    if lambda > 1.0 {
                        return Err(ModelError::Numeric(
                            "normal equations not positive definite".into(),
                        ));
                    }
                }
            }
        };

        let mut model = Self {
            config: config.clone(),
            beta,
            changepoints,
            first_date,
            last_date,
            span_days,
            sigma_log: 0.0,
        };

        // In-sample residual dispersion in log space
        let mut sq_sum = 0.0;
        for (i, &date) in dates.iter().enumerate() {
            let r = y[i] - model.predict_log(date);
            sq_sum += r * r;
        }
        model.sigma_log = (sq_sum / n as f64).sqrt().max(1e-8);

        if !model.beta.iter().all(|v| v.is_finite()) {
            return Err(ModelError::Numeric("non-finite fit coefficients".into()));
        }

        Ok(model)
    }

    /// Log-space prediction at any date (past or future).
    fn predict_log(&self, date: NaiveDate) -> f64 {
        let row = basis_row(
            date,
            self.first_date,
            self.span_days,
            &self.changepoints,
            &self.config,
        );
        row.iter()
            .zip(self.beta.iter())
            .map(|(a, b)| a * b)
            .sum()
    }

    /// Retrospective predictions in price units for the given dates.
    pub fn predict_in_sample(&self, dates: &[NaiveDate]) -> Vec<f64> {
        dates.iter().map(|&d| self.predict_log(d).exp()).collect()
    }

    /// Forecast path over the next `days` trading days (weekdays only).
    ///
    /// The interval half-width grows as sigma * sqrt(1 + k/252): native
    /// model uncertainty scaled by forecast distance.
    pub fn forecast_path(&self, days: usize) -> Vec<TrendPoint> {
        let mut out = Vec::with_capacity(days);
        let mut date = self.last_date;
        for k in 1..=days {
            date = next_weekday(date);
            let mu = self.predict_log(date);
            let se = self.sigma_log * (1.0 + k as f64 / 252.0).sqrt();
            let z = self.config.interval_z;
            out.push(TrendPoint {
                date,
                point: mu.exp(),
                lower: (mu - z * se).exp(),
                upper: (mu + z * se).exp(),
            });
        }
        out
    }

    /// Point forecast and native interval at a single horizon.
    pub fn forecast_at(&self, days: usize) -> Result<TrendForecast, ModelError> {
        let path = self.forecast_path(days);
        let last = path
            .last()
            .ok_or_else(|| ModelError::Numeric("zero-day forecast requested".into()))?;
        Ok(TrendForecast {
            days,
            point: last.point,
            lower: last.lower,
            upper: last.upper,
        })
    }

    /// Residuals (actual - prediction) in price units.
    pub fn residuals(&self, dates: &[NaiveDate], closes: &[f64]) -> Vec<f64> {
        dates
            .iter()
            .zip(closes)
            .map(|(&d, &c)| c - self.predict_log(d).exp())
            .collect()
    }

    pub fn sigma_log(&self) -> f64 {
        self.sigma_log
    }

    pub fn last_date(&self) -> NaiveDate {
        self.last_date
    }
}

fn basis_dim(config: &TrendConfig) -> usize {
    2 + config.n_changepoints + 2 * config.yearly_order + 2 * config.weekly_order
}

/// Design-matrix row for one date: intercept, linear trend, changepoint
/// hinges, yearly Fourier terms, weekly Fourier terms.
fn basis_row(
    date: NaiveDate,
    first_date: NaiveDate,
    span_days: f64,
    changepoints: &[f64],
    config: &TrendConfig,
) -> Vec<f64> {
    let t = (date - first_date).num_days() as f64 / span_days;

    let mut row = Vec::with_capacity(basis_dim(config));
    row.push(1.0);
    row.push(t);
    for &cp in changepoints {
        row.push((t - cp).max(0.0));
    }

    let yearly = date.ordinal() as f64 / 365.25;
    for k in 1..=config.yearly_order {
        let arg = 2.0 * std::f64::consts::PI * k as f64 * yearly;
        row.push(arg.sin());
        row.push(arg.cos());
    }

    let weekly = date.weekday().num_days_from_monday() as f64 / 7.0;
    for k in 1..=config.weekly_order {
        let arg = 2.0 * std::f64::consts::PI * k as f64 * weekly;
        row.push(arg.sin());
        row.push(arg.cos());
    }

    row
}

fn next_weekday(date: NaiveDate) -> NaiveDate {
    let mut d = date + Duration::days(1);
    while matches!(d.weekday(), Weekday::Sat | Weekday::Sun) {
        d += Duration::days(1);
    }
    d
}

/// Solve A x = b for symmetric positive definite A via Cholesky.
///
/// Returns None when A is not positive definite (caller bumps the ridge).
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }
            if i == j {
                if sum <= 0.0 || !sum.is_finite() {
                    return None;
                }
                l[[i, j]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }

    // Forward substitution: L z = b
    let mut z = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[[i, k]] * z[k];
        }
        z[i] = sum / l[[i, i]];
    }

    // Back substitution: Lᵀ x = z
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = z[i];
        for k in (i + 1)..n {
            sum -= l[[k, i]] * x[k];
        }
        x[i] = sum / l[[i, i]];
    }

    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weekday_dates(n: usize) -> Vec<NaiveDate> {
        let mut dates = Vec::with_capacity(n);
        let mut d = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
        while dates.len() < n {
            if !matches!(d.weekday(), Weekday::Sat | Weekday::Sun) {
                dates.push(d);
            }
            d += Duration::days(1);
        }
        dates
    }

    #[test]
    fn cholesky_solves_identity() {
        let a = Array2::eye(3);
        let b = Array1::from(vec![1.0, 2.0, 3.0]);
        let x = cholesky_solve(&a, &b).unwrap();
        for (xi, bi) in x.iter().zip(b.iter()) {
            assert!((xi - bi).abs() < 1e-12);
        }
    }

    #[test]
    fn cholesky_rejects_indefinite() {
        let mut a = Array2::eye(2);
        a[[1, 1]] = -1.0;
        assert!(cholesky_solve(&a, &Array1::from(vec![1.0, 1.0])).is_none());
    }

    #[test]
    fn rejects_short_history() {
        let dates = weekday_dates(30);
        let closes = vec![100.0; 30];
        let err = TrendModel::fit(&dates, &closes, &TrendConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            ModelError::InsufficientHistory { got: 30, min: 90 }
        ));
    }

    #[test]
    fn rejects_non_positive_close() {
        let dates = weekday_dates(120);
        let mut closes = vec![100.0; 120];
        closes[50] = 0.0;
        assert!(matches!(
            TrendModel::fit(&dates, &closes, &TrendConfig::default()),
            Err(ModelError::Numeric(_))
        ));
    }

    #[test]
    fn recovers_exponential_trend() {
        // Closed-form series: closes grow at a constant log rate.
        // The fit and a one-month extrapolation should stay within a small
        // tolerance of the analytic continuation.
        let n = 504;
        let dates = weekday_dates(n);
        let rate_per_day = 0.0005;
        let closes: Vec<f64> = dates
            .iter()
            .map(|d| 100.0 * ((*d - dates[0]).num_days() as f64 * rate_per_day).exp())
            .collect();

        let model = TrendModel::fit(&dates, &closes, &TrendConfig::default()).unwrap();
        let forecast = model.forecast_at(21).unwrap();

        let future_date = {
            let mut d = dates[n - 1];
            for _ in 0..21 {
                d = next_weekday(d);
            }
            d
        };
        let expected = 100.0 * ((future_date - dates[0]).num_days() as f64 * rate_per_day).exp();

        let rel_err = (forecast.point - expected).abs() / expected;
        assert!(
            rel_err < 0.02,
            "forecast {} vs analytic {expected}: rel err {rel_err}",
            forecast.point
        );
        assert!(forecast.lower <= forecast.point && forecast.point <= forecast.upper);
    }

    #[test]
    fn interval_widens_with_horizon() {
        let dates = weekday_dates(252);
        let closes: Vec<f64> = (0..252)
            .map(|i| 100.0 + (i as f64 * 0.3).sin() * 3.0 + i as f64 * 0.05)
            .collect();
        let model = TrendModel::fit(&dates, &closes, &TrendConfig::default()).unwrap();

        let short = model.forecast_at(21).unwrap();
        let long = model.forecast_at(252).unwrap();
        let rel_width = |f: &TrendForecast| (f.upper - f.lower) / f.point;
        assert!(rel_width(&long) > rel_width(&short));
    }

    #[test]
    fn forecast_path_skips_weekends() {
        let dates = weekday_dates(120);
        let closes: Vec<f64> = (0..120).map(|i| 100.0 + i as f64 * 0.1).collect();
        let model = TrendModel::fit(&dates, &closes, &TrendConfig::default()).unwrap();

        for point in model.forecast_path(30) {
            assert!(!matches!(
                point.date.weekday(),
                Weekday::Sat | Weekday::Sun
            ));
        }
    }

    #[test]
    fn in_sample_residuals_are_small_for_clean_trend() {
        let dates = weekday_dates(252);
        let closes: Vec<f64> = dates
            .iter()
            .map(|d| 100.0 * ((*d - dates[0]).num_days() as f64 * 0.0003).exp())
            .collect();
        let model = TrendModel::fit(&dates, &closes, &TrendConfig::default()).unwrap();
        let residuals = model.residuals(&dates, &closes);

        let max_abs = residuals.iter().fold(0.0_f64, |m, r| m.max(r.abs()));
        assert!(max_abs < 2.0, "max residual {max_abs} too large");
    }
}
