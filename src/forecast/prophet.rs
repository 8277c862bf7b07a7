//! Additive trend + seasonality + regressor model
//!
//! A piecewise-linear trend with changepoints, Fourier seasonal terms and
//! standardized external regressors, fitted as a MAP estimate under Gaussian
//! priors. With Gaussian noise that reduces to ridge-penalized least squares
//! solved in closed form.

use chrono::NaiveDateTime;
use nalgebra::{DMatrix, DVector};
use std::f64::consts::PI;
use tracing::debug;

use super::{Backtest, ForecastError, Forecaster, Split};
use crate::dataset::{interpolate_gaps, HourlyFrame};

/// Fourier seasonal component
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Seasonality {
    pub name: &'static str,
    /// Period in hours
    pub period: f64,
    pub order: usize,
}

pub const DAILY: Seasonality = Seasonality { name: "daily", period: 24.0, order: 4 };
pub const WEEKLY: Seasonality = Seasonality { name: "weekly", period: 168.0, order: 3 };
pub const YEARLY: Seasonality = Seasonality { name: "yearly", period: 8766.0, order: 10 };

/// Model hyperparameters
#[derive(Debug, Clone)]
pub struct ProphetConfig {
    pub n_changepoints: usize,
    /// Share of history eligible for changepoints
    pub changepoint_range: f64,
    pub changepoint_prior_scale: f64,
    pub seasonality_prior_scale: f64,
    pub regressor_prior_scale: f64,
    pub seasonalities: Vec<Seasonality>,
}

impl Default for ProphetConfig {
    fn default() -> Self {
        Self {
            n_changepoints: 25,
            changepoint_range: 0.8,
            changepoint_prior_scale: 0.05,
            seasonality_prior_scale: 10.0,
            regressor_prior_scale: 10.0,
            seasonalities: vec![DAILY, WEEKLY, YEARLY],
        }
    }
}

/// Observation noise variance on the scaled target, fixes the prior strength
const NOISE_VARIANCE: f64 = 0.01;

/// One design point
#[derive(Debug, Clone, Copy)]
pub struct ProphetInput {
    pub timestamp: NaiveDateTime,
    pub cloudiness: f64,
    pub temperature: f64,
}

#[derive(Debug, Clone, Copy)]
struct Standardizer {
    mean: f64,
    std: f64,
}

impl Standardizer {
    fn fit(values: &[f64]) -> Self {
        let n = values.len().max(1) as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = if var.sqrt() > 1e-12 { var.sqrt() } else { 1.0 };
        Self { mean, std }
    }

    fn apply(&self, v: f64) -> f64 {
        (v - self.mean) / self.std
    }
}

/// Fitted additive model
#[derive(Debug, Clone)]
pub struct ProphetFit {
    cfg: ProphetConfig,
    /// Start of history and length of the trend time unit, in hours
    t0: f64,
    t_scale: f64,
    y_scale: f64,
    changepoints: Vec<f64>,
    cloudiness: Standardizer,
    temperature: Standardizer,
    pub coefficients: Vec<f64>,
}

fn epoch_hours(ts: NaiveDateTime) -> f64 {
    ts.and_utc().timestamp() as f64 / 3600.0
}

impl ProphetFit {
    fn n_features(&self) -> usize {
        2 + self.changepoints.len()
            + self.cfg.seasonalities.iter().map(|s| 2 * s.order).sum::<usize>()
            + 2
    }

    fn features(&self, input: &ProphetInput) -> Vec<f64> {
        let hours = epoch_hours(input.timestamp);
        let t = (hours - self.t0) / self.t_scale;

        let mut row = Vec::with_capacity(self.n_features());
        row.push(1.0);
        row.push(t);
        row.extend(self.changepoints.iter().map(|s| (t - s).max(0.0)));
        for season in &self.cfg.seasonalities {
            for k in 1..=season.order {
                let angle = 2.0 * PI * k as f64 * hours / season.period;
                row.push(angle.sin());
                row.push(angle.cos());
            }
        }
        row.push(self.cloudiness.apply(input.cloudiness));
        row.push(self.temperature.apply(input.temperature));
        row
    }

    /// Diagonal of the ridge penalty; intercept and base slope are free
    fn penalties(&self) -> Vec<f64> {
        let prior = |scale: f64| NOISE_VARIANCE / (scale * scale);
        let mut pen = vec![0.0, 0.0];
        let changepoint_prior = prior(self.cfg.changepoint_prior_scale);
        pen.extend(std::iter::repeat(changepoint_prior).take(self.changepoints.len()));
        let seasonal_terms: usize = self.cfg.seasonalities.iter().map(|s| 2 * s.order).sum();
        pen.extend(std::iter::repeat(prior(self.cfg.seasonality_prior_scale)).take(seasonal_terms));
        pen.extend(std::iter::repeat(prior(self.cfg.regressor_prior_scale)).take(2));
        pen
    }

    pub fn fit(
        inputs: &[ProphetInput],
        targets: &[f64],
        cfg: ProphetConfig,
    ) -> Result<Self, ForecastError> {
        if inputs.len() != targets.len() || inputs.len() < 2 {
            return Err(ForecastError::Model(format!(
                "Prophet needs at least 2 aligned rows, got {} inputs and {} targets",
                inputs.len(),
                targets.len()
            )));
        }

        let hours: Vec<f64> = inputs.iter().map(|i| epoch_hours(i.timestamp)).collect();
        let t0 = hours.iter().copied().fold(f64::INFINITY, f64::min);
        let t_end = hours.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let t_scale = if t_end > t0 { t_end - t0 } else { 1.0 };

        let y_abs_max = targets.iter().map(|v| v.abs()).fold(0.0, f64::max);
        let y_scale = if y_abs_max > 0.0 { y_abs_max } else { 1.0 };

        // Changepoints spread uniformly over the leading share of history
        let hist = ((inputs.len() as f64) * cfg.changepoint_range).floor() as usize;
        let n_cp = cfg.n_changepoints.min(hist.saturating_sub(1));
        let changepoints: Vec<f64> = (1..=n_cp)
            .map(|j| {
                let idx = ((j as f64) * (hist - 1) as f64 / n_cp as f64).round() as usize;
                (hours[idx] - t0) / t_scale
            })
            .collect();

        let clouds: Vec<f64> = inputs.iter().map(|i| i.cloudiness).collect();
        let temps: Vec<f64> = inputs.iter().map(|i| i.temperature).collect();

        let mut model = ProphetFit {
            cfg,
            t0,
            t_scale,
            y_scale,
            changepoints,
            cloudiness: Standardizer::fit(&clouds),
            temperature: Standardizer::fit(&temps),
            coefficients: Vec::new(),
        };

        let p = model.n_features();
        let flat: Vec<f64> = inputs.iter().flat_map(|i| model.features(i)).collect();
        let x = DMatrix::from_row_slice(inputs.len(), p, &flat);
        let y = DVector::from_iterator(targets.len(), targets.iter().map(|v| v / y_scale));

        let mut gram = x.transpose() * &x;
        for (j, pen) in model.penalties().into_iter().enumerate() {
            gram[(j, j)] += pen;
        }
        let rhs = x.transpose() * y;

        let beta = match gram.clone().cholesky() {
            Some(chol) => chol.solve(&rhs),
            None => gram.lu().solve(&rhs).ok_or_else(|| {
                ForecastError::Model("Prophet normal equations are singular".into())
            })?,
        };

        debug!(
            rows = inputs.len(),
            features = p,
            changepoints = model.changepoints.len(),
            "Prophet fit finished"
        );
        model.coefficients = beta.iter().copied().collect();
        Ok(model)
    }

    pub fn predict(&self, inputs: &[ProphetInput]) -> Vec<f64> {
        inputs
            .iter()
            .map(|input| {
                let row = self.features(input);
                let scaled: f64 = row.iter().zip(&self.coefficients).map(|(a, b)| a * b).sum();
                scaled * self.y_scale
            })
            .collect()
    }
}

/// FB_PROPHET branch of the pipeline
#[derive(Debug, Clone, Default)]
pub struct ProphetForecaster {
    pub config: ProphetConfig,
}

impl Forecaster for ProphetForecaster {
    fn backtest(
        &self,
        frame: &HourlyFrame,
        split: Split,
        horizon: usize,
    ) -> Result<Backtest, ForecastError> {
        let missing = || ForecastError::Model("regressor series holds no observations".into());
        let clouds = interpolate_gaps(&frame.cloudiness).ok_or_else(missing)?;
        let temps = interpolate_gaps(&frame.temperature).ok_or_else(missing)?;
        let input = |i: usize| ProphetInput {
            timestamp: frame.timestamp(i),
            cloudiness: clouds[i],
            temperature: temps[i],
        };

        let (inputs, targets): (Vec<ProphetInput>, Vec<f64>) = (0..split.train_len)
            .filter_map(|i| frame.fact[i].map(|y| (input(i), y)))
            .unzip();
        let fit = ProphetFit::fit(&inputs, &targets, self.config.clone())?;

        let future: Vec<ProphetInput> = (split.train_len..split.train_len + horizon)
            .map(input)
            .collect();
        Ok(Backtest::on_grid(frame, split, fit.predict(&future)))
    }
}
