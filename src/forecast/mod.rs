//! Backtested forecasting
//!
//! A prediction request cleans the uploaded dataset onto an hourly grid,
//! holds out the trailing share of it, fits the selected model on the rest and
//! scores the first `horizon` held-out hours.

pub mod boosting;
pub mod features;
pub mod metrics;
pub mod optimize;
pub mod prophet;
pub mod sarima;

pub use boosting::BoostingForecaster;
pub use metrics::{ForecastMetrics, ForecastMetricsError};
pub use prophet::ProphetForecaster;
pub use sarima::SarimaForecaster;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ForecastConfig;
use crate::dataset::{DatasetError, HourlyFrame, LoadedDataset};
use crate::domain::{AvailableModel, PredictionConfig};

/// Columns a prediction needs besides `date`
pub const REQUIRED_COLUMNS: [&str; 4] = ["date", "fact", "cloudiness", "temperature"];

#[derive(Debug, thiserror::Error)]
pub enum ForecastError {
    #[error("Insufficient data: need at least {needed} observations, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error("Model fit failed: {0}")]
    Model(String),

    #[error("Metrics error: {0}")]
    Metrics(#[from] ForecastMetricsError),
}

/// Train/test partition of the hourly grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Split {
    pub train_len: usize,
    pub test_len: usize,
}

impl Split {
    /// `test_len = floor(n * test_fraction)`, the rest is training data
    pub fn new(n: usize, test_fraction: f64) -> Self {
        let test_len = ((n as f64) * test_fraction).floor() as usize;
        Self {
            train_len: n - test_len.min(n),
            test_len: test_len.min(n),
        }
    }
}

/// Predictions paired with what was actually observed
#[derive(Debug, Clone, Default)]
pub struct Backtest {
    pub timestamps: Vec<NaiveDateTime>,
    pub observed: Vec<Option<f64>>,
    pub predicted: Vec<f64>,
}

impl Backtest {
    /// Align `predicted` with the grid hours following the training slice
    pub fn on_grid(frame: &HourlyFrame, split: Split, predicted: Vec<f64>) -> Self {
        let range = split.train_len..split.train_len + predicted.len();
        Self {
            timestamps: range.clone().map(|i| frame.timestamp(i)).collect(),
            observed: frame.fact[range].to_vec(),
            predicted,
        }
    }
}

/// A forecasting procedure evaluated against a held-out slice
pub trait Forecaster: Send + Sync {
    fn backtest(
        &self,
        frame: &HourlyFrame,
        split: Split,
        horizon: usize,
    ) -> Result<Backtest, ForecastError>;
}

pub fn forecaster_for(model: AvailableModel) -> Box<dyn Forecaster> {
    match model {
        AvailableModel::Sarima => Box::new(SarimaForecaster::default()),
        AvailableModel::FbProphet => Box::new(ProphetForecaster::default()),
        AvailableModel::Xgboost => Box::new(BoostingForecaster::default()),
    }
}

/// Persisted result of one prediction run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionOutcome {
    pub model_type: AvailableModel,
    /// Horizon the caller asked for
    pub requested_horizon: u32,
    /// Horizon actually scored, capped by the held-out length
    pub forecast_horizon: usize,
    pub timestamps: Vec<NaiveDateTime>,
    pub observed: Vec<Option<f64>>,
    pub predicted: Vec<f64>,
    pub metrics: ForecastMetrics,
}

/// Run one model against a loaded dataset.
///
/// Deterministic for a given input and model; CPU-bound, so async callers
/// should move it onto the blocking pool.
pub fn run_prediction(
    dataset: &LoadedDataset,
    request: &PredictionConfig,
    settings: &ForecastConfig,
) -> Result<PredictionOutcome, ForecastError> {
    dataset.require_columns(&REQUIRED_COLUMNS)?;

    let needed = settings.min_observations;
    let frame = HourlyFrame::from_observations(&dataset.observations, settings.max_grid_hours)?
        .ok_or(ForecastError::InsufficientData { needed, got: 0 })?;
    let got = frame.observed_count();
    if got < needed {
        return Err(ForecastError::InsufficientData { needed, got });
    }

    let split = Split::new(frame.len(), settings.test_fraction);
    let horizon = (request.forecast_horizon as usize).min(split.test_len);
    if horizon == 0 {
        return Err(ForecastError::InsufficientData { needed, got });
    }

    let backtest = forecaster_for(request.model_type).backtest(&frame, split, horizon)?;
    let metrics = ForecastMetrics::calculate(&backtest.observed, &backtest.predicted)?;

    info!(
        model = %request.model_type,
        grid_hours = frame.len(),
        train = split.train_len,
        test = split.test_len,
        scored = backtest.predicted.len(),
        mse = metrics.mse,
        rmse = metrics.rmse,
        mae = metrics.mae,
        "prediction finished"
    );

    Ok(PredictionOutcome {
        model_type: request.model_type,
        requested_horizon: request.forecast_horizon,
        forecast_horizon: backtest.predicted.len(),
        timestamps: backtest.timestamps,
        observed: backtest.observed,
        predicted: backtest.predicted,
        metrics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Observation;
    use chrono::{Duration, NaiveDate};
    use rstest::rstest;

    fn synthetic(hours: usize) -> LoadedDataset {
        let start = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let observations = (0..hours)
            .map(|i| {
                let hour = (i % 24) as f64;
                let sun = (std::f64::consts::PI * (hour - 6.0) / 12.0).sin().max(0.0);
                let cloud = ((i * 13) % 100) as f64;
                Observation {
                    date: Some(start + Duration::hours(i as i64)),
                    fact: Some(50.0 * sun * (1.0 - cloud / 200.0)),
                    cloudiness: Some(cloud),
                    temperature: Some(15.0 + 5.0 * sun),
                    ..Default::default()
                }
            })
            .collect();
        LoadedDataset {
            columns: REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect(),
            observations,
        }
    }

    fn request(model_type: AvailableModel, horizon: u32) -> PredictionConfig {
        PredictionConfig { model_type, forecast_horizon: horizon }
    }

    #[test]
    fn test_split() {
        assert_eq!(Split::new(100, 0.3), Split { train_len: 70, test_len: 30 });
        assert_eq!(Split::new(31, 0.3), Split { train_len: 22, test_len: 9 });
    }

    #[rstest]
    #[case(AvailableModel::Sarima)]
    #[case(AvailableModel::FbProphet)]
    #[case(AvailableModel::Xgboost)]
    fn test_every_model_produces_horizon(#[case] model: AvailableModel) {
        let ds = synthetic(24 * 10);
        let settings = ForecastConfig::default();
        let out = run_prediction(&ds, &request(model, 48), &settings).unwrap();
        assert_eq!(out.forecast_horizon, 48);
        assert_eq!(out.predicted.len(), 48);
        assert_eq!(out.observed.len(), 48);
        assert_eq!(out.timestamps.len(), 48);
        assert!(out.metrics.mse >= 0.0);
        assert_eq!(out.metrics.rmse, metrics::round3(out.metrics.mse.sqrt()));
    }

    #[test]
    fn test_horizon_capped_by_test_length() {
        let ds = synthetic(40);
        let out = run_prediction(
            &ds,
            &request(AvailableModel::Sarima, 128),
            &ForecastConfig::default(),
        )
        .unwrap();
        assert_eq!(out.forecast_horizon, 12);
        assert_eq!(out.requested_horizon, 128);
    }

    #[test]
    fn test_insufficient_data() {
        let ds = synthetic(29);
        let settings = ForecastConfig::default();
        let err = run_prediction(&ds, &request(AvailableModel::Sarima, 24), &settings).unwrap_err();
        assert!(matches!(err, ForecastError::InsufficientData { needed: 30, got: 29 }));
    }

    #[test]
    fn test_missing_regressor_column() {
        let mut ds = synthetic(48);
        ds.columns.retain(|c| c != "temperature");
        let settings = ForecastConfig::default();
        let err =
            run_prediction(&ds, &request(AvailableModel::FbProphet, 24), &settings).unwrap_err();
        assert!(matches!(
            err,
            ForecastError::Dataset(DatasetError::MissingColumn("temperature"))
        ));
    }

    #[test]
    fn test_lag_model_needs_enough_complete_rows() {
        // 30 grid hours leave only 6 lag rows against a 9-hour test slice
        let ds = synthetic(30);
        let settings = ForecastConfig::default();
        let err =
            run_prediction(&ds, &request(AvailableModel::Xgboost, 24), &settings).unwrap_err();
        assert!(matches!(err, ForecastError::InsufficientData { .. }));
    }

    #[test]
    fn test_rejects_grid_span_over_limit() {
        let mut ds = synthetic(48);
        ds.observations[0].date =
            NaiveDate::from_ymd_opt(1, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0));
        let settings = ForecastConfig::default();
        let err = run_prediction(&ds, &request(AvailableModel::Sarima, 24), &settings).unwrap_err();
        assert!(err.to_string().contains("0001-01-01"));
        match err {
            ForecastError::Dataset(DatasetError::SpanTooLong { max, .. }) => {
                assert_eq!(max, settings.max_grid_hours)
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[rstest]
    #[case(AvailableModel::Sarima)]
    #[case(AvailableModel::FbProphet)]
    fn test_deterministic(#[case] model: AvailableModel) {
        let ds = synthetic(24 * 5);
        let settings = ForecastConfig::default();
        let a = run_prediction(&ds, &request(model, 24), &settings).unwrap();
        let b = run_prediction(&ds, &request(model, 24), &settings).unwrap();
        assert_eq!(a.predicted, b.predicted);
        assert_eq!(a.metrics, b.metrics);
    }
}
