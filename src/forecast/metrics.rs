//! Backtest accuracy metrics
//!
//! Errors are computed over the held-out slice only. Observed gaps are
//! skipped pairwise so a missing hour never counts as a zero.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Accuracy of a forecast against the held-out observations
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastMetrics {
    /// Mean squared error, rounded to 3 decimals
    pub mse: f64,
    /// Square root of the rounded MSE, rounded to 3 decimals
    pub rmse: f64,
    /// Mean absolute error, rounded to 3 decimals
    pub mae: f64,
    /// Pairs that entered the computation
    #[serde(skip_serializing_if = "is_zero", default)]
    pub sample_count: usize,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

impl ForecastMetrics {
    /// Compare `predicted` with `observed`; `None` observations are ignored.
    pub fn calculate(
        observed: &[Option<f64>],
        predicted: &[f64],
    ) -> Result<Self, ForecastMetricsError> {
        if observed.len() != predicted.len() {
            return Err(ForecastMetricsError::DimensionMismatch {
                observed: observed.len(),
                predicted: predicted.len(),
            });
        }

        let errors: Vec<f64> = observed
            .iter()
            .zip(predicted)
            .filter_map(|(o, p)| o.map(|o| o - p))
            .collect();

        if errors.is_empty() {
            return Err(ForecastMetricsError::EmptyData);
        }

        let n = errors.len() as f64;
        let mse = round3(errors.iter().map(|e| e * e).sum::<f64>() / n);
        let mae = round3(errors.iter().map(|e| e.abs()).sum::<f64>() / n);

        Ok(ForecastMetrics {
            mse,
            rmse: round3(mse.sqrt()),
            mae,
            sample_count: errors.len(),
        })
    }
}

impl fmt::Display for ForecastMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MSE: {}, RMSE: {}, MAE: {}", self.mse, self.rmse, self.mae)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ForecastMetricsError {
    #[error("Dimension mismatch: observed={observed}, predicted={predicted}")]
    DimensionMismatch { observed: usize, predicted: usize },

    #[error("No observed values to compare against")]
    EmptyData,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn some(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().copied().map(Some).collect()
    }

    #[test]
    fn test_perfect_forecast() {
        let actual = [1.0, 2.0, 3.0, 4.0, 5.0];
        let metrics = ForecastMetrics::calculate(&some(&actual), &actual).unwrap();

        assert_eq!(metrics.mse, 0.0);
        assert_eq!(metrics.rmse, 0.0);
        assert_eq!(metrics.mae, 0.0);
        assert_eq!(metrics.sample_count, 5);
    }

    #[test]
    fn test_forecast_with_errors() {
        let observed = some(&[100.0, 200.0, 300.0, 400.0]);
        let predicted = [110.0, 190.0, 310.0, 400.0];

        let metrics = ForecastMetrics::calculate(&observed, &predicted).unwrap();

        assert_relative_eq!(metrics.mse, 75.0);
        assert_relative_eq!(metrics.mae, 7.5);
        assert_relative_eq!(metrics.rmse, 8.66);
    }

    #[test]
    fn test_rmse_derived_from_rounded_mse() {
        // mse = 0.000444 rounds to 0.0, so rmse must be 0.0 too
        let observed = some(&[0.0, 0.0]);
        let predicted = [0.0298, 0.0];
        let metrics = ForecastMetrics::calculate(&observed, &predicted).unwrap();
        assert_eq!(metrics.mse, 0.0);
        assert_eq!(metrics.rmse, 0.0);
        assert_eq!(metrics.mae, 0.015);
    }

    #[test]
    fn test_gaps_are_skipped() {
        let observed = vec![Some(1.0), None, Some(3.0)];
        let predicted = [2.0, 100.0, 3.0];
        let metrics = ForecastMetrics::calculate(&observed, &predicted).unwrap();
        assert_eq!(metrics.sample_count, 2);
        assert_relative_eq!(metrics.mae, 0.5);
    }

    #[test]
    fn test_dimension_mismatch() {
        let result = ForecastMetrics::calculate(&some(&[1.0, 2.0, 3.0]), &[1.0, 2.0]);
        assert!(matches!(
            result,
            Err(ForecastMetricsError::DimensionMismatch { observed: 3, predicted: 2 })
        ));
    }

    #[test]
    fn test_all_gaps_is_empty() {
        let result = ForecastMetrics::calculate(&[None, None], &[1.0, 2.0]);
        assert!(matches!(result, Err(ForecastMetricsError::EmptyData)));
    }

    proptest! {
        #[test]
        fn metrics_are_non_negative_and_consistent(
            pairs in proptest::collection::vec((-1e4f64..1e4, -1e4f64..1e4), 1..64)
        ) {
            let observed: Vec<Option<f64>> = pairs.iter().map(|(o, _)| Some(*o)).collect();
            let predicted: Vec<f64> = pairs.iter().map(|(_, p)| *p).collect();
            let m = ForecastMetrics::calculate(&observed, &predicted).unwrap();
            prop_assert!(m.mse >= 0.0 && m.rmse >= 0.0 && m.mae >= 0.0);
            prop_assert_eq!(m.rmse, round3(m.mse.sqrt()));
        }
    }
}
