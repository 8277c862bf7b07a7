//! Gradient-boosted regression trees over lag features
//!
//! Squared-error boosting: every round fits a depth-limited SmartCore
//! regression tree to the current residuals and adds its shrunken output to
//! the ensemble.

use anyhow::anyhow;
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::tree::decision_tree_regressor::{
    DecisionTreeRegressor, DecisionTreeRegressorParameters,
};
use tracing::debug;

use super::features::{LagFeatures, LAG_COUNT};
use super::{Backtest, ForecastError, Forecaster, Split};
use crate::dataset::HourlyFrame;

type Tree = DecisionTreeRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// Boosting hyperparameters
#[derive(Debug, Clone, Copy)]
pub struct BoostingConfig {
    pub n_rounds: usize,
    pub learning_rate: f64,
    pub max_depth: u16,
    pub min_samples_leaf: usize,
    pub min_samples_split: usize,
}

impl Default for BoostingConfig {
    fn default() -> Self {
        Self {
            n_rounds: 100,
            learning_rate: 0.3,
            max_depth: 6,
            min_samples_leaf: 1,
            min_samples_split: 2,
        }
    }
}

impl BoostingConfig {
    fn tree_parameters(&self) -> DecisionTreeRegressorParameters {
        DecisionTreeRegressorParameters::default()
            .with_max_depth(self.max_depth)
            .with_min_samples_leaf(self.min_samples_leaf)
            .with_min_samples_split(self.min_samples_split)
    }
}

fn to_matrix(rows: &[Vec<f64>]) -> anyhow::Result<DenseMatrix<f64>> {
    let n_samples = rows.len();
    let n_features = rows.first().map(Vec::len).unwrap_or(0);
    let mut flat = Vec::with_capacity(n_samples * n_features);
    for row in rows {
        if row.len() != n_features {
            anyhow::bail!("All feature vectors must have the same length");
        }
        flat.extend_from_slice(row);
    }
    Ok(DenseMatrix::new(n_samples, n_features, flat, false))
}

/// Trained ensemble
pub struct BoostedTrees {
    pub base_score: f64,
    pub learning_rate: f64,
    trees: Vec<Tree>,
}

impl BoostedTrees {
    pub fn fit(x: &[Vec<f64>], y: &[f64], cfg: BoostingConfig) -> anyhow::Result<Self> {
        if x.is_empty() || y.is_empty() {
            anyhow::bail!("Cannot train on empty dataset");
        }
        if x.len() != y.len() {
            anyhow::bail!(
                "Feature and target count mismatch: {} features, {} targets",
                x.len(),
                y.len()
            );
        }

        let matrix = to_matrix(x)?;
        let base_score = y.iter().sum::<f64>() / y.len() as f64;
        let mut current = vec![base_score; y.len()];
        let mut trees = Vec::with_capacity(cfg.n_rounds);

        for round in 0..cfg.n_rounds {
            let residuals: Vec<f64> = y.iter().zip(&current).map(|(t, p)| t - p).collect();
            if residuals.iter().all(|r| r.abs() < 1e-12) {
                debug!(round, "residuals vanished, stopping early");
                break;
            }
            let tree = Tree::fit(&matrix, &residuals, cfg.tree_parameters())
                .map_err(|e| anyhow!("Tree training failed in round {}: {:?}", round, e))?;
            let step = tree
                .predict(&matrix)
                .map_err(|e| anyhow!("Tree prediction failed in round {}: {:?}", round, e))?;
            for (p, s) in current.iter_mut().zip(&step) {
                *p += cfg.learning_rate * s;
            }
            trees.push(tree);
        }

        debug!(rounds = trees.len(), samples = y.len(), "boosting finished");
        Ok(Self {
            base_score,
            learning_rate: cfg.learning_rate,
            trees,
        })
    }

    pub fn predict(&self, x: &[Vec<f64>]) -> anyhow::Result<Vec<f64>> {
        if x.is_empty() {
            return Ok(Vec::new());
        }
        let matrix = to_matrix(x)?;
        let mut out = vec![self.base_score; x.len()];
        for tree in &self.trees {
            let step = tree
                .predict(&matrix)
                .map_err(|e| anyhow!("Tree prediction failed: {:?}", e))?;
            for (p, s) in out.iter_mut().zip(&step) {
                *p += self.learning_rate * s;
            }
        }
        Ok(out)
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

/// XGBOOST branch of the pipeline
#[derive(Debug, Clone, Default)]
pub struct BoostingForecaster {
    pub config: BoostingConfig,
}

impl Forecaster for BoostingForecaster {
    fn backtest(
        &self,
        frame: &HourlyFrame,
        split: Split,
        horizon: usize,
    ) -> Result<Backtest, ForecastError> {
        let features = LagFeatures::build(frame, LAG_COUNT);
        if features.len() <= split.test_len {
            return Err(ForecastError::InsufficientData {
                needed: split.test_len + 1,
                got: features.len(),
            });
        }
        let (train, test) = features.split_tail(split.test_len);
        let model = BoostedTrees::fit(&train.rows, &train.targets, self.config)
            .map_err(|e| ForecastError::Model(e.to_string()))?;

        let horizon = horizon.min(test.len());
        let predicted = model
            .predict(&test.rows[..horizon])
            .map_err(|e| ForecastError::Model(e.to_string()))?;

        Ok(Backtest {
            timestamps: test.timestamps[..horizon].to_vec(),
            observed: test.targets[..horizon].iter().copied().map(Some).collect(),
            predicted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy(n: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..n).map(|i| vec![i as f64, (i % 5) as f64]).collect();
        let y: Vec<f64> = x
            .iter()
            .map(|r| 3.0 * r[1] + if r[0] > 20.0 { 10.0 } else { 0.0 })
            .collect();
        (x, y)
    }

    #[test]
    fn test_default_config() {
        let cfg = BoostingConfig::default();
        assert_eq!(cfg.n_rounds, 100);
        assert_eq!(cfg.max_depth, 6);
        assert!((cfg.learning_rate - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn test_boosting_fits_training_data() {
        let (x, y) = toy(40);
        let model = BoostedTrees::fit(&x, &y, BoostingConfig::default()).unwrap();
        let pred = model.predict(&x).unwrap();
        let mae = pred.iter().zip(&y).map(|(p, t)| (p - t).abs()).sum::<f64>() / y.len() as f64;
        assert!(mae < 0.1, "mae = {mae}");
        assert!(model.n_trees() >= 1);
    }

    #[test]
    fn test_constant_target_needs_no_trees() {
        let x: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let model = BoostedTrees::fit(&x, &[4.0; 10], BoostingConfig::default()).unwrap();
        assert_eq!(model.n_trees(), 0);
        assert_eq!(model.predict(&x[..2]).unwrap(), vec![4.0, 4.0]);
    }

    #[test]
    fn test_fit_rejects_mismatch() {
        let (x, _) = toy(5);
        assert!(BoostedTrees::fit(&x, &[1.0, 2.0], BoostingConfig::default()).is_err());
        assert!(BoostedTrees::fit(&[], &[], BoostingConfig::default()).is_err());
    }
}
