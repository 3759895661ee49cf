//! Bagged regression-tree ensemble

use crate::error::{ForecastError, Result};
use crate::features::{FeatureVector, MIN_HISTORY};
use crate::models::{
    ensure_training_rows, recursive_forecast, training_set, ForecastGenerator, MIN_TRAINING_ROWS,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use supply_math::{RegressionTree, TreeParams};

/// Random forest over the derived predictors
///
/// Each tree is fitted on a bootstrap sample and considers a random subset
/// of predictors at every split. The RNG is seeded, so fits are repeatable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomForest {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Predictors considered per split (`None` uses all)
    pub max_features: Option<usize>,
    pub seed: u64,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self {
            n_trees: 50,
            max_depth: 8,
            min_samples_leaf: 2,
            max_features: Some(5),
            seed: 42,
        }
    }
}

impl RandomForest {
    /// Check the parameters
    pub fn validate(&self) -> Result<()> {
        if self.n_trees == 0 {
            return Err(ForecastError::InvalidParameter(
                "Random forest needs at least one tree".to_string(),
            ));
        }
        if self.min_samples_leaf == 0 {
            return Err(ForecastError::InvalidParameter(
                "min_samples_leaf must be positive".to_string(),
            ));
        }
        if self.max_features == Some(0) {
            return Err(ForecastError::InvalidParameter(
                "max_features must be positive".to_string(),
            ));
        }
        Ok(())
    }

    fn tree_params(&self) -> TreeParams {
        TreeParams {
            max_depth: self.max_depth,
            min_samples_split: 2 * self.min_samples_leaf,
            min_samples_leaf: self.min_samples_leaf,
            max_features: self.max_features,
        }
    }

    /// Fit the forest on complete predictor rows
    pub fn fit(&self, features: &[FeatureVector]) -> Result<Vec<RegressionTree>> {
        let (rows, targets) = training_set(features);
        ensure_training_rows(rows.len())?;

        let params = self.tree_params();
        let mut rng = StdRng::seed_from_u64(self.seed);
        let n = rows.len();

        let mut trees = Vec::with_capacity(self.n_trees);
        for _ in 0..self.n_trees {
            let mut sample_rows = Vec::with_capacity(n);
            let mut sample_targets = Vec::with_capacity(n);
            for _ in 0..n {
                let i = rng.gen_range(0..n);
                sample_rows.push(rows[i].clone());
                sample_targets.push(targets[i]);
            }
            trees.push(RegressionTree::fit(
                &sample_rows,
                &sample_targets,
                &params,
                &mut rng,
            )?);
        }

        Ok(trees)
    }
}

fn forest_predict(trees: &[RegressionTree], row: &[f64]) -> Result<f64> {
    let mut sum = 0.0;
    for tree in trees {
        sum += tree.predict(row)?;
    }
    Ok(sum / trees.len() as f64)
}

impl ForecastGenerator for RandomForest {
    fn name(&self) -> &str {
        "Random Forest"
    }

    fn min_history(&self) -> usize {
        MIN_HISTORY + MIN_TRAINING_ROWS
    }

    fn fit_predict(&self, features: &[FeatureVector], horizon: usize) -> Result<Vec<f64>> {
        let trees = self.fit(features)?;
        recursive_forecast(features, horizon, |row| forest_predict(&trees, row))
    }
}
