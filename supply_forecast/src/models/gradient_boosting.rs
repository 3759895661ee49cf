//! Gradient-boosted regression trees

use crate::error::{ForecastError, Result};
use crate::features::{FeatureVector, MIN_HISTORY};
use crate::models::{
    ensure_training_rows, recursive_forecast, training_set, ForecastGenerator, MIN_TRAINING_ROWS,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use supply_math::{LinearRegression, RegressionTree, TreeParams};

// Column of the trend index in the predictor layout
const TREND_COLUMN: usize = 4;

/// Least-squares boosting of shallow trees
///
/// The base learner is a linear fit on the trend index, so the model can
/// extrapolate a trend that the trees alone would flatten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradientBoosting {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

impl Default for GradientBoosting {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 3,
            seed: 42,
        }
    }
}

/// Fitted boosting model
#[derive(Debug, Clone)]
pub struct TrainedGradientBoosting {
    base: Option<LinearRegression>,
    base_mean: f64,
    learning_rate: f64,
    trees: Vec<RegressionTree>,
}

impl TrainedGradientBoosting {
    fn base_prediction(&self, row: &[f64]) -> f64 {
        match &self.base {
            Some(lr) => lr.predict(row[TREND_COLUMN]),
            None => self.base_mean,
        }
    }

    /// Predict the target for one predictor row
    pub fn predict(&self, row: &[f64]) -> Result<f64> {
        let mut y = self.base_prediction(row);
        for tree in &self.trees {
            y += self.learning_rate * tree.predict(row)?;
        }
        Ok(y)
    }

    /// Number of boosting stages
    pub fn stages(&self) -> usize {
        self.trees.len()
    }
}

impl GradientBoosting {
    /// Check the parameters
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(ForecastError::InvalidParameter(
                "Gradient boosting needs at least one estimator".to_string(),
            ));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(ForecastError::InvalidParameter(
                "Learning rate must be in (0, 1]".to_string(),
            ));
        }
        if self.min_samples_leaf == 0 {
            return Err(ForecastError::InvalidParameter(
                "min_samples_leaf must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Fit the boosted model on complete predictor rows
    pub fn fit(&self, features: &[FeatureVector]) -> Result<TrainedGradientBoosting> {
        let (rows, targets) = training_set(features);
        ensure_training_rows(rows.len())?;

        let trend: Vec<f64> = rows.iter().map(|r| r[TREND_COLUMN]).collect();
        let base_mean = targets.iter().sum::<f64>() / targets.len() as f64;
        let mut model = TrainedGradientBoosting {
            base: LinearRegression::fit(&trend, &targets).ok(),
            base_mean,
            learning_rate: self.learning_rate,
            trees: Vec::with_capacity(self.n_estimators),
        };

        let params = TreeParams {
            max_depth: self.max_depth,
            min_samples_split: 2 * self.min_samples_leaf,
            min_samples_leaf: self.min_samples_leaf,
            max_features: None,
        };
        let mut rng = StdRng::seed_from_u64(self.seed);

        let mut fitted: Vec<f64> = rows.iter().map(|r| model.base_prediction(r)).collect();
        for _ in 0..self.n_estimators {
            let residuals: Vec<f64> = targets
                .iter()
                .zip(&fitted)
                .map(|(y, f)| y - f)
                .collect();

            let tree = RegressionTree::fit(&rows, &residuals, &params, &mut rng)?;
            for (f, row) in fitted.iter_mut().zip(&rows) {
                *f += self.learning_rate * tree.predict(row)?;
            }
            model.trees.push(tree);
        }

        Ok(model)
    }
}

impl ForecastGenerator for GradientBoosting {
    fn name(&self) -> &str {
        "Gradient Boosting"
    }

    fn min_history(&self) -> usize {
        MIN_HISTORY + MIN_TRAINING_ROWS
    }

    fn fit_predict(&self, features: &[FeatureVector], horizon: usize) -> Result<Vec<f64>> {
        let model = self.fit(features)?;
        recursive_forecast(features, horizon, |row| model.predict(row))
    }
}
