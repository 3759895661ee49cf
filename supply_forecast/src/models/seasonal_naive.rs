//! Seasonal-naive persistence model

use crate::error::{ForecastError, Result};
use crate::features::FeatureVector;
use crate::models::ForecastGenerator;
use serde::{Deserialize, Serialize};

/// Repeats the last observed season
///
/// With `season_length = 1` this is plain persistence (last value carried
/// forward).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonalNaive {
    /// Length of one season, in observations
    pub season_length: usize,
}

impl Default for SeasonalNaive {
    fn default() -> Self {
        Self { season_length: 7 }
    }
}

impl SeasonalNaive {
    /// Create a new seasonal-naive model
    pub fn new(season_length: usize) -> Result<Self> {
        let model = Self { season_length };
        model.validate()?;
        Ok(model)
    }

    /// Check the parameters
    pub fn validate(&self) -> Result<()> {
        if self.season_length == 0 {
            return Err(ForecastError::InvalidParameter(
                "Season length must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl ForecastGenerator for SeasonalNaive {
    fn name(&self) -> &str {
        "Seasonal Naive"
    }

    fn min_history(&self) -> usize {
        self.season_length
    }

    fn fit_predict(&self, features: &[FeatureVector], horizon: usize) -> Result<Vec<f64>> {
        if features.len() < self.season_length {
            return Err(ForecastError::InsufficientData {
                required: self.season_length,
                actual: features.len(),
            });
        }

        let last_season = &features[features.len() - self.season_length..];

        Ok((0..horizon)
            .map(|h| last_season[h % self.season_length].value)
            .collect())
    }
}
