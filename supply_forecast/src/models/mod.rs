//! Point-forecast generators
//!
//! A generator turns a feature series into `horizon` non-negative
//! predictions. Its confidence is measured, not declared: the generator is
//! first backtested on the last `validation_window` observations and the
//! holdout sMAPE is mapped onto [0, 1].

use crate::error::{ForecastError, Result};
use crate::features::{next_predictors, FeatureVector};
use crate::utils::{forecast_accuracy, future_timestamps, sampling_interval, ForecastAccuracy};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

pub mod gradient_boosting;
pub mod random_forest;
pub mod seasonal_naive;

pub use gradient_boosting::GradientBoosting;
pub use random_forest::RandomForest;
pub use seasonal_naive::SeasonalNaive;

/// Minimum number of complete predictor rows a tree learner trains on
pub const MIN_TRAINING_ROWS: usize = 10;

/// One generator's prediction for a horizon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawModelForecast")]
pub struct ModelForecast {
    model_id: String,
    predictions: Vec<f64>,
    confidence: f64,
    validation: Option<ForecastAccuracy>,
}

impl ModelForecast {
    /// Create a model forecast, checking length, sign and confidence range
    pub fn new(
        model_id: impl Into<String>,
        predictions: Vec<f64>,
        horizon: usize,
        confidence: f64,
    ) -> Result<Self> {
        let model_id = model_id.into();

        if predictions.len() != horizon {
            return Err(ForecastError::ValidationError(format!(
                "Model '{}' produced {} predictions for a horizon of {}",
                model_id,
                predictions.len(),
                horizon
            )));
        }
        if let Some(v) = predictions.iter().find(|v| !v.is_finite() || **v < 0.0) {
            return Err(ForecastError::ValidationError(format!(
                "Model '{}' produced an invalid prediction: {}",
                model_id, v
            )));
        }
        if !(0.0..=1.0).contains(&confidence) {
            return Err(ForecastError::ValidationError(format!(
                "Model '{}' confidence {} is outside [0, 1]",
                model_id, confidence
            )));
        }

        Ok(Self {
            model_id,
            predictions,
            confidence,
            validation: None,
        })
    }

    /// Attach holdout accuracy metrics
    pub fn with_validation(mut self, accuracy: ForecastAccuracy) -> Self {
        self.validation = Some(accuracy);
        self
    }

    /// Get the model identifier
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Get the predictions, one per sampling step
    pub fn predictions(&self) -> &[f64] {
        &self.predictions
    }

    /// Get the self-reported confidence weight
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Get the holdout accuracy, if the forecast was backtested
    pub fn validation(&self) -> Option<&ForecastAccuracy> {
        self.validation.as_ref()
    }

    /// Number of forecast steps
    pub fn horizon(&self) -> usize {
        self.predictions.len()
    }
}

#[derive(Deserialize)]
struct RawModelForecast {
    model_id: String,
    predictions: Vec<f64>,
    confidence: f64,
    validation: Option<ForecastAccuracy>,
}

impl TryFrom<RawModelForecast> for ModelForecast {
    type Error = ForecastError;

    fn try_from(raw: RawModelForecast) -> Result<Self> {
        let horizon = raw.predictions.len();
        let forecast = Self::new(raw.model_id, raw.predictions, horizon, raw.confidence)?;
        Ok(match raw.validation {
            Some(accuracy) => forecast.with_validation(accuracy),
            None => forecast,
        })
    }
}

/// Common interface for point-forecast generators
pub trait ForecastGenerator: Debug {
    /// Human readable name of the model
    fn name(&self) -> &str;

    /// Minimum number of feature rows `fit_predict` accepts
    fn min_history(&self) -> usize;

    /// Fit on `features` and predict the next `horizon` values
    fn fit_predict(&self, features: &[FeatureVector], horizon: usize) -> Result<Vec<f64>>;

    /// Backtest on the tail of `features`, then fit on all of it and forecast
    fn generate(
        &self,
        model_id: &str,
        features: &[FeatureVector],
        horizon: usize,
        validation_window: usize,
    ) -> Result<ModelForecast> {
        if validation_window == 0 {
            return Err(ForecastError::InvalidParameter(
                "Validation window must be positive".to_string(),
            ));
        }

        let required = self.min_history() + validation_window;
        if features.len() < required {
            return Err(ForecastError::InsufficientData {
                required,
                actual: features.len(),
            });
        }

        let split = features.len() - validation_window;
        let backtest = floor_at_zero(self.fit_predict(&features[..split], validation_window)?);
        let actual: Vec<f64> = features[split..].iter().map(|f| f.value).collect();
        let accuracy = forecast_accuracy(&backtest, &actual)?;

        let predictions = floor_at_zero(self.fit_predict(features, horizon)?);

        Ok(ModelForecast::new(model_id, predictions, horizon, accuracy.confidence())?
            .with_validation(accuracy))
    }
}

/// Closed set of generator variants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Generator {
    SeasonalNaive(SeasonalNaive),
    RandomForest(RandomForest),
    GradientBoosting(GradientBoosting),
}

impl Generator {
    /// Check the variant's parameters
    pub fn validate(&self) -> Result<()> {
        match self {
            Generator::SeasonalNaive(g) => g.validate(),
            Generator::RandomForest(g) => g.validate(),
            Generator::GradientBoosting(g) => g.validate(),
        }
    }

    fn inner(&self) -> &dyn ForecastGenerator {
        match self {
            Generator::SeasonalNaive(g) => g,
            Generator::RandomForest(g) => g,
            Generator::GradientBoosting(g) => g,
        }
    }
}

impl ForecastGenerator for Generator {
    fn name(&self) -> &str {
        self.inner().name()
    }

    fn min_history(&self) -> usize {
        self.inner().min_history()
    }

    fn fit_predict(&self, features: &[FeatureVector], horizon: usize) -> Result<Vec<f64>> {
        self.inner().fit_predict(features, horizon)
    }
}

/// A generator registered under an identifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredGenerator {
    pub id: String,
    #[serde(flatten)]
    pub generator: Generator,
}

/// Ordered registry of generators
///
/// Built once at start-up and passed to the ensemble by reference.
/// Registration order is the reduction order of the ensemble.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GeneratorRegistry {
    entries: Vec<RegisteredGenerator>,
}

impl GeneratorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the default seasonal-naive, random forest and gradient boosting variants
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.entries = default_generators();
        registry
    }

    /// Register a generator, rejecting duplicate identifiers
    pub fn register(&mut self, id: impl Into<String>, generator: Generator) -> Result<()> {
        let id = id.into();
        if self.get(&id).is_some() {
            return Err(ForecastError::InvalidParameter(format!(
                "Generator '{}' is already registered",
                id
            )));
        }
        generator.validate()?;

        self.entries.push(RegisteredGenerator { id, generator });
        Ok(())
    }

    /// Look up a generator by identifier
    pub fn get(&self, id: &str) -> Option<&Generator> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .map(|e| &e.generator)
    }

    /// Registered generators in registration order
    pub fn entries(&self) -> &[RegisteredGenerator] {
        &self.entries
    }

    /// Number of registered generators
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no generator is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TryFrom<Vec<RegisteredGenerator>> for GeneratorRegistry {
    type Error = ForecastError;

    fn try_from(entries: Vec<RegisteredGenerator>) -> Result<Self> {
        let mut registry = Self::new();
        for entry in entries {
            registry.register(entry.id, entry.generator)?;
        }
        Ok(registry)
    }
}

/// Default generator set
pub fn default_generators() -> Vec<RegisteredGenerator> {
    vec![
        RegisteredGenerator {
            id: "seasonal_naive".to_string(),
            generator: Generator::SeasonalNaive(SeasonalNaive::default()),
        },
        RegisteredGenerator {
            id: "random_forest".to_string(),
            generator: Generator::RandomForest(RandomForest::default()),
        },
        RegisteredGenerator {
            id: "gradient_boosting".to_string(),
            generator: Generator::GradientBoosting(GradientBoosting::default()),
        },
    ]
}

fn floor_at_zero(values: Vec<f64>) -> Vec<f64> {
    values.into_iter().map(|v| v.max(0.0)).collect()
}

/// Complete predictor rows and their targets
pub(crate) fn training_set(features: &[FeatureVector]) -> (Vec<Vec<f64>>, Vec<f64>) {
    let mut rows = Vec::new();
    let mut targets = Vec::new();

    for pair in features.windows(2) {
        if let Some(row) = pair[1].predictors(&pair[0]) {
            rows.push(row);
            targets.push(pair[1].value);
        }
    }

    (rows, targets)
}

/// Roll a one-step predictor forward `horizon` steps
///
/// Steps are spaced by the sampling interval of the last two feature rows.
/// Each prediction is floored at zero and appended to the history before
/// the next step's predictors are derived.
pub(crate) fn recursive_forecast<F>(
    features: &[FeatureVector],
    horizon: usize,
    predict: F,
) -> Result<Vec<f64>>
where
    F: Fn(&[f64]) -> Result<f64>,
{
    let last = features.last().ok_or_else(|| {
        ForecastError::DataError("Cannot forecast from an empty feature series".to_string())
    })?;

    let mut history: Vec<f64> = features.iter().map(|f| f.value).collect();
    let mut predictions = Vec::with_capacity(horizon);

    let tail = &features[features.len().saturating_sub(2)..];
    let timestamps: Vec<_> = tail.iter().map(|f| f.timestamp).collect();
    let step = sampling_interval(&timestamps);

    for timestamp in future_timestamps(last.timestamp, horizon, step)? {
        let row = next_predictors(&history, timestamp).ok_or(ForecastError::InsufficientData {
            required: crate::features::MIN_HISTORY,
            actual: history.len(),
        })?;
        let y = predict(&row)?.max(0.0);
        history.push(y);
        predictions.push(y);
    }

    Ok(predictions)
}

/// Fail when there are too few complete rows to train on
pub(crate) fn ensure_training_rows(rows: usize) -> Result<()> {
    if rows < MIN_TRAINING_ROWS {
        return Err(ForecastError::InsufficientData {
            required: MIN_TRAINING_ROWS,
            actual: rows,
        });
    }
    Ok(())
}
