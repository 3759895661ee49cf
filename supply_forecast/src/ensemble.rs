//! Ensemble forecasting
//!
//! Runs every registered generator over the same immutable feature series,
//! drops the ones that fail or time out, and blends the survivors by
//! normalized confidence. The interval half-width `z * sigma` is computed
//! once per call and applied to every day.

use crate::error::{ForecastError, Result};
use crate::features::{FeatureVector, MIN_HISTORY};
use crate::models::{ForecastGenerator, GeneratorRegistry, ModelForecast};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default standard error used for confidence intervals
pub const DEFAULT_STANDARD_ERROR: f64 = 5.0;

/// Default confidence level for intervals
pub const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.95;

/// How the interval standard error is obtained
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum StandardErrorMethod {
    /// A constant sigma
    Fixed { value: f64 },
    /// Weighted average of the members' holdout RMSE
    HoldoutRmse,
}

impl Default for StandardErrorMethod {
    fn default() -> Self {
        StandardErrorMethod::Fixed {
            value: DEFAULT_STANDARD_ERROR,
        }
    }
}

/// Confidence interval settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntervalSettings {
    pub confidence_level: f64,
    pub standard_error: StandardErrorMethod,
}

impl Default for IntervalSettings {
    fn default() -> Self {
        Self {
            confidence_level: DEFAULT_CONFIDENCE_LEVEL,
            standard_error: StandardErrorMethod::default(),
        }
    }
}

/// Whether generators run on their own threads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Sequential,
    #[default]
    Parallel,
}

/// Options for one ensemble run
#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleOptions {
    /// Forecast horizon in sampling steps
    pub horizon: usize,
    /// Holdout length used to measure each generator's confidence
    pub validation_window: usize,
    pub interval: IntervalSettings,
    pub mode: ExecutionMode,
    /// Time budget for the whole run
    ///
    /// Only [`ExecutionMode::Parallel`] enforces it while generators run:
    /// workers still busy at the deadline are abandoned. In
    /// [`ExecutionMode::Sequential`] the deadline is checked before each
    /// generator starts, so a generator already running is never
    /// interrupted and the run can overshoot by that generator's duration.
    pub timeout: Option<Duration>,
}

impl EnsembleOptions {
    /// Options with defaults for everything but the horizon
    pub fn new(horizon: usize) -> Self {
        Self {
            horizon,
            validation_window: 14,
            interval: IntervalSettings::default(),
            mode: ExecutionMode::default(),
            timeout: None,
        }
    }
}

/// Normalized weight of one ensemble member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelWeight {
    pub model_id: String,
    pub weight: f64,
}

/// A generator left out of the blend, and why
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroppedGenerator {
    pub model_id: String,
    pub reason: String,
}

/// Combined forecast with confidence bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleForecast {
    point: Vec<f64>,
    lower: Vec<f64>,
    upper: Vec<f64>,
    confidence_level: f64,
    standard_error: f64,
    z_score: f64,
    weights: Vec<ModelWeight>,
    members: Vec<ModelForecast>,
    dropped: Vec<DroppedGenerator>,
}

impl EnsembleForecast {
    /// Combined point predictions
    pub fn point(&self) -> &[f64] {
        &self.point
    }

    /// Lower confidence bounds
    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    /// Upper confidence bounds
    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    /// Confidence level of the bounds
    pub fn confidence_level(&self) -> f64 {
        self.confidence_level
    }

    /// Standard error used for the bounds
    pub fn standard_error(&self) -> f64 {
        self.standard_error
    }

    /// Normal quantile used for the bounds
    pub fn z_score(&self) -> f64 {
        self.z_score
    }

    /// Normalized member weights, in registry order
    pub fn weights(&self) -> &[ModelWeight] {
        &self.weights
    }

    /// Member forecasts, in registry order
    pub fn members(&self) -> &[ModelForecast] {
        &self.members
    }

    /// Generators that failed or timed out
    pub fn dropped(&self) -> &[DroppedGenerator] {
        &self.dropped
    }

    /// Number of forecast steps
    pub fn horizon(&self) -> usize {
        self.point.len()
    }

    /// Serialize to a JSON string
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Normal quantile for a two-sided interval at `confidence_level`
///
/// The common levels use the tabulated 1.645 / 1.96 / 2.576.
pub fn z_score(confidence_level: f64) -> Result<f64> {
    if !(confidence_level > 0.0 && confidence_level < 1.0) {
        return Err(ForecastError::ValidationError(
            "Confidence level must be between 0 and 1".to_string(),
        ));
    }

    for (level, z) in [(0.90, 1.645), (0.95, 1.96), (0.99, 2.576)] {
        if (confidence_level - level).abs() < 1e-12 {
            return Ok(z);
        }
    }

    let normal =
        Normal::new(0.0, 1.0).map_err(|e| ForecastError::ValidationError(e.to_string()))?;
    Ok(normal.inverse_cdf(0.5 + confidence_level / 2.0))
}

/// Normalize confidences so they sum to one
///
/// When every confidence is zero the members are weighted equally.
pub fn normalize_weights(confidences: &[f64]) -> Vec<f64> {
    let total: f64 = confidences.iter().sum();
    if total > 0.0 {
        confidences.iter().map(|c| c / total).collect()
    } else {
        let n = confidences.len() as f64;
        confidences.iter().map(|_| 1.0 / n).collect()
    }
}

/// Blend member forecasts into one ensemble forecast
pub fn combine_forecasts(
    members: Vec<ModelForecast>,
    settings: &IntervalSettings,
) -> Result<EnsembleForecast> {
    let Some(first) = members.first() else {
        return Err(ForecastError::NoGeneratorsAvailable(
            "No member forecasts to combine".to_string(),
        ));
    };

    let horizon = first.horizon();
    if let Some(m) = members.iter().find(|m| m.horizon() != horizon) {
        return Err(ForecastError::ValidationError(format!(
            "Model '{}' has horizon {}, expected {}",
            m.model_id(),
            m.horizon(),
            horizon
        )));
    }

    let confidences: Vec<f64> = members.iter().map(|m| m.confidence()).collect();
    let weights = normalize_weights(&confidences);

    let point: Vec<f64> = (0..horizon)
        .map(|d| {
            members
                .iter()
                .zip(&weights)
                .map(|(m, w)| w * m.predictions()[d])
                .sum::<f64>()
                .max(0.0)
        })
        .collect();

    let standard_error = match settings.standard_error {
        StandardErrorMethod::Fixed { value } => {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ForecastError::ValidationError(format!(
                    "Standard error must be a non-negative number, got {}",
                    value
                )));
            }
            value
        }
        StandardErrorMethod::HoldoutRmse => {
            let mut sigma = 0.0;
            for (m, w) in members.iter().zip(&weights) {
                let accuracy = m.validation().ok_or_else(|| {
                    ForecastError::ValidationError(format!(
                        "Model '{}' has no holdout accuracy for the RMSE standard error",
                        m.model_id()
                    ))
                })?;
                sigma += w * accuracy.rmse;
            }
            sigma
        }
    };

    let z = z_score(settings.confidence_level)?;
    let half_width = z * standard_error;

    let lower = point.iter().map(|p| p - half_width).collect();
    let upper = point.iter().map(|p| p + half_width).collect();

    let weights = members
        .iter()
        .zip(weights)
        .map(|(m, weight)| ModelWeight {
            model_id: m.model_id().to_string(),
            weight,
        })
        .collect();

    Ok(EnsembleForecast {
        point,
        lower,
        upper,
        confidence_level: settings.confidence_level,
        standard_error,
        z_score: z,
        weights,
        members,
        dropped: Vec::new(),
    })
}

/// Run every registered generator and blend the survivors
pub fn run_ensemble(
    registry: &GeneratorRegistry,
    features: Arc<[FeatureVector]>,
    options: &EnsembleOptions,
) -> Result<EnsembleForecast> {
    if registry.is_empty() {
        return Err(ForecastError::NoGeneratorsAvailable(
            "Generator registry is empty".to_string(),
        ));
    }
    if features.len() < MIN_HISTORY {
        return Err(ForecastError::InsufficientData {
            required: MIN_HISTORY,
            actual: features.len(),
        });
    }
    if options.horizon == 0 {
        return Err(ForecastError::InvalidParameter(
            "Forecast horizon must be positive".to_string(),
        ));
    }

    let outcomes = match options.mode {
        ExecutionMode::Sequential => run_sequential(registry, &features, options),
        ExecutionMode::Parallel => run_parallel(registry, features, options),
    };

    let mut members = Vec::new();
    let mut dropped = Vec::new();
    for (entry, outcome) in registry.entries().iter().zip(outcomes) {
        match outcome {
            Ok(forecast) => {
                debug!(
                    model_id = %entry.id,
                    confidence = forecast.confidence(),
                    "generator finished"
                );
                members.push(forecast);
            }
            Err(reason) => {
                warn!(model_id = %entry.id, %reason, "dropping generator from ensemble");
                dropped.push(DroppedGenerator {
                    model_id: entry.id.clone(),
                    reason,
                });
            }
        }
    }

    if members.is_empty() {
        let reasons: Vec<String> = dropped
            .iter()
            .map(|d| format!("{}: {}", d.model_id, d.reason))
            .collect();
        return Err(ForecastError::NoGeneratorsAvailable(format!(
            "every generator failed ({})",
            reasons.join("; ")
        )));
    }

    let mut ensemble = combine_forecasts(members, &options.interval)?;
    info!(
        members = ensemble.members().len(),
        dropped = dropped.len(),
        horizon = ensemble.horizon(),
        "ensemble forecast combined"
    );
    ensemble.dropped = dropped;

    Ok(ensemble)
}

type Outcome = std::result::Result<ModelForecast, String>;

fn run_sequential(
    registry: &GeneratorRegistry,
    features: &[FeatureVector],
    options: &EnsembleOptions,
) -> Vec<Outcome> {
    let deadline = options.timeout.map(|t| Instant::now() + t);

    registry
        .entries()
        .iter()
        .map(|entry| {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(format!("timed out after {:?}", options.timeout.unwrap_or_default()));
            }
            entry
                .generator
                .generate(&entry.id, features, options.horizon, options.validation_window)
                .map_err(|e| e.to_string())
        })
        .collect()
}

fn run_parallel(
    registry: &GeneratorRegistry,
    features: Arc<[FeatureVector]>,
    options: &EnsembleOptions,
) -> Vec<Outcome> {
    let n = registry.len();
    let mut outcomes: Vec<Option<Outcome>> = (0..n).map(|_| None).collect();
    let (tx, rx) = crossbeam_channel::unbounded::<(usize, Outcome)>();

    let mut spawned = 0;
    for (slot, entry) in registry.entries().iter().enumerate() {
        let tx = tx.clone();
        let features = Arc::clone(&features);
        let entry = entry.clone();
        let (horizon, validation_window) = (options.horizon, options.validation_window);

        let handle = thread::Builder::new()
            .name(format!("generator-{}", entry.id))
            .spawn(move || {
                let outcome = entry
                    .generator
                    .generate(&entry.id, &features, horizon, validation_window)
                    .map_err(|e| e.to_string());
                // The receiver is gone if this generator was abandoned
                let _ = tx.send((slot, outcome));
            });

        match handle {
            Ok(_) => spawned += 1,
            Err(e) => outcomes[slot] = Some(Err(format!("failed to start: {}", e))),
        }
    }
    drop(tx);

    let deadline = options.timeout.map(|t| Instant::now() + t);
    for _ in 0..spawned {
        let message = match deadline {
            Some(d) => rx.recv_deadline(d).ok(),
            None => rx.recv().ok(),
        };
        let Some((slot, outcome)) = message else {
            break;
        };
        outcomes[slot] = Some(outcome);
    }

    outcomes
        .into_iter()
        .map(|o| {
            o.unwrap_or_else(|| {
                Err(format!(
                    "timed out after {:?}",
                    options.timeout.unwrap_or_default()
                ))
            })
        })
        .collect()
}
