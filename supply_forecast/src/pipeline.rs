//! End-to-end analysis of one entity and metric
//!
//! Fetches the history once, analyzes its trend, optionally forecasts it
//! with the generator ensemble and optionally scores a set of sub-metrics.

use crate::config::PipelineConfig;
use crate::data::{HistoryProvider, MetricKind};
use crate::ensemble::{run_ensemble, EnsembleForecast, EnsembleOptions, IntervalSettings};
use crate::error::{ForecastError, Result};
use crate::features::{derive_features, FeatureVector};
use crate::metrics::{
    analyze_trend, composite_score, insight_for, recommendations_for, CompositeScore, Insight,
    Recommendation, TrendReport,
};
use crate::models::GeneratorRegistry;
use crate::utils::{future_timestamps, sampling_interval};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// What to analyze
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    pub entity_id: String,
    pub metric: MetricKind,
    /// Forecast horizon in sampling steps (`None` uses the configured default)
    pub horizon: Option<usize>,
    pub include_forecast: bool,
    /// Interval confidence level (`None` uses the configured level)
    pub confidence_level: Option<f64>,
    /// Sub-metrics for the composite score; empty means no score
    pub sub_metrics: BTreeMap<String, f64>,
    /// Weights replacing the configured scoring weights
    pub weight_overrides: BTreeMap<String, f64>,
    /// Generator timeout (`None` uses the configured timeout)
    pub timeout: Option<Duration>,
}

impl AnalysisRequest {
    /// Request a trend analysis and forecast with default settings
    pub fn new(entity_id: impl Into<String>, metric: MetricKind) -> Self {
        Self {
            entity_id: entity_id.into(),
            metric,
            horizon: None,
            include_forecast: true,
            confidence_level: None,
            sub_metrics: BTreeMap::new(),
            weight_overrides: BTreeMap::new(),
            timeout: None,
        }
    }

    pub fn with_horizon(mut self, horizon: usize) -> Self {
        self.horizon = Some(horizon);
        self
    }

    pub fn without_forecast(mut self) -> Self {
        self.include_forecast = false;
        self
    }

    pub fn with_confidence_level(mut self, level: f64) -> Self {
        self.confidence_level = Some(level);
        self
    }

    pub fn with_sub_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.sub_metrics.insert(name.into(), value);
        self
    }

    pub fn with_weight(mut self, name: impl Into<String>, weight: f64) -> Self {
        self.weight_overrides.insert(name.into(), weight);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Result of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub entity_id: String,
    pub metric: MetricKind,
    pub observations: usize,
    pub trend: TrendReport,
    pub insight: Option<Insight>,
    pub recommendations: Vec<Recommendation>,
    /// Dates the forecast values apply to
    pub forecast_dates: Vec<DateTime<Utc>>,
    pub forecast: Option<EnsembleForecast>,
    /// Trend of the forecast point values
    pub forecast_trend: Option<TrendReport>,
    pub composite: Option<CompositeScore>,
}

impl PipelineReport {
    /// Convert the report to JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Trend, forecast and scoring pipeline over a history provider
#[derive(Debug)]
pub struct AnalyticsPipeline<P: HistoryProvider> {
    provider: P,
    registry: GeneratorRegistry,
    config: PipelineConfig,
}

impl<P: HistoryProvider> AnalyticsPipeline<P> {
    /// Create a pipeline whose generators come from `config`
    pub fn new(provider: P, config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let registry = config.registry()?;
        Ok(Self {
            provider,
            registry,
            config,
        })
    }

    /// Create a pipeline with an explicit generator registry
    pub fn with_registry(
        provider: P,
        registry: GeneratorRegistry,
        config: PipelineConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            provider,
            registry,
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn registry(&self) -> &GeneratorRegistry {
        &self.registry
    }

    /// Run the full analysis for one request
    pub fn analyze(&self, request: &AnalysisRequest) -> Result<PipelineReport> {
        let series = self.provider.fetch(&request.entity_id, request.metric)?;
        info!(
            entity_id = %request.entity_id,
            metric = %request.metric,
            observations = series.len(),
            "analyzing series"
        );

        let values = series.values();
        let trend = analyze_trend(&values)?;
        let (insight, recommendations) = match trend.analysis() {
            Some(analysis) => (
                Some(insight_for(analysis)),
                recommendations_for(analysis, self.config.volatility_threshold),
            ),
            None => (None, Vec::new()),
        };

        let mut forecast_dates = Vec::new();
        let mut forecast = None;
        let mut forecast_trend = None;
        if request.include_forecast {
            let features: Arc<[FeatureVector]> = derive_features(&series)?.into();
            let options = self.ensemble_options(request)?;
            let result = run_ensemble(&self.registry, features, &options)?;

            if let Some(last) = series.last_timestamp() {
                let step = sampling_interval(&series.timestamps());
                forecast_dates = future_timestamps(last, result.horizon(), step)?;
            }
            forecast_trend = Some(analyze_trend(result.point())?);
            forecast = Some(result);
        }

        let composite = if request.sub_metrics.is_empty() {
            None
        } else {
            Some(self.score(&request.sub_metrics, &request.weight_overrides)?)
        };

        Ok(PipelineReport {
            entity_id: request.entity_id.clone(),
            metric: request.metric,
            observations: series.len(),
            trend,
            insight,
            recommendations,
            forecast_dates,
            forecast,
            forecast_trend,
            composite,
        })
    }

    /// Composite score of `metrics`
    ///
    /// Each metric is weighted by its override if present, else by its
    /// configured scoring weight, else by 1.
    pub fn score(
        &self,
        metrics: &BTreeMap<String, f64>,
        overrides: &BTreeMap<String, f64>,
    ) -> Result<CompositeScore> {
        if let Some(name) = overrides.keys().find(|k| !metrics.contains_key(*k)) {
            return Err(ForecastError::ValidationError(format!(
                "Weight override '{}' has no matching metric",
                name
            )));
        }

        let weights: BTreeMap<String, f64> = metrics
            .keys()
            .map(|name| {
                let weight = overrides
                    .get(name)
                    .or_else(|| self.config.scoring_weights.get(name))
                    .copied()
                    .unwrap_or(1.0);
                (name.clone(), weight)
            })
            .collect();

        let score = composite_score(metrics, &weights)?;
        debug!(score = score.value, risk = %score.risk_level, "composite score");
        Ok(score)
    }

    fn ensemble_options(&self, request: &AnalysisRequest) -> Result<EnsembleOptions> {
        let horizon = request.horizon.unwrap_or(self.config.default_horizon);
        if horizon == 0 {
            return Err(ForecastError::InvalidParameter(
                "Forecast horizon must be positive".to_string(),
            ));
        }

        Ok(EnsembleOptions {
            horizon,
            validation_window: self.config.validation_window,
            interval: IntervalSettings {
                confidence_level: request
                    .confidence_level
                    .unwrap_or(self.config.interval.confidence_level),
                standard_error: self.config.interval.standard_error,
            },
            mode: self.config.execution,
            timeout: request.timeout.or_else(|| self.config.timeout()),
        })
    }
}
