//! Pipeline configuration
//!
//! Loaded from TOML; every field has a default so an empty document is a
//! valid configuration.
//!
//! ```toml
//! validation_window = 14
//! execution = "parallel"
//! timeout_ms = 2000
//!
//! [interval]
//! confidence_level = 0.95
//! standard_error = { method = "fixed", value = 5.0 }
//!
//! [[generators]]
//! id = "weekly"
//! kind = "seasonal_naive"
//! season_length = 7
//!
//! [scoring_weights]
//! on_time_delivery = 0.4
//! quality = 0.6
//! ```

use crate::ensemble::{z_score, ExecutionMode, IntervalSettings, StandardErrorMethod};
use crate::error::{ForecastError, Result};
use crate::metrics::DEFAULT_VOLATILITY_THRESHOLD;
use crate::models::{default_generators, GeneratorRegistry, RegisteredGenerator};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Settings for the analytics pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Generators, in ensemble reduction order
    pub generators: Vec<RegisteredGenerator>,
    /// Holdout length used to measure generator confidence
    pub validation_window: usize,
    pub interval: IntervalSettings,
    pub execution: ExecutionMode,
    /// Per-request generator timeout in milliseconds
    pub timeout_ms: Option<u64>,
    /// Volatility above which smoothing is recommended
    pub volatility_threshold: f64,
    /// Horizon used when a request does not name one
    pub default_horizon: usize,
    /// Default composite-score weights, by metric name
    pub scoring_weights: BTreeMap<String, f64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            generators: default_generators(),
            validation_window: 14,
            interval: IntervalSettings::default(),
            execution: ExecutionMode::default(),
            timeout_ms: None,
            volatility_threshold: DEFAULT_VOLATILITY_THRESHOLD,
            default_horizon: 30,
            scoring_weights: BTreeMap::new(),
        }
    }
}

impl PipelineConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&source)?;
        info!(
            path = %path.display(),
            generators = config.generators.len(),
            "loaded pipeline configuration"
        );
        Ok(config)
    }

    /// Check every setting
    pub fn validate(&self) -> Result<()> {
        if self.validation_window == 0 {
            return Err(config_error("validation_window must be positive"));
        }
        if self.default_horizon == 0 {
            return Err(config_error("default_horizon must be positive"));
        }
        if !(self.volatility_threshold.is_finite() && self.volatility_threshold >= 0.0) {
            return Err(config_error("volatility_threshold must be a non-negative number"));
        }

        z_score(self.interval.confidence_level).map_err(|e| config_error(&e.to_string()))?;
        if let StandardErrorMethod::Fixed { value } = self.interval.standard_error {
            if !(value.is_finite() && value >= 0.0) {
                return Err(config_error("fixed standard error must be a non-negative number"));
            }
        }

        for (name, weight) in &self.scoring_weights {
            if !(weight.is_finite() && *weight >= 0.0) {
                return Err(config_error(&format!(
                    "scoring weight '{}' must be a non-negative number",
                    name
                )));
            }
        }

        let mut seen = HashSet::new();
        for entry in &self.generators {
            if !seen.insert(entry.id.as_str()) {
                return Err(config_error(&format!("duplicate generator id '{}'", entry.id)));
            }
            entry
                .generator
                .validate()
                .map_err(|e| config_error(&format!("generator '{}': {}", entry.id, e)))?;
        }
        if self.generators.is_empty() {
            warn!("pipeline configured without forecast generators");
        }

        Ok(())
    }

    /// Build the generator registry
    pub fn registry(&self) -> Result<GeneratorRegistry> {
        GeneratorRegistry::try_from(self.generators.clone())
    }

    /// Generator timeout, if configured
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

fn config_error(message: &str) -> ForecastError {
    ForecastError::ConfigError(message.to_string())
}
