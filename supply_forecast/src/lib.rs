//! # Supply Forecast
//!
//! KPI trend aggregation and ensemble demand forecasting for supply-chain
//! entities (products, suppliers, cost centres).
//!
//! ## Features
//!
//! - Observation series with CSV and in-memory history providers
//! - Calendar, lag and rolling-window feature derivation
//! - Forecast generators (Seasonal Naive, Random Forest, Gradient Boosting)
//! - Confidence-weighted ensemble with symmetric confidence intervals
//! - Trend analysis, insights, recommendations and composite risk scores
//! - TOML pipeline configuration
//!
//! ## Quick Start
//!
//! ```no_run
//! use supply_forecast::data::{DataLoader, InMemoryHistory, MetricKind};
//! use supply_forecast::pipeline::{AnalysisRequest, AnalyticsPipeline};
//! use supply_forecast::PipelineConfig;
//!
//! # fn main() -> supply_forecast::error::Result<()> {
//! // Load history
//! let series = DataLoader::from_csv("demand.csv", "SKU-001", MetricKind::Demand)?;
//! let provider = InMemoryHistory::new().with_series(series);
//!
//! // Build the pipeline with default generators
//! let pipeline = AnalyticsPipeline::new(provider, PipelineConfig::default())?;
//!
//! // Two-week forecast plus a supplier score
//! let request = AnalysisRequest::new("SKU-001", MetricKind::Demand)
//!     .with_horizon(14)
//!     .with_sub_metric("on_time_delivery", 92.0)
//!     .with_sub_metric("quality", 88.0);
//! let report = pipeline.analyze(&request)?;
//!
//! println!("{}", report.to_json()?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod data;
pub mod ensemble;
pub mod error;
pub mod features;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod utils;

// Re-export commonly used types
pub use crate::config::PipelineConfig;
pub use crate::data::{DataLoader, HistoryProvider, MetricKind, ObservationSeries};
pub use crate::ensemble::{combine_forecasts, run_ensemble, EnsembleForecast, EnsembleOptions};
pub use crate::error::ForecastError;
pub use crate::features::{derive_features, FeatureVector};
pub use crate::metrics::{analyze_trend, composite_score, RiskLevel, TrendReport};
pub use crate::models::{ForecastGenerator, Generator, GeneratorRegistry, ModelForecast};
pub use crate::pipeline::{AnalysisRequest, AnalyticsPipeline, PipelineReport};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
