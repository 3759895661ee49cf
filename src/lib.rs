//! # Supply Pulse
//!
//! Umbrella crate for the supply-chain analytics workspace.
//!
//! - [`math`]: rolling windows, linear regression and regression trees
//! - [`forecast`]: history providers, feature derivation, the generator
//!   ensemble, trend and risk metrics and the analysis pipeline
//!
//! ## Example
//!
//! ```
//! use supply_pulse_workspace::forecast::metrics::{composite_score, RiskLevel};
//! use std::collections::BTreeMap;
//!
//! let metrics: BTreeMap<String, f64> =
//!     [("a".to_string(), 90.0), ("b".to_string(), 10.0)].into();
//! let weights: BTreeMap<String, f64> =
//!     [("a".to_string(), 1.0), ("b".to_string(), 1.0)].into();
//!
//! let score = composite_score(&metrics, &weights).unwrap();
//! assert_eq!(score.value, 50.0);
//! assert_eq!(score.risk_level, RiskLevel::Medium);
//! ```

pub use supply_forecast as forecast;
pub use supply_math as math;

pub use supply_forecast::{
    AnalysisRequest, AnalyticsPipeline, ForecastError, MetricKind, PipelineConfig, PipelineReport,
};

/// Names of the workspace member crates
pub fn member_crates() -> [&'static str; 2] {
    [supply_math::NAME, supply_forecast::NAME]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_crates() {
        assert_eq!(member_crates(), ["supply_math", "supply_forecast"]);
    }

    #[test]
    fn test_facade_reaches_members() {
        let window = math::RollingWindow::new(3).unwrap();
        assert_eq!(window.period(), 3);
        assert_eq!(forecast::features::MIN_HISTORY, 30);
    }
}
