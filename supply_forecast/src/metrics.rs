//! Trend analysis, composite scoring and risk bucketing

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use supply_math::statistics::{ensure_finite, pivoted_mean, scaled_population_std_dev};

/// Number of trailing points averaged as the recent level
pub const RECENT_WINDOW: usize = 7;

/// Change percentage beyond which a trend is called strong
pub const INSIGHT_CHANGE_THRESHOLD: f64 = 5.0;

/// Volatility above which smoothing is recommended
pub const DEFAULT_VOLATILITY_THRESHOLD: f64 = 10.0;

/// Upper bound (exclusive) of the LOW bucket
pub const LOW_RISK_UPPER: f64 = 25.0;
/// Upper bound (inclusive) of the MEDIUM bucket
pub const MEDIUM_RISK_UPPER: f64 = 50.0;
/// Upper bound (exclusive) of the HIGH bucket
pub const HIGH_RISK_UPPER: f64 = 75.0;

/// Direction of a trend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Up,
    Down,
    Stable,
}

/// Summary of a series' recent behaviour
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendAnalysis {
    pub direction: TrendDirection,
    pub change_percentage: f64,
    /// Population standard deviation of the whole series
    pub volatility: f64,
    /// Absolute change percentage
    pub trend_strength: f64,
    pub recent_avg: f64,
    pub earlier_avg: f64,
}

/// Outcome of a trend analysis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "trend", rename_all = "snake_case")]
pub enum TrendReport {
    /// Fewer than two points
    InsufficientData,
    Analysis(TrendAnalysis),
}

impl TrendReport {
    /// The analysis, unless the series was too short
    pub fn analysis(&self) -> Option<&TrendAnalysis> {
        match self {
            TrendReport::InsufficientData => None,
            TrendReport::Analysis(a) => Some(a),
        }
    }

    /// Whether this is the insufficient-data sentinel
    pub fn is_insufficient(&self) -> bool {
        matches!(self, TrendReport::InsufficientData)
    }
}

/// Analyze the trend of a numeric series
///
/// The recent level is the mean of the last 7 points (the last half,
/// rounded up, for shorter series); the earlier level is the mean of the
/// first half, rounded down.
pub fn analyze_trend(values: &[f64]) -> Result<TrendReport> {
    if values.len() < 2 {
        return Ok(TrendReport::InsufficientData);
    }
    ensure_finite(values, "Trend series").map_err(|e| ForecastError::ValidationError(e.to_string()))?;

    let n = values.len();
    let recent_len = if n >= RECENT_WINDOW {
        RECENT_WINDOW
    } else {
        n.div_ceil(2)
    };
    let recent_avg = pivoted_mean(&values[n - recent_len..])?;
    let earlier_avg = pivoted_mean(&values[..n / 2])?;

    let change_percentage = if earlier_avg != 0.0 {
        (recent_avg - earlier_avg) / earlier_avg * 100.0
    } else {
        0.0
    };

    let volatility = scaled_population_std_dev(values)?;

    if ![recent_avg, earlier_avg, change_percentage, volatility]
        .iter()
        .all(|v| v.is_finite())
    {
        return Err(ForecastError::ValidationError(
            "Trend statistics overflowed; series values are out of range".to_string(),
        ));
    }

    let direction = if change_percentage > 0.0 {
        TrendDirection::Up
    } else if change_percentage < 0.0 {
        TrendDirection::Down
    } else {
        TrendDirection::Stable
    };

    Ok(TrendReport::Analysis(TrendAnalysis {
        direction,
        change_percentage,
        volatility,
        trend_strength: change_percentage.abs(),
        recent_avg,
        earlier_avg,
    }))
}

/// Classification of a trend for presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Insight {
    StrongPositive,
    DecliningNeedsAttention,
    Stable,
}

/// Classify a trend analysis
pub fn insight_for(analysis: &TrendAnalysis) -> Insight {
    match analysis.direction {
        TrendDirection::Up if analysis.change_percentage > INSIGHT_CHANGE_THRESHOLD => {
            Insight::StrongPositive
        }
        TrendDirection::Down if analysis.change_percentage < -INSIGHT_CHANGE_THRESHOLD => {
            Insight::DecliningNeedsAttention
        }
        _ => Insight::Stable,
    }
}

/// Follow-up actions suggested by a trend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    ApplySmoothing,
    InvestigateRootCauses,
    ReviewOperatingProcedures,
}

/// Recommendations for a trend analysis
pub fn recommendations_for(analysis: &TrendAnalysis, volatility_threshold: f64) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();

    if analysis.volatility > volatility_threshold {
        recommendations.push(Recommendation::ApplySmoothing);
    }
    if analysis.direction == TrendDirection::Down {
        recommendations.push(Recommendation::InvestigateRootCauses);
        recommendations.push(Recommendation::ReviewOperatingProcedures);
    }

    recommendations
}

/// Risk bucket of a 0–100 score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Bucket a score: LOW below 25, MEDIUM from 25 up to and including 50,
    /// HIGH below 75, CRITICAL from 75
    pub fn from_score(score: f64) -> Self {
        if score < LOW_RISK_UPPER {
            RiskLevel::Low
        } else if score <= MEDIUM_RISK_UPPER {
            RiskLevel::Medium
        } else if score < HIGH_RISK_UPPER {
            RiskLevel::High
        } else {
            RiskLevel::Critical
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

/// One sub-metric's share of a composite score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorContribution {
    pub metric: String,
    pub value: f64,
    /// Weight normalized over all factors
    pub weight: f64,
    /// `weight * value`
    pub contribution: f64,
}

/// Weighted aggregate of sub-metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeScore {
    pub value: f64,
    pub risk_level: RiskLevel,
    pub factors: Vec<FactorContribution>,
}

/// Weighted mean of named sub-metrics, clamped to [0, 100]
///
/// Metric and weight key sets must match exactly.
pub fn composite_score(
    metrics: &BTreeMap<String, f64>,
    weights: &BTreeMap<String, f64>,
) -> Result<CompositeScore> {
    if metrics.is_empty() {
        return Err(ForecastError::ValidationError(
            "Composite score needs at least one metric".to_string(),
        ));
    }

    if !metrics.keys().eq(weights.keys()) {
        let missing: Vec<&str> = metrics
            .keys()
            .filter(|k| !weights.contains_key(*k))
            .map(String::as_str)
            .collect();
        let unknown: Vec<&str> = weights
            .keys()
            .filter(|k| !metrics.contains_key(*k))
            .map(String::as_str)
            .collect();
        return Err(ForecastError::ValidationError(format!(
            "Metric and weight keys differ (no weight for {:?}, no metric for {:?})",
            missing, unknown
        )));
    }

    for (name, value) in metrics {
        if !value.is_finite() {
            return Err(ForecastError::ValidationError(format!(
                "Metric '{}' is not a finite number",
                name
            )));
        }
    }
    for (name, weight) in weights {
        if !weight.is_finite() || *weight < 0.0 {
            return Err(ForecastError::ValidationError(format!(
                "Weight '{}' must be a non-negative number, got {}",
                name, weight
            )));
        }
    }

    // Scale by the largest weight so the sum cannot overflow
    let largest = weights.values().fold(0.0_f64, |acc, w| acc.max(*w));
    if largest <= 0.0 {
        return Err(ForecastError::ValidationError(
            "Weights must not all be zero".to_string(),
        ));
    }
    let total_weight: f64 = weights.values().map(|w| w / largest).sum();

    let factors: Vec<FactorContribution> = metrics
        .iter()
        .map(|(name, &value)| {
            let weight = weights[name] / largest / total_weight;
            FactorContribution {
                metric: name.clone(),
                value,
                weight,
                contribution: weight * value,
            }
        })
        .collect();

    let raw: f64 = factors.iter().map(|f| f.contribution).sum();
    if !raw.is_finite() {
        return Err(ForecastError::ValidationError(
            "Composite score overflowed; metric values are out of range".to_string(),
        ));
    }
    let value = raw.clamp(0.0, 100.0);

    Ok(CompositeScore {
        value,
        risk_level: RiskLevel::from_score(value),
        factors,
    })
}

/// Sub-metrics of one risk category (supplier, operational, financial, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskCategory {
    pub name: String,
    pub metrics: BTreeMap<String, f64>,
    pub weights: BTreeMap<String, f64>,
}

/// Per-category scores and their weighted overall score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskProfile {
    pub categories: BTreeMap<String, CompositeScore>,
    pub overall: CompositeScore,
}

/// Score every category, then combine the category scores with `category_weights`
pub fn score_risk_categories(
    categories: &[RiskCategory],
    category_weights: &BTreeMap<String, f64>,
) -> Result<RiskProfile> {
    let mut scores = BTreeMap::new();
    for category in categories {
        let score = composite_score(&category.metrics, &category.weights)?;
        if scores.insert(category.name.clone(), score).is_some() {
            return Err(ForecastError::ValidationError(format!(
                "Risk category '{}' appears more than once",
                category.name
            )));
        }
    }

    let category_values: BTreeMap<String, f64> = scores
        .iter()
        .map(|(name, score)| (name.clone(), score.value))
        .collect();
    let overall = composite_score(&category_values, category_weights)?;

    Ok(RiskProfile {
        categories: scores,
        overall,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn analysis(values: &[f64]) -> TrendAnalysis {
        *analyze_trend(values).unwrap().analysis().unwrap()
    }

    #[test]
    fn test_short_series_uses_halves() {
        // len 5: recent = last 3, earlier = first 2
        let a = analysis(&[10.0, 10.0, 20.0, 20.0, 20.0]);
        assert_relative_eq!(a.recent_avg, 20.0);
        assert_relative_eq!(a.earlier_avg, 10.0);
        assert_relative_eq!(a.change_percentage, 100.0);

        // len 2: first point against last point
        let a = analysis(&[50.0, 40.0]);
        assert_relative_eq!(a.earlier_avg, 50.0);
        assert_relative_eq!(a.recent_avg, 40.0);
        assert_eq!(a.direction, TrendDirection::Down);
    }

    #[test]
    fn test_zero_baseline_is_stable() {
        let a = analysis(&[0.0, 0.0, 5.0, 5.0]);
        assert_eq!(a.change_percentage, 0.0);
        assert_eq!(a.direction, TrendDirection::Stable);
        assert!(a.volatility > 0.0);
    }

    #[test]
    fn test_non_finite_rejected() {
        assert!(analyze_trend(&[1.0, f64::INFINITY]).is_err());
    }

    #[test]
    fn test_recommendations() {
        let falling = analysis(&[100.0, 100.0, 100.0, 60.0, 60.0, 60.0]);
        assert_eq!(
            recommendations_for(&falling, DEFAULT_VOLATILITY_THRESHOLD),
            vec![
                Recommendation::ApplySmoothing,
                Recommendation::InvestigateRootCauses,
                Recommendation::ReviewOperatingProcedures,
            ]
        );

        let flat = analysis(&[10.0, 10.0, 10.0]);
        assert!(recommendations_for(&flat, DEFAULT_VOLATILITY_THRESHOLD).is_empty());
    }

    #[test]
    fn test_risk_level_display() {
        assert_eq!(RiskLevel::Critical.to_string(), "CRITICAL");
        assert!(RiskLevel::Low < RiskLevel::Medium);
    }
}
