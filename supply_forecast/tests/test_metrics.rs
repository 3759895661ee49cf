use approx::assert_relative_eq;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rstest::rstest;
use std::collections::BTreeMap;
use supply_forecast::metrics::{
    analyze_trend, composite_score, insight_for, recommendations_for, score_risk_categories,
    Insight, Recommendation, RiskCategory, RiskLevel, TrendDirection, TrendReport,
    DEFAULT_VOLATILITY_THRESHOLD,
};
use supply_forecast::ForecastError;

fn map(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

#[test]
fn test_step_up_trend() {
    let mut values = vec![100.0; 7];
    values.extend(vec![150.0; 7]);

    let report = analyze_trend(&values).unwrap();
    let analysis = report.analysis().unwrap();

    assert_eq!(analysis.direction, TrendDirection::Up);
    assert_relative_eq!(analysis.recent_avg, 150.0);
    assert_relative_eq!(analysis.earlier_avg, 100.0);
    assert_relative_eq!(analysis.change_percentage, 50.0);
    assert_relative_eq!(analysis.trend_strength, 50.0);
    assert_relative_eq!(analysis.volatility, 25.0);

    assert_eq!(insight_for(analysis), Insight::StrongPositive);
    assert_eq!(
        recommendations_for(analysis, DEFAULT_VOLATILITY_THRESHOLD),
        vec![Recommendation::ApplySmoothing]
    );
}

#[test]
fn test_single_point_is_insufficient() {
    let report = analyze_trend(&[42.0]).unwrap();
    assert!(report.is_insufficient());
    assert_eq!(
        serde_json::to_string(&report).unwrap(),
        r#"{"trend":"insufficient_data"}"#
    );
    assert!(analyze_trend(&[]).unwrap().is_insufficient());
}

#[test]
fn test_short_series_uses_halves() {
    // Recent is the last two points, earlier the first one
    let report = analyze_trend(&[10.0, 20.0, 30.0]).unwrap();
    let analysis = report.analysis().unwrap();
    assert_relative_eq!(analysis.recent_avg, 25.0);
    assert_relative_eq!(analysis.earlier_avg, 10.0);
    assert_relative_eq!(analysis.change_percentage, 150.0);
}

#[test]
fn test_zero_baseline_is_stable() {
    let report = analyze_trend(&[0.0, 0.0, 5.0, 5.0]).unwrap();
    let analysis = report.analysis().unwrap();
    assert_relative_eq!(analysis.change_percentage, 0.0);
    assert_eq!(analysis.direction, TrendDirection::Stable);
}

#[test]
fn test_declining_trend_recommendations() {
    let values: Vec<f64> = (0..20).map(|i| 100.0 - i as f64).collect();
    let report = analyze_trend(&values).unwrap();
    let analysis = report.analysis().unwrap();

    assert_eq!(analysis.direction, TrendDirection::Down);
    assert_eq!(insight_for(analysis), Insight::DecliningNeedsAttention);
    assert_eq!(
        recommendations_for(analysis, 100.0),
        vec![
            Recommendation::InvestigateRootCauses,
            Recommendation::ReviewOperatingProcedures
        ]
    );
}

#[test]
fn test_small_change_is_stable_insight() {
    let mut values = vec![100.0; 7];
    values.extend(vec![103.0; 7]);
    let report = analyze_trend(&values).unwrap();
    assert_eq!(insight_for(report.analysis().unwrap()), Insight::Stable);
}

#[test]
fn test_non_finite_trend_input() {
    let err = analyze_trend(&[1.0, f64::NAN]).unwrap_err();
    assert!(matches!(err, ForecastError::ValidationError(_)));
}

#[test]
fn test_analysis_json_shape() {
    let report = analyze_trend(&[1.0, 2.0]).unwrap();
    let json: serde_json::Value = serde_json::to_value(report).unwrap();
    assert_eq!(json["trend"], "analysis");
    assert_eq!(json["direction"], "up");

    let back: TrendReport = serde_json::from_value(json).unwrap();
    assert_eq!(back, report);
}

#[test]
fn test_equal_weight_composite() {
    let score =
        composite_score(&map(&[("a", 90.0), ("b", 10.0)]), &map(&[("a", 1.0), ("b", 1.0)]))
            .unwrap();

    assert_relative_eq!(score.value, 50.0);
    assert_eq!(score.risk_level, RiskLevel::Medium);
    assert_eq!(score.factors.len(), 2);
    assert_relative_eq!(score.factors[0].contribution, 45.0);
}

#[test]
fn test_weights_are_normalized() {
    let score = composite_score(
        &map(&[("delivery", 80.0), ("quality", 40.0)]),
        &map(&[("delivery", 3.0), ("quality", 1.0)]),
    )
    .unwrap();
    assert_relative_eq!(score.value, 70.0, epsilon = 1e-9);
    assert_eq!(score.risk_level, RiskLevel::High);
}

#[test]
fn test_score_is_clamped() {
    let high = composite_score(&map(&[("a", 250.0)]), &map(&[("a", 1.0)])).unwrap();
    assert_relative_eq!(high.value, 100.0);
    assert_eq!(high.risk_level, RiskLevel::Critical);

    let low = composite_score(&map(&[("a", -20.0)]), &map(&[("a", 1.0)])).unwrap();
    assert_relative_eq!(low.value, 0.0);
    assert_eq!(low.risk_level, RiskLevel::Low);
}

#[test]
fn test_huge_weights_do_not_overflow() {
    let score =
        composite_score(&map(&[("a", 90.0), ("b", 10.0)]), &map(&[("a", 1e308), ("b", 1e308)]))
            .unwrap();
    assert_relative_eq!(score.value, 50.0, epsilon = 1e-9);
    assert_eq!(score.risk_level, RiskLevel::Medium);

    let total: f64 = score.factors.iter().map(|f| f.weight).sum();
    assert_relative_eq!(total, 1.0, epsilon = 1e-12);

    let skewed = composite_score(
        &map(&[("a", 80.0), ("b", 0.0)]),
        &map(&[("a", f64::MAX), ("b", f64::MAX / 3.0)]),
    )
    .unwrap();
    assert_relative_eq!(skewed.value, 60.0, epsilon = 1e-9);
}

#[test]
fn test_extreme_metrics_clamp() {
    let top = composite_score(
        &map(&[("a", f64::MAX), ("b", f64::MAX)]),
        &map(&[("a", 1.0), ("b", 1.0)]),
    )
    .unwrap();
    assert_eq!(top.value, 100.0);
    assert_eq!(top.risk_level, RiskLevel::Critical);

    let cancelled = composite_score(
        &map(&[("a", -f64::MAX), ("b", f64::MAX)]),
        &map(&[("a", 1.0), ("b", 1.0)]),
    )
    .unwrap();
    assert_eq!(cancelled.value, 0.0);
    assert_eq!(cancelled.risk_level, RiskLevel::Low);
}

#[test]
fn test_trend_on_huge_constant_series() {
    let report = analyze_trend(&[1e308; 4]).unwrap();
    let analysis = report.analysis().unwrap();

    assert_eq!(analysis.direction, TrendDirection::Stable);
    assert_eq!(analysis.change_percentage, 0.0);
    assert_eq!(analysis.volatility, 0.0);
    assert_eq!(analysis.recent_avg, 1e308);
}

#[test]
fn test_trend_on_huge_rising_series() {
    let mut values = vec![1e307; 7];
    values.extend(vec![1.5e307; 7]);

    let report = analyze_trend(&values).unwrap();
    let analysis = report.analysis().unwrap();
    assert_eq!(analysis.direction, TrendDirection::Up);
    assert_relative_eq!(analysis.change_percentage, 50.0, max_relative = 1e-9);
    assert!(analysis.volatility.is_finite());
}

#[test]
fn test_unrepresentable_trend_rejected() {
    // The spread between the extremes does not fit in an f64
    let err = analyze_trend(&[-f64::MAX, f64::MAX, -f64::MAX, f64::MAX]).unwrap_err();
    assert!(matches!(err, ForecastError::ValidationError(_)));
}

#[rstest]
#[case::empty(map(&[]), map(&[]))]
#[case::missing_weight(map(&[("a", 1.0), ("b", 2.0)]), map(&[("a", 1.0)]))]
#[case::unknown_weight(map(&[("a", 1.0)]), map(&[("a", 1.0), ("z", 1.0)]))]
#[case::negative_weight(map(&[("a", 1.0)]), map(&[("a", -1.0)]))]
#[case::zero_weights(map(&[("a", 1.0), ("b", 2.0)]), map(&[("a", 0.0), ("b", 0.0)]))]
#[case::nan_metric(map(&[("a", f64::NAN)]), map(&[("a", 1.0)]))]
fn test_invalid_composite_input(
    #[case] metrics: BTreeMap<String, f64>,
    #[case] weights: BTreeMap<String, f64>,
) {
    let err = composite_score(&metrics, &weights).unwrap_err();
    assert!(matches!(err, ForecastError::ValidationError(_)));
}

#[rstest]
#[case(0.0, RiskLevel::Low)]
#[case(24.99, RiskLevel::Low)]
#[case(25.0, RiskLevel::Medium)]
#[case(50.0, RiskLevel::Medium)]
#[case(50.01, RiskLevel::High)]
#[case(74.99, RiskLevel::High)]
#[case(75.0, RiskLevel::Critical)]
#[case(100.0, RiskLevel::Critical)]
fn test_risk_buckets(#[case] score: f64, #[case] expected: RiskLevel) {
    assert_eq!(RiskLevel::from_score(score), expected);
}

#[test]
fn test_risk_level_serialization() {
    assert_eq!(serde_json::to_string(&RiskLevel::Critical).unwrap(), "\"CRITICAL\"");
    assert_eq!(RiskLevel::Medium.to_string(), "MEDIUM");
}

#[test]
fn test_risk_categories() {
    let categories = vec![
        RiskCategory {
            name: "supplier".to_string(),
            metrics: map(&[("on_time", 20.0), ("defects", 40.0)]),
            weights: map(&[("on_time", 1.0), ("defects", 1.0)]),
        },
        RiskCategory {
            name: "financial".to_string(),
            metrics: map(&[("cost_variance", 80.0)]),
            weights: map(&[("cost_variance", 1.0)]),
        },
    ];

    let profile = score_risk_categories(
        &categories,
        &map(&[("supplier", 0.5), ("financial", 0.5)]),
    )
    .unwrap();

    assert_relative_eq!(profile.categories["supplier"].value, 30.0);
    assert_eq!(profile.categories["financial"].risk_level, RiskLevel::Critical);
    assert_relative_eq!(profile.overall.value, 55.0);
    assert_eq!(profile.overall.risk_level, RiskLevel::High);
}

#[test]
fn test_duplicate_risk_category() {
    let category = RiskCategory {
        name: "supplier".to_string(),
        metrics: map(&[("a", 1.0)]),
        weights: map(&[("a", 1.0)]),
    };
    let err = score_risk_categories(&[category.clone(), category], &map(&[("supplier", 1.0)]))
        .unwrap_err();
    assert!(matches!(err, ForecastError::ValidationError(_)));
}

proptest! {
    #[test]
    fn prop_score_within_bounds(
        entries in prop::collection::btree_map(
            "[a-z]{1,6}",
            (
                -500.0f64..500.0,
                prop_oneof![0.01f64..10.0, 1e300f64..f64::MAX],
            ),
            1..8,
        )
    ) {
        let metrics: BTreeMap<String, f64> = entries.iter().map(|(k, (v, _))| (k.clone(), *v)).collect();
        let weights: BTreeMap<String, f64> = entries.iter().map(|(k, (_, w))| (k.clone(), *w)).collect();

        let score = composite_score(&metrics, &weights).unwrap();
        prop_assert!((0.0..=100.0).contains(&score.value));
        prop_assert_eq!(score.risk_level, RiskLevel::from_score(score.value));
    }

    #[test]
    fn prop_buckets_monotonic(a in 0.0f64..=100.0, b in 0.0f64..=100.0) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(RiskLevel::from_score(lo) <= RiskLevel::from_score(hi));
    }
}
