use chrono::{Duration, TimeZone, Utc};
use std::io::Write;
use supply_forecast::data::{CsvHistory, InMemoryHistory};
use supply_forecast::metrics::{Insight, RiskLevel};
use supply_forecast::models::{Generator, GeneratorRegistry, SeasonalNaive};
use supply_forecast::{
    AnalysisRequest, AnalyticsPipeline, ForecastError, MetricKind, ObservationSeries,
    PipelineConfig, PipelineReport,
};
use tempfile::tempdir;

fn demand_history(len: usize) -> InMemoryHistory {
    let start = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
    let values = (0..len)
        .map(|i| 300.0 + 2.0 * i as f64 + if i % 7 == 6 { -60.0 } else { 0.0 })
        .collect();
    InMemoryHistory::new()
        .with_series(ObservationSeries::daily("SKU-100", MetricKind::Demand, start, values).unwrap())
}

#[test]
fn test_full_analysis() {
    let pipeline = AnalyticsPipeline::new(demand_history(90), PipelineConfig::default()).unwrap();
    let request = AnalysisRequest::new("SKU-100", MetricKind::Demand)
        .with_horizon(14)
        .with_sub_metric("on_time_delivery", 92.0)
        .with_sub_metric("quality", 30.0);

    let report = pipeline.analyze(&request).unwrap();

    assert_eq!(report.observations, 90);
    assert_eq!(report.insight, Some(Insight::StrongPositive));

    let forecast = report.forecast.as_ref().unwrap();
    assert_eq!(forecast.horizon(), 14);
    assert_eq!(forecast.members().len(), 3);

    assert_eq!(report.forecast_dates.len(), 14);
    let last = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap() + Duration::days(89);
    assert_eq!(report.forecast_dates[0], last + Duration::days(1));

    assert!(report.forecast_trend.as_ref().unwrap().analysis().is_some());

    let composite = report.composite.as_ref().unwrap();
    assert!((composite.value - 61.0).abs() < 1e-9);
    assert_eq!(composite.risk_level, RiskLevel::High);
}

#[test]
fn test_report_json_round_trip() {
    let pipeline = AnalyticsPipeline::new(demand_history(60), PipelineConfig::default()).unwrap();
    let report = pipeline
        .analyze(&AnalysisRequest::new("SKU-100", MetricKind::Demand).with_horizon(3))
        .unwrap();

    let json = report.to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["entity_id"], "SKU-100");
    assert_eq!(value["metric"], "demand");
    assert_eq!(value["trend"]["trend"], "analysis");

    let back: PipelineReport = serde_json::from_str(&json).unwrap();
    assert_eq!(back.observations, report.observations);
}

#[test]
fn test_short_history_with_forecast() {
    let pipeline = AnalyticsPipeline::new(demand_history(20), PipelineConfig::default()).unwrap();
    let request = AnalysisRequest::new("SKU-100", MetricKind::Demand);

    let err = pipeline.analyze(&request).unwrap_err();
    assert!(matches!(
        err,
        ForecastError::InsufficientData { required: 30, actual: 20 }
    ));

    // Trend analysis alone still works
    let report = pipeline.analyze(&request.without_forecast()).unwrap();
    assert!(report.forecast.is_none());
    assert!(report.trend.analysis().is_some());
}

#[test]
fn test_custom_registry() {
    let mut registry = GeneratorRegistry::new();
    registry
        .register("weekly", Generator::SeasonalNaive(SeasonalNaive::new(7).unwrap()))
        .unwrap();

    let pipeline =
        AnalyticsPipeline::with_registry(demand_history(40), registry, PipelineConfig::default())
            .unwrap();
    let report = pipeline
        .analyze(&AnalysisRequest::new("SKU-100", MetricKind::Demand).with_horizon(7))
        .unwrap();

    let forecast = report.forecast.unwrap();
    assert_eq!(forecast.members().len(), 1);
    // Seasonal naive repeats the last week
    let history: Vec<f64> = (33..40)
        .map(|i| 300.0 + 2.0 * i as f64 + if i % 7 == 6 { -60.0 } else { 0.0 })
        .collect();
    assert_eq!(forecast.point(), history.as_slice());
}

#[test]
fn test_invalid_confidence_level() {
    let pipeline = AnalyticsPipeline::new(demand_history(60), PipelineConfig::default()).unwrap();
    let request = AnalysisRequest::new("SKU-100", MetricKind::Demand).with_confidence_level(1.2);
    assert!(pipeline.analyze(&request).is_err());
}

#[test]
fn test_csv_backed_pipeline() {
    let dir = tempdir().unwrap();
    let history = CsvHistory::new(dir.path());

    let mut file = std::fs::File::create(history.path_for("SUP-3", MetricKind::Cost)).unwrap();
    writeln!(file, "timestamp,value").unwrap();
    for day in 1..=10 {
        writeln!(file, "2024-04-{:02},{}", day, 50.0 - day as f64).unwrap();
    }
    drop(file);

    let pipeline = AnalyticsPipeline::new(history, PipelineConfig::default()).unwrap();
    let report = pipeline
        .analyze(&AnalysisRequest::new("SUP-3", MetricKind::Cost).without_forecast())
        .unwrap();

    assert_eq!(report.observations, 10);
    assert_eq!(report.insight, Some(Insight::DecliningNeedsAttention));
    assert_eq!(report.recommendations.len(), 2);
}

#[test]
fn test_weekly_history_forecast_dates() {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let points = (0..60)
        .map(|i| (start + Duration::weeks(i), 500.0 + 5.0 * i as f64))
        .collect();
    let series = ObservationSeries::from_points("SKU-200", MetricKind::Demand, points).unwrap();
    let pipeline = AnalyticsPipeline::new(
        InMemoryHistory::new().with_series(series),
        PipelineConfig::default(),
    )
    .unwrap();

    let report = pipeline
        .analyze(&AnalysisRequest::new("SKU-200", MetricKind::Demand).with_horizon(4))
        .unwrap();

    let last = start + Duration::weeks(59);
    let expected: Vec<_> = (1..=4).map(|k| last + Duration::weeks(k)).collect();
    assert_eq!(report.forecast_dates, expected);
}
