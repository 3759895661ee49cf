//! Print a trend and forecast report for one CSV series
//!
//! ```bash
//! # Default generators and horizon
//! forecast_report demand.csv
//!
//! # Two-week forecast with a pipeline config
//! forecast_report demand.csv --config pipeline.toml --horizon 14
//! ```
//!
//! Log output is controlled through `RUST_LOG`.

use clap::Parser;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;
use supply_forecast::data::{DataLoader, InMemoryHistory, MetricKind};
use supply_forecast::error::Result;
use supply_forecast::pipeline::{AnalysisRequest, AnalyticsPipeline};
use supply_forecast::PipelineConfig;
use tracing_subscriber::EnvFilter;

const ENTITY_ID: &str = "series";

#[derive(Parser, Debug)]
#[command(name = "forecast_report")]
#[command(about = "Trend analysis and ensemble forecast for a timestamp,value CSV")]
#[command(version)]
struct Args {
    /// CSV file with `timestamp,value` rows
    csv: PathBuf,

    /// Pipeline configuration (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Forecast horizon in sampling steps (defaults to the configured horizon)
    #[arg(long, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    horizon: Option<usize>,

    /// Quantity the series measures
    #[arg(short, long, default_value = "demand", value_parser = parse_metric)]
    metric: MetricKind,
}

fn parse_metric(raw: &str) -> std::result::Result<MetricKind, String> {
    match raw {
        "demand" => Ok(MetricKind::Demand),
        "supplier_performance" => Ok(MetricKind::SupplierPerformance),
        "cost" => Ok(MetricKind::Cost),
        other => Err(format!(
            "unknown metric '{}' (expected demand, supplier_performance or cost)",
            other
        )),
    }
}

fn run(args: &Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    let horizon = args.horizon.unwrap_or(config.default_horizon);

    let series = DataLoader::from_csv(&args.csv, ENTITY_ID, args.metric)?;
    let provider = InMemoryHistory::new().with_series(series);
    let pipeline = AnalyticsPipeline::new(provider, config)?;

    let request = AnalysisRequest::new(ENTITY_ID, args.metric).with_horizon(horizon);
    let report = pipeline.analyze(&request)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "{}", report.to_json()?)?;
    Ok(())
}

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    if let Err(err) = run(&args) {
        eprintln!("error: {}", err);
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_command_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_horizon_is_a_flag_not_a_config_path() {
        let args = Args::try_parse_from(["forecast_report", "s.csv", "--horizon", "14"]).unwrap();
        assert_eq!(args.csv, PathBuf::from("s.csv"));
        assert_eq!(args.horizon, Some(14));
        assert!(args.config.is_none());
        assert_eq!(args.metric, MetricKind::Demand);
    }

    #[test]
    fn test_config_and_metric_flags() {
        let args = Args::try_parse_from([
            "forecast_report",
            "cost.csv",
            "--config",
            "pipeline.toml",
            "--metric",
            "cost",
        ])
        .unwrap();
        assert_eq!(args.config, Some(PathBuf::from("pipeline.toml")));
        assert_eq!(args.metric, MetricKind::Cost);
        assert_eq!(args.horizon, None);
    }

    #[test]
    fn test_rejected_arguments() {
        // A bare second positional is no longer accepted
        assert!(Args::try_parse_from(["forecast_report", "s.csv", "14"]).is_err());
        assert!(Args::try_parse_from(["forecast_report", "s.csv", "--horizon", "0"]).is_err());
        assert!(Args::try_parse_from(["forecast_report", "s.csv", "--metric", "stock"]).is_err());
        assert!(Args::try_parse_from(["forecast_report"]).is_err());
    }
}
