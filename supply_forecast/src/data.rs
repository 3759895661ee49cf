//! Historical observation series and the providers that fetch them

use crate::error::{ForecastError, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Kind of quantity an observation series measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Units demanded per period
    Demand,
    /// Supplier performance score
    SupplierPerformance,
    /// Cost per period
    Cost,
}

impl MetricKind {
    /// Stable identifier used in file names and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Demand => "demand",
            MetricKind::SupplierPerformance => "supplier_performance",
            MetricKind::Cost => "cost",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single time-stamped measurement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Ordered historical measurements for one entity and metric
///
/// Deserialization runs the same checks as [`ObservationSeries::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawObservationSeries")]
pub struct ObservationSeries {
    entity_id: String,
    metric: MetricKind,
    observations: Vec<Observation>,
}

impl ObservationSeries {
    /// Create a series, checking that timestamps strictly increase and values are finite
    pub fn new(
        entity_id: impl Into<String>,
        metric: MetricKind,
        observations: Vec<Observation>,
    ) -> Result<Self> {
        for (i, obs) in observations.iter().enumerate() {
            if !obs.value.is_finite() {
                return Err(ForecastError::ValidationError(format!(
                    "Observation {} has a non-finite value",
                    i
                )));
            }
        }

        if let Some(i) = observations
            .windows(2)
            .position(|w| w[1].timestamp <= w[0].timestamp)
        {
            return Err(ForecastError::ValidationError(format!(
                "Timestamps must be strictly increasing: {} is not after {}",
                observations[i + 1].timestamp,
                observations[i].timestamp
            )));
        }

        Ok(Self {
            entity_id: entity_id.into(),
            metric,
            observations,
        })
    }

    /// Create a series from (timestamp, value) pairs
    pub fn from_points(
        entity_id: impl Into<String>,
        metric: MetricKind,
        points: Vec<(DateTime<Utc>, f64)>,
    ) -> Result<Self> {
        let observations = points
            .into_iter()
            .map(|(timestamp, value)| Observation { timestamp, value })
            .collect();

        Self::new(entity_id, metric, observations)
    }

    /// Create a daily series starting at `start`
    pub fn daily(
        entity_id: impl Into<String>,
        metric: MetricKind,
        start: DateTime<Utc>,
        values: Vec<f64>,
    ) -> Result<Self> {
        let points = values
            .into_iter()
            .enumerate()
            .map(|(i, v)| (start + Duration::days(i as i64), v))
            .collect();

        Self::from_points(entity_id, metric, points)
    }

    /// Get the entity identifier
    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    /// Get the metric kind
    pub fn metric(&self) -> MetricKind {
        self.metric
    }

    /// Get the observations
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Get the values as a vector
    pub fn values(&self) -> Vec<f64> {
        self.observations.iter().map(|o| o.value).collect()
    }

    /// Get the timestamps as a vector
    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.observations.iter().map(|o| o.timestamp).collect()
    }

    /// Most recent timestamp, if any
    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.observations.last().map(|o| o.timestamp)
    }

    /// Number of observations
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Whether the series has no observations
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

#[derive(Deserialize)]
struct RawObservationSeries {
    entity_id: String,
    metric: MetricKind,
    observations: Vec<Observation>,
}

impl TryFrom<RawObservationSeries> for ObservationSeries {
    type Error = ForecastError;

    fn try_from(raw: RawObservationSeries) -> Result<Self> {
        Self::new(raw.entity_id, raw.metric, raw.observations)
    }
}

/// Source of historical observation series
///
/// The pipeline calls `fetch` once per run and treats the result as an
/// immutable snapshot.
pub trait HistoryProvider {
    /// Fetch the full history for an entity and metric
    fn fetch(&self, entity_id: &str, metric: MetricKind) -> Result<ObservationSeries>;
}

/// History provider backed by a map of preloaded series
#[derive(Debug, Clone, Default)]
pub struct InMemoryHistory {
    series: HashMap<(String, MetricKind), ObservationSeries>,
}

impl InMemoryHistory {
    /// Create an empty provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a series, keyed by its entity and metric
    pub fn insert(&mut self, series: ObservationSeries) {
        let key = (series.entity_id().to_string(), series.metric());
        self.series.insert(key, series);
    }

    /// Builder-style insert
    pub fn with_series(mut self, series: ObservationSeries) -> Self {
        self.insert(series);
        self
    }
}

impl HistoryProvider for InMemoryHistory {
    fn fetch(&self, entity_id: &str, metric: MetricKind) -> Result<ObservationSeries> {
        self.series
            .get(&(entity_id.to_string(), metric))
            .cloned()
            .ok_or_else(|| {
                ForecastError::DataError(format!(
                    "No {} history for entity '{}'",
                    metric, entity_id
                ))
            })
    }
}

/// History provider reading `<entity>_<metric>.csv` files from a directory
#[derive(Debug, Clone)]
pub struct CsvHistory {
    root: PathBuf,
}

impl CsvHistory {
    /// Create a provider rooted at `root`
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Path of the file holding an entity's metric history
    pub fn path_for(&self, entity_id: &str, metric: MetricKind) -> PathBuf {
        self.root
            .join(format!("{}_{}.csv", entity_id, metric.as_str()))
    }
}

impl HistoryProvider for CsvHistory {
    fn fetch(&self, entity_id: &str, metric: MetricKind) -> Result<ObservationSeries> {
        DataLoader::from_csv(self.path_for(entity_id, metric), entity_id, metric)
    }
}

#[derive(Debug, Deserialize)]
struct CsvRecord {
    timestamp: String,
    value: f64,
}

/// Loader for `timestamp,value` CSV data
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load a series from a CSV file
    pub fn from_csv<P: AsRef<Path>>(
        path: P,
        entity_id: &str,
        metric: MetricKind,
    ) -> Result<ObservationSeries> {
        let file = File::open(path)?;
        Self::from_reader(file, entity_id, metric)
    }

    /// Load a series from any CSV reader with a header row
    pub fn from_reader<R: Read>(
        reader: R,
        entity_id: &str,
        metric: MetricKind,
    ) -> Result<ObservationSeries> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut observations = Vec::new();
        for record in csv_reader.deserialize() {
            let record: CsvRecord = record?;
            observations.push(Observation {
                timestamp: parse_timestamp(&record.timestamp)?,
                value: record.value,
            });
        }

        ObservationSeries::new(entity_id, metric, observations)
    }
}

/// Parse an RFC 3339 timestamp, a `YYYY-MM-DD HH:MM:SS` datetime or a bare date
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(Utc.from_utc_datetime(&naive));
    }

    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ForecastError::DataError(format!("Unrecognized timestamp: {}", raw)))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| ForecastError::DataError(format!("Invalid date: {}", raw)))?;

    Ok(Utc.from_utc_datetime(&midnight))
}
