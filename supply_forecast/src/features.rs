//! Feature derivation from a raw observation series
//!
//! Every index of a series gets calendar fields, lag values, rolling window
//! statistics and a trend index. Lags and rolling statistics that reach
//! before the start of the series are `None`, never zero.

use crate::data::ObservationSeries;
use crate::error::{ForecastError, Result};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use supply_math::rolling::{rolling_mean, rolling_std_dev};
use supply_math::statistics;

/// Lag depths, in observations
pub const LAGS: [usize; 4] = [1, 7, 14, 30];

/// Rolling window sizes, in observations
pub const WINDOWS: [usize; 3] = [7, 14, 30];

/// Minimum series length accepted by [`derive_features`]
pub const MIN_HISTORY: usize = 30;

/// Names of the model predictors, in the order produced by
/// [`FeatureVector::predictors`] and [`next_predictors`]
pub const PREDICTOR_NAMES: [&str; 15] = [
    "day_of_week",
    "month",
    "quarter",
    "day_of_year",
    "trend",
    "lag_1",
    "lag_7",
    "lag_14",
    "lag_30",
    "rolling_mean_7",
    "rolling_std_7",
    "rolling_mean_14",
    "rolling_std_14",
    "rolling_mean_30",
    "rolling_std_30",
];

/// Calendar fields of a timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarFeatures {
    /// Monday = 0 .. Sunday = 6
    pub day_of_week: u32,
    /// 1..=12
    pub month: u32,
    /// 1..=4
    pub quarter: u32,
    /// 1..=366
    pub day_of_year: u32,
}

impl CalendarFeatures {
    /// Derive calendar fields from a timestamp
    pub fn from_timestamp(timestamp: &DateTime<Utc>) -> Self {
        let month = timestamp.month();

        Self {
            day_of_week: timestamp.weekday().num_days_from_monday(),
            month,
            quarter: (month - 1) / 3 + 1,
            day_of_year: timestamp.ordinal(),
        }
    }

    fn as_predictors(&self) -> [f64; 4] {
        [
            self.day_of_week as f64,
            self.month as f64,
            self.quarter as f64,
            self.day_of_year as f64,
        ]
    }
}

/// Mean and population standard deviation of one rolling window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RollingStats {
    pub mean: f64,
    pub std_dev: f64,
}

/// Derived predictors for one index of a series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Position in the series; doubles as the linear trend predictor
    pub trend_index: usize,
    pub timestamp: DateTime<Utc>,
    /// Observed value at this index
    pub value: f64,
    pub calendar: CalendarFeatures,
    /// Lag values, ordered as [`LAGS`]
    pub lags: [Option<f64>; 4],
    /// Rolling statistics ending at this index, ordered as [`WINDOWS`]
    pub rolling: [Option<RollingStats>; 3],
}

impl FeatureVector {
    /// Value `k` observations back, if `k` is a derived lag and far enough in
    pub fn lag(&self, k: usize) -> Option<f64> {
        LAGS.iter()
            .position(|&l| l == k)
            .and_then(|pos| self.lags[pos])
    }

    /// Rolling mean for a derived window size
    pub fn rolling_mean(&self, window: usize) -> Option<f64> {
        self.rolling_stats(window).map(|s| s.mean)
    }

    /// Rolling population standard deviation for a derived window size
    pub fn rolling_std(&self, window: usize) -> Option<f64> {
        self.rolling_stats(window).map(|s| s.std_dev)
    }

    fn rolling_stats(&self, window: usize) -> Option<RollingStats> {
        WINDOWS
            .iter()
            .position(|&w| w == window)
            .and_then(|pos| self.rolling[pos])
    }

    /// Model predictors for this index's value
    ///
    /// Rolling statistics come from `previous` so the row only describes
    /// values strictly before this one. Returns `None` while any lag or
    /// window is still undefined.
    pub fn predictors(&self, previous: &FeatureVector) -> Option<Vec<f64>> {
        let mut row = Vec::with_capacity(PREDICTOR_NAMES.len());
        row.extend_from_slice(&self.calendar.as_predictors());
        row.push(self.trend_index as f64);

        for lag in &self.lags {
            row.push((*lag)?);
        }
        for stats in &previous.rolling {
            let stats = (*stats)?;
            row.push(stats.mean);
            row.push(stats.std_dev);
        }

        Some(row)
    }
}

/// Model predictors for the value that directly follows `history`
///
/// Produces the same layout as [`FeatureVector::predictors`], so it can
/// drive recursive multi-step forecasts over a history extended with
/// earlier predictions.
pub fn next_predictors(history: &[f64], timestamp: DateTime<Utc>) -> Option<Vec<f64>> {
    let t = history.len();
    let mut row = Vec::with_capacity(PREDICTOR_NAMES.len());
    row.extend_from_slice(&CalendarFeatures::from_timestamp(&timestamp).as_predictors());
    row.push(t as f64);

    for &k in &LAGS {
        if t < k {
            return None;
        }
        row.push(history[t - k]);
    }
    for &w in &WINDOWS {
        if t < w {
            return None;
        }
        let window = &history[t - w..];
        row.push(statistics::mean(window).ok()?);
        row.push(statistics::population_std_dev(window).ok()?);
    }

    Some(row)
}

/// Derive one feature vector per index of `series`
pub fn derive_features(series: &ObservationSeries) -> Result<Vec<FeatureVector>> {
    if series.len() < MIN_HISTORY {
        return Err(ForecastError::InsufficientData {
            required: MIN_HISTORY,
            actual: series.len(),
        });
    }

    let values = series.values();

    let mut means = Vec::with_capacity(WINDOWS.len());
    let mut stds = Vec::with_capacity(WINDOWS.len());
    for &w in &WINDOWS {
        means.push(rolling_mean(&values, w)?);
        stds.push(rolling_std_dev(&values, w)?);
    }

    let features = series
        .observations()
        .iter()
        .enumerate()
        .map(|(i, obs)| {
            let mut lags = [None; 4];
            for (slot, &k) in lags.iter_mut().zip(LAGS.iter()) {
                if i >= k {
                    *slot = Some(values[i - k]);
                }
            }

            let mut rolling = [None; 3];
            for (w, slot) in rolling.iter_mut().enumerate() {
                if let (Some(mean), Some(std_dev)) = (means[w][i], stds[w][i]) {
                    *slot = Some(RollingStats { mean, std_dev });
                }
            }

            FeatureVector {
                trend_index: i,
                timestamp: obs.timestamp,
                value: obs.value,
                calendar: CalendarFeatures::from_timestamp(&obs.timestamp),
                lags,
                rolling,
            }
        })
        .collect();

    Ok(features)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MetricKind;
    use approx::assert_relative_eq;
    use chrono::TimeZone;

    fn series(len: usize) -> ObservationSeries {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let values = (0..len).map(|i| 100.0 + i as f64).collect();
        ObservationSeries::daily("SKU-1", MetricKind::Demand, start, values).unwrap()
    }

    #[test]
    fn test_calendar_fields() {
        // 2024-01-01 was a Monday
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let cal = CalendarFeatures::from_timestamp(&ts);
        assert_eq!(cal.day_of_week, 0);
        assert_eq!(cal.month, 1);
        assert_eq!(cal.quarter, 1);
        assert_eq!(cal.day_of_year, 1);

        // Leap year end
        let ts = Utc.with_ymd_and_hms(2024, 12, 31, 12, 0, 0).unwrap();
        let cal = CalendarFeatures::from_timestamp(&ts);
        assert_eq!(cal.day_of_week, 1);
        assert_eq!(cal.quarter, 4);
        assert_eq!(cal.day_of_year, 366);
    }

    #[test]
    fn test_short_series_rejected() {
        let err = derive_features(&series(29)).unwrap_err();
        assert!(matches!(
            err,
            ForecastError::InsufficientData {
                required: 30,
                actual: 29
            }
        ));
    }

    #[test]
    fn test_lags_absent_not_zero() {
        let features = derive_features(&series(35)).unwrap();

        assert_eq!(features[0].lag(1), None);
        assert_eq!(features[1].lag(1), Some(100.0));
        assert_eq!(features[29].lag(30), None);
        assert_eq!(features[30].lag(30), Some(100.0));
        // Not a derived lag
        assert_eq!(features[30].lag(2), None);
    }

    #[test]
    fn test_rolling_windows() {
        let features = derive_features(&series(35)).unwrap();

        assert_eq!(features[5].rolling_mean(7), None);
        assert_relative_eq!(features[6].rolling_mean(7).unwrap(), 103.0);
        assert_eq!(features[28].rolling_mean(30), None);
        assert_relative_eq!(features[29].rolling_mean(30).unwrap(), 114.5);
        assert_relative_eq!(features[29].rolling_std(30).unwrap(), (899.0f64 / 12.0).sqrt());
        assert_eq!(features[10].trend_index, 10);
    }

    #[test]
    fn test_next_predictors_matches_feature_rows() {
        let s = series(40);
        let features = derive_features(&s).unwrap();
        let values = s.values();

        for i in 30..40 {
            let from_features = features[i].predictors(&features[i - 1]).unwrap();
            let from_history = next_predictors(&values[..i], features[i].timestamp).unwrap();
            for (a, b) in from_features.iter().zip(from_history.iter()) {
                assert_relative_eq!(a, b, epsilon = 1e-9);
            }
        }

        assert!(features[29].predictors(&features[28]).is_none());
        assert!(next_predictors(&values[..29], features[29].timestamp).is_none());
    }
}
