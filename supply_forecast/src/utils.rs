//! Utility functions for the supply_forecast crate

use crate::error::{ForecastError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Spacing between the last two timestamps
///
/// Series with fewer than two timestamps are treated as daily.
pub fn sampling_interval(timestamps: &[DateTime<Utc>]) -> Duration {
    match timestamps {
        [.., previous, last] => *last - *previous,
        _ => Duration::days(1),
    }
}

/// Create `horizon` timestamps after `last_timestamp`, `step` apart
pub fn future_timestamps(
    last_timestamp: DateTime<Utc>,
    horizon: usize,
    step: Duration,
) -> Result<Vec<DateTime<Utc>>> {
    if step <= Duration::zero() {
        return Err(ForecastError::ValidationError(
            "Forecast step must be positive".to_string(),
        ));
    }

    let mut timestamps = Vec::with_capacity(horizon);
    let mut current = last_timestamp;
    for _ in 0..horizon {
        current = current.checked_add_signed(step).ok_or_else(|| {
            ForecastError::ValidationError("Forecast dates are out of range".to_string())
        })?;
        timestamps.push(current);
    }

    Ok(timestamps)
}

/// Calculate accuracy metrics for a forecast vs actual values
pub fn forecast_accuracy(forecast: &[f64], actual: &[f64]) -> Result<ForecastAccuracy> {
    if forecast.len() != actual.len() || forecast.is_empty() {
        return Err(ForecastError::ValidationError(
            "Forecast and actual values must have the same non-zero length".to_string(),
        ));
    }

    let n = forecast.len() as f64;

    let errors: Vec<f64> = forecast
        .iter()
        .zip(actual.iter())
        .map(|(&f, &a)| a - f)
        .collect();

    let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;
    let mse = errors.iter().map(|e| e.powi(2)).sum::<f64>() / n;
    let rmse = mse.sqrt();

    // Zero actuals have no defined percentage error and are skipped
    let (pct_sum, pct_count) = actual
        .iter()
        .zip(errors.iter())
        .filter(|(&a, _)| a != 0.0)
        .fold((0.0, 0usize), |(sum, count), (&a, &e)| {
            (sum + e.abs() / a.abs() * 100.0, count + 1)
        });
    let mape = if pct_count > 0 {
        pct_sum / pct_count as f64
    } else {
        0.0
    };

    let smape = actual
        .iter()
        .zip(forecast.iter())
        .map(|(&a, &f)| {
            let denom = a.abs() + f.abs();
            if denom == 0.0 {
                0.0
            } else {
                200.0 * (a - f).abs() / denom
            }
        })
        .sum::<f64>()
        / n;

    Ok(ForecastAccuracy {
        mae,
        mse,
        rmse,
        mape,
        smape,
    })
}

/// Forecast accuracy metrics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastAccuracy {
    /// Mean Absolute Error
    pub mae: f64,
    /// Mean Squared Error
    pub mse: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Percentage Error
    pub mape: f64,
    /// Symmetric Mean Absolute Percentage Error, in [0, 200]
    pub smape: f64,
}

impl ForecastAccuracy {
    /// Map sMAPE onto a [0, 1] confidence: a perfect forecast scores 1
    pub fn confidence(&self) -> f64 {
        (1.0 - self.smape / 200.0).clamp(0.0, 1.0)
    }
}
