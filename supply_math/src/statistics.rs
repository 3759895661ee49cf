//! Descriptive statistics over plain slices

use crate::{MathError, Result};

/// Arithmetic mean of a slice
pub fn mean(values: &[f64]) -> Result<f64> {
    if values.is_empty() {
        return Err(MathError::InsufficientData(
            "Cannot take the mean of an empty series".to_string(),
        ));
    }

    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population variance (divides by `n`, not `n - 1`)
pub fn population_variance(values: &[f64]) -> Result<f64> {
    let avg = mean(values)?;
    let sum_sq = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>();

    Ok(sum_sq / values.len() as f64)
}

/// Population standard deviation
pub fn population_std_dev(values: &[f64]) -> Result<f64> {
    Ok(population_variance(values)?.sqrt())
}

/// Mean computed as offsets from the first value
///
/// Stays finite for large values as long as their spread is representable.
pub fn pivoted_mean(values: &[f64]) -> Result<f64> {
    let pivot = *values.first().ok_or_else(|| {
        MathError::InsufficientData("Cannot take the mean of an empty series".to_string())
    })?;
    let offset = values.iter().map(|v| v - pivot).sum::<f64>() / values.len() as f64;

    Ok(pivot + offset)
}

/// Population standard deviation with deviations scaled by the largest one
pub fn scaled_population_std_dev(values: &[f64]) -> Result<f64> {
    let avg = pivoted_mean(values)?;
    let largest = values.iter().fold(0.0_f64, |acc, v| acc.max((v - avg).abs()));
    if largest == 0.0 {
        return Ok(0.0);
    }

    let sum_sq = values
        .iter()
        .map(|v| ((v - avg) / largest).powi(2))
        .sum::<f64>();
    Ok(largest * (sum_sq / values.len() as f64).sqrt())
}

/// Check that every value is finite
pub fn ensure_finite(values: &[f64], what: &str) -> Result<()> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(i) => Err(MathError::InvalidInput(format!(
            "{} contains a non-finite value at index {}",
            what, i
        ))),
        None => Ok(()),
    }
}
