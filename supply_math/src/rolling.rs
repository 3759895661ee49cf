//! Rolling window statistics
//!
//! A fixed-size window that is fed one observation at a time, plus batch
//! helpers that produce one optional value per index of a series. Indices
//! before the window is full yield `None`.

use crate::{MathError, Result};
use std::collections::VecDeque;

/// Fixed-size window over the most recent observations
#[derive(Debug, Clone)]
pub struct RollingWindow {
    period: usize,
    values: VecDeque<f64>,
}

impl RollingWindow {
    /// Create a new rolling window with the specified period
    pub fn new(period: usize) -> Result<Self> {
        if period == 0 {
            return Err(MathError::InvalidInput(
                "Period must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            period,
            values: VecDeque::with_capacity(period),
        })
    }

    /// Push a new value, evicting the oldest once the window is full
    pub fn update(&mut self, value: f64) {
        self.values.push_back(value);

        if self.values.len() > self.period {
            self.values.pop_front();
        }
    }

    /// Whether the window holds `period` values
    pub fn is_full(&self) -> bool {
        self.values.len() == self.period
    }

    /// Mean of the window, `None` until the window is full
    pub fn mean(&self) -> Option<f64> {
        if !self.is_full() {
            return None;
        }

        Some(self.values.iter().sum::<f64>() / self.period as f64)
    }

    /// Population standard deviation of the window, `None` until full
    pub fn std_dev(&self) -> Option<f64> {
        let mean = self.mean()?;
        let variance = self
            .values
            .iter()
            .map(|v| (v - mean).powi(2))
            .sum::<f64>()
            / self.period as f64;

        Some(variance.sqrt())
    }

    /// Get the current period
    pub fn period(&self) -> usize {
        self.period
    }
}

/// Rolling mean for every index of `values`
pub fn rolling_mean(values: &[f64], period: usize) -> Result<Vec<Option<f64>>> {
    let mut window = RollingWindow::new(period)?;

    Ok(values
        .iter()
        .map(|&v| {
            window.update(v);
            window.mean()
        })
        .collect())
}

/// Rolling population standard deviation for every index of `values`
pub fn rolling_std_dev(values: &[f64], period: usize) -> Result<Vec<Option<f64>>> {
    let mut window = RollingWindow::new(period)?;

    Ok(values
        .iter()
        .map(|&v| {
            window.update(v);
            window.std_dev()
        })
        .collect())
}
