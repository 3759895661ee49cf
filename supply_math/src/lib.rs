//! # Supply Math
//!
//! Numeric building blocks for supply-chain analytics.
//! This crate provides the descriptive statistics, rolling windows and
//! regression learners used by the forecasting pipeline.

use thiserror::Error;

pub mod regression;
pub mod rolling;
pub mod statistics;
pub mod tree;

pub use regression::LinearRegression;
pub use rolling::RollingWindow;
pub use tree::{RegressionTree, TreeParams};

/// Errors that can occur in numeric calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for numeric operations
pub type Result<T> = std::result::Result<T, MathError>;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
