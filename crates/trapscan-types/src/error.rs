//! Error types for trapscan

use thiserror::Error;

use crate::Category;

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration not found")]
    NotFound,

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Failed to save configuration: {0}")]
    SaveError(String),
}

/// Record-store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Store data corrupted: {0}")]
    Corrupted(String),

    #[error("Store IO error: {0}")]
    IoError(String),
}

/// Threshold configuration errors.
///
/// A non-monotonic config is rejected outright; bounds are never reordered
/// or clamped on the caller's behalf.
#[derive(Debug, Error)]
pub enum ThresholdError {
    #[error(
        "Non-monotonic thresholds for {category}: watch {watch} <= action {action} <= critical {critical} must hold"
    )]
    NonMonotonic {
        category: Category,
        watch: u32,
        action: u32,
        critical: u32,
    },
}

/// Single-pass oracle failures.
///
/// All three are recoverable at the aggregation layer: the pass is dropped
/// from its category's value list and never contributes a synthetic zero.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("Oracle pass timed out")]
    Timeout,

    #[error("Oracle unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed oracle response: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Threshold error: {0}")]
    Threshold(#[from] ThresholdError),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid image format: {0}")]
    InvalidImageFormat(String),

    #[error("Scan failed: {0}")]
    ScanFailed(String),
}

pub type Result<T> = std::result::Result<T, Error>;
