//! Error types for DCA Sentinel

use thiserror::Error;

use crate::wallet::AggregationError;

/// Application-level errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found error
    #[error("Not found: {0}")]
    NotFound(String),

    /// Symbol or address that the token registry cannot resolve
    #[error("Unknown token: {0}")]
    UnknownToken(String),

    /// Per-user cap reached (wallets, active alerts)
    #[error("Limit exceeded: {0}")]
    LimitExceeded(String),

    /// Record already exists
    #[error("Duplicate: {0}")]
    Duplicate(String),

    /// Balance lookup failed for one of the user's wallets
    #[error(transparent)]
    Aggregation(#[from] AggregationError),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Short machine-readable reason, used in logs and by the front-end
    pub fn reason(&self) -> &'static str {
        match self {
            AppError::Config(_) => "configuration_error",
            AppError::Database(_) => "database_error",
            AppError::Validation(_) => "validation_failed",
            AppError::NotFound(_) => "not_found",
            AppError::UnknownToken(_) => "unknown_token",
            AppError::LimitExceeded(_) => "limit_exceeded",
            AppError::Duplicate(_) => "duplicate",
            AppError::Aggregation(_) => "balance_unavailable",
            AppError::Internal(_) => "internal_error",
        }
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;
