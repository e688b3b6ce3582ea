//! Error types for the incentive engine
//!
//! Provides a unified error type and domain-specific error variants

use thiserror::Error;

/// Result type alias using IncentiveError
pub type Result<T> = std::result::Result<T, IncentiveError>;

/// Unified error type for incentive operations
#[derive(Debug, Error)]
pub enum IncentiveError {
    // Activity configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    // Raw contract validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    // Fact store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IncentiveError {
    /// Whether this error means "this contract is already recorded".
    ///
    /// A unique-key collision under concurrency is treated the same as a
    /// duplicate found by the dedup check.
    pub fn is_duplicate(&self) -> bool {
        matches!(
            self,
            IncentiveError::Store(StoreError::Duplicate { .. })
                | IncentiveError::Store(StoreError::ConcurrencyViolation { .. })
        )
    }
}

/// Activity configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No reward configuration registered for activity: {0}")]
    NotFound(String),

    #[error("Invalid reward configuration for {key}: {}", violations.join("; "))]
    Invalid { key: String, violations: Vec<String> },

    #[error("Failed to parse reward configuration: {0}")]
    Parse(String),
}

/// Errors raised while adapting a raw contract row
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid amount in {field}: {value}")]
    InvalidAmount { field: &'static str, value: String },

    #[error("Negative amount in {field}: {value}")]
    NegativeAmount { field: &'static str, value: String },

    #[error("Amount in {field} is finer than one fen: {value}")]
    SubFenAmount { field: &'static str, value: String },

    #[error("Unknown order type: {0}")]
    UnknownOrderType(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

/// Fact store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Contract {contract_id} already recorded for activity {activity_code}")]
    Duplicate {
        activity_code: String,
        contract_id: String,
    },

    #[error("Unique key violation on ({activity_code}, {contract_id})")]
    ConcurrencyViolation {
        activity_code: String,
        contract_id: String,
    },

    #[error("Storage backend failure: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for IncentiveError {
    fn from(err: serde_json::Error) -> Self {
        IncentiveError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for IncentiveError {
    fn from(err: std::io::Error) -> Self {
        IncentiveError::Store(StoreError::Backend(err.to_string()))
    }
}

impl From<anyhow::Error> for IncentiveError {
    fn from(err: anyhow::Error) -> Self {
        IncentiveError::Internal(err.to_string())
    }
}
