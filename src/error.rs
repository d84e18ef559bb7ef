//! Error types for the LBF Operator

use crate::chain::ChainError;
use crate::models::{OperationStatus, OperationType};
use thiserror::Error;

/// Application-level errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// JSON encoding/decoding of stored records
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Another operation of the strategy is already running
    #[error("Operation {operation_id} is already in progress for strategy {strategy_id}")]
    OperationInProgressExists { strategy_id: i64, operation_id: i64 },

    /// A pending operation of the same type already exists
    #[error("Pending {op_type} operation already exists for strategy {strategy_id}")]
    OperationPendingExists { strategy_id: i64, op_type: OperationType },

    /// Strategy is not active
    #[error("Strategy {0} is inactive")]
    InactiveStrategy(i64),

    /// Strategy settings failed validation
    #[error("Invalid strategy settings: {0}")]
    SettingsInvalid(String),

    /// Lifecycle transition not permitted
    #[error("Invalid operation transition for {id}: {from} -> {to}")]
    InvalidTransition {
        id: i64,
        from: OperationStatus,
        to: OperationStatus,
    },

    /// Malformed input to a domain operation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found error
    #[error("Not found: {0}")]
    NotFound(String),

    /// Chain read/write failure
    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Expected, non-fatal conditions reported to the operator and never retried
    pub fn is_policy_violation(&self) -> bool {
        matches!(
            self,
            AppError::OperationInProgressExists { .. }
                | AppError::OperationPendingExists { .. }
                | AppError::InactiveStrategy(_)
                | AppError::SettingsInvalid(_)
        )
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;
