//! Record store error types.

use thiserror::Error;
use ueye_models::ValidationError;

/// Result type for record store operations.
pub type DbResult<T> = Result<T, DbError>;

/// Errors that can occur while reading or writing video records.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Database configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid record: {0}")]
    Invalid(#[from] ValidationError),

    #[error("Corrupt row for video {id}: {reason}")]
    CorruptRow { id: i64, reason: String },

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

impl DbError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn corrupt_row(id: i64, reason: impl Into<String>) -> Self {
        Self::CorruptRow {
            id,
            reason: reason.into(),
        }
    }

    /// Check if error is transient (connection or pool trouble).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DbError::Sqlx(
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed
            )
        )
    }
}
