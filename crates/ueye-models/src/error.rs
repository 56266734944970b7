//! Validation error types.

use thiserror::Error;

/// Result type for input validation.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Errors raised when inbound data is rejected before any I/O happens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Title must not be empty")]
    EmptyTitle,

    #[error("Title is {0} characters long, maximum is 255")]
    TitleTooLong(usize),

    #[error("Unknown time of day: {0}")]
    InvalidTimeOfDay(String),

    #[error("Missing filename")]
    MissingFilename,

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Upload payload is empty")]
    EmptyPayload,

    #[error("Upload exceeds {limit} bytes")]
    PayloadTooLarge { limit: u64 },

    #[error("Invalid object key: {0}")]
    InvalidObjectKey(String),
}

impl ValidationError {
    pub fn unsupported_format(filename: impl Into<String>) -> Self {
        Self::UnsupportedFormat(filename.into())
    }

    pub fn invalid_object_key(key: impl Into<String>) -> Self {
        Self::InvalidObjectKey(key.into())
    }
}
