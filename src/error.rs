//! Error types for ratewarden.

use thiserror::Error;

/// Main error type for ratewarden operations.
#[derive(Error, Debug)]
pub enum RateWardenError {
    /// No policy is registered under the requested name
    #[error("Policy not found: {0}")]
    PolicyNotFound(String),

    /// Policy parameters rejected at registration time
    #[error("Invalid policy '{name}': {reason}")]
    InvalidPolicy { name: String, reason: String },

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RateWardenError {
    pub(crate) fn invalid_policy(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPolicy {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for ratewarden operations.
pub type Result<T> = std::result::Result<T, RateWardenError>;
