//! Error types for resolution, planning and apply

use serde::Serialize;
use thiserror::Error;

/// Result type alias for resolver and engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while resolving or provisioning a trust relationship
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid configuration: {field} is required when cicd_provider is '{provider}': {message}")]
    MissingField {
        provider: String,
        field: String,
        message: String,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("plan failed: {message}")]
    Plan { message: String },

    #[error("apply failed: {message}")]
    Apply { message: String, retryable: bool },

    #[error("apply failed after {attempts} attempts (retries exhausted): {message}")]
    RetriesExhausted { attempts: u32, message: String },

    #[error("expectation failed: {message}")]
    ExpectationFailed { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl Error {
    pub fn missing_field(
        provider: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::MissingField {
            provider: provider.into(),
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    pub fn plan(message: impl Into<String>) -> Self {
        Self::Plan {
            message: message.into(),
        }
    }

    /// Engine failure that a retry will not fix (e.g. access denied)
    pub fn apply(message: impl Into<String>) -> Self {
        Self::Apply {
            message: message.into(),
            retryable: false,
        }
    }

    /// Engine failure known to be transient
    pub fn apply_transient(message: impl Into<String>) -> Self {
        Self::Apply {
            message: message.into(),
            retryable: true,
        }
    }

    pub fn expectation_failed(message: impl Into<String>) -> Self {
        Self::ExpectationFailed {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// True for errors raised before anything was handed to an engine
    pub fn is_config(&self) -> bool {
        matches!(self, Self::MissingField { .. } | Self::InvalidConfig { .. })
    }

    /// Get the error key for this error
    pub fn error_key(&self) -> &'static str {
        match self {
            Self::MissingField { .. } => "config_error",
            Self::InvalidConfig { .. } => "config_error",
            Self::Plan { .. } => "plan_error",
            Self::Apply { .. } => "apply_error",
            Self::RetriesExhausted { .. } => "apply_retries_exhausted",
            Self::ExpectationFailed { .. } => "expectation_failed",
            Self::Internal { .. } => "internal_error",
        }
    }
}

/// Serializable error body for machine-readable reports
#[derive(Serialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl From<&Error> for ErrorResponse {
    fn from(err: &Error) -> Self {
        Self {
            error: err.error_key().to_string(),
            message: err.to_string(),
        }
    }
}
