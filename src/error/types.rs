//! Error type definitions.

use thiserror::Error;

/// Errors surfaced by the REST client.
///
/// Nothing is retried or recovered locally: every variant is returned to the
/// caller as-is.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Token acquisition against the identity provider failed.
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// Invalid client-side input (header names/values, URLs).
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Connection, DNS or I/O failure while talking to the endpoint.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// The transport gave up waiting for the endpoint.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Request serialization or response deserialization failed.
    #[error("JSON error: {0}")]
    JsonError(String),

    /// Non-2xx response, only produced under `StatusPolicy::RequireSuccess`.
    #[error("API error {code}: {message}")]
    ApiError {
        code: u16,
        message: String,
        body: String,
    },

    /// The call was cancelled through its cancellation token.
    #[error("Cancelled: {0}")]
    Cancelled(String),
}

/// Coarse classification of an [`ApiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Auth,
    Configuration,
    Transport,
    Deserialization,
    Status,
    Cancelled,
}

impl ApiError {
    /// Build a status error from a response.
    pub fn api_error(code: u16, message: impl Into<String>, body: impl Into<String>) -> Self {
        Self::ApiError {
            code,
            message: message.into(),
            body: body.into(),
        }
    }

    /// Map this error onto its category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::AuthenticationError(_) => ErrorCategory::Auth,
            Self::ConfigurationError(_) => ErrorCategory::Configuration,
            Self::HttpError(_) | Self::Timeout(_) => ErrorCategory::Transport,
            Self::JsonError(_) => ErrorCategory::Deserialization,
            Self::ApiError { .. } => ErrorCategory::Status,
            Self::Cancelled(_) => ErrorCategory::Cancelled,
        }
    }

    pub fn is_auth_error(&self) -> bool {
        self.category() == ErrorCategory::Auth
    }

    pub fn is_transport_error(&self) -> bool {
        self.category() == ErrorCategory::Transport
    }

    pub fn is_deserialization_error(&self) -> bool {
        self.category() == ErrorCategory::Deserialization
    }

    /// HTTP status code, when the error carries one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::ApiError { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, ApiError>;
