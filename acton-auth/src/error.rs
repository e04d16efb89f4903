//! Error types for the authentication core
//!
//! Errors fall into four groups: validation errors raised by value-object
//! constructors, state errors raised by aggregates on illegal transitions,
//! provider errors carrying a [`ProviderErrorCode`], and not-found errors for
//! absent sessions or authentications.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::repository::RepositoryError;

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the crate
///
/// Large error variants are boxed to reduce stack size
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// Malformed input rejected by a value-object constructor
    #[error("Validation error: {0}")]
    Validation(String),

    /// Operation not allowed in the aggregate's current state
    #[error("Illegal state: {0}")]
    InvalidState(String),

    /// Argument rejected by an aggregate operation
    #[error("Illegal argument: {0}")]
    InvalidArgument(String),

    /// Session or authentication does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Token provider failure
    #[error(transparent)]
    Provider(#[from] TokenProviderError),

    /// Repository failure, surfaced unchanged
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Event publishing failed after the state change was saved
    #[error("Event publishing failed: {0}")]
    Publish(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether retrying the same call may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Provider(e) => e.is_retryable(),
            Error::Repository(e) => e.is_retriable(),
            Error::Publish(_) => true,
            _ => false,
        }
    }

    /// Whether this error reports a missing session or authentication
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound(_) => true,
            Error::Repository(e) => e.is_not_found(),
            _ => false,
        }
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

/// Error category reported by a token provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderErrorCode {
    /// Token issuance failed for a reason other than bad credentials
    TokenIssueFailed,
    /// Token validation could not be completed
    TokenValidationFailed,
    /// Token refresh failed
    TokenRefreshFailed,
    /// Username or password rejected
    InvalidCredentials,
    /// The presented token is past its lifetime
    TokenExpired,
    /// Provider unreachable or returned a server error
    ProviderUnavailable,
    /// Provider misconfigured (keys, endpoints)
    ConfigurationError,
}

impl ProviderErrorCode {
    /// Wire name of the code
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TokenIssueFailed => "TOKEN_ISSUE_FAILED",
            Self::TokenValidationFailed => "TOKEN_VALIDATION_FAILED",
            Self::TokenRefreshFailed => "TOKEN_REFRESH_FAILED",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::ProviderUnavailable => "PROVIDER_UNAVAILABLE",
            Self::ConfigurationError => "CONFIGURATION_ERROR",
        }
    }
}

impl fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error raised by a [`TokenProvider`](crate::provider::TokenProvider)
///
/// Every provider failure is reported through this one type so callers can
/// branch on [`code`](Self::code) without knowing which strategy is active.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{code}] {provider}: {message}")]
pub struct TokenProviderError {
    /// Error category
    pub code: ProviderErrorCode,
    /// Name of the provider that failed (e.g. "keycloak", "local_jwt")
    pub provider: String,
    /// Human-readable detail
    pub message: String,
}

impl TokenProviderError {
    /// Create a new provider error
    pub fn new(
        code: ProviderErrorCode,
        provider: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create an invalid credentials error
    pub fn invalid_credentials(provider: impl Into<String>) -> Self {
        Self::new(
            ProviderErrorCode::InvalidCredentials,
            provider,
            "Invalid credentials",
        )
    }

    /// Create a provider unavailable error
    pub fn unavailable(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ProviderUnavailable, provider, message)
    }

    /// Create a configuration error
    pub fn configuration(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ConfigurationError, provider, message)
    }

    /// Only transient unavailability is worth retrying
    pub fn is_retryable(&self) -> bool {
        self.code == ProviderErrorCode::ProviderUnavailable
    }
}
