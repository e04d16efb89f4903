//! Token providers
//!
//! A [`TokenProvider`] issues, validates and refreshes tokens. Two strategies
//! are interchangeable behind the trait:
//!
//! - [`LocalJwtProvider`] signs and verifies JWTs in-process against a
//!   [`UserDirectory`]
//! - [`KeycloakProvider`] delegates to a Keycloak realm over HTTP, validating
//!   through userinfo and falling back to introspection on HTTP 403
//!
//! Every failure is a [`TokenProviderError`] carrying a
//! [`ProviderErrorCode`](crate::error::ProviderErrorCode). A token that is
//! merely invalid is not an error: validation returns
//! [`ValidationResult::invalid`] with the reason in `claims["reason"]`.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Credentials, Token};
use crate::error::TokenProviderError;

pub mod config;
pub mod directory;
pub mod keycloak;
pub mod local_jwt;

pub use config::{KeycloakConfig, LocalJwtConfig, TokensConfig};
pub use directory::{InMemoryUserDirectory, UserDirectory, UserRecord};
pub use keycloak::KeycloakProvider;
pub use local_jwt::LocalJwtProvider;

/// Which strategy a provider implements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    /// Remote Keycloak realm
    Keycloak,
    /// In-process JWT signing
    LocalJwt,
}

impl ProviderType {
    /// Name used in errors and log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Keycloak => "keycloak",
            Self::LocalJwt => "local_jwt",
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of validating an access token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Whether the token is currently valid
    pub valid: bool,
    /// Subject of the token
    pub user_id: Option<String>,
    /// Username of the subject
    pub username: Option<String>,
    /// Roles granted to the subject
    pub authorities: Vec<String>,
    /// When the token expires, if known
    pub expires_at: Option<DateTime<Utc>>,
    /// Raw claims; holds `reason` for invalid results
    pub claims: HashMap<String, serde_json::Value>,
}

impl ValidationResult {
    /// A valid result
    pub fn valid(
        user_id: impl Into<String>,
        username: Option<String>,
        authorities: Vec<String>,
        expires_at: Option<DateTime<Utc>>,
        claims: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            valid: true,
            user_id: Some(user_id.into()),
            username,
            authorities,
            expires_at,
            claims,
        }
    }

    /// An invalid result with a reason
    pub fn invalid(reason: impl Into<String>) -> Self {
        let mut claims = HashMap::new();
        claims.insert(
            "reason".to_string(),
            serde_json::Value::String(reason.into()),
        );
        Self {
            valid: false,
            user_id: None,
            username: None,
            authorities: Vec::new(),
            expires_at: None,
            claims,
        }
    }

    /// Why the token was rejected, for invalid results
    pub fn reason(&self) -> Option<&str> {
        self.claims.get("reason").and_then(|v| v.as_str())
    }
}

/// Strategy for issuing, validating and refreshing tokens
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Exchange credentials for a token pair
    ///
    /// Rejected credentials fail with `INVALID_CREDENTIALS`.
    async fn issue_token(&self, credentials: &Credentials) -> Result<Token, TokenProviderError>;

    /// Check an access token
    ///
    /// An invalid token yields `Ok` with `valid == false`; `Err` is reserved
    /// for cases where validity could not be determined.
    async fn validate_token(&self, access_token: &str)
        -> Result<ValidationResult, TokenProviderError>;

    /// Exchange a refresh token for a new pair
    async fn refresh_token(&self, refresh_token: &str) -> Result<Token, TokenProviderError>;

    /// Which strategy this is
    fn provider_type(&self) -> ProviderType;
}
