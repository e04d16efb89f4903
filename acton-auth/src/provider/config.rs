//! Provider configuration
//!
//! ```toml
//! [tokens]
//! min_expires_in_secs = 60
//! max_expires_in_secs = 86400
//!
//! [local_jwt]
//! algorithm = "HS256"
//! secret = "change-me-to-at-least-32-bytes-of-entropy"
//! issuer = "acton-auth"
//! access_token_lifetime_secs = 900
//! refresh_token_lifetime_secs = 604800
//!
//! [keycloak]
//! server_url = "https://sso.example.com"
//! realm = "main"
//! client_id = "api"
//! client_secret = "..."
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::TokenLifetimeBounds;

/// Accepted range for token lifetimes reported by any provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokensConfig {
    /// Smallest accepted `expires_in` (default: 60)
    #[serde(default = "default_min_expires_in")]
    pub min_expires_in_secs: i64,

    /// Largest accepted `expires_in` (default: 86400)
    #[serde(default = "default_max_expires_in")]
    pub max_expires_in_secs: i64,
}

impl Default for TokensConfig {
    fn default() -> Self {
        Self {
            min_expires_in_secs: default_min_expires_in(),
            max_expires_in_secs: default_max_expires_in(),
        }
    }
}

impl TokensConfig {
    /// Validate the configuration, returning an error message if invalid
    pub fn validate(&self) -> Result<(), String> {
        self.bounds().map(|_| ()).map_err(|e| e.to_string())
    }

    /// Bounds to enforce on issued tokens
    pub fn bounds(&self) -> Result<TokenLifetimeBounds, crate::error::Error> {
        TokenLifetimeBounds::new(self.min_expires_in_secs, self.max_expires_in_secs)
    }
}

/// Local JWT signing configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalJwtConfig {
    /// Signing algorithm: HS256/384/512, RS256/384/512, ES256/384
    #[serde(default = "default_algorithm")]
    pub algorithm: String,

    /// Shared secret for HMAC algorithms
    #[serde(default)]
    pub secret: Option<String>,

    /// PEM private key for RSA/EC algorithms
    #[serde(default)]
    pub private_key_path: Option<PathBuf>,

    /// PEM public key for RSA/EC algorithms
    #[serde(default)]
    pub public_key_path: Option<PathBuf>,

    /// `iss` claim, checked on validation when set
    #[serde(default)]
    pub issuer: Option<String>,

    /// `aud` claim, checked on validation when set
    #[serde(default)]
    pub audience: Option<String>,

    /// Access token lifetime (default: 900 = 15 min)
    #[serde(default = "default_access_token_lifetime")]
    pub access_token_lifetime_secs: i64,

    /// Refresh token lifetime (default: 604800 = 7 days)
    #[serde(default = "default_refresh_token_lifetime")]
    pub refresh_token_lifetime_secs: i64,
}

impl Default for LocalJwtConfig {
    fn default() -> Self {
        Self {
            algorithm: default_algorithm(),
            secret: None,
            private_key_path: None,
            public_key_path: None,
            issuer: None,
            audience: None,
            access_token_lifetime_secs: default_access_token_lifetime(),
            refresh_token_lifetime_secs: default_refresh_token_lifetime(),
        }
    }
}

impl LocalJwtConfig {
    /// HMAC configuration with an inline secret
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: Some(secret.into()),
            ..Default::default()
        }
    }

    /// Validate the configuration, returning an error message if invalid
    pub fn validate(&self) -> Result<(), String> {
        let algorithm = self.algorithm.to_uppercase();
        if algorithm.starts_with("HS") {
            if self.secret.as_deref().unwrap_or_default().is_empty() {
                return Err(format!("local_jwt.secret is required for {}", algorithm));
            }
        } else if self.private_key_path.is_none() || self.public_key_path.is_none() {
            return Err(format!(
                "local_jwt.private_key_path and public_key_path are required for {}",
                algorithm
            ));
        }
        if self.access_token_lifetime_secs <= 0 {
            return Err("local_jwt.access_token_lifetime_secs must be greater than 0".to_string());
        }
        if self.refresh_token_lifetime_secs <= 0 {
            return Err(
                "local_jwt.refresh_token_lifetime_secs must be greater than 0".to_string(),
            );
        }
        Ok(())
    }
}

/// Keycloak realm configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeycloakConfig {
    /// Base URL, e.g. `https://sso.example.com`
    pub server_url: String,

    /// Realm name
    pub realm: String,

    /// OAuth client id
    pub client_id: String,

    /// OAuth client secret, for confidential clients
    #[serde(default)]
    pub client_secret: Option<String>,

    /// Scope requested on the password grant (default: "openid")
    #[serde(default = "default_scope")]
    pub scope: String,

    /// TCP connect timeout (default: 5)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Whole-request timeout (default: 10)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl KeycloakConfig {
    /// Configuration with default scope and timeouts
    pub fn new(
        server_url: impl Into<String>,
        realm: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            server_url: server_url.into(),
            realm: realm.into(),
            client_id: client_id.into(),
            client_secret: None,
            scope: default_scope(),
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }

    /// Validate the configuration, returning an error message if invalid
    pub fn validate(&self) -> Result<(), String> {
        if !(self.server_url.starts_with("http://") || self.server_url.starts_with("https://")) {
            return Err("keycloak.server_url must be an http(s) URL".to_string());
        }
        if self.realm.trim().is_empty() {
            return Err("keycloak.realm must not be empty".to_string());
        }
        if self.client_id.trim().is_empty() {
            return Err("keycloak.client_id must not be empty".to_string());
        }
        if self.connect_timeout_secs == 0 || self.request_timeout_secs == 0 {
            return Err("keycloak timeouts must be greater than 0".to_string());
        }
        Ok(())
    }

    /// `{server}/realms/{realm}/protocol/openid-connect`
    pub fn openid_connect_base(&self) -> String {
        format!(
            "{}/realms/{}/protocol/openid-connect",
            self.server_url.trim_end_matches('/'),
            self.realm
        )
    }
}

fn default_min_expires_in() -> i64 {
    60
}

fn default_max_expires_in() -> i64 {
    86_400
}

fn default_algorithm() -> String {
    "HS256".to_string()
}

fn default_access_token_lifetime() -> i64 {
    900 // 15 minutes
}

fn default_refresh_token_lifetime() -> i64 {
    604_800 // 7 days
}

fn default_scope() -> String {
    "openid".to_string()
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_request_timeout() -> u64 {
    10
}
