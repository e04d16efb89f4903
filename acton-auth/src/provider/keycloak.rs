//! Keycloak-backed token provider
//!
//! Tokens are issued and refreshed through the realm's token endpoint
//! (password and refresh grants). Validation asks the userinfo endpoint
//! first. Userinfo needs the `openid` scope, so a token without it gets 403
//! even though it may be perfectly valid; only then is the introspection
//! endpoint consulted. A 401 from userinfo means the token itself was
//! rejected and is reported as invalid without a second call.
//!
//! | Endpoint   | Status            | Result                                  |
//! |------------|-------------------|-----------------------------------------|
//! | token      | 200               | [`Token`]                               |
//! | token      | 400/401 `invalid_grant` | `INVALID_CREDENTIALS` / `TOKEN_EXPIRED` |
//! | token      | other 4xx         | `TOKEN_ISSUE_FAILED` / `TOKEN_REFRESH_FAILED` |
//! | userinfo   | 401               | invalid                                 |
//! | userinfo   | 403               | introspection                           |
//! | any        | 5xx, transport    | `PROVIDER_UNAVAILABLE`                  |

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::config::KeycloakConfig;
use super::{ProviderType, TokenProvider, ValidationResult};
use crate::domain::{Credentials, Token, TokenLifetimeBounds};
use crate::error::{ProviderErrorCode, TokenProviderError};

const PROVIDER: &str = "keycloak";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: String,
    expires_in: i64,
}

#[derive(Debug, Default, Deserialize)]
struct OAuthErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl OAuthErrorBody {
    fn describe(&self) -> &str {
        self.error_description
            .as_deref()
            .filter(|d| !d.is_empty())
            .unwrap_or(&self.error)
    }
}

#[derive(Debug, Clone, Copy)]
enum Grant {
    Password,
    Refresh,
}

impl Grant {
    fn failed_code(self) -> ProviderErrorCode {
        match self {
            Self::Password => ProviderErrorCode::TokenIssueFailed,
            Self::Refresh => ProviderErrorCode::TokenRefreshFailed,
        }
    }
}

/// [`TokenProvider`] that delegates to a Keycloak realm
#[derive(Clone)]
pub struct KeycloakProvider {
    client: Client,
    config: KeycloakConfig,
    token_url: String,
    userinfo_url: String,
    introspect_url: String,
    bounds: TokenLifetimeBounds,
}

impl KeycloakProvider {
    /// Build the provider and its HTTP client
    pub fn new(
        config: KeycloakConfig,
        bounds: TokenLifetimeBounds,
    ) -> Result<Self, TokenProviderError> {
        config
            .validate()
            .map_err(|e| TokenProviderError::configuration(PROVIDER, e))?;

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| {
                TokenProviderError::configuration(
                    PROVIDER,
                    format!("Failed to create HTTP client: {}", e),
                )
            })?;

        let base = config.openid_connect_base();
        Ok(Self {
            client,
            token_url: format!("{}/token", base),
            userinfo_url: format!("{}/userinfo", base),
            introspect_url: format!("{}/token/introspect", base),
            config,
            bounds,
        })
    }

    async fn request_token(
        &self,
        form: &[(&str, &str)],
        grant: Grant,
    ) -> Result<Token, TokenProviderError> {
        let response = self
            .client
            .post(&self.token_url)
            .form(form)
            .send()
            .await
            .map_err(|e| transport_error("token", e))?;

        let status = response.status();
        if status.is_success() {
            let body: TokenResponse = response
                .json()
                .await
                .map_err(|e| body_error(grant.failed_code(), "token", e))?;
            return Token::new(
                body.access_token,
                body.refresh_token,
                body.expires_in,
                &self.bounds,
            )
            .map_err(|e| TokenProviderError::new(grant.failed_code(), PROVIDER, e.to_string()));
        }

        if status.is_server_error() {
            warn!(status = %status, "Keycloak token endpoint returned server error");
            return Err(TokenProviderError::unavailable(
                PROVIDER,
                format!("Token endpoint returned {}", status),
            ));
        }

        let error: OAuthErrorBody = response.json().await.unwrap_or_default();
        let rejected = matches!(status, StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED)
            && error.error == "invalid_grant";

        match (rejected, grant) {
            (true, Grant::Password) => Err(TokenProviderError::invalid_credentials(PROVIDER)),
            (true, Grant::Refresh) => Err(TokenProviderError::new(
                ProviderErrorCode::TokenExpired,
                PROVIDER,
                format!("Refresh token rejected: {}", error.describe()),
            )),
            (false, _) => Err(TokenProviderError::new(
                grant.failed_code(),
                PROVIDER,
                format!("Token endpoint returned {}: {}", status, error.describe()),
            )),
        }
    }

    async fn userinfo(&self, access_token: &str) -> Result<ValidationResult, TokenProviderError> {
        let response = self
            .client
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| transport_error("userinfo", e))?;

        match response.status() {
            StatusCode::OK => {
                let claims: HashMap<String, Value> = response.json().await.map_err(|e| {
                    body_error(ProviderErrorCode::TokenValidationFailed, "userinfo", e)
                })?;
                result_from_claims(claims, "preferred_username")
            }
            StatusCode::UNAUTHORIZED => {
                Ok(ValidationResult::invalid("Token rejected by identity provider"))
            }
            StatusCode::FORBIDDEN => {
                debug!("Userinfo forbidden for token, falling back to introspection");
                self.introspect(access_token).await
            }
            status => Err(status_error("Userinfo", status)),
        }
    }

    async fn introspect(&self, access_token: &str) -> Result<ValidationResult, TokenProviderError> {
        let mut form = vec![
            ("token", access_token),
            ("client_id", self.config.client_id.as_str()),
        ];
        if let Some(secret) = self.config.client_secret.as_deref() {
            form.push(("client_secret", secret));
        }

        let response = self
            .client
            .post(&self.introspect_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| transport_error("introspection", e))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(status_error("Introspection", status));
        }

        let claims: HashMap<String, Value> = response.json().await.map_err(|e| {
            body_error(ProviderErrorCode::TokenValidationFailed, "introspection", e)
        })?;

        if !claims.get("active").and_then(Value::as_bool).unwrap_or(false) {
            return Ok(ValidationResult::invalid("Token is not active"));
        }
        result_from_claims(claims, "username")
    }
}

#[async_trait]
impl TokenProvider for KeycloakProvider {
    async fn issue_token(&self, credentials: &Credentials) -> Result<Token, TokenProviderError> {
        debug!(username = %credentials.username(), realm = %self.config.realm, "Requesting Keycloak password grant");

        let mut form = vec![
            ("grant_type", "password"),
            ("client_id", self.config.client_id.as_str()),
            ("username", credentials.username()),
            ("password", credentials.password()),
            ("scope", self.config.scope.as_str()),
        ];
        if let Some(secret) = self.config.client_secret.as_deref() {
            form.push(("client_secret", secret));
        }

        self.request_token(&form, Grant::Password).await
    }

    async fn validate_token(
        &self,
        access_token: &str,
    ) -> Result<ValidationResult, TokenProviderError> {
        self.userinfo(access_token).await
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<Token, TokenProviderError> {
        let mut form = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
        ];
        if let Some(secret) = self.config.client_secret.as_deref() {
            form.push(("client_secret", secret));
        }

        self.request_token(&form, Grant::Refresh).await
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::Keycloak
    }
}

fn transport_error(endpoint: &str, e: reqwest::Error) -> TokenProviderError {
    warn!(endpoint, error = %e, "Keycloak request failed");
    TokenProviderError::unavailable(PROVIDER, format!("{} request failed: {}", endpoint, e))
}

fn body_error(code: ProviderErrorCode, endpoint: &str, e: reqwest::Error) -> TokenProviderError {
    if e.is_timeout() {
        return transport_error(endpoint, e);
    }
    TokenProviderError::new(
        code,
        PROVIDER,
        format!("Malformed {} response: {}", endpoint, e),
    )
}

fn status_error(endpoint: &str, status: StatusCode) -> TokenProviderError {
    let message = format!("{} endpoint returned {}", endpoint, status);
    if status.is_server_error() {
        warn!(status = %status, "{}", message);
        TokenProviderError::unavailable(PROVIDER, message)
    } else {
        TokenProviderError::new(ProviderErrorCode::TokenValidationFailed, PROVIDER, message)
    }
}

fn result_from_claims(
    claims: HashMap<String, Value>,
    username_claim: &str,
) -> Result<ValidationResult, TokenProviderError> {
    let user_id = claims
        .get("sub")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            TokenProviderError::new(
                ProviderErrorCode::TokenValidationFailed,
                PROVIDER,
                "Identity provider response has no subject",
            )
        })?;
    let username = claims
        .get(username_claim)
        .and_then(Value::as_str)
        .map(str::to_string);
    let authorities = claims
        .get("realm_access")
        .and_then(|r| r.get("roles"))
        .and_then(Value::as_array)
        .map(|roles| {
            roles
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let expires_at = claims
        .get("exp")
        .and_then(Value::as_i64)
        .and_then(|exp| DateTime::<Utc>::from_timestamp(exp, 0));

    Ok(ValidationResult::valid(
        user_id,
        username,
        authorities,
        expires_at,
        claims,
    ))
}
