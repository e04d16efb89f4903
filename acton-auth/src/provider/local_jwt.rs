//! In-process JWT provider
//!
//! Issues an access/refresh pair of JWTs for users found in a
//! [`UserDirectory`]. The two tokens share a signing key and are told apart
//! by the `typ` claim, so a refresh token is never accepted as an access
//! token and vice versa.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::config::LocalJwtConfig;
use super::directory::{UserDirectory, UserRecord};
use super::{ProviderType, TokenProvider, ValidationResult};
use crate::domain::{Credentials, Token, TokenLifetimeBounds};
use crate::error::{ProviderErrorCode, TokenProviderError};

const PROVIDER: &str = "local_jwt";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize)]
struct LocalClaims {
    sub: String,
    username: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    roles: Vec<String>,
    iat: i64,
    exp: i64,
    jti: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    iss: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    aud: Option<String>,
    typ: TokenKind,
}

/// [`TokenProvider`] that signs and verifies JWTs locally
#[derive(Clone)]
pub struct LocalJwtProvider {
    encoding_key: Arc<EncodingKey>,
    decoding_key: Arc<DecodingKey>,
    algorithm: Algorithm,
    issuer: Option<String>,
    audience: Option<String>,
    access_lifetime_secs: i64,
    refresh_lifetime_secs: i64,
    bounds: TokenLifetimeBounds,
    directory: Arc<dyn UserDirectory>,
}

impl LocalJwtProvider {
    /// Build the provider, loading key material
    ///
    /// Fails with `CONFIGURATION_ERROR` for unknown algorithms, unreadable or
    /// malformed keys, or an access lifetime outside `bounds`.
    pub fn new(
        config: &LocalJwtConfig,
        bounds: TokenLifetimeBounds,
        directory: Arc<dyn UserDirectory>,
    ) -> Result<Self, TokenProviderError> {
        config.validate().map_err(configuration_error)?;

        let algorithm = parse_algorithm(&config.algorithm)?;
        let (encoding_key, decoding_key) = load_keys(config, algorithm)?;

        if !bounds.contains(config.access_token_lifetime_secs) {
            return Err(configuration_error(format!(
                "access_token_lifetime_secs {} is outside [{}, {}]",
                config.access_token_lifetime_secs, bounds.min_secs, bounds.max_secs
            )));
        }

        Ok(Self {
            encoding_key: Arc::new(encoding_key),
            decoding_key: Arc::new(decoding_key),
            algorithm,
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            access_lifetime_secs: config.access_token_lifetime_secs,
            refresh_lifetime_secs: config.refresh_token_lifetime_secs,
            bounds,
            directory,
        })
    }

    fn issue_pair(&self, user: &UserRecord, code: ProviderErrorCode) -> Result<Token, TokenProviderError> {
        let now = Utc::now().timestamp();
        let access = self.sign(user, TokenKind::Access, now, self.access_lifetime_secs, code)?;
        let refresh = self.sign(user, TokenKind::Refresh, now, self.refresh_lifetime_secs, code)?;

        Token::new(access, refresh, self.access_lifetime_secs, &self.bounds)
            .map_err(|e| TokenProviderError::new(code, PROVIDER, e.to_string()))
    }

    fn sign(
        &self,
        user: &UserRecord,
        typ: TokenKind,
        issued_at: i64,
        lifetime_secs: i64,
        code: ProviderErrorCode,
    ) -> Result<String, TokenProviderError> {
        let claims = LocalClaims {
            sub: user.user_id.clone(),
            username: user.username.clone(),
            roles: user.roles.clone(),
            iat: issued_at,
            exp: issued_at + lifetime_secs,
            jti: uuid::Uuid::new_v4().to_string(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            typ,
        };

        encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| TokenProviderError::new(code, PROVIDER, format!("Failed to sign token: {}", e)))
    }

    fn decode(&self, token: &str) -> Result<LocalClaims, jsonwebtoken::errors::Error> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }
        match &self.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        decode::<LocalClaims>(token, &self.decoding_key, &validation).map(|data| data.claims)
    }
}

#[async_trait]
impl TokenProvider for LocalJwtProvider {
    async fn issue_token(&self, credentials: &Credentials) -> Result<Token, TokenProviderError> {
        let user = self
            .directory
            .authenticate(credentials.username(), credentials.password())
            .await
            .map_err(|e| {
                TokenProviderError::new(ProviderErrorCode::TokenIssueFailed, PROVIDER, e.to_string())
            })?
            .ok_or_else(|| TokenProviderError::invalid_credentials(PROVIDER))?;

        debug!(username = %user.username, "Issuing local JWT pair");
        self.issue_pair(&user, ProviderErrorCode::TokenIssueFailed)
    }

    async fn validate_token(
        &self,
        access_token: &str,
    ) -> Result<ValidationResult, TokenProviderError> {
        let claims = match self.decode(access_token) {
            Ok(claims) => claims,
            Err(e) if matches!(e.kind(), ErrorKind::ExpiredSignature) => {
                return Ok(ValidationResult::invalid("Token expired"));
            }
            Err(e) => return Ok(ValidationResult::invalid(format!("Invalid token: {}", e))),
        };

        if claims.typ != TokenKind::Access {
            return Ok(ValidationResult::invalid("Not an access token"));
        }

        let expires_at = DateTime::<Utc>::from_timestamp(claims.exp, 0);
        let raw: HashMap<String, serde_json::Value> = serde_json::to_value(&claims)
            .ok()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();

        Ok(ValidationResult::valid(
            claims.sub,
            Some(claims.username),
            claims.roles,
            expires_at,
            raw,
        ))
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<Token, TokenProviderError> {
        let claims = self.decode(refresh_token).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenProviderError::new(
                ProviderErrorCode::TokenExpired,
                PROVIDER,
                "Refresh token expired",
            ),
            _ => TokenProviderError::new(
                ProviderErrorCode::TokenRefreshFailed,
                PROVIDER,
                format!("Invalid refresh token: {}", e),
            ),
        })?;

        if claims.typ != TokenKind::Refresh {
            return Err(TokenProviderError::new(
                ProviderErrorCode::TokenRefreshFailed,
                PROVIDER,
                "Not a refresh token",
            ));
        }

        let user = self
            .directory
            .find_by_username(&claims.username)
            .await
            .map_err(|e| {
                TokenProviderError::new(
                    ProviderErrorCode::TokenRefreshFailed,
                    PROVIDER,
                    e.to_string(),
                )
            })?
            .filter(|user| user.user_id == claims.sub)
            .ok_or_else(|| TokenProviderError::invalid_credentials(PROVIDER))?;

        debug!(username = %user.username, "Refreshing local JWT pair");
        self.issue_pair(&user, ProviderErrorCode::TokenRefreshFailed)
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::LocalJwt
    }
}

fn configuration_error(message: impl Into<String>) -> TokenProviderError {
    TokenProviderError::configuration(PROVIDER, message)
}

fn parse_algorithm(alg: &str) -> Result<Algorithm, TokenProviderError> {
    match alg.to_uppercase().as_str() {
        "RS256" => Ok(Algorithm::RS256),
        "RS384" => Ok(Algorithm::RS384),
        "RS512" => Ok(Algorithm::RS512),
        "ES256" => Ok(Algorithm::ES256),
        "ES384" => Ok(Algorithm::ES384),
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        _ => Err(configuration_error(format!(
            "Unsupported JWT algorithm: {}",
            alg
        ))),
    }
}

fn read_pem(path: Option<&Path>, which: &str) -> Result<Vec<u8>, TokenProviderError> {
    let path = path.ok_or_else(|| configuration_error(format!("Missing {} key path", which)))?;
    fs::read(path).map_err(|e| {
        configuration_error(format!(
            "Failed to read JWT {} key '{}': {}",
            which,
            path.display(),
            e
        ))
    })
}

fn load_keys(
    config: &LocalJwtConfig,
    algorithm: Algorithm,
) -> Result<(EncodingKey, DecodingKey), TokenProviderError> {
    let key_error = |e: jsonwebtoken::errors::Error| configuration_error(format!("Invalid key: {}", e));

    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
            let secret = config.secret.as_deref().unwrap_or_default().as_bytes();
            Ok((
                EncodingKey::from_secret(secret),
                DecodingKey::from_secret(secret),
            ))
        }
        Algorithm::RS256 | Algorithm::RS384 | Algorithm::RS512 => {
            let private = read_pem(config.private_key_path.as_deref(), "private")?;
            let public = read_pem(config.public_key_path.as_deref(), "public")?;
            Ok((
                EncodingKey::from_rsa_pem(&private).map_err(key_error)?,
                DecodingKey::from_rsa_pem(&public).map_err(key_error)?,
            ))
        }
        Algorithm::ES256 | Algorithm::ES384 => {
            let private = read_pem(config.private_key_path.as_deref(), "private")?;
            let public = read_pem(config.public_key_path.as_deref(), "public")?;
            Ok((
                EncodingKey::from_ec_pem(&private).map_err(key_error)?,
                DecodingKey::from_ec_pem(&public).map_err(key_error)?,
            ))
        }
        _ => Err(configuration_error("Unsupported algorithm for key creation")),
    }
}
