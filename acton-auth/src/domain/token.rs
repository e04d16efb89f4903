//! Issued token pair value object

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Allowed range for a token's `expires_in`, in seconds
///
/// Each provider carries its own bounds (see `tokens` in the configuration),
/// so a misbehaving identity provider cannot hand out tokens that live for a
/// year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenLifetimeBounds {
    /// Smallest accepted lifetime (inclusive)
    pub min_secs: i64,
    /// Largest accepted lifetime (inclusive)
    pub max_secs: i64,
}

impl TokenLifetimeBounds {
    /// Create bounds, rejecting an empty or negative range
    pub fn new(min_secs: i64, max_secs: i64) -> Result<Self, Error> {
        if min_secs <= 0 {
            return Err(Error::Validation(
                "Minimum token lifetime must be positive".to_string(),
            ));
        }
        if max_secs < min_secs {
            return Err(Error::Validation(format!(
                "Maximum token lifetime ({}) is below the minimum ({})",
                max_secs, min_secs
            )));
        }
        Ok(Self { min_secs, max_secs })
    }

    /// Whether `expires_in` falls inside the bounds
    pub fn contains(&self, expires_in: i64) -> bool {
        (self.min_secs..=self.max_secs).contains(&expires_in)
    }
}

impl Default for TokenLifetimeBounds {
    fn default() -> Self {
        Self {
            min_secs: 60,
            max_secs: 86_400,
        }
    }
}

/// Access/refresh token pair returned by a provider
///
/// Immutable: [`expire`](Self::expire) returns a new instance and leaves the
/// original untouched. `Debug` prints a short prefix of long tokens and only
/// the length of short ones.
///
/// A deserialized token must have both tokens non-empty and a positive
/// `expires_in`. Provider bounds are not re-applied on reload.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredToken")]
pub struct Token {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    expired: bool,
}

impl Token {
    /// Validate and build a token pair
    ///
    /// Fails when either token is empty or `expires_in` is outside `bounds`.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_in: i64,
        bounds: &TokenLifetimeBounds,
    ) -> Result<Self, Error> {
        let access_token = access_token.into();
        let refresh_token = refresh_token.into();

        check_not_empty(&access_token, &refresh_token)?;
        if !bounds.contains(expires_in) {
            return Err(Error::Validation(format!(
                "Token lifetime {}s is outside [{}, {}]",
                expires_in, bounds.min_secs, bounds.max_secs
            )));
        }

        Ok(Self {
            access_token,
            refresh_token,
            expires_in,
            expired: false,
        })
    }

    /// The access token
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// The refresh token
    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    /// Access token lifetime in seconds
    pub fn expires_in(&self) -> i64 {
        self.expires_in
    }

    /// Whether the token has been explicitly expired
    pub fn is_expired(&self) -> bool {
        self.expired
    }

    /// Return an expired copy of this token
    #[must_use]
    pub fn expire(&self) -> Token {
        Token {
            expired: true,
            ..self.clone()
        }
    }
}

#[derive(Deserialize)]
struct StoredToken {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    #[serde(default)]
    expired: bool,
}

impl TryFrom<StoredToken> for Token {
    type Error = Error;

    fn try_from(stored: StoredToken) -> Result<Self, Self::Error> {
        check_not_empty(&stored.access_token, &stored.refresh_token)?;
        if stored.expires_in <= 0 {
            return Err(Error::Validation(format!(
                "Token lifetime must be positive, got {}s",
                stored.expires_in
            )));
        }
        Ok(Self {
            access_token: stored.access_token,
            refresh_token: stored.refresh_token,
            expires_in: stored.expires_in,
            expired: stored.expired,
        })
    }
}

fn check_not_empty(access_token: &str, refresh_token: &str) -> Result<(), Error> {
    if access_token.is_empty() {
        return Err(Error::Validation("Access token must not be empty".to_string()));
    }
    if refresh_token.is_empty() {
        return Err(Error::Validation(
            "Refresh token must not be empty".to_string(),
        ));
    }
    Ok(())
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &preview(&self.access_token))
            .field("refresh_token", &preview(&self.refresh_token))
            .field("expires_in", &self.expires_in)
            .field("expired", &self.expired)
            .finish()
    }
}

/// Tokens shorter than this print only their length
const PREVIEW_MIN_CHARS: usize = 32;
const PREVIEW_PREFIX_CHARS: usize = 8;

fn preview(token: &str) -> String {
    let len = token.chars().count();
    if len < PREVIEW_MIN_CHARS {
        return format!("<{} chars>", len);
    }
    let head: String = token.chars().take(PREVIEW_PREFIX_CHARS).collect();
    format!("{}...", head)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> TokenLifetimeBounds {
        TokenLifetimeBounds::new(60, 3600).unwrap()
    }

    #[test]
    fn test_valid_token() {
        let token = Token::new("access", "refresh", 900, &bounds()).unwrap();
        assert_eq!(token.access_token(), "access");
        assert_eq!(token.refresh_token(), "refresh");
        assert_eq!(token.expires_in(), 900);
        assert!(!token.is_expired());
    }

    #[test]
    fn test_empty_tokens_rejected() {
        assert!(Token::new("", "refresh", 900, &bounds()).is_err());
        assert!(Token::new("access", "", 900, &bounds()).is_err());
    }

    #[test]
    fn test_whitespace_tokens_are_not_empty() {
        let token = Token::new(" ", "refresh", 900, &bounds()).unwrap();
        assert_eq!(token.access_token(), " ");
    }

    #[test]
    fn test_lifetime_bounds_inclusive() {
        assert!(Token::new("a", "r", 59, &bounds()).is_err());
        assert!(Token::new("a", "r", 60, &bounds()).is_ok());
        assert!(Token::new("a", "r", 3600, &bounds()).is_ok());
        assert!(Token::new("a", "r", 3601, &bounds()).is_err());
    }

    #[test]
    fn test_expire_returns_new_instance() {
        let token = Token::new("access", "refresh", 900, &bounds()).unwrap();
        let expired = token.expire();

        assert!(expired.is_expired());
        assert!(!token.is_expired());
        assert_eq!(expired.access_token(), token.access_token());
    }

    #[test]
    fn test_expire_is_idempotent_by_value() {
        let token = Token::new("access", "refresh", 900, &bounds()).unwrap();
        assert_eq!(token.expire().expire(), token.expire());
    }

    #[test]
    fn test_invalid_bounds() {
        assert!(TokenLifetimeBounds::new(0, 100).is_err());
        assert!(TokenLifetimeBounds::new(100, 99).is_err());
        assert!(TokenLifetimeBounds::new(100, 100).is_ok());
    }

    #[test]
    fn test_debug_hides_full_token() {
        let access = "abcdefghijklmnopqrstuvwxyz0123456789";
        let token = Token::new(access, "qrstuvwxyz012345", 900, &bounds()).unwrap();
        let debug = format!("{:?}", token);
        assert!(!debug.contains(access));
        assert!(debug.contains("abcdefgh..."));
    }

    #[test]
    fn test_debug_prints_only_length_of_short_tokens() {
        let token = Token::new("secret", "refresh1", 900, &bounds()).unwrap();
        let debug = format!("{:?}", token);
        assert!(!debug.contains("secret"));
        assert!(!debug.contains("refresh1"));
        assert!(debug.contains("<6 chars>"));
        assert!(debug.contains("<8 chars>"));
    }

    #[test]
    fn test_deserialize_round_trip_keeps_expiry() {
        let token = Token::new("access", "refresh", 900, &bounds()).unwrap().expire();
        let json = serde_json::to_string(&token).unwrap();
        let back: Token = serde_json::from_str(&json).unwrap();
        assert_eq!(back, token);
        assert!(back.is_expired());
    }

    #[test]
    fn test_deserialize_rejects_invalid_tokens() {
        let empty = r#"{"access_token":"","refresh_token":"","expires_in":900,"expired":false}"#;
        assert!(serde_json::from_str::<Token>(empty).is_err());

        let negative = r#"{"access_token":"a","refresh_token":"r","expires_in":-5,"expired":false}"#;
        assert!(serde_json::from_str::<Token>(negative).is_err());
    }
}
