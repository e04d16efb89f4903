//! Authentication aggregate
//!
//! One [`Authentication`] models one login attempt. It starts `Pending` and
//! moves exactly once to `Success` (with a [`Token`]) or `Failed` (with a
//! reason). Every mutator returns the [`AuthenticationEvent`] it produced; the
//! aggregate keeps no event buffer of its own.
//!
//! ```text
//! Pending ──mark_as_successful──▶ Success ──update_token / expire_token──▶ Success
//!    │
//!    └──────mark_as_failed───────▶ Failed
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::credentials::Credentials;
use super::token::Token;
use crate::error::Error;
use crate::ids::AuthenticationId;

/// Lifecycle status of an authentication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthenticationStatus {
    /// Credentials submitted, provider not yet answered
    Pending,
    /// Token issued
    Success,
    /// Rejected; terminal
    Failed,
}

impl fmt::Display for AuthenticationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Success => write!(f, "SUCCESS"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// Domain events produced by [`Authentication`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthenticationEvent {
    /// Credentials were submitted
    Attempted {
        /// Authentication id
        authentication_id: AuthenticationId,
        /// Submitted username
        username: String,
        /// When the attempt was recorded
        occurred_at: DateTime<Utc>,
    },
    /// A token was issued, or re-issued after a refresh
    Succeeded {
        /// Authentication id
        authentication_id: AuthenticationId,
        /// Authenticated username
        username: String,
        /// Access token lifetime in seconds
        expires_in: i64,
        /// When the token was issued
        occurred_at: DateTime<Utc>,
    },
    /// The attempt was rejected
    Failed {
        /// Authentication id
        authentication_id: AuthenticationId,
        /// Submitted username
        username: String,
        /// Why the attempt failed
        reason: String,
        /// When the failure was recorded
        occurred_at: DateTime<Utc>,
    },
    /// The issued token was expired (logout / revocation)
    TokenExpired {
        /// Authentication id
        authentication_id: AuthenticationId,
        /// Token owner
        username: String,
        /// When the token was expired
        occurred_at: DateTime<Utc>,
    },
}

impl AuthenticationEvent {
    /// Short name used for routing and logging
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Attempted { .. } => "attempted",
            Self::Succeeded { .. } => "succeeded",
            Self::Failed { .. } => "failed",
            Self::TokenExpired { .. } => "token_expired",
        }
    }

    /// The authentication this event belongs to
    pub fn authentication_id(&self) -> AuthenticationId {
        match self {
            Self::Attempted {
                authentication_id, ..
            }
            | Self::Succeeded {
                authentication_id, ..
            }
            | Self::Failed {
                authentication_id, ..
            }
            | Self::TokenExpired {
                authentication_id, ..
            } => *authentication_id,
        }
    }
}

/// A single authentication attempt and its outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Authentication {
    id: AuthenticationId,
    credentials: Credentials,
    status: AuthenticationStatus,
    token: Option<Token>,
    attempt_time: DateTime<Utc>,
    success_time: Option<DateTime<Utc>>,
    failure_time: Option<DateTime<Utc>>,
    failure_reason: Option<String>,
    token_expired_time: Option<DateTime<Utc>>,
}

impl Authentication {
    /// Start a new pending authentication
    pub fn attempt(credentials: Credentials) -> (Self, AuthenticationEvent) {
        Self::attempt_at(credentials, Utc::now())
    }

    /// Start a new pending authentication at an explicit instant
    pub fn attempt_at(credentials: Credentials, now: DateTime<Utc>) -> (Self, AuthenticationEvent) {
        let id = AuthenticationId::generate();
        let event = AuthenticationEvent::Attempted {
            authentication_id: id,
            username: credentials.username().to_string(),
            occurred_at: now,
        };
        let authentication = Self {
            id,
            credentials,
            status: AuthenticationStatus::Pending,
            token: None,
            attempt_time: now,
            success_time: None,
            failure_time: None,
            failure_reason: None,
            token_expired_time: None,
        };
        (authentication, event)
    }

    /// Complete the attempt with an issued token
    pub fn mark_as_successful(&mut self, token: Token) -> Result<AuthenticationEvent, Error> {
        self.mark_as_successful_at(token, Utc::now())
    }

    /// Complete the attempt with an issued token at an explicit instant
    pub fn mark_as_successful_at(
        &mut self,
        token: Token,
        now: DateTime<Utc>,
    ) -> Result<AuthenticationEvent, Error> {
        self.require_status(AuthenticationStatus::Pending, "mark as successful")?;

        let expires_in = token.expires_in();
        self.token = Some(token);
        self.status = AuthenticationStatus::Success;
        self.success_time = Some(now);

        Ok(AuthenticationEvent::Succeeded {
            authentication_id: self.id,
            username: self.username().to_string(),
            expires_in,
            occurred_at: now,
        })
    }

    /// Reject the attempt
    pub fn mark_as_failed(&mut self, reason: impl Into<String>) -> Result<AuthenticationEvent, Error> {
        self.mark_as_failed_at(reason, Utc::now())
    }

    /// Reject the attempt at an explicit instant
    pub fn mark_as_failed_at(
        &mut self,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<AuthenticationEvent, Error> {
        self.require_status(AuthenticationStatus::Pending, "mark as failed")?;

        let reason = reason.into();
        if reason.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "Failure reason must not be blank".to_string(),
            ));
        }

        self.status = AuthenticationStatus::Failed;
        self.failure_time = Some(now);
        self.failure_reason = Some(reason.clone());

        Ok(AuthenticationEvent::Failed {
            authentication_id: self.id,
            username: self.username().to_string(),
            reason,
            occurred_at: now,
        })
    }

    /// Replace the token after a refresh
    ///
    /// Re-issuance is reported as another `Succeeded` event.
    pub fn update_token(&mut self, token: Token) -> Result<AuthenticationEvent, Error> {
        self.update_token_at(token, Utc::now())
    }

    /// Replace the token after a refresh at an explicit instant
    pub fn update_token_at(
        &mut self,
        token: Token,
        now: DateTime<Utc>,
    ) -> Result<AuthenticationEvent, Error> {
        self.require_status(AuthenticationStatus::Success, "update token")?;

        let expires_in = token.expires_in();
        self.token = Some(token);
        self.success_time = Some(now);
        self.token_expired_time = None;

        Ok(AuthenticationEvent::Succeeded {
            authentication_id: self.id,
            username: self.username().to_string(),
            expires_in,
            occurred_at: now,
        })
    }

    /// Expire the current token
    pub fn expire_token(&mut self) -> Result<AuthenticationEvent, Error> {
        self.expire_token_at(Utc::now())
    }

    /// Expire the current token at an explicit instant
    pub fn expire_token_at(&mut self, now: DateTime<Utc>) -> Result<AuthenticationEvent, Error> {
        self.require_status(AuthenticationStatus::Success, "expire token")?;

        let expired = match &self.token {
            Some(token) if !token.is_expired() => token.expire(),
            Some(_) => {
                return Err(Error::InvalidState(format!(
                    "Authentication {} token is already expired",
                    self.id
                )))
            }
            None => {
                return Err(Error::InvalidState(format!(
                    "Authentication {} has no token to expire",
                    self.id
                )))
            }
        };

        self.token = Some(expired);
        self.token_expired_time = Some(now);

        Ok(AuthenticationEvent::TokenExpired {
            authentication_id: self.id,
            username: self.username().to_string(),
            occurred_at: now,
        })
    }

    /// True iff a token is present and not expired
    pub fn is_token_valid(&self) -> bool {
        self.token.as_ref().is_some_and(|t| !t.is_expired())
    }

    fn require_status(&self, expected: AuthenticationStatus, action: &str) -> Result<(), Error> {
        if self.status != expected {
            return Err(Error::InvalidState(format!(
                "Cannot {} authentication {}: status is {}, expected {}",
                action, self.id, self.status, expected
            )));
        }
        Ok(())
    }

    /// Authentication id
    pub fn id(&self) -> AuthenticationId {
        self.id
    }

    /// Submitted credentials
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Submitted username
    pub fn username(&self) -> &str {
        self.credentials.username()
    }

    /// Current status
    pub fn status(&self) -> AuthenticationStatus {
        self.status
    }

    /// Issued token, if any
    pub fn token(&self) -> Option<&Token> {
        self.token.as_ref()
    }

    /// When the attempt was made
    pub fn attempt_time(&self) -> DateTime<Utc> {
        self.attempt_time
    }

    /// When the token was (last) issued
    pub fn success_time(&self) -> Option<DateTime<Utc>> {
        self.success_time
    }

    /// When the attempt failed
    pub fn failure_time(&self) -> Option<DateTime<Utc>> {
        self.failure_time
    }

    /// Why the attempt failed
    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    /// When the token was expired
    pub fn token_expired_time(&self) -> Option<DateTime<Utc>> {
        self.token_expired_time
    }

    /// Whether the attempt is still pending
    pub fn is_pending(&self) -> bool {
        self.status == AuthenticationStatus::Pending
    }

    /// Whether the attempt succeeded
    pub fn is_successful(&self) -> bool {
        self.status == AuthenticationStatus::Success
    }

    /// Whether the attempt failed
    pub fn is_failed(&self) -> bool {
        self.status == AuthenticationStatus::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::token::TokenLifetimeBounds;

    fn credentials() -> Credentials {
        Credentials::new("validuser", "password123").unwrap()
    }

    fn token(access: &str) -> Token {
        Token::new(access, "refresh", 900, &TokenLifetimeBounds::default()).unwrap()
    }

    #[test]
    fn test_attempt_creates_pending_with_event() {
        let (auth, event) = Authentication::attempt(credentials());
        assert!(auth.is_pending());
        assert!(auth.token().is_none());
        assert!(!auth.is_token_valid());
        assert_eq!(event.kind(), "attempted");
        assert_eq!(event.authentication_id(), auth.id());
    }

    #[test]
    fn test_mark_as_successful() {
        let (mut auth, _) = Authentication::attempt(credentials());
        let event = auth.mark_as_successful(token("access")).unwrap();

        assert!(auth.is_successful());
        assert!(auth.success_time().is_some());
        assert!(auth.is_token_valid());
        assert!(matches!(event, AuthenticationEvent::Succeeded { expires_in: 900, .. }));
    }

    #[test]
    fn test_mark_as_failed() {
        let (mut auth, _) = Authentication::attempt(credentials());
        let event = auth.mark_as_failed("Invalid credentials").unwrap();

        assert!(auth.is_failed());
        assert_eq!(auth.failure_reason(), Some("Invalid credentials"));
        assert!(auth.failure_time().is_some());
        assert!(matches!(event, AuthenticationEvent::Failed { ref reason, .. } if reason == "Invalid credentials"));
    }

    #[test]
    fn test_blank_failure_reason_rejected() {
        let (mut auth, _) = Authentication::attempt(credentials());
        assert!(matches!(
            auth.mark_as_failed("   "),
            Err(Error::InvalidArgument(_))
        ));
        assert!(auth.is_pending());
    }

    #[test]
    fn test_terminal_states_are_final() {
        let (mut succeeded, _) = Authentication::attempt(credentials());
        succeeded.mark_as_successful(token("a")).unwrap();
        assert!(matches!(
            succeeded.mark_as_successful(token("b")),
            Err(Error::InvalidState(_))
        ));
        assert!(matches!(
            succeeded.mark_as_failed("late"),
            Err(Error::InvalidState(_))
        ));

        let (mut failed, _) = Authentication::attempt(credentials());
        failed.mark_as_failed("nope").unwrap();
        assert!(matches!(
            failed.mark_as_failed("again"),
            Err(Error::InvalidState(_))
        ));
        assert!(matches!(
            failed.mark_as_successful(token("a")),
            Err(Error::InvalidState(_))
        ));
    }

    #[test]
    fn test_update_token_requires_success() {
        let (mut pending, _) = Authentication::attempt(credentials());
        assert!(matches!(
            pending.update_token(token("a")),
            Err(Error::InvalidState(_))
        ));

        let (mut failed, _) = Authentication::attempt(credentials());
        failed.mark_as_failed("nope").unwrap();
        assert!(matches!(
            failed.update_token(token("a")),
            Err(Error::InvalidState(_))
        ));
    }

    #[test]
    fn test_update_token_reissues() {
        let t0 = Utc::now();
        let (mut auth, _) = Authentication::attempt_at(credentials(), t0);
        auth.mark_as_successful_at(token("first"), t0).unwrap();

        let later = t0 + chrono::Duration::minutes(10);
        let event = auth.update_token_at(token("second"), later).unwrap();

        assert_eq!(auth.token().unwrap().access_token(), "second");
        assert_eq!(auth.success_time(), Some(later));
        assert_eq!(event.kind(), "succeeded");
    }

    #[test]
    fn test_expire_token() {
        let (mut auth, _) = Authentication::attempt(credentials());
        auth.mark_as_successful(token("access")).unwrap();

        let event = auth.expire_token().unwrap();
        assert_eq!(event.kind(), "token_expired");
        assert!(!auth.is_token_valid());
        assert!(auth.token().unwrap().is_expired());
        assert!(auth.token_expired_time().is_some());

        // A second expiry has no live token to act on
        assert!(matches!(auth.expire_token(), Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_expire_token_outside_success() {
        let (mut pending, _) = Authentication::attempt(credentials());
        assert!(matches!(pending.expire_token(), Err(Error::InvalidState(_))));

        let (mut failed, _) = Authentication::attempt(credentials());
        failed.mark_as_failed("nope").unwrap();
        assert!(matches!(failed.expire_token(), Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_update_after_expiry_restores_validity() {
        let (mut auth, _) = Authentication::attempt(credentials());
        auth.mark_as_successful(token("a")).unwrap();
        auth.expire_token().unwrap();

        auth.update_token(token("b")).unwrap();
        assert!(auth.is_token_valid());
        assert!(auth.token_expired_time().is_none());
    }

    #[test]
    fn test_event_serialization_tag() {
        let (_, event) = Authentication::attempt(credentials());
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "attempted");
        assert_eq!(json["username"], "validuser");
    }
}
