//! Authentication use cases
//!
//! [`AuthenticationService::authenticate`] drives one login attempt:
//!
//! 1. create a pending [`Authentication`]
//! 2. refuse immediately if the caller's session is locked, otherwise ask the
//!    [`TokenProvider`] for a token
//! 3. save the terminal aggregate and publish the attempt event followed by
//!    exactly one terminal event
//! 4. with an [`AttemptContext`], feed failures to the suspicious-activity
//!    monitor and record the scored attempt against the session
//!
//! Provider failures never escape `authenticate`; they become a `FAILED`
//! authentication with a readable reason. Repository and publish failures
//! propagate.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use super::risk::RiskAssessor;
use super::session::SessionService;
use crate::activity::SuspiciousActivityMonitor;
use crate::domain::{Authentication, AuthenticationEvent, Credentials, Token};
use crate::error::{Error, ProviderErrorCode, Result, TokenProviderError};
use crate::events::EventPublisher;
use crate::ids::{AuthenticationId, SessionId};
use crate::provider::{TokenProvider, ValidationResult};
use crate::repository::{AuthenticationRepository, AuthenticationSessionRepository};

/// Where an attempt comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptContext {
    /// Session the attempt is recorded against
    pub session_id: SessionId,
    /// Client address, used for brute-force detection
    pub client_ip: String,
}

impl AttemptContext {
    /// Build a context
    pub fn new(session_id: SessionId, client_ip: impl Into<String>) -> Self {
        Self {
            session_id,
            client_ip: client_ip.into(),
        }
    }
}

/// Result of [`AuthenticationService::authenticate`]
#[derive(Debug, Clone)]
pub struct AuthenticationOutcome {
    /// The terminal authentication
    pub authentication: Authentication,
    /// Whether the session is locked after this attempt
    pub locked: bool,
    /// End of the lock, when locked
    pub locked_until: Option<DateTime<Utc>>,
}

impl AuthenticationOutcome {
    /// The attempt produced a token
    pub fn is_success(&self) -> bool {
        self.authentication.is_successful()
    }

    /// The attempt was rejected
    pub fn is_failure(&self) -> bool {
        self.authentication.is_failed()
    }

    /// Why the attempt was rejected
    pub fn failure_reason(&self) -> Option<&str> {
        self.authentication.failure_reason()
    }

    /// The issued token
    pub fn token(&self) -> Option<&Token> {
        self.authentication.token()
    }
}

/// Orchestrates provider, repositories, events and lockout
pub struct AuthenticationService<A, S> {
    provider: Arc<dyn TokenProvider>,
    repository: A,
    publisher: Arc<dyn EventPublisher>,
    sessions: Arc<SessionService<S>>,
    monitor: Arc<SuspiciousActivityMonitor>,
    risk: RiskAssessor,
}

impl<A, S> AuthenticationService<A, S>
where
    A: AuthenticationRepository,
    S: AuthenticationSessionRepository,
{
    /// Wire the use case; risk scoring follows the monitor's threshold
    pub fn new(
        provider: Arc<dyn TokenProvider>,
        repository: A,
        publisher: Arc<dyn EventPublisher>,
        sessions: Arc<SessionService<S>>,
        monitor: Arc<SuspiciousActivityMonitor>,
    ) -> Self {
        let risk = RiskAssessor::new(monitor.threshold());
        Self {
            provider,
            repository,
            publisher,
            sessions,
            monitor,
            risk,
        }
    }

    /// Authenticate `credentials`, optionally within a session
    pub async fn authenticate(
        &self,
        credentials: Credentials,
        context: Option<&AttemptContext>,
    ) -> Result<AuthenticationOutcome> {
        let now = Utc::now();
        let (mut authentication, attempted) = Authentication::attempt_at(credentials, now);

        let locked_until = match context {
            Some(ctx) => self.sessions.locked_until(&ctx.session_id, now).await?,
            None => None,
        };

        let terminal = match locked_until {
            Some(until) => {
                warn!(
                    username = %authentication.username(),
                    locked_until = %until,
                    "Authentication refused: session locked"
                );
                authentication
                    .mark_as_failed_at(format!("Account locked until {}", until.to_rfc3339()), now)?
            }
            None => match self.provider.issue_token(authentication.credentials()).await {
                Ok(token) => {
                    info!(
                        username = %authentication.username(),
                        provider = %self.provider.provider_type(),
                        "Authentication succeeded"
                    );
                    authentication.mark_as_successful_at(token, Utc::now())?
                }
                Err(e) => {
                    warn!(
                        username = %authentication.username(),
                        provider = %e.provider,
                        code = %e.code,
                        "Authentication failed"
                    );
                    authentication.mark_as_failed_at(failure_reason(&e), Utc::now())?
                }
            },
        };

        self.repository.save(&authentication).await?;
        self.publish(attempted).await?;
        self.publish(terminal).await?;

        let (locked, locked_until) = match context {
            Some(ctx) => self.record_in_session(&authentication, ctx).await?,
            None => (false, None),
        };

        Ok(AuthenticationOutcome {
            authentication,
            locked,
            locked_until,
        })
    }

    /// Validate an access token
    ///
    /// Tokens revoked through [`logout`](Self::logout) are reported invalid
    /// even when the provider still accepts them.
    pub async fn validate_token(&self, access_token: &str) -> Result<ValidationResult> {
        let result = self.provider.validate_token(access_token).await?;
        if !result.valid {
            return Ok(result);
        }

        let revoked = self
            .repository
            .find_by_access_token(access_token)
            .await?
            .is_some_and(|auth| !auth.is_token_valid());
        if revoked {
            return Ok(ValidationResult::invalid("Token revoked"));
        }
        Ok(result)
    }

    /// Exchange a refresh token for a new pair on the stored authentication
    ///
    /// Fails with [`Error::NotFound`] for an unknown refresh token and with
    /// [`Error::InvalidState`] after logout.
    pub async fn refresh(&self, refresh_token: &str) -> Result<Authentication> {
        let mut authentication = self
            .repository
            .find_by_refresh_token(refresh_token)
            .await?
            .ok_or_else(|| Error::NotFound("No authentication for refresh token".to_string()))?;

        if !authentication.is_token_valid() {
            return Err(Error::InvalidState(format!(
                "Authentication {} token has been revoked",
                authentication.id()
            )));
        }

        let token = self.provider.refresh_token(refresh_token).await?;
        let event = authentication.update_token(token)?;
        self.repository.save(&authentication).await?;
        self.publish(event).await?;

        info!(
            authentication_id = %authentication.id(),
            username = %authentication.username(),
            "Token refreshed"
        );
        Ok(authentication)
    }

    /// Expire the token carrying `access_token`
    pub async fn logout(&self, access_token: &str) -> Result<Authentication> {
        let mut authentication = self
            .repository
            .find_by_access_token(access_token)
            .await?
            .ok_or_else(|| Error::NotFound("No authentication for access token".to_string()))?;

        let event = authentication.expire_token()?;
        self.repository.save(&authentication).await?;
        self.publish(event).await?;

        info!(
            authentication_id = %authentication.id(),
            username = %authentication.username(),
            "Token expired by logout"
        );
        Ok(authentication)
    }

    /// Load an authentication by id
    pub async fn find(&self, id: &AuthenticationId) -> Result<Option<Authentication>> {
        Ok(self.repository.find_by_id(id).await?)
    }

    /// Newest successful authentication for `username`
    pub async fn latest_successful(&self, username: &str) -> Result<Option<Authentication>> {
        Ok(self
            .repository
            .find_latest_successful_by_username(username)
            .await?)
    }

    /// Session service backing lockout
    pub fn sessions(&self) -> &Arc<SessionService<S>> {
        &self.sessions
    }

    /// Suspicious-activity monitor fed by failures
    pub fn monitor(&self) -> &Arc<SuspiciousActivityMonitor> {
        &self.monitor
    }

    async fn record_in_session(
        &self,
        authentication: &Authentication,
        ctx: &AttemptContext,
    ) -> Result<(bool, Option<DateTime<Utc>>)> {
        let success = authentication.is_successful();
        let at = authentication
            .failure_time()
            .or(authentication.success_time())
            .unwrap_or(authentication.attempt_time());

        let recent_failures = if success {
            self.monitor.failures_in_window(&ctx.client_ip, at)
        } else {
            self.monitor.record_failure(&ctx.client_ip, at)
        };
        let risk_level = self.risk.assess(success, recent_failures)?;

        let outcome = self
            .sessions
            .record_attempt(
                ctx.session_id,
                authentication.username(),
                &ctx.client_ip,
                success,
                risk_level,
            )
            .await?;
        Ok((outcome.locked, outcome.locked_until))
    }

    async fn publish(&self, event: AuthenticationEvent) -> Result<()> {
        let kind = event.kind();
        let authentication_id = event.authentication_id();
        self.publisher.publish(event).await.inspect_err(|e| {
            error!(
                event = kind,
                authentication_id = %authentication_id,
                error = %e,
                "Failed to publish authentication event"
            );
        })
    }
}

fn failure_reason(err: &TokenProviderError) -> String {
    match err.code {
        ProviderErrorCode::InvalidCredentials => "Invalid credentials".to_string(),
        ProviderErrorCode::ProviderUnavailable => {
            format!("Authentication provider unavailable: {}", err.message)
        }
        _ => format!("Authentication failed: {}", err.message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::SuspiciousActivityConfig;
    use crate::domain::{LockoutPolicy, SessionEvent, TokenLifetimeBounds};
    use crate::events::InMemoryEventPublisher;
    use crate::provider::ProviderType;
    use crate::repository::{InMemoryAuthenticationRepository, InMemorySessionRepository};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Accepts validuser/password123; can be switched to unavailable
    struct StubProvider {
        unavailable: AtomicBool,
        issued: AtomicUsize,
    }

    impl StubProvider {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                unavailable: AtomicBool::new(false),
                issued: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TokenProvider for StubProvider {
        async fn issue_token(
            &self,
            credentials: &Credentials,
        ) -> std::result::Result<Token, TokenProviderError> {
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(TokenProviderError::unavailable("stub", "connection refused"));
            }
            if credentials.username() != "validuser" || credentials.password() != "password123" {
                return Err(TokenProviderError::invalid_credentials("stub"));
            }
            let n = self.issued.fetch_add(1, Ordering::SeqCst);
            Ok(Token::new(
                format!("access-{}", n),
                format!("refresh-{}", n),
                900,
                &TokenLifetimeBounds::default(),
            )
            .unwrap())
        }

        async fn validate_token(
            &self,
            access_token: &str,
        ) -> std::result::Result<ValidationResult, TokenProviderError> {
            if access_token.starts_with("access-") {
                Ok(ValidationResult::valid(
                    "user-1",
                    Some("validuser".to_string()),
                    Vec::new(),
                    None,
                    Default::default(),
                ))
            } else {
                Ok(ValidationResult::invalid("Unknown token"))
            }
        }

        async fn refresh_token(
            &self,
            refresh_token: &str,
        ) -> std::result::Result<Token, TokenProviderError> {
            if !refresh_token.starts_with("refresh-") {
                return Err(TokenProviderError::new(
                    ProviderErrorCode::TokenRefreshFailed,
                    "stub",
                    "bad refresh token",
                ));
            }
            let n = self.issued.fetch_add(1, Ordering::SeqCst);
            Ok(Token::new(
                format!("access-{}", n),
                format!("refresh-{}", n),
                900,
                &TokenLifetimeBounds::default(),
            )
            .unwrap())
        }

        fn provider_type(&self) -> ProviderType {
            ProviderType::LocalJwt
        }
    }

    struct Fixture {
        service: AuthenticationService<InMemoryAuthenticationRepository, InMemorySessionRepository>,
        provider: Arc<StubProvider>,
        repository: InMemoryAuthenticationRepository,
        publisher: InMemoryEventPublisher,
    }

    fn fixture() -> Fixture {
        let provider = StubProvider::new();
        let repository = InMemoryAuthenticationRepository::new();
        let publisher = InMemoryEventPublisher::new();
        let sessions = Arc::new(SessionService::new(
            InMemorySessionRepository::new(),
            Arc::new(publisher.clone()),
            LockoutPolicy::default(),
        ));
        let monitor = Arc::new(SuspiciousActivityMonitor::new(
            SuspiciousActivityConfig::default(),
        ));
        let service = AuthenticationService::new(
            provider.clone(),
            repository.clone(),
            Arc::new(publisher.clone()),
            sessions,
            monitor,
        );
        Fixture {
            service,
            provider,
            repository,
            publisher,
        }
    }

    fn good() -> Credentials {
        Credentials::new("validuser", "password123").unwrap()
    }

    fn bad() -> Credentials {
        Credentials::new("validuser", "wrongpassword").unwrap()
    }

    fn kinds(publisher: &InMemoryEventPublisher) -> Vec<&'static str> {
        publisher
            .authentication_events()
            .iter()
            .map(|e| e.kind())
            .collect()
    }

    #[tokio::test]
    async fn test_success_publishes_attempt_then_success() {
        let f = fixture();
        let outcome = f.service.authenticate(good(), None).await.unwrap();

        assert!(outcome.is_success());
        assert!(outcome.authentication.is_token_valid());
        assert_eq!(outcome.token().unwrap().access_token(), "access-0");
        assert_eq!(kinds(&f.publisher), vec!["attempted", "succeeded"]);
        assert_eq!(f.repository.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_credentials_reason() {
        let f = fixture();
        let outcome = f.service.authenticate(bad(), None).await.unwrap();

        assert!(outcome.is_failure());
        assert!(outcome
            .failure_reason()
            .unwrap()
            .contains("Invalid credentials"));
        assert_eq!(kinds(&f.publisher), vec!["attempted", "failed"]);
    }

    #[tokio::test]
    async fn test_unavailable_provider_reason() {
        let f = fixture();
        f.provider.unavailable.store(true, Ordering::SeqCst);

        let outcome = f.service.authenticate(good(), None).await.unwrap();
        assert_eq!(
            outcome.failure_reason(),
            Some("Authentication provider unavailable: connection refused")
        );
    }

    #[tokio::test]
    async fn test_failure_reason_mapping() {
        let err = TokenProviderError::new(ProviderErrorCode::TokenIssueFailed, "p", "bad body");
        assert_eq!(failure_reason(&err), "Authentication failed: bad body");
    }

    #[tokio::test]
    async fn test_lockout_refuses_without_calling_provider() {
        let f = fixture();
        let ctx = AttemptContext::new(SessionId::generate(), "10.0.0.7");

        for _ in 0..4 {
            let outcome = f.service.authenticate(bad(), Some(&ctx)).await.unwrap();
            assert!(!outcome.locked);
        }
        let outcome = f.service.authenticate(bad(), Some(&ctx)).await.unwrap();
        assert!(outcome.locked);
        assert!(outcome.locked_until.is_some());
        assert!(matches!(
            f.publisher.session_events().as_slice(),
            [SessionEvent::AccountLocked { .. }]
        ));

        let issued_before = f.provider.issued.load(Ordering::SeqCst);
        let outcome = f.service.authenticate(good(), Some(&ctx)).await.unwrap();
        assert!(outcome.is_failure());
        assert!(outcome
            .failure_reason()
            .unwrap()
            .starts_with("Account locked until"));
        assert!(outcome.locked);
        assert_eq!(f.provider.issued.load(Ordering::SeqCst), issued_before);

        // 6 attempts, each with exactly two events
        assert_eq!(f.publisher.authentication_events().len(), 12);
        assert_eq!(
            f.service.monitor().failures_in_window("10.0.0.7", Utc::now()),
            6
        );
    }

    #[tokio::test]
    async fn test_publish_failure_propagates_after_save() {
        let f = fixture();
        f.publisher.set_failing(true);

        let err = f.service.authenticate(good(), None).await.unwrap_err();
        assert!(matches!(err, Error::Publish(_)));
        assert_eq!(f.repository.len(), 1);
    }

    #[tokio::test]
    async fn test_logout_revokes_token() {
        let f = fixture();
        let outcome = f.service.authenticate(good(), None).await.unwrap();
        let access = outcome.token().unwrap().access_token().to_string();

        assert!(f.service.validate_token(&access).await.unwrap().valid);

        let auth = f.service.logout(&access).await.unwrap();
        assert!(!auth.is_token_valid());
        assert!(auth.token_expired_time().is_some());

        let result = f.service.validate_token(&access).await.unwrap();
        assert!(!result.valid);
        assert_eq!(result.reason(), Some("Token revoked"));

        let err = f.service.logout(&access).await.unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_refresh_replaces_token() {
        let f = fixture();
        let outcome = f.service.authenticate(good(), None).await.unwrap();
        let refresh = outcome.token().unwrap().refresh_token().to_string();

        let auth = f.service.refresh(&refresh).await.unwrap();
        assert_eq!(auth.id(), outcome.authentication.id());
        assert_eq!(auth.token().unwrap().access_token(), "access-1");
        assert_eq!(kinds(&f.publisher), vec!["attempted", "succeeded", "succeeded"]);

        let stored = f.service.find(&auth.id()).await.unwrap().unwrap();
        assert_eq!(stored.token().unwrap().access_token(), "access-1");
    }

    #[tokio::test]
    async fn test_refresh_after_logout_is_refused() {
        let f = fixture();
        let outcome = f.service.authenticate(good(), None).await.unwrap();
        let token = outcome.token().unwrap().clone();
        f.service.logout(token.access_token()).await.unwrap();

        let err = f.service.refresh(token.refresh_token()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_unknown_tokens_not_found() {
        let f = fixture();
        assert!(f.service.refresh("refresh-x").await.unwrap_err().is_not_found());
        assert!(f.service.logout("access-x").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_latest_successful() {
        let f = fixture();
        f.service.authenticate(good(), None).await.unwrap();
        let second = f.service.authenticate(good(), None).await.unwrap();
        f.service.authenticate(bad(), None).await.unwrap();

        let latest = f.service.latest_successful("validuser").await.unwrap().unwrap();
        assert_eq!(latest.id(), second.authentication.id());
        assert!(f.service.latest_successful("nobody").await.unwrap().is_none());
    }
}
