//! End-to-end flows through the public API with the local JWT provider

use std::sync::Arc;

use acton_auth::prelude::*;
use acton_auth::provider::LocalJwtConfig;

const SECRET: &str = "integration-test-secret-0123456789abcdef";

struct Harness {
    service: AuthenticationService<InMemoryAuthenticationRepository, InMemorySessionRepository>,
    sessions: Arc<SessionService<InMemorySessionRepository>>,
    publisher: InMemoryEventPublisher,
}

fn harness() -> Harness {
    let mut config = Config::default();
    config.local_jwt = LocalJwtConfig::with_secret(SECRET);
    config.password = PasswordConfig {
        memory_cost_kib: 1024,
        time_cost: 1,
        parallelism: 1,
    };
    config.validate().unwrap();

    let directory = InMemoryUserDirectory::new(config.password.clone()).unwrap();
    directory
        .add_user("validuser", "password123", vec!["user".to_string()])
        .unwrap();
    let provider = config.build_provider(Arc::new(directory)).unwrap();

    let publisher = InMemoryEventPublisher::new();
    let sessions = Arc::new(SessionService::new(
        InMemorySessionRepository::new(),
        Arc::new(publisher.clone()),
        config.lockout,
    ));
    let monitor = Arc::new(SuspiciousActivityMonitor::new(
        config.suspicious_activity.clone(),
    ));
    let service = AuthenticationService::new(
        provider,
        InMemoryAuthenticationRepository::new(),
        Arc::new(publisher.clone()),
        Arc::clone(&sessions),
        monitor,
    );

    Harness {
        service,
        sessions,
        publisher,
    }
}

fn credentials(password: &str) -> Credentials {
    Credentials::new("validuser", password).unwrap()
}

#[tokio::test]
async fn valid_credentials_issue_a_usable_token() {
    let h = harness();
    let outcome = h
        .service
        .authenticate(credentials("password123"), None)
        .await
        .unwrap();

    assert!(outcome.is_success());
    assert_eq!(
        outcome.authentication.status(),
        AuthenticationStatus::Success
    );
    assert!(outcome.authentication.is_token_valid());

    let token = outcome.token().unwrap();
    let validation = h.service.validate_token(token.access_token()).await.unwrap();
    assert!(validation.valid);
    assert_eq!(validation.username.as_deref(), Some("validuser"));
    assert_eq!(validation.authorities, vec!["user".to_string()]);
}

#[tokio::test]
async fn wrong_password_fails_with_invalid_credentials() {
    let h = harness();
    let outcome = h
        .service
        .authenticate(credentials("wrongpassword"), None)
        .await
        .unwrap();

    assert!(outcome.is_failure());
    assert!(outcome
        .failure_reason()
        .unwrap()
        .contains("Invalid credentials"));
    assert!(outcome.token().is_none());

    let kinds: Vec<_> = h
        .publisher
        .authentication_events()
        .iter()
        .map(|e| e.kind())
        .collect();
    assert_eq!(kinds, vec!["attempted", "failed"]);
}

#[tokio::test]
async fn repeated_failures_lock_the_session_until_unlocked() {
    let h = harness();
    let session_id = h.sessions.start_session().await.unwrap();
    let ctx = AttemptContext::new(session_id, "198.51.100.20");

    for _ in 0..5 {
        h.service
            .authenticate(credentials("wrongpassword"), Some(&ctx))
            .await
            .unwrap();
    }
    assert!(h.sessions.is_locked(&session_id).await.unwrap());

    // Correct credentials are refused while locked
    let refused = h
        .service
        .authenticate(credentials("password123"), Some(&ctx))
        .await
        .unwrap();
    assert!(refused.is_failure());
    assert!(refused.locked);

    assert!(h.sessions.unlock(session_id).await.unwrap());
    let outcome = h
        .service
        .authenticate(credentials("password123"), Some(&ctx))
        .await
        .unwrap();
    assert!(outcome.is_success());
    assert!(!outcome.locked);

    let session = h.sessions.find_session(&session_id).await.unwrap().unwrap();
    assert_eq!(session.attempts().len(), 7);
    assert!(session.attempts()[6].success);
}

#[tokio::test]
async fn unlocking_an_unknown_session_is_not_found() {
    let h = harness();
    let err = h.sessions.unlock(SessionId::generate()).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn publish_failure_surfaces_to_the_caller() {
    let h = harness();
    h.publisher.set_failing(true);

    let err = h
        .service
        .authenticate(credentials("password123"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Publish(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn refresh_then_logout() {
    let h = harness();
    let outcome = h
        .service
        .authenticate(credentials("password123"), None)
        .await
        .unwrap();
    let first = outcome.token().unwrap().clone();

    let refreshed = h.service.refresh(first.refresh_token()).await.unwrap();
    let second = refreshed.token().unwrap().clone();
    assert!(h
        .service
        .validate_token(second.access_token())
        .await
        .unwrap()
        .valid);

    h.service.logout(second.access_token()).await.unwrap();
    let validation = h
        .service
        .validate_token(second.access_token())
        .await
        .unwrap();
    assert!(!validation.valid);

    let latest = h
        .service
        .latest_successful("validuser")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.id(), outcome.authentication.id());
    assert!(!latest.is_token_valid());
}
