//! Session lockout use cases
//!
//! Every mutation is a load → mutate → save → publish cycle through the
//! session repository. Cycles on the same session id are serialized by a
//! fixed set of striped async mutexes, so two concurrent attempts never
//! overwrite each other's append inside this process. Atomicity across
//! processes is left to the repository.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::domain::{AttemptOutcome, AuthenticationSession, LockoutPolicy, RiskLevel};
use crate::error::{Error, Result};
use crate::events::SessionEventPublisher;
use crate::ids::SessionId;
use crate::repository::AuthenticationSessionRepository;

const LOCK_STRIPES: usize = 64;

/// Records attempts against sessions and manages lockout
pub struct SessionService<S> {
    repository: S,
    publisher: Arc<dyn SessionEventPublisher>,
    policy: LockoutPolicy,
    stripes: Vec<Mutex<()>>,
}

impl<S: AuthenticationSessionRepository> SessionService<S> {
    /// Create the service; new sessions get `policy`
    pub fn new(repository: S, publisher: Arc<dyn SessionEventPublisher>, policy: LockoutPolicy) -> Self {
        Self {
            repository,
            publisher,
            policy,
            stripes: (0..LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }

    /// Create and store an empty session
    pub async fn start_session(&self) -> Result<SessionId> {
        let session = AuthenticationSession::new(SessionId::generate(), self.policy);
        self.repository.save(&session).await?;
        debug!(session_id = %session.session_id(), "Started authentication session");
        Ok(session.session_id())
    }

    /// Record an attempt, creating the session on first use
    pub async fn record_attempt(
        &self,
        session_id: SessionId,
        user_id: &str,
        client_ip: &str,
        success: bool,
        risk_level: RiskLevel,
    ) -> Result<AttemptOutcome> {
        let _guard = self.lock(&session_id).await;
        // Read the clock under the lock so attempts are stored in order
        self.record_locked(session_id, user_id, client_ip, success, risk_level, Utc::now())
            .await
    }

    /// Record an attempt at an explicit instant
    pub async fn record_attempt_at(
        &self,
        session_id: SessionId,
        user_id: &str,
        client_ip: &str,
        success: bool,
        risk_level: RiskLevel,
        now: DateTime<Utc>,
    ) -> Result<AttemptOutcome> {
        let _guard = self.lock(&session_id).await;
        self.record_locked(session_id, user_id, client_ip, success, risk_level, now)
            .await
    }

    /// Lift a lock administratively
    ///
    /// Returns whether the session was locked. Fails with
    /// [`Error::NotFound`] for an unknown session; repository errors are
    /// returned unchanged.
    pub async fn unlock(&self, session_id: SessionId) -> Result<bool> {
        let _guard = self.lock(&session_id).await;
        self.unlock_locked(session_id, Utc::now()).await
    }

    /// Lift a lock at an explicit instant
    pub async fn unlock_at(&self, session_id: SessionId, now: DateTime<Utc>) -> Result<bool> {
        let _guard = self.lock(&session_id).await;
        self.unlock_locked(session_id, now).await
    }

    async fn record_locked(
        &self,
        session_id: SessionId,
        user_id: &str,
        client_ip: &str,
        success: bool,
        risk_level: RiskLevel,
        now: DateTime<Utc>,
    ) -> Result<AttemptOutcome> {
        let mut session = match self.repository.find_by_session_id(&session_id).await? {
            Some(session) => session,
            None => AuthenticationSession::new_at(session_id, self.policy, now),
        };

        let outcome = session.record_attempt_at(user_id, client_ip, success, risk_level, now)?;
        self.repository.save(&session).await?;

        debug!(
            session_id = %session_id,
            user_id,
            client_ip,
            success,
            failure_count = session.failures_in_window(now),
            "Recorded authentication attempt"
        );
        if let Some(until) = outcome.locked_until {
            warn!(session_id = %session_id, locked_until = %until, "Session is locked");
        }

        self.publisher.publish_all(outcome.events.clone()).await?;
        Ok(outcome)
    }

    async fn unlock_locked(&self, session_id: SessionId, now: DateTime<Utc>) -> Result<bool> {
        let mut session = self
            .repository
            .find_by_session_id(&session_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Session {} not found", session_id)))?;

        let (was_locked, events) = session.unlock_at(now);
        self.repository.save(&session).await?;

        if was_locked {
            info!(session_id = %session_id, "Session unlocked by administrator");
        }
        self.publisher.publish_all(events).await?;
        Ok(was_locked)
    }

    /// End of the active lock, if the session exists and is locked at `now`
    pub async fn locked_until(
        &self,
        session_id: &SessionId,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .repository
            .find_by_session_id(session_id)
            .await?
            .filter(|session| session.is_currently_locked_at(now))
            .and_then(|session| session.lockout_until()))
    }

    /// Whether the session is locked right now; unknown sessions are not
    pub async fn is_locked(&self, session_id: &SessionId) -> Result<bool> {
        Ok(self.locked_until(session_id, Utc::now()).await?.is_some())
    }

    /// Load a session
    pub async fn find_session(&self, session_id: &SessionId) -> Result<Option<AuthenticationSession>> {
        Ok(self.repository.find_by_session_id(session_id).await?)
    }

    /// Delete a session; returns whether it existed
    pub async fn end_session(&self, session_id: SessionId) -> Result<bool> {
        let _guard = self.lock(&session_id).await;
        let removed = self.repository.delete(&session_id).await?;
        if removed {
            debug!(session_id = %session_id, "Ended authentication session");
        }
        Ok(removed)
    }

    /// Lockout policy applied to new sessions
    pub fn policy(&self) -> &LockoutPolicy {
        &self.policy
    }

    async fn lock(&self, session_id: &SessionId) -> MutexGuard<'_, ()> {
        let index = (session_id.as_uuid().as_u128() % LOCK_STRIPES as u128) as usize;
        self.stripes[index].lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SessionEvent, UnlockReason};
    use crate::events::InMemoryEventPublisher;
    use crate::repository::{
        InMemorySessionRepository, RepositoryError, RepositoryOperation, RepositoryResult,
    };
    use chrono::Duration;

    fn risk() -> RiskLevel {
        RiskLevel::low("test").unwrap()
    }

    fn service() -> (
        SessionService<InMemorySessionRepository>,
        InMemorySessionRepository,
        InMemoryEventPublisher,
    ) {
        let repository = InMemorySessionRepository::new();
        let publisher = InMemoryEventPublisher::new();
        let service = SessionService::new(
            repository.clone(),
            Arc::new(publisher.clone()),
            LockoutPolicy::default(),
        );
        (service, repository, publisher)
    }

    struct UnavailableRepository;

    impl AuthenticationSessionRepository for UnavailableRepository {
        async fn save(&self, _session: &AuthenticationSession) -> RepositoryResult<()> {
            Err(RepositoryError::connection_failed("database down")
                .with_operation(RepositoryOperation::Save))
        }

        async fn find_by_session_id(
            &self,
            _session_id: &SessionId,
        ) -> RepositoryResult<Option<AuthenticationSession>> {
            Err(RepositoryError::connection_failed("database down")
                .with_operation(RepositoryOperation::FindBySessionId))
        }

        async fn delete(&self, _session_id: &SessionId) -> RepositoryResult<bool> {
            Err(RepositoryError::connection_failed("database down")
                .with_operation(RepositoryOperation::Delete))
        }
    }

    #[tokio::test]
    async fn test_lockout_flow() {
        let (service, _, publisher) = service();
        let session_id = service.start_session().await.unwrap();
        let t0 = Utc::now();

        for i in 0..4 {
            let outcome = service
                .record_attempt_at(session_id, "alice", "10.0.0.1", false, risk(), t0 + Duration::seconds(i))
                .await
                .unwrap();
            assert!(!outcome.locked);
        }
        let outcome = service
            .record_attempt_at(session_id, "alice", "10.0.0.1", false, risk(), t0 + Duration::seconds(4))
            .await
            .unwrap();
        assert!(outcome.locked);
        assert_eq!(
            outcome.locked_until,
            Some(t0 + Duration::seconds(4) + Duration::minutes(30))
        );
        assert!(matches!(
            publisher.session_events().as_slice(),
            [SessionEvent::AccountLocked { .. }]
        ));
        assert!(service
            .locked_until(&session_id, t0 + Duration::seconds(5))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_unknown_session_created_on_first_attempt() {
        let (service, repository, _) = service();
        let session_id = SessionId::generate();
        service
            .record_attempt(session_id, "alice", "10.0.0.1", false, risk())
            .await
            .unwrap();
        assert_eq!(repository.len(), 1);
    }

    #[tokio::test]
    async fn test_unlock() {
        let (service, _, publisher) = service();
        let session_id = SessionId::generate();
        let t0 = Utc::now();
        for i in 0..5 {
            service
                .record_attempt_at(session_id, "alice", "10.0.0.1", false, risk(), t0 + Duration::seconds(i))
                .await
                .unwrap();
        }

        assert!(service.unlock_at(session_id, t0 + Duration::seconds(10)).await.unwrap());
        assert!(!service.unlock_at(session_id, t0 + Duration::seconds(11)).await.unwrap());
        assert!(matches!(
            publisher.session_events().last(),
            Some(SessionEvent::AccountUnlocked {
                reason: UnlockReason::AdminAction,
                ..
            })
        ));
        assert!(!service.is_locked(&session_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_unlock_unknown_session_is_not_found() {
        let (service, _, _) = service();
        let err = service.unlock(SessionId::generate()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_repository_errors_propagate_unchanged() {
        let service = SessionService::new(
            UnavailableRepository,
            Arc::new(InMemoryEventPublisher::new()),
            LockoutPolicy::default(),
        );

        let err = service.unlock(SessionId::generate()).await.unwrap_err();
        match err {
            Error::Repository(e) => {
                assert_eq!(e.operation, RepositoryOperation::FindBySessionId);
                assert!(e.is_retriable());
            }
            other => panic!("expected repository error, got {:?}", other),
        }

        let err = service
            .record_attempt(SessionId::generate(), "alice", "10.0.0.1", false, risk())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Repository(_)));
    }

    #[tokio::test]
    async fn test_publish_failure_after_save_surfaces() {
        let (service, repository, publisher) = service();
        let session_id = SessionId::generate();
        let t0 = Utc::now();
        for i in 0..4 {
            service
                .record_attempt_at(session_id, "alice", "10.0.0.1", false, risk(), t0 + Duration::seconds(i))
                .await
                .unwrap();
        }

        publisher.set_failing(true);
        let err = service
            .record_attempt_at(session_id, "alice", "10.0.0.1", false, risk(), t0 + Duration::seconds(4))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Publish(_)));

        // The state change was saved before the publish failed
        let stored = repository
            .find_by_session_id(&session_id)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.is_currently_locked_at(t0 + Duration::seconds(5)));
    }

    #[tokio::test]
    async fn test_concurrent_attempts_are_not_lost() {
        let (service, repository, _) = service();
        let service = Arc::new(service);
        let session_id = SessionId::generate();

        let tasks: Vec<_> = (0..20)
            .map(|_| {
                let service = Arc::clone(&service);
                tokio::spawn(async move {
                    service
                        .record_attempt(session_id, "alice", "10.0.0.1", true, risk())
                        .await
                        .unwrap();
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let stored = repository
            .find_by_session_id(&session_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.attempts().len(), 20);
    }

    #[tokio::test]
    async fn test_end_session() {
        let (service, _, _) = service();
        let session_id = service.start_session().await.unwrap();
        assert!(service.end_session(session_id).await.unwrap());
        assert!(service.find_session(&session_id).await.unwrap().is_none());
    }
}
