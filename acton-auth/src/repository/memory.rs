//! In-memory repository adapters
//!
//! Backed by [`DashMap`]; cloning an adapter shares the underlying store.
//! Useful for tests and for embedding the crate in a single process.

use std::sync::Arc;

use dashmap::DashMap;

use super::traits::{AuthenticationRepository, AuthenticationSessionRepository, RepositoryResult};
use crate::domain::{Authentication, AuthenticationSession};
use crate::ids::{AuthenticationId, SessionId};

/// [`AuthenticationRepository`] held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryAuthenticationRepository {
    entries: Arc<DashMap<AuthenticationId, Authentication>>,
}

impl InMemoryAuthenticationRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored authentications
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the repository is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn find_where(&self, pred: impl Fn(&Authentication) -> bool) -> Option<Authentication> {
        self.entries
            .iter()
            .find(|entry| pred(entry.value()))
            .map(|entry| entry.value().clone())
    }
}

impl AuthenticationRepository for InMemoryAuthenticationRepository {
    async fn save(&self, authentication: &Authentication) -> RepositoryResult<()> {
        self.entries
            .insert(authentication.id(), authentication.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &AuthenticationId) -> RepositoryResult<Option<Authentication>> {
        Ok(self.entries.get(id).map(|entry| entry.value().clone()))
    }

    async fn find_latest_successful_by_username(
        &self,
        username: &str,
    ) -> RepositoryResult<Option<Authentication>> {
        Ok(self
            .entries
            .iter()
            .filter(|entry| entry.is_successful() && entry.username() == username)
            .max_by_key(|entry| entry.success_time())
            .map(|entry| entry.value().clone()))
    }

    async fn find_by_access_token(
        &self,
        access_token: &str,
    ) -> RepositoryResult<Option<Authentication>> {
        Ok(self.find_where(|auth| {
            auth.token()
                .is_some_and(|t| t.access_token() == access_token)
        }))
    }

    async fn find_by_refresh_token(
        &self,
        refresh_token: &str,
    ) -> RepositoryResult<Option<Authentication>> {
        Ok(self.find_where(|auth| {
            auth.token()
                .is_some_and(|t| t.refresh_token() == refresh_token)
        }))
    }
}

/// [`AuthenticationSessionRepository`] held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemorySessionRepository {
    sessions: Arc<DashMap<SessionId, AuthenticationSession>>,
}

impl InMemorySessionRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the repository is empty
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl AuthenticationSessionRepository for InMemorySessionRepository {
    async fn save(&self, session: &AuthenticationSession) -> RepositoryResult<()> {
        self.sessions.insert(session.session_id(), session.clone());
        Ok(())
    }

    async fn find_by_session_id(
        &self,
        session_id: &SessionId,
    ) -> RepositoryResult<Option<AuthenticationSession>> {
        Ok(self
            .sessions
            .get(session_id)
            .map(|entry| entry.value().clone()))
    }

    async fn delete(&self, session_id: &SessionId) -> RepositoryResult<bool> {
        Ok(self.sessions.remove(session_id).is_some())
    }
}
