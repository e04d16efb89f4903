//! Repository ports for the two aggregates
//!
//! Traits use RPITIT (return-position `impl Future`) rather than
//! `async_trait`, so implementations write plain `async fn`s:
//!
//! ```rust,ignore
//! use acton_auth::repository::{AuthenticationSessionRepository, RepositoryResult};
//!
//! struct PgSessions { pool: PgPool }
//!
//! impl AuthenticationSessionRepository for PgSessions {
//!     async fn save(&self, session: &AuthenticationSession) -> RepositoryResult<()> {
//!         // upsert serialized session keyed by session_id
//!         todo!()
//!     }
//!     // ... other methods
//! }
//! ```

use std::future::Future;

use super::error::RepositoryError;
use crate::domain::{Authentication, AuthenticationSession};
use crate::ids::{AuthenticationId, SessionId};

/// Result type for repository operations
pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

/// Storage for [`Authentication`] aggregates
pub trait AuthenticationRepository: Send + Sync {
    /// Insert or replace an authentication
    fn save(
        &self,
        authentication: &Authentication,
    ) -> impl Future<Output = RepositoryResult<()>> + Send;

    /// Load an authentication by id
    ///
    /// Returns `Ok(None)` when absent.
    fn find_by_id(
        &self,
        id: &AuthenticationId,
    ) -> impl Future<Output = RepositoryResult<Option<Authentication>>> + Send;

    /// Newest successful authentication for a username, by success time
    fn find_latest_successful_by_username(
        &self,
        username: &str,
    ) -> impl Future<Output = RepositoryResult<Option<Authentication>>> + Send;

    /// Authentication whose current token has this access token
    fn find_by_access_token(
        &self,
        access_token: &str,
    ) -> impl Future<Output = RepositoryResult<Option<Authentication>>> + Send;

    /// Authentication whose current token has this refresh token
    fn find_by_refresh_token(
        &self,
        refresh_token: &str,
    ) -> impl Future<Output = RepositoryResult<Option<Authentication>>> + Send;
}

/// Storage for [`AuthenticationSession`] aggregates
pub trait AuthenticationSessionRepository: Send + Sync {
    /// Insert or replace a session
    fn save(
        &self,
        session: &AuthenticationSession,
    ) -> impl Future<Output = RepositoryResult<()>> + Send;

    /// Load a session by id
    ///
    /// Returns `Ok(None)` when absent.
    fn find_by_session_id(
        &self,
        session_id: &SessionId,
    ) -> impl Future<Output = RepositoryResult<Option<AuthenticationSession>>> + Send;

    /// Delete a session
    ///
    /// Returns `Ok(true)` if a session was removed, `Ok(false)` if none existed.
    fn delete(&self, session_id: &SessionId) -> impl Future<Output = RepositoryResult<bool>> + Send;
}
