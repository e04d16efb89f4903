//! User lookup for the local JWT provider

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;
use crate::password::{PasswordConfig, PasswordHasher};

/// A user known to the local provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Stable subject id, used as the `sub` claim
    pub user_id: String,
    /// Login name
    pub username: String,
    /// Argon2id PHC hash
    #[serde(default, skip_serializing)]
    pub password_hash: String,
    /// Roles placed in the `roles` claim
    pub roles: Vec<String>,
}

/// Source of users for [`LocalJwtProvider`](super::LocalJwtProvider)
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Look up a user by name
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, Error>;

    /// Check a username/password pair
    ///
    /// Returns `Ok(None)` for an unknown user or a wrong password alike.
    async fn authenticate(&self, username: &str, password: &str)
        -> Result<Option<UserRecord>, Error>;
}

/// [`UserDirectory`] held in memory with Argon2id-hashed passwords
///
/// Password checks run on the blocking pool. An unknown username is checked
/// against a dummy hash with the same cost, so it takes as long as a wrong
/// password for a known one.
#[derive(Clone)]
pub struct InMemoryUserDirectory {
    users: Arc<DashMap<String, UserRecord>>,
    hasher: PasswordHasher,
    dummy_hash: Arc<str>,
    #[cfg(test)]
    verifications: Arc<std::sync::atomic::AtomicUsize>,
}

impl InMemoryUserDirectory {
    /// Create an empty directory
    pub fn new(config: PasswordConfig) -> Result<Self, Error> {
        let hasher = PasswordHasher::new(config)?;
        let dummy_hash = hasher.hash(&Uuid::new_v4().to_string())?;
        Ok(Self {
            users: Arc::new(DashMap::new()),
            hasher,
            dummy_hash: Arc::from(dummy_hash),
            #[cfg(test)]
            verifications: Arc::default(),
        })
    }

    async fn verify(&self, password: &str, hash: &str) -> Result<bool, Error> {
        #[cfg(test)]
        self.verifications
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);

        let hasher = self.hasher.clone();
        let password = password.to_string();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| Error::Internal(format!("Task join error: {}", e)))?
    }

    /// Add or replace a user, hashing the password
    pub fn add_user(
        &self,
        username: impl Into<String>,
        password: &str,
        roles: Vec<String>,
    ) -> Result<UserRecord, Error> {
        let username = username.into();
        let record = UserRecord {
            user_id: Uuid::new_v4().to_string(),
            username: username.clone(),
            password_hash: self.hasher.hash(password)?,
            roles,
        };
        self.users.insert(username, record.clone());
        Ok(record)
    }

    /// Remove a user; returns whether one existed
    pub fn remove_user(&self, username: &str) -> bool {
        self.users.remove(username).is_some()
    }

    /// Number of users
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Whether the directory is empty
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, Error> {
        Ok(self.users.get(username).map(|entry| entry.value().clone()))
    }

    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<UserRecord>, Error> {
        let Some(record) = self.find_by_username(username).await? else {
            self.verify(password, &self.dummy_hash).await?;
            return Ok(None);
        };
        if self.verify(password, &record.password_hash).await? {
            Ok(Some(record))
        } else {
            Ok(None)
        }
    }
}
