//! # acton-auth
//!
//! Authentication core for acton services: token issuance and validation
//! behind pluggable providers, with brute-force lockout.
//!
//! ## Features
//!
//! - **Authentication lifecycle**: a per-attempt state machine
//!   (`PENDING → SUCCESS | FAILED`) that returns the domain events it produces
//! - **Token providers**: local JWT signing (`jsonwebtoken`) or a remote
//!   Keycloak realm with userinfo → introspection fallback
//! - **Session lockout**: sliding-window failure counting with timed locks
//!   and administrative unlock
//! - **Suspicious-activity detection**: bounded per-IP failure trackers with
//!   alert hooks
//! - **Ports**: repository and event publisher traits, with in-memory,
//!   tracing and (feature `nats`) NATS adapters
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use acton_auth::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config)?;
//!     config.validate()?;
//!
//!     let directory = InMemoryUserDirectory::new(config.password.clone())?;
//!     directory.add_user("validuser", "password123", vec!["user".to_string()])?;
//!     let provider = config.build_provider(Arc::new(directory))?;
//!
//!     let publisher = Arc::new(TracingEventPublisher);
//!     let sessions = Arc::new(SessionService::new(
//!         InMemorySessionRepository::new(),
//!         publisher.clone(),
//!         config.lockout,
//!     ));
//!     let monitor = Arc::new(SuspiciousActivityMonitor::new(
//!         config.suspicious_activity.clone(),
//!     ));
//!     let service = AuthenticationService::new(
//!         provider,
//!         InMemoryAuthenticationRepository::new(),
//!         publisher,
//!         sessions,
//!         monitor,
//!     );
//!
//!     let context = AttemptContext::new(SessionId::generate(), "203.0.113.7");
//!     let outcome = service
//!         .authenticate(Credentials::new("validuser", "password123")?, Some(&context))
//!         .await?;
//!     assert!(outcome.is_success());
//!     Ok(())
//! }
//! ```

pub mod activity;
pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod ids;
pub mod observability;
pub mod password;
pub mod provider;
pub mod repository;
pub mod service;

pub use config::Config;
pub use error::{Error, ProviderErrorCode, Result, TokenProviderError};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::activity::{
        SuspiciousActivityAlert, SuspiciousActivityConfig, SuspiciousActivityEvent,
        SuspiciousActivityMonitor,
    };
    pub use crate::config::Config;
    pub use crate::domain::{
        Authentication, AuthenticationEvent, AuthenticationStatus, AuthenticationSession,
        Credentials, LockoutPolicy, RiskCategory, RiskLevel, SessionEvent, Token,
    };
    pub use crate::error::{Error, ProviderErrorCode, Result, TokenProviderError};
    pub use crate::events::{
        EventPublisher, InMemoryEventPublisher, SessionEventPublisher, TracingEventPublisher,
    };
    pub use crate::ids::{AuthenticationId, SessionId};
    pub use crate::observability::init_tracing;
    pub use crate::password::{PasswordConfig, PasswordHasher};
    pub use crate::provider::{
        InMemoryUserDirectory, KeycloakProvider, LocalJwtProvider, ProviderType, TokenProvider,
        UserDirectory, ValidationResult,
    };
    pub use crate::repository::{
        AuthenticationRepository, AuthenticationSessionRepository,
        InMemoryAuthenticationRepository, InMemorySessionRepository, RepositoryError,
    };
    pub use crate::service::{
        AttemptContext, AuthenticationOutcome, AuthenticationService, SessionService,
    };

    #[cfg(feature = "nats")]
    pub use crate::events::NatsEventPublisher;
}
