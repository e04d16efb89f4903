//! Domain event publishing
//!
//! Aggregates return the events they produce; use cases hand them to an
//! [`EventPublisher`] (authentication events) or a [`SessionEventPublisher`]
//! (session events). Delivery is assumed at-least-once, and a publish
//! failure is returned to the caller rather than swallowed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{info, warn};

use crate::domain::{AuthenticationEvent, SessionEvent};
use crate::error::{Error, Result};

#[cfg(feature = "nats")]
mod nats;

#[cfg(feature = "nats")]
pub use nats::{NatsConfig, NatsEventPublisher};

/// Sink for [`AuthenticationEvent`]s
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish one event
    async fn publish(&self, event: AuthenticationEvent) -> Result<()>;
}

/// Sink for [`SessionEvent`]s
#[async_trait]
pub trait SessionEventPublisher: Send + Sync {
    /// Publish a batch of events, in order
    async fn publish_all(&self, events: Vec<SessionEvent>) -> Result<()>;
}

/// Publisher that writes every event to the tracing log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventPublisher;

#[async_trait]
impl EventPublisher for TracingEventPublisher {
    async fn publish(&self, event: AuthenticationEvent) -> Result<()> {
        match &event {
            AuthenticationEvent::Failed {
                authentication_id,
                username,
                reason,
                ..
            } => warn!(
                event = event.kind(),
                authentication_id = %authentication_id,
                username = %username,
                reason = %reason,
                "Authentication event"
            ),
            _ => info!(
                event = event.kind(),
                authentication_id = %event.authentication_id(),
                "Authentication event"
            ),
        }
        Ok(())
    }
}

#[async_trait]
impl SessionEventPublisher for TracingEventPublisher {
    async fn publish_all(&self, events: Vec<SessionEvent>) -> Result<()> {
        for event in events {
            match &event {
                SessionEvent::AccountLocked {
                    session_id,
                    locked_until,
                    failure_count,
                } => warn!(
                    session_id = %session_id,
                    locked_until = %locked_until,
                    failure_count,
                    "Session locked"
                ),
                SessionEvent::AccountUnlocked { session_id, reason } => info!(
                    session_id = %session_id,
                    reason = %reason,
                    "Session unlocked"
                ),
            }
        }
        Ok(())
    }
}

/// Publisher that keeps events in memory
///
/// Clones share the same buffers. [`set_failing`](Self::set_failing) makes
/// every publish fail, for exercising error paths.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventPublisher {
    authentication: Arc<Mutex<Vec<AuthenticationEvent>>>,
    session: Arc<Mutex<Vec<SessionEvent>>>,
    failing: Arc<AtomicBool>,
}

impl InMemoryEventPublisher {
    /// Create an empty publisher
    pub fn new() -> Self {
        Self::default()
    }

    /// Authentication events published so far
    pub fn authentication_events(&self) -> Vec<AuthenticationEvent> {
        self.authentication
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Session events published so far
    pub fn session_events(&self) -> Vec<SessionEvent> {
        self.session
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Drop all recorded events
    pub fn clear(&self) {
        self.authentication
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        self.session
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Make subsequent publishes fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Publish("event bus unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventPublisher {
    async fn publish(&self, event: AuthenticationEvent) -> Result<()> {
        self.check()?;
        self.authentication
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
        Ok(())
    }
}

#[async_trait]
impl SessionEventPublisher for InMemoryEventPublisher {
    async fn publish_all(&self, events: Vec<SessionEvent>) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }
        self.check()?;
        self.session
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend(events);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Authentication, Credentials, UnlockReason};
    use crate::ids::SessionId;

    fn attempted() -> AuthenticationEvent {
        let creds = Credentials::new("validuser", "password123").unwrap();
        Authentication::attempt(creds).1
    }

    #[tokio::test]
    async fn test_in_memory_records_in_order() {
        let publisher = InMemoryEventPublisher::new();
        let first = attempted();
        let second = attempted();
        publisher.publish(first.clone()).await.unwrap();
        publisher.publish(second.clone()).await.unwrap();

        assert_eq!(publisher.authentication_events(), vec![first, second]);
    }

    #[tokio::test]
    async fn test_failing_publisher() {
        let publisher = InMemoryEventPublisher::new();
        publisher.set_failing(true);

        let result = publisher.publish(attempted()).await;
        assert!(matches!(result, Err(Error::Publish(_))));
        assert!(publisher.authentication_events().is_empty());

        publisher.set_failing(false);
        assert!(publisher.publish(attempted()).await.is_ok());
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let publisher = InMemoryEventPublisher::new();
        publisher.set_failing(true);
        assert!(publisher.publish_all(Vec::new()).await.is_ok());
    }

    #[tokio::test]
    async fn test_tracing_publisher_accepts_everything() {
        let publisher = TracingEventPublisher;
        publisher.publish(attempted()).await.unwrap();
        publisher
            .publish_all(vec![SessionEvent::AccountUnlocked {
                session_id: SessionId::generate(),
                reason: UnlockReason::AdminAction,
            }])
            .await
            .unwrap();
    }
}
