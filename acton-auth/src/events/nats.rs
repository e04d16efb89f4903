//! NATS event publisher (requires `nats` feature)
//!
//! Events are published as JSON to `{prefix}.authentication.{kind}` and
//! `{prefix}.session.{kind}`, e.g. `auth.session.account_locked`.

use async_nats::Client;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{EventPublisher, SessionEventPublisher};
use crate::domain::{AuthenticationEvent, SessionEvent};
use crate::error::{Error, Result};

/// NATS connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,

    /// Connection name
    #[serde(default)]
    pub name: Option<String>,

    /// Max reconnection attempts
    #[serde(default = "default_max_reconnects")]
    pub max_reconnects: usize,

    /// Subject prefix (default: "auth")
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,
}

fn default_max_reconnects() -> usize {
    10
}

fn default_subject_prefix() -> String {
    "auth".to_string()
}

/// Publisher sending domain events to NATS subjects
#[derive(Clone)]
pub struct NatsEventPublisher {
    client: Client,
    prefix: String,
}

impl NatsEventPublisher {
    /// Wrap an existing client
    pub fn new(client: Client, prefix: impl Into<String>) -> Self {
        Self {
            client,
            prefix: prefix.into(),
        }
    }

    /// Connect using `config`
    pub async fn connect(config: &NatsConfig) -> Result<Self> {
        let mut opts = async_nats::ConnectOptions::new();
        if let Some(name) = &config.name {
            opts = opts.name(name);
        }
        opts = opts.max_reconnects(Some(config.max_reconnects));

        let client = opts.connect(&config.url).await.map_err(|e| {
            Error::Publish(format!(
                "Failed to connect to NATS server at '{}': {}",
                config.url, e
            ))
        })?;
        tracing::info!("NATS event publisher connected to {}", config.url);

        Ok(Self::new(client, config.subject_prefix.clone()))
    }

    fn subject(&self, stream: &str, kind: &str) -> String {
        format!("{}.{}.{}", self.prefix, stream, kind)
    }

    async fn publish_json<T: Serialize + Sync>(&self, subject: String, payload: &T) -> Result<()> {
        let json = serde_json::to_vec(payload)
            .map_err(|e| Error::Internal(format!("Failed to serialize event: {}", e)))?;

        self.client
            .publish(subject.clone(), json.into())
            .await
            .map_err(|e| Error::Publish(format!("Failed to publish to {}: {}", subject, e)))
    }
}

#[async_trait]
impl EventPublisher for NatsEventPublisher {
    async fn publish(&self, event: AuthenticationEvent) -> Result<()> {
        let subject = self.subject("authentication", event.kind());
        self.publish_json(subject, &event).await
    }
}

#[async_trait]
impl SessionEventPublisher for NatsEventPublisher {
    async fn publish_all(&self, events: Vec<SessionEvent>) -> Result<()> {
        for event in &events {
            let subject = self.subject("session", event.kind());
            self.publish_json(subject, event).await?;
        }
        Ok(())
    }
}
