//! Suspicious-activity alert hooks
//!
//! Hooks are dispatched via `tokio::spawn` so they never delay the
//! authentication response.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Signal raised by [`SuspiciousActivityMonitor`](super::SuspiciousActivityMonitor)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum SuspiciousActivityEvent {
    /// A client reached the failure threshold within the window
    ThresholdExceeded {
        /// Client address
        client_ip: String,
        /// Failures in the window, including the latest
        failure_count: usize,
        /// Configured threshold
        threshold: u32,
        /// Window length in seconds
        window_secs: u64,
        /// When the threshold was reached
        detected_at: DateTime<Utc>,
    },
}

/// Receiver for [`SuspiciousActivityEvent`]s
///
/// ```rust,ignore
/// use acton_auth::activity::{SuspiciousActivityAlert, SuspiciousActivityEvent};
///
/// struct Firewall;
///
/// #[async_trait]
/// impl SuspiciousActivityAlert for Firewall {
///     async fn on_alert(&self, event: SuspiciousActivityEvent) {
///         // push client_ip to a block list
///     }
/// }
/// ```
#[async_trait]
pub trait SuspiciousActivityAlert: Send + Sync + 'static {
    /// Called inside `tokio::spawn`; implementations handle their own errors
    async fn on_alert(&self, event: SuspiciousActivityEvent);
}
