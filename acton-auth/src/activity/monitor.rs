//! Bounded per-IP registry of failure trackers

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::{debug, warn};

use super::alert::{SuspiciousActivityAlert, SuspiciousActivityEvent};
use super::config::SuspiciousActivityConfig;
use super::tracker::SuspiciousActivityTracker;

// Keeps window arithmetic on `DateTime<Utc>` far from overflow
const MAX_SECS: u64 = 365 * 24 * 3600;

/// Brute-force detector keyed by client address
///
/// Holds at most `max_tracked_clients` trackers. When full, trackers idle for
/// longer than `idle_ttl_secs` are dropped first, then the least recently
/// active. The bound is checked before each insertion, so concurrent inserts
/// of new addresses may overshoot it briefly.
///
/// The monitor only detects; it never blocks an authentication.
pub struct SuspiciousActivityMonitor {
    trackers: DashMap<String, Arc<SuspiciousActivityTracker>>,
    config: SuspiciousActivityConfig,
    hooks: Vec<Arc<dyn SuspiciousActivityAlert>>,
}

impl SuspiciousActivityMonitor {
    /// Create a monitor with no alert hooks
    pub fn new(config: SuspiciousActivityConfig) -> Self {
        Self {
            trackers: DashMap::new(),
            config,
            hooks: Vec::new(),
        }
    }

    /// Register an alert hook
    pub fn with_alert(mut self, hook: Arc<dyn SuspiciousActivityAlert>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Record a failure for `client_ip` and return its count in the window
    pub fn record_failure(&self, client_ip: &str, at: DateTime<Utc>) -> usize {
        let tracker = self.tracker_for(client_ip, at);
        let failure_count = tracker.add_failure(at);

        debug!(client_ip, failure_count, "Recorded failure for client");

        if failure_count >= self.config.threshold as usize {
            warn!(
                client_ip,
                failure_count,
                threshold = self.config.threshold,
                window_secs = self.config.window_secs,
                "Suspicious activity: failure threshold reached"
            );
            self.dispatch(SuspiciousActivityEvent::ThresholdExceeded {
                client_ip: client_ip.to_string(),
                failure_count,
                threshold: self.config.threshold,
                window_secs: self.config.window_secs,
                detected_at: at,
            });
        }

        failure_count
    }

    /// Failures for `client_ip` in the window ending at `now`
    pub fn failures_in_window(&self, client_ip: &str, now: DateTime<Utc>) -> usize {
        self.trackers
            .get(client_ip)
            .map(|tracker| tracker.failures_in_window(now))
            .unwrap_or(0)
    }

    /// Forget a client; returns whether it was tracked
    pub fn clear(&self, client_ip: &str) -> bool {
        self.trackers.remove(client_ip).is_some()
    }

    /// Drop trackers idle at `now`; returns how many were removed
    pub fn purge_idle(&self, now: DateTime<Utc>) -> usize {
        let ttl = self.idle_ttl();
        let before = self.trackers.len();
        self.trackers
            .retain(|_, tracker| now - tracker.last_seen() < ttl);
        before.saturating_sub(self.trackers.len())
    }

    /// Number of tracked clients
    pub fn tracked_clients(&self) -> usize {
        self.trackers.len()
    }

    /// Configured alert threshold
    pub fn threshold(&self) -> u32 {
        self.config.threshold
    }

    fn window(&self) -> Duration {
        Duration::seconds(self.config.window_secs.min(MAX_SECS) as i64)
    }

    fn idle_ttl(&self) -> Duration {
        Duration::seconds(self.config.idle_ttl_secs.min(MAX_SECS) as i64)
    }

    fn tracker_for(&self, client_ip: &str, at: DateTime<Utc>) -> Arc<SuspiciousActivityTracker> {
        if let Some(tracker) = self.trackers.get(client_ip) {
            return Arc::clone(tracker.value());
        }

        if self.trackers.len() >= self.config.max_tracked_clients {
            let purged = self.purge_idle(at);
            if purged > 0 {
                debug!(purged, "Evicted idle client trackers");
            }
        }
        while self.trackers.len() >= self.config.max_tracked_clients {
            if !self.evict_least_recent() {
                break;
            }
        }

        let window = self.window();
        Arc::clone(
            self.trackers
                .entry(client_ip.to_string())
                .or_insert_with(|| Arc::new(SuspiciousActivityTracker::new_at(window, at)))
                .value(),
        )
    }

    fn evict_least_recent(&self) -> bool {
        // Collect the key first so no shard guard is held during removal
        let oldest = self
            .trackers
            .iter()
            .min_by_key(|entry| entry.value().last_seen())
            .map(|entry| entry.key().clone());

        match oldest {
            Some(key) => {
                debug!(client_ip = %key, "Evicted least recently active client tracker");
                self.trackers.remove(&key).is_some()
            }
            None => false,
        }
    }

    fn dispatch(&self, event: SuspiciousActivityEvent) {
        if self.hooks.is_empty() || tokio::runtime::Handle::try_current().is_err() {
            return;
        }
        for hook in &self.hooks {
            let hook = Arc::clone(hook);
            let event = event.clone();
            tokio::spawn(async move {
                hook.on_alert(event).await;
            });
        }
    }
}
