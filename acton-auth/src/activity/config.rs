//! Suspicious-activity detection configuration

use serde::{Deserialize, Serialize};

const MAX_DURATION_SECS: u64 = 365 * 24 * 3600;

/// Thresholds and bounds for [`SuspiciousActivityMonitor`](super::SuspiciousActivityMonitor)
///
/// # Example (config.toml)
///
/// ```toml
/// [suspicious_activity]
/// threshold = 5
/// window_secs = 300
/// max_tracked_clients = 10000
/// idle_ttl_secs = 3600
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuspiciousActivityConfig {
    /// Failures within the window that raise an alert
    #[serde(default = "default_threshold")]
    pub threshold: u32,

    /// Window length in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Upper bound on tracked client addresses
    #[serde(default = "default_max_tracked_clients")]
    pub max_tracked_clients: usize,

    /// Trackers with no failure for this long are evicted
    #[serde(default = "default_idle_ttl_secs")]
    pub idle_ttl_secs: u64,
}

impl SuspiciousActivityConfig {
    /// Validate the configuration, returning an error message if invalid
    pub fn validate(&self) -> Result<(), String> {
        if self.threshold == 0 {
            return Err("suspicious_activity.threshold must be greater than 0".to_string());
        }
        if self.window_secs == 0 {
            return Err("suspicious_activity.window_secs must be greater than 0".to_string());
        }
        if self.max_tracked_clients == 0 {
            return Err(
                "suspicious_activity.max_tracked_clients must be greater than 0".to_string(),
            );
        }
        if self.idle_ttl_secs > MAX_DURATION_SECS {
            return Err("suspicious_activity.idle_ttl_secs must not exceed one year".to_string());
        }
        if self.idle_ttl_secs < self.window_secs {
            return Err(
                "suspicious_activity.idle_ttl_secs must not be shorter than window_secs"
                    .to_string(),
            );
        }
        Ok(())
    }
}

impl Default for SuspiciousActivityConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            window_secs: default_window_secs(),
            max_tracked_clients: default_max_tracked_clients(),
            idle_ttl_secs: default_idle_ttl_secs(),
        }
    }
}

fn default_threshold() -> u32 {
    5
}

fn default_window_secs() -> u64 {
    300 // 5 minutes
}

fn default_max_tracked_clients() -> usize {
    10_000
}

fn default_idle_ttl_secs() -> u64 {
    3600 // 1 hour
}
