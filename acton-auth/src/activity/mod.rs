//! Suspicious-activity detection
//!
//! A cross-cutting brute-force detector, independent of session lockout.
//! Each client address gets a [`SuspiciousActivityTracker`] counting failures
//! in a sliding window; the [`SuspiciousActivityMonitor`] keeps a bounded map
//! of trackers and raises [`SuspiciousActivityEvent`]s when a client reaches
//! the threshold. Detection never blocks authentication.

pub mod alert;
pub mod config;
pub mod monitor;
pub mod tracker;

pub use alert::{SuspiciousActivityAlert, SuspiciousActivityEvent};
pub use config::SuspiciousActivityConfig;
pub use monitor::SuspiciousActivityMonitor;
pub use tracker::SuspiciousActivityTracker;
