//! Per-client sliding-window failure counter

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

struct TrackerState {
    /// Failure timestamps, oldest first
    failures: VecDeque<DateTime<Utc>>,
    /// Most recent failure seen, used for idle eviction
    last_seen: DateTime<Utc>,
}

/// Thread-safe count of failures within a trailing time window
///
/// The lock is held only for the prune/insert and never across an `.await`.
/// Pruning trims from the front, so only failures in `[now - window, now]`
/// are ever counted.
pub struct SuspiciousActivityTracker {
    state: Mutex<TrackerState>,
    window: Duration,
}

impl SuspiciousActivityTracker {
    /// Create an empty tracker
    pub fn new(window: Duration) -> Self {
        Self::new_at(window, Utc::now())
    }

    pub(crate) fn new_at(window: Duration, now: DateTime<Utc>) -> Self {
        Self {
            state: Mutex::new(TrackerState {
                failures: VecDeque::new(),
                last_seen: now,
            }),
            window,
        }
    }

    /// Record a failure and return the count inside the window
    ///
    /// A timestamp older than the newest one already held (two writers racing
    /// on a coarse clock) is inserted in order, keeping the queue sorted.
    pub fn add_failure(&self, at: DateTime<Utc>) -> usize {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        prune(&mut state.failures, at - self.window);

        let position = state.failures.partition_point(|t| *t <= at);
        state.failures.insert(position, at);
        if at > state.last_seen {
            state.last_seen = at;
        }
        count_until(&state.failures, at)
    }

    /// Failures in `[now - window, now]`, pruning older entries
    pub fn failures_in_window(&self, now: DateTime<Utc>) -> usize {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        prune(&mut state.failures, now - self.window);
        count_until(&state.failures, now)
    }

    /// Time of the most recent recorded failure (or creation)
    pub fn last_seen(&self) -> DateTime<Utc> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last_seen
    }

    /// Window length
    pub fn window(&self) -> Duration {
        self.window
    }
}

fn prune(failures: &mut VecDeque<DateTime<Utc>>, cutoff: DateTime<Utc>) {
    while failures.front().is_some_and(|t| *t < cutoff) {
        failures.pop_front();
    }
}

fn count_until(failures: &VecDeque<DateTime<Utc>>, now: DateTime<Utc>) -> usize {
    failures.partition_point(|t| *t <= now)
}
