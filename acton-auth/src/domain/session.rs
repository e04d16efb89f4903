//! Authentication session aggregate (lockout engine)
//!
//! An [`AuthenticationSession`] accumulates the attempts made under one
//! session id and decides when the session is locked. Failures are counted in
//! a sliding window of `window_minutes`; reaching `max_attempts` locks the
//! session for `lockout_minutes`. Counting is session-wide: a success by any
//! user in the session resets the counter and lifts the lock.
//!
//! The aggregate is plain data with no interior locking. Concurrent writers
//! must serialize load → mutate → save themselves (see
//! [`SessionService`](crate::service::SessionService)).

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::risk::RiskLevel;
use crate::error::Error;
use crate::ids::SessionId;

fn default_max_attempts() -> u32 {
    5
}

fn default_window_minutes() -> u32 {
    15
}

fn default_lockout_minutes() -> u32 {
    30
}

/// Lockout thresholds for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockoutPolicy {
    /// Failures within the window that lock the session
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Sliding window length in minutes
    #[serde(default = "default_window_minutes")]
    pub window_minutes: u32,

    /// How long a lock lasts, in minutes
    #[serde(default = "default_lockout_minutes")]
    pub lockout_minutes: u32,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            window_minutes: default_window_minutes(),
            lockout_minutes: default_lockout_minutes(),
        }
    }
}

impl LockoutPolicy {
    /// Validate the policy
    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("lockout max_attempts must be greater than 0".to_string());
        }
        if self.window_minutes == 0 {
            return Err("lockout window_minutes must be greater than 0".to_string());
        }
        if self.lockout_minutes == 0 {
            return Err("lockout lockout_minutes must be greater than 0".to_string());
        }
        Ok(())
    }

    fn window(&self) -> Duration {
        Duration::minutes(i64::from(self.window_minutes))
    }

    fn lockout(&self) -> Duration {
        Duration::minutes(i64::from(self.lockout_minutes))
    }
}

/// Reason a session was unlocked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnlockReason {
    /// A successful login cleared the lockout
    SuccessfulLogin,
    /// An administrator manually unlocked the session
    AdminAction,
}

impl fmt::Display for UnlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SuccessfulLogin => write!(f, "successful_login"),
            Self::AdminAction => write!(f, "admin_action"),
        }
    }
}

/// Domain events produced by [`AuthenticationSession`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// The failure threshold was reached
    ///
    /// Emitted on every failure while the threshold is met, not only on the
    /// first one, so monitoring sees continued attempts against a locked
    /// session.
    AccountLocked {
        /// Locked session
        session_id: SessionId,
        /// End of the lock
        locked_until: DateTime<Utc>,
        /// Failures in the window when the lock was (re)applied
        failure_count: usize,
    },
    /// An active lock was lifted
    AccountUnlocked {
        /// Unlocked session
        session_id: SessionId,
        /// Why it was unlocked
        reason: UnlockReason,
    },
}

impl SessionEvent {
    /// Short name used for routing and logging
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AccountLocked { .. } => "account_locked",
            Self::AccountUnlocked { .. } => "account_unlocked",
        }
    }

    /// The session this event belongs to
    pub fn session_id(&self) -> SessionId {
        match self {
            Self::AccountLocked { session_id, .. } | Self::AccountUnlocked { session_id, .. } => {
                *session_id
            }
        }
    }
}

/// One attempt recorded against a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationAttempt {
    /// User the attempt was made for
    pub user_id: String,
    /// Client address the attempt came from
    pub client_ip: String,
    /// Whether the attempt succeeded
    pub success: bool,
    /// Risk annotation
    pub risk_level: RiskLevel,
    /// When the attempt was recorded
    pub timestamp: DateTime<Utc>,
}

/// Result of [`AuthenticationSession::record_attempt`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptOutcome {
    /// Whether the session is locked after this attempt
    pub locked: bool,
    /// End of the lock, when locked
    pub locked_until: Option<DateTime<Utc>>,
    /// Events produced by this attempt
    pub events: Vec<SessionEvent>,
}

/// Attempts grouped under one session id, plus lockout state
///
/// A deserialized session must have a valid policy, attempts in
/// chronological order, and a reset marker within the attempt list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "StoredSession")]
pub struct AuthenticationSession {
    session_id: SessionId,
    attempts: Vec<AuthenticationAttempt>,
    lockout_until: Option<DateTime<Utc>>,
    policy: LockoutPolicy,
    created_at: DateTime<Utc>,
    /// Index of the first attempt that still counts towards lockout
    failures_since: usize,
}

#[derive(Deserialize)]
struct StoredSession {
    session_id: SessionId,
    attempts: Vec<AuthenticationAttempt>,
    lockout_until: Option<DateTime<Utc>>,
    policy: LockoutPolicy,
    created_at: DateTime<Utc>,
    #[serde(default)]
    failures_since: usize,
}

impl TryFrom<StoredSession> for AuthenticationSession {
    type Error = Error;

    fn try_from(stored: StoredSession) -> Result<Self, Self::Error> {
        stored.policy.validate().map_err(Error::Validation)?;
        if stored.failures_since > stored.attempts.len() {
            return Err(Error::Validation(format!(
                "Failure counter reset at attempt {} but only {} attempts are stored",
                stored.failures_since,
                stored.attempts.len()
            )));
        }
        if stored
            .attempts
            .windows(2)
            .any(|pair| pair[1].timestamp < pair[0].timestamp)
        {
            return Err(Error::Validation(
                "Stored attempts are not in chronological order".to_string(),
            ));
        }

        Ok(Self {
            session_id: stored.session_id,
            attempts: stored.attempts,
            lockout_until: stored.lockout_until,
            policy: stored.policy,
            created_at: stored.created_at,
            failures_since: stored.failures_since,
        })
    }
}

impl AuthenticationSession {
    /// Create an empty session
    pub fn new(session_id: SessionId, policy: LockoutPolicy) -> Self {
        Self::new_at(session_id, policy, Utc::now())
    }

    /// Create an empty session at an explicit instant
    pub fn new_at(session_id: SessionId, policy: LockoutPolicy, now: DateTime<Utc>) -> Self {
        Self {
            session_id,
            attempts: Vec::new(),
            lockout_until: None,
            policy,
            created_at: now,
            failures_since: 0,
        }
    }

    /// Record an attempt and re-evaluate the lockout policy
    pub fn record_attempt(
        &mut self,
        user_id: impl Into<String>,
        client_ip: impl Into<String>,
        success: bool,
        risk_level: RiskLevel,
    ) -> Result<AttemptOutcome, Error> {
        self.record_attempt_at(user_id, client_ip, success, risk_level, Utc::now())
    }

    /// Record an attempt at an explicit instant
    ///
    /// Attempts must be recorded in chronological order.
    pub fn record_attempt_at(
        &mut self,
        user_id: impl Into<String>,
        client_ip: impl Into<String>,
        success: bool,
        risk_level: RiskLevel,
        now: DateTime<Utc>,
    ) -> Result<AttemptOutcome, Error> {
        let user_id = user_id.into();
        if user_id.trim().is_empty() {
            return Err(Error::InvalidArgument("User id must not be blank".to_string()));
        }
        if let Some(last) = self.attempts.last() {
            if now < last.timestamp {
                return Err(Error::InvalidArgument(format!(
                    "Attempt at {} predates the last recorded attempt at {}",
                    now, last.timestamp
                )));
            }
        }

        self.attempts.push(AuthenticationAttempt {
            user_id,
            client_ip: client_ip.into(),
            success,
            risk_level,
            timestamp: now,
        });

        let mut events = Vec::new();

        if success {
            let was_locked = self.is_currently_locked_at(now);
            self.failures_since = self.attempts.len();
            self.lockout_until = None;
            if was_locked {
                events.push(SessionEvent::AccountUnlocked {
                    session_id: self.session_id,
                    reason: UnlockReason::SuccessfulLogin,
                });
            }
            return Ok(AttemptOutcome {
                locked: false,
                locked_until: None,
                events,
            });
        }

        let failure_count = self.failures_in_window(now);
        if failure_count >= self.policy.max_attempts as usize {
            let locked_until = now + self.policy.lockout();
            self.lockout_until = Some(locked_until);
            events.push(SessionEvent::AccountLocked {
                session_id: self.session_id,
                locked_until,
                failure_count,
            });
        }

        let locked = self.is_currently_locked_at(now);
        Ok(AttemptOutcome {
            locked,
            locked_until: if locked { self.lockout_until } else { None },
            events,
        })
    }

    /// Failures since the last reset whose timestamp is within the window
    ///
    /// The cutoff is inclusive: a failure exactly `window_minutes` old counts.
    pub fn failures_in_window(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.policy.window();
        self.attempts
            .get(self.failures_since..)
            .unwrap_or_default()
            .iter()
            .filter(|a| !a.success && a.timestamp >= cutoff && a.timestamp <= now)
            .count()
    }

    /// Whether the session is locked right now
    pub fn is_currently_locked(&self) -> bool {
        self.is_currently_locked_at(Utc::now())
    }

    /// Whether the session is locked at `now`
    pub fn is_currently_locked_at(&self, now: DateTime<Utc>) -> bool {
        self.lockout_until.is_some_and(|until| now < until)
    }

    /// Time left on the lock at `now`, if locked
    pub fn lockout_remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.lockout_until
            .filter(|until| now < *until)
            .map(|until| until - now)
    }

    /// Lift the lock unconditionally
    ///
    /// Returns whether the session was locked, plus an `AccountUnlocked`
    /// event when it was. The failure counter is reset as well, so the next
    /// failure does not re-lock immediately.
    pub fn unlock(&mut self) -> (bool, Vec<SessionEvent>) {
        self.unlock_at(Utc::now())
    }

    /// Lift the lock at an explicit instant
    pub fn unlock_at(&mut self, now: DateTime<Utc>) -> (bool, Vec<SessionEvent>) {
        let was_locked = self.is_currently_locked_at(now);
        self.lockout_until = None;
        self.failures_since = self.attempts.len();

        let events = if was_locked {
            vec![SessionEvent::AccountUnlocked {
                session_id: self.session_id,
                reason: UnlockReason::AdminAction,
            }]
        } else {
            Vec::new()
        };
        (was_locked, events)
    }

    /// Session id
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Every attempt, oldest first
    pub fn attempts(&self) -> &[AuthenticationAttempt] {
        &self.attempts
    }

    /// Stored end of the last lock, which may lie in the past
    pub fn lockout_until(&self) -> Option<DateTime<Utc>> {
        self.lockout_until
    }

    /// Lockout policy in force
    pub fn policy(&self) -> &LockoutPolicy {
        &self.policy
    }

    /// When the session was created
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
