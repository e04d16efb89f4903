//! Domain model: value objects and aggregates

pub mod authentication;
pub mod credentials;
pub mod risk;
pub mod session;
pub mod token;

pub use authentication::{Authentication, AuthenticationEvent, AuthenticationStatus};
pub use credentials::Credentials;
pub use risk::{RiskCategory, RiskLevel};
pub use session::{
    AttemptOutcome, AuthenticationAttempt, AuthenticationSession, LockoutPolicy, SessionEvent,
    UnlockReason,
};
pub use token::{Token, TokenLifetimeBounds};
