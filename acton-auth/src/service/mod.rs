//! Use cases tying aggregates, providers, repositories and events together

pub mod authentication;
pub mod risk;
pub mod session;

pub use authentication::{AttemptContext, AuthenticationOutcome, AuthenticationService};
pub use risk::RiskAssessor;
pub use session::SessionService;
