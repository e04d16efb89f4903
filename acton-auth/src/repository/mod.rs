//! Persistence ports for authentications and sessions
//!
//! The core never talks to a database directly. Use cases load, mutate and
//! save aggregates through [`AuthenticationRepository`] and
//! [`AuthenticationSessionRepository`]; errors are reported as
//! [`RepositoryError`] and propagated unchanged.
//!
//! In-memory adapters are provided for tests and single-process embedding.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{RepositoryError, RepositoryErrorKind, RepositoryOperation};
pub use memory::{InMemoryAuthenticationRepository, InMemorySessionRepository};
pub use traits::{AuthenticationRepository, AuthenticationSessionRepository, RepositoryResult};
