//! Typed identifiers for authentications and sessions
//!
//! Both identifiers wrap a random (v4) UUID. They are security-relevant (a
//! session id is the key that lockout state hangs off), so they use random
//! rather than time-sortable UUIDs.
//!
//! ```rust
//! use acton_auth::ids::SessionId;
//!
//! let id = SessionId::generate();
//! let parsed = SessionId::of(&id.to_string()).unwrap();
//! assert_eq!(id, parsed);
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

macro_rules! uuid_identifier {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a new random identifier
            #[must_use]
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            /// Parse an identifier from its string form
            ///
            /// Fails with [`Error::Validation`] when the input is blank or
            /// not a UUID.
            pub fn of(value: &str) -> Result<Self, Error> {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    return Err(Error::Validation(format!("{} must not be blank", $label)));
                }
                Uuid::parse_str(trimmed)
                    .map(Self)
                    .map_err(|e| Error::Validation(format!("Invalid {}: {}", $label, e)))
            }

            /// Wrap an existing UUID
            #[must_use]
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// The underlying UUID
            #[must_use]
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::of(s)
            }
        }
    };
}

uuid_identifier!(
    /// Identifier of a single [`Authentication`](crate::domain::Authentication) attempt
    AuthenticationId,
    "authentication id"
);

uuid_identifier!(
    /// Identifier of an [`AuthenticationSession`](crate::domain::AuthenticationSession)
    SessionId,
    "session id"
);
