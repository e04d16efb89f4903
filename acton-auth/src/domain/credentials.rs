//! Login credentials value object

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer};

use crate::error::Error;

/// Minimum username length (inclusive)
pub const MIN_USERNAME_LENGTH: usize = 3;
/// Maximum username length (inclusive)
pub const MAX_USERNAME_LENGTH: usize = 50;
/// Minimum password length (inclusive)
pub const MIN_PASSWORD_LENGTH: usize = 8;

static USERNAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("username pattern is a valid regex"));

/// Username/password pair submitted for authentication
///
/// Validated on construction and immutable afterwards. The password is never
/// printed by `Debug` and never serialized.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Validate and build credentials
    ///
    /// Fails when the username is not 3–50 characters of `[A-Za-z0-9_]`, or
    /// when the password is shorter than 8 characters.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Result<Self, Error> {
        let username = username.into();
        let password = password.into();

        let username_len = username.chars().count();
        if !(MIN_USERNAME_LENGTH..=MAX_USERNAME_LENGTH).contains(&username_len) {
            return Err(Error::Validation(format!(
                "Username must be between {} and {} characters",
                MIN_USERNAME_LENGTH, MAX_USERNAME_LENGTH
            )));
        }
        if !USERNAME_PATTERN.is_match(&username) {
            return Err(Error::Validation(
                "Username may only contain letters, digits and underscores".to_string(),
            ));
        }
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(Error::Validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }

        Ok(Self { username, password })
    }

    /// The username
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The plaintext password
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

// Persisted form carries only the username; see `Authentication`.
impl serde::Serialize for Credentials {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("Credentials", 1)?;
        state.serialize_field("username", &self.username)?;
        state.end()
    }
}

/// Deserialized credentials have no password; they are only ever reloaded
/// from storage for audit, never re-submitted to a provider.
impl<'de> Deserialize<'de> for Credentials {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Stored {
            username: String,
        }
        let stored = Stored::deserialize(deserializer)?;
        Ok(Self {
            username: stored.username,
            password: String::new(),
        })
    }
}
