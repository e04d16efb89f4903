//! Argon2id password hashing for the local user directory
//!
//! ```rust,ignore
//! use acton_auth::password::{PasswordConfig, PasswordHasher};
//!
//! let hasher = PasswordHasher::new(PasswordConfig::default())?;
//! let hash = hasher.hash("password123")?;
//! assert!(hasher.verify("password123", &hash)?);
//! ```

use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as Argon2Hasher, PasswordVerifier,
        SaltString,
    },
    Algorithm, Argon2, Params, Version,
};
use serde::{Deserialize, Serialize};

use crate::error::Error;

fn default_memory_cost() -> u32 {
    65536
}

fn default_time_cost() -> u32 {
    3
}

fn default_parallelism() -> u32 {
    4
}

/// Argon2id cost parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordConfig {
    /// Memory cost in KiB (default: 65536 = 64 MiB)
    #[serde(default = "default_memory_cost")]
    pub memory_cost_kib: u32,

    /// Iterations (default: 3)
    #[serde(default = "default_time_cost")]
    pub time_cost: u32,

    /// Lanes (default: 4)
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_cost_kib: default_memory_cost(),
            time_cost: default_time_cost(),
            parallelism: default_parallelism(),
        }
    }
}

impl PasswordConfig {
    /// Validate the parameters against Argon2's limits
    pub fn validate(&self) -> Result<(), String> {
        self.params().map(|_| ())
    }

    fn params(&self) -> Result<Params, String> {
        Params::new(self.memory_cost_kib, self.time_cost, self.parallelism, None)
            .map_err(|e| format!("invalid password hashing parameters: {}", e))
    }
}

/// Argon2id hasher producing PHC strings
#[derive(Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl PasswordHasher {
    /// Create a hasher, rejecting parameters Argon2 cannot use
    pub fn new(config: PasswordConfig) -> Result<Self, Error> {
        let params = config.params().map_err(Error::Validation)?;
        Ok(Self { params })
    }

    /// Hash a password with a fresh random salt
    pub fn hash(&self, password: &str) -> Result<String, Error> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone());

        argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| Error::Internal(format!("Failed to hash password: {}", e)))
    }

    /// Verify a password against a PHC hash in constant time
    ///
    /// `Ok(false)` means the password is wrong; `Err` means the stored hash
    /// is unusable.
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, Error> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| Error::Internal(format!("Invalid password hash format: {}", e)))?;

        match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(Error::Internal(format!(
                "Password verification failed: {}",
                e
            ))),
        }
    }

    /// Whether a stored hash was produced with other parameters
    pub fn needs_rehash(&self, hash: &str) -> bool {
        let Ok(parsed_hash) = PasswordHash::new(hash) else {
            return true;
        };
        if parsed_hash.algorithm != Algorithm::Argon2id.ident() {
            return true;
        }
        if parsed_hash.version != Some(Version::V0x13 as u32) {
            return true;
        }

        let param = |name: &str| {
            parsed_hash
                .params
                .iter()
                .find(|(k, _)| k.as_str() == name)
                .and_then(|(_, v)| v.decimal().ok())
        };

        param("m") != Some(self.params.m_cost())
            || param("t") != Some(self.params.t_cost())
            || param("p") != Some(self.params.p_cost())
    }
}

#[cfg(test)]
pub(crate) fn fast_test_config() -> PasswordConfig {
    PasswordConfig {
        memory_cost_kib: 1024,
        time_cost: 1,
        parallelism: 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(fast_test_config()).unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = hasher();
        let hash = hasher.hash("password123").unwrap();
        assert!(hash.starts_with("$argon2id$"));

        assert!(hasher.verify("password123", &hash).unwrap());
        assert!(!hasher.verify("wrongpassword", &hash).unwrap());
    }

    #[test]
    fn test_invalid_hash_format() {
        assert!(hasher().verify("password123", "not_a_valid_hash").is_err());
    }

    #[test]
    fn test_salted_hashes_differ() {
        let hasher = hasher();
        let hash1 = hasher.hash("password123").unwrap();
        let hash2 = hasher.hash("password123").unwrap();
        assert_ne!(hash1, hash2);
        assert!(hasher.verify("password123", &hash2).unwrap());
    }

    #[test]
    fn test_needs_rehash() {
        let hasher = hasher();
        let hash = hasher.hash("password123").unwrap();
        assert!(!hasher.needs_rehash(&hash));

        let stronger = PasswordHasher::new(PasswordConfig {
            memory_cost_kib: 2048,
            ..fast_test_config()
        })
        .unwrap();
        assert!(stronger.needs_rehash(&hash));
        assert!(stronger.needs_rehash("garbage"));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let config = PasswordConfig {
            memory_cost_kib: 1,
            time_cost: 0,
            parallelism: 0,
        };
        assert!(config.validate().is_err());
        assert!(matches!(
            PasswordHasher::new(config),
            Err(Error::Validation(_))
        ));
    }
}
