//! Configuration management using Figment
//!
//! Configuration is loaded from multiple sources with the following precedence (highest to lowest):
//! 1. Environment variables (prefix: ACTON_AUTH_, nested keys split on `__`)
//! 2. Current working directory: ./config.toml
//! 3. XDG config directory: ~/.config/acton-auth/config.toml
//! 4. System directory: /etc/acton-auth/config.toml
//! 5. Default values
//!
//! With [`Config::load_for_service`] the XDG and system paths gain a
//! `{service_name}/` component.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::activity::SuspiciousActivityConfig;
use crate::domain::LockoutPolicy;
use crate::error::{Error, Result};
use crate::password::PasswordConfig;
use crate::provider::{
    KeycloakConfig, KeycloakProvider, LocalJwtConfig, LocalJwtProvider, ProviderType,
    TokenProvider, TokensConfig, UserDirectory,
};

#[cfg(feature = "nats")]
use crate::events::NatsConfig;

const APP_NAME: &str = "acton-auth";
const ENV_PREFIX: &str = "ACTON_AUTH_";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service configuration
    pub service: ServiceConfig,

    /// Which token provider is active
    #[serde(default)]
    pub provider: ProviderSelection,

    /// Accepted token lifetimes
    #[serde(default)]
    pub tokens: TokensConfig,

    /// Local JWT provider settings
    #[serde(default)]
    pub local_jwt: LocalJwtConfig,

    /// Keycloak provider settings (required when `provider.kind = "keycloak"`)
    #[serde(default)]
    pub keycloak: Option<KeycloakConfig>,

    /// Session lockout policy
    #[serde(default)]
    pub lockout: LockoutPolicy,

    /// Brute-force detection
    #[serde(default)]
    pub suspicious_activity: SuspiciousActivityConfig,

    /// Argon2id parameters for the local user directory
    #[serde(default)]
    pub password: PasswordConfig,

    /// NATS event publishing (optional)
    #[cfg(feature = "nats")]
    #[serde(default)]
    pub nats: Option<NatsConfig>,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name
    pub name: String,

    /// Log level or filter directive (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Token provider selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSelection {
    /// Provider strategy (default: local_jwt)
    #[serde(default = "default_provider_kind")]
    pub kind: ProviderType,
}

impl Default for ProviderSelection {
    fn default() -> Self {
        Self {
            kind: default_provider_kind(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_provider_kind() -> ProviderType {
    ProviderType::LocalJwt
}

impl Config {
    /// Load configuration from all sources
    ///
    /// Searches for config files in this order (first found wins per key):
    /// 1. Current working directory: ./config.toml
    /// 2. XDG config directory: ~/.config/acton-auth/config.toml
    /// 3. System directory: /etc/acton-auth/config.toml
    ///
    /// Environment variables (ACTON_AUTH_ prefix) override all file-based configs.
    pub fn load() -> Result<Self> {
        Self::load_paths(Self::find_config_paths(None))
    }

    /// Load configuration for a specific service name
    ///
    /// Uses `~/.config/acton-auth/{service_name}/config.toml` and
    /// `/etc/acton-auth/{service_name}/config.toml`.
    pub fn load_for_service(service_name: &str) -> Result<Self> {
        Self::load_paths(Self::find_config_paths(Some(service_name)))
    }

    /// Load configuration from a specific file
    ///
    /// This bypasses XDG directories and loads directly from the given path.
    /// Useful for testing or non-standard deployments.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }

    fn load_paths(config_paths: Vec<PathBuf>) -> Result<Self> {
        tracing::debug!("Searching for config files in order:");
        for path in &config_paths {
            tracing::debug!("  - {}", path.display());
        }

        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        // Lowest priority first so later merges override
        for path in config_paths.iter().rev() {
            if path.exists() {
                tracing::info!("Loading configuration from: {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config = figment.extract()?;
        Ok(config)
    }

    /// Candidate config file paths, highest priority first
    fn find_config_paths(service_name: Option<&str>) -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        let relative = match service_name {
            Some(name) => Path::new(name).join("config.toml"),
            None => PathBuf::from("config.toml"),
        };

        let xdg_dirs = xdg::BaseDirectories::with_prefix(APP_NAME);
        if let Ok(path) = xdg_dirs.place_config_file(&relative) {
            paths.push(path);
        }

        paths.push(Path::new("/etc").join(APP_NAME).join(&relative));
        paths
    }

    /// Validate every section
    ///
    /// Only the section for the selected provider is checked.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            self.tokens.validate(),
            self.lockout.validate(),
            self.suspicious_activity.validate(),
            self.password.validate(),
            self.validate_provider(),
        ];
        for check in checks {
            check.map_err(Error::Validation)?;
        }
        Ok(())
    }

    fn validate_provider(&self) -> std::result::Result<(), String> {
        match self.provider.kind {
            ProviderType::LocalJwt => self.local_jwt.validate(),
            ProviderType::Keycloak => match &self.keycloak {
                Some(keycloak) => keycloak.validate(),
                None => Err("keycloak section is required when provider.kind = \"keycloak\"".to_string()),
            },
        }
    }

    /// Construct the configured token provider
    ///
    /// `directory` backs the local JWT provider and is ignored for Keycloak.
    pub fn build_provider(&self, directory: Arc<dyn UserDirectory>) -> Result<Arc<dyn TokenProvider>> {
        let bounds = self.tokens.bounds()?;

        let provider: Arc<dyn TokenProvider> = match self.provider.kind {
            ProviderType::LocalJwt => {
                Arc::new(LocalJwtProvider::new(&self.local_jwt, bounds, directory)?)
            }
            ProviderType::Keycloak => {
                let keycloak = self.keycloak.clone().ok_or_else(|| {
                    Error::Validation(
                        "keycloak section is required when provider.kind = \"keycloak\"".to_string(),
                    )
                })?;
                Arc::new(KeycloakProvider::new(keycloak, bounds)?)
            }
        };

        tracing::info!(provider = %self.provider.kind, "Token provider configured");
        Ok(provider)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                name: APP_NAME.to_string(),
                log_level: default_log_level(),
            },
            provider: ProviderSelection::default(),
            tokens: TokensConfig::default(),
            local_jwt: LocalJwtConfig::default(),
            keycloak: None,
            lockout: LockoutPolicy::default(),
            suspicious_activity: SuspiciousActivityConfig::default(),
            password: PasswordConfig::default(),
            #[cfg(feature = "nats")]
            nats: None,
        }
    }
}
