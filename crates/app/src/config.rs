//! Layered configuration for the `courseline` binary.
//!
//! Sources, highest priority first:
//! 1. Environment variables (`COURSELINE_*`, `__` separates nested keys)
//! 2. `courseline.toml` in the working directory
//! 3. Built-in defaults
//!
//! A `.env` file in the working directory is loaded into the process
//! environment before the figment is built.

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CONFIG_FILE: &str = "courseline.toml";
pub const ENV_PREFIX: &str = "COURSELINE_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Figment(#[from] figment::Error),

    #[error("invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_url: String,
    pub log_level: String,
    pub max_connections: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:courseline.sqlite3?mode=rwc".into(),
            log_level: "warn".into(),
            max_connections: 5,
        }
    }
}

impl AppConfig {
    /// Load from `courseline.toml` and the environment, without touching `.env`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a source cannot be parsed or a value is out of range.
    pub fn load() -> Result<Self, ConfigError> {
        let config: Self = Self::figment().extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Load `.env` first, then the figment.
    ///
    /// # Errors
    ///
    /// See [`AppConfig::load`].
    pub fn load_with_dotenv() -> Result<Self, ConfigError> {
        // A missing .env is normal.
        let _ = dotenvy::dotenv();
        Self::load()
    }

    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        let local = Path::new(CONFIG_FILE);
        if local.exists() {
            figment = figment.merge(Toml::file(local));
        }

        // COURSELINE_LOG is the tracing filter directive, not a config key.
        figment.merge(Env::prefixed(ENV_PREFIX).split("__").ignore(&["log"]))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "database_url",
                reason: "must not be empty".into(),
            });
        }
        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_connections",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}
