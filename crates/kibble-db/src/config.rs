//! Store configuration.
//!
//! Loaded from environment variables with fallback to defaults.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::pool::DbConfig;

/// Storefront runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database file (`KIBBLE_DATABASE_PATH`)
    pub database_path: PathBuf,

    /// Pool size (`KIBBLE_DB_MAX_CONNECTIONS`)
    pub max_connections: u32,

    /// SQLite busy timeout in milliseconds (`KIBBLE_DB_BUSY_TIMEOUT_MS`)
    pub busy_timeout_ms: u64,

    /// Default tracing filter (`KIBBLE_LOG`)
    pub log_filter: String,
}

impl StoreConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = StoreConfig {
            database_path: lookup("KIBBLE_DATABASE_PATH")
                .unwrap_or_else(|| "./kibble.db".to_string())
                .into(),

            max_connections: lookup("KIBBLE_DB_MAX_CONNECTIONS")
                .unwrap_or_else(|| "5".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("KIBBLE_DB_MAX_CONNECTIONS".to_string()))?,

            busy_timeout_ms: lookup("KIBBLE_DB_BUSY_TIMEOUT_MS")
                .unwrap_or_else(|| "5000".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("KIBBLE_DB_BUSY_TIMEOUT_MS".to_string()))?,

            log_filter: lookup("KIBBLE_LOG").unwrap_or_else(|| "info".to_string()),
        };

        if config.max_connections == 0 {
            return Err(ConfigError::InvalidValue(
                "KIBBLE_DB_MAX_CONNECTIONS".to_string(),
            ));
        }

        Ok(config)
    }

    /// Pool configuration derived from this config.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database_path.clone())
            .max_connections(self.max_connections)
            .busy_timeout(Duration::from_millis(self.busy_timeout_ms))
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}
