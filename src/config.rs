//! Process configuration, read from environment variables.
//!
//! | Variable | Default |
//! |---|---|
//! | `RACE_BIND_ADDR` | `0.0.0.0:8080` |
//! | `RACE_MAX_CONNECTIONS` | `1000` |
//! | `RACE_IDLE_TIMEOUT_SECS` | `300` |
//! | `RACE_DATA_DIR` | unset: results kept in memory |
//! | `RACE_CATALOGUE` | unset: demo catalogue |
//! | `AUTH_*` | see [`AuthConfig`] |

use std::path::PathBuf;
use std::time::Duration;

use crate::network::auth::AuthConfig;
use crate::network::server::ServerConfig;

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A variable is set but cannot be parsed.
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        /// Variable name.
        key: &'static str,
        /// Raw value.
        value: String,
        /// Parser message.
        reason: String,
    },
}

/// Where race data comes from and where results go.
#[derive(Clone, Debug, Default)]
pub struct StorageConfig {
    /// Directory for durable result files.
    pub data_dir: Option<PathBuf>,
    /// JSON race catalogue to load at startup.
    pub catalogue: Option<PathBuf>,
}

/// Everything the server binary needs.
#[derive(Clone, Debug, Default)]
pub struct AppConfig {
    /// Listener settings.
    pub server: ServerConfig,
    /// Token verification for `identify`.
    pub auth: AuthConfig,
    /// Catalogue and result storage.
    pub storage: StorageConfig,
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration from any key lookup. Unset keys take defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = ServerConfig::default();

        let server = ServerConfig {
            bind_addr: parse_or(&lookup, "RACE_BIND_ADDR", defaults.bind_addr)?,
            max_connections: parse_or(&lookup, "RACE_MAX_CONNECTIONS", defaults.max_connections)?,
            idle_timeout: parse_or(&lookup, "RACE_IDLE_TIMEOUT_SECS", defaults.idle_timeout.as_secs())
                .map(Duration::from_secs)?,
            version: defaults.version,
        };

        if server.max_connections == 0 {
            return Err(ConfigError::Invalid {
                key: "RACE_MAX_CONNECTIONS",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }

        let storage = StorageConfig {
            data_dir: non_empty(&lookup, "RACE_DATA_DIR").map(PathBuf::from),
            catalogue: non_empty(&lookup, "RACE_CATALOGUE").map(PathBuf::from),
        };

        Ok(Self {
            server,
            auth: AuthConfig::from_lookup(&lookup),
            storage,
        })
    }
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).filter(|v| !v.trim().is_empty())
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty(lookup, key) {
        None => Ok(default),
        Some(value) => match value.trim().parse::<T>() {
            Ok(parsed) => Ok(parsed),
            Err(e) => Err(ConfigError::Invalid {
                key,
                reason: e.to_string(),
                value,
            }),
        },
    }
}
