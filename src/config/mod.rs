//! Configuration management.
//!
//! This module handles:
//! - Environment variable loading (with `.env` support)
//! - Backend selection with fallback to the default kind
//! - Default value handling and validation
//!
//! # Example
//!
//! ```
//! use prefstore::config::{Config, DEFAULT_SHUTDOWN_TIMEOUT_MS};
//! use prefstore::backend::BackendKind;
//! use prefstore::record::ActivationMode;
//!
//! // Create a config directly (use Config::from_env() in production)
//! let config = Config {
//!     backend: BackendKind::Sqlite,
//!     database_path: "./data/players.db".to_string(),
//!     mysql_url: None,
//!     json_data_dir: "./data/playerdata".to_string(),
//!     shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT_MS,
//!     default_activation_mode: ActivationMode::Sneak,
//!     default_pattern_id: None,
//! };
//!
//! assert_eq!(config.backend, BackendKind::Sqlite);
//! ```

use crate::backend::BackendKind;
use crate::error::ConfigError;
use crate::record::ActivationMode;

/// Default `SQLite` database path.
pub const DEFAULT_DATABASE_PATH: &str = "./data/players.db";

/// Default directory for the flat-file backend.
pub const DEFAULT_JSON_DATA_DIR: &str = "./data/playerdata";

/// Default bounded wait for shutdown, in milliseconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 5_000;

/// Minimum accepted shutdown timeout.
pub const MIN_SHUTDOWN_TIMEOUT_MS: u64 = 100;

/// Maximum accepted shutdown timeout.
pub const MAX_SHUTDOWN_TIMEOUT_MS: u64 = 600_000;

/// Application configuration.
///
/// Use [`Config::from_env`] to load configuration from environment
/// variables, then hand the config to
/// [`StorageEngine::from_config`](crate::engine::StorageEngine::from_config).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Selected storage backend kind.
    pub backend: BackendKind,
    /// `SQLite` database file path.
    pub database_path: String,
    /// `MySQL` connection URL; required when `backend` is `MySql`.
    pub mysql_url: Option<String>,
    /// Data directory for the flat-file backend.
    pub json_data_dir: String,
    /// Bounded wait for shutdown, in milliseconds.
    pub shutdown_timeout_ms: u64,
    /// Fallback activation mode for unknown persisted mode identifiers.
    pub default_activation_mode: ActivationMode,
    /// Fallback pattern for unknown persisted pattern identifiers.
    pub default_pattern_id: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Optional environment variables (with defaults):
    /// - `STORAGE_BACKEND`: `sqlite` | `mysql` | `json` (default: `sqlite`;
    ///   unrecognized values warn and fall back to the default rather than
    ///   failing startup)
    /// - `DATABASE_PATH`: `SQLite` file path (default: `./data/players.db`)
    /// - `MYSQL_URL`: connection URL, required only for the `mysql` backend
    /// - `JSON_DATA_DIR`: flat-file directory (default: `./data/playerdata`)
    /// - `SHUTDOWN_TIMEOUT_MS`: bounded shutdown wait (default: `5000`)
    /// - `DEFAULT_ACTIVATION_MODE`: decode fallback mode (default: `SNEAK`)
    /// - `DEFAULT_PATTERN_ID`: decode fallback pattern (default: none)
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if:
    /// - the `mysql` backend is selected without `MYSQL_URL`
    /// - `SHUTDOWN_TIMEOUT_MS` is not a valid integer or is out of bounds
    /// - `DEFAULT_ACTIVATION_MODE` is not a known mode identifier
    #[must_use = "configuration should be used"]
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        let backend = std::env::var("STORAGE_BACKEND").map_or_else(
            |_| BackendKind::default(),
            |raw| {
                BackendKind::from_id(&raw).unwrap_or_else(|| {
                    let fallback = BackendKind::default();
                    tracing::warn!(
                        requested = raw.as_str(),
                        fallback = fallback.id(),
                        "Unrecognized storage backend, falling back to default"
                    );
                    fallback
                })
            },
        );

        let database_path =
            std::env::var("DATABASE_PATH").unwrap_or_else(|_| DEFAULT_DATABASE_PATH.into());

        let mysql_url = std::env::var("MYSQL_URL").ok();
        if backend == BackendKind::MySql && mysql_url.is_none() {
            return Err(ConfigError::MissingRequired {
                var: "MYSQL_URL".into(),
            });
        }

        let json_data_dir =
            std::env::var("JSON_DATA_DIR").unwrap_or_else(|_| DEFAULT_JSON_DATA_DIR.into());

        let shutdown_timeout_ms =
            parse_env_u64("SHUTDOWN_TIMEOUT_MS", DEFAULT_SHUTDOWN_TIMEOUT_MS)?;

        let default_activation_mode = match std::env::var("DEFAULT_ACTIVATION_MODE") {
            Ok(raw) => {
                ActivationMode::from_id(&raw).ok_or_else(|| ConfigError::InvalidValue {
                    var: "DEFAULT_ACTIVATION_MODE".into(),
                    reason: format!("unknown activation mode {raw:?}"),
                })?
            }
            Err(_) => ActivationMode::default(),
        };

        let default_pattern_id = std::env::var("DEFAULT_PATTERN_ID").ok();

        let config = Self {
            backend,
            database_path,
            mysql_url,
            json_data_dir,
            shutdown_timeout_ms,
            default_activation_mode,
            default_pattern_id,
        };
        validate_config(&config)?;
        Ok(config)
    }
}

/// Validate a configuration's value ranges.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] if `shutdown_timeout_ms` is
/// outside `[MIN_SHUTDOWN_TIMEOUT_MS, MAX_SHUTDOWN_TIMEOUT_MS]`.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if !(MIN_SHUTDOWN_TIMEOUT_MS..=MAX_SHUTDOWN_TIMEOUT_MS).contains(&config.shutdown_timeout_ms) {
        return Err(ConfigError::InvalidValue {
            var: "SHUTDOWN_TIMEOUT_MS".into(),
            reason: format!(
                "must be between {MIN_SHUTDOWN_TIMEOUT_MS} and {MAX_SHUTDOWN_TIMEOUT_MS}"
            ),
        });
    }
    Ok(())
}

fn parse_env_u64(var: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            var: var.into(),
            reason: format!("{raw:?} is not a valid positive integer"),
        }),
        Err(_) => Ok(default),
    }
}
