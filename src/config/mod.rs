//! Configuration loading
//!
//! Reads an optional JSON5 file, then applies `QUICKPOLL_*` environment
//! overrides on top.

pub mod types;

pub use types::{Config, DatabaseConfig, ServerConfig, DEFAULT_PORT, MEMORY_DATABASE};

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "QUICKPOLL_CONFIG";

/// Config file used when nothing else is specified
pub const DEFAULT_CONFIG_FILE: &str = "quickpoll.json5";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}

/// Resolve the config file path: explicit flag, then env, then default
pub fn get_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    std::env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// Load configuration from `path` and the process environment.
///
/// A missing file is not an error unless the path was given explicitly.
pub fn load_config(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    let path = get_config_path(explicit);

    let mut config = match std::fs::read_to_string(&path) {
        Ok(raw) => parse_config(&path, &raw)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && explicit.is_none() => {
            tracing::debug!("No config file at {}, using defaults", path.display());
            Config::default()
        }
        Err(source) => return Err(ConfigError::Io { path, source }),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    Ok(config)
}

/// Parse JSON5 config text
pub fn parse_config(path: &Path, raw: &str) -> Result<Config, ConfigError> {
    json5::from_str(raw).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Apply `QUICKPOLL_*` overrides using `lookup` to read variables
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(bind) = lookup("QUICKPOLL_BIND") {
        config.server.bind = bind;
    }
    if let Some(port) = lookup("QUICKPOLL_PORT") {
        config.server.port = port.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: "QUICKPOLL_PORT".to_string(),
            value: port,
        })?;
    }
    if let Some(url) = lookup("QUICKPOLL_DATABASE_URL") {
        config.database.url = url;
    }
    if let Some(level) = lookup("QUICKPOLL_LOG_LEVEL") {
        config.logging.log_level = level;
    }
    Ok(())
}
