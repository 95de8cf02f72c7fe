//! Typed configuration structures
//!
//! Every section has defaults, so an empty file (or no file) is a valid
//! configuration.

use crate::polls::PollLimits;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// HTTP listener
    pub server: ServerConfig,
    /// Poll storage
    pub database: DatabaseConfig,
    /// Input limits for polls and votes
    pub polls: PollLimits,
    /// Logging
    pub logging: LoggingConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    /// Bind address
    pub bind: String,
    /// Port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

pub const DEFAULT_PORT: u16 = 3000;

/// Value of `database.url` that selects the in-process store
pub const MEMORY_DATABASE: &str = "memory";

/// Poll storage configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseConfig {
    /// SQLite URL (`sqlite://polls.db`, `sqlite::memory:`) or `memory`
    pub url: String,
    /// Pool size for file-backed databases
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://polls.db".to_string(),
            max_connections: 5,
        }
    }
}

impl DatabaseConfig {
    pub fn is_memory(&self) -> bool {
        self.url == MEMORY_DATABASE
    }
}
