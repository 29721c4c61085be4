//! Configuration module for Parley.

use serde::Deserialize;
use std::path::Path;

use crate::{ChatError, Result};

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origins.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    4000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/parley.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// JWT secret key (must be set).
    #[serde(default)]
    pub jwt_secret: String,
    /// Name of the cookie carrying the access token on WebSocket handshake.
    #[serde(default = "default_token_cookie")]
    pub token_cookie: String,
}

fn default_token_cookie() -> String {
    "accessToken".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_cookie: default_token_cookie(),
        }
    }
}

/// Chat behavior configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    /// Default number of messages per history page.
    #[serde(default = "default_history_limit")]
    pub history_default_limit: u32,
    /// Maximum number of messages per history page.
    #[serde(default = "default_history_max_limit")]
    pub history_max_limit: u32,
}

fn default_history_limit() -> u32 {
    50
}

fn default_history_max_limit() -> u32 {
    200
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_default_limit: default_history_limit(),
            history_max_limit: default_history_max_limit(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/parley.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Authentication configuration.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Chat behavior configuration.
    #[serde(default)]
    pub chat: ChatConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ChatError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| ChatError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `PARLEY_JWT_SECRET`: Override the JWT secret key
    pub fn apply_env_overrides(&mut self) {
        if let Ok(jwt_secret) = std::env::var("PARLEY_JWT_SECRET") {
            if !jwt_secret.is_empty() {
                self.auth.jwt_secret = jwt_secret;
            }
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if the JWT secret is not set or the history limits
    /// are inconsistent.
    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.is_empty() {
            return Err(ChatError::Config(
                "jwt_secret is not set. \
                 Set it in config.toml or via PARLEY_JWT_SECRET environment variable."
                    .to_string(),
            ));
        }
        if self.chat.history_default_limit == 0
            || self.chat.history_default_limit > self.chat.history_max_limit
        {
            return Err(ChatError::Config(
                "history_default_limit must be between 1 and history_max_limit".to_string(),
            ));
        }
        Ok(())
    }
}
