//! # Configuration
//!
//! Client settings resolved from defaults, an optional config file,
//! `FITCHAT_*` environment variables, and command-line overrides.

use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path, path::PathBuf, time::Duration};
use thiserror::Error;
use url::Url;

pub const ENV_SERVER_URL: &str = "FITCHAT_SERVER_URL";
pub const ENV_USER_ID: &str = "FITCHAT_USER_ID";
pub const ENV_AUTH_TOKEN: &str = "FITCHAT_AUTH_TOKEN";
pub const ENV_POLL_INTERVAL_SECS: &str = "FITCHAT_POLL_INTERVAL_SECS";
pub const ENV_LOG_LEVEL: &str = "FITCHAT_LOG_LEVEL";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported configuration format '{extension}'. Use 'yaml', 'json', or 'toml'.")]
    UnsupportedFormat { extension: String },

    #[error("failed to parse configuration file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid {name} value: {message}")]
    InvalidEnv { name: &'static str, message: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Settings for the chat client.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the chat server
    pub server_url: String,

    /// Id of the signed-in user
    pub user_id: Option<String>,

    /// Bearer token sent with every request
    pub auth_token: Option<String>,

    /// Seconds between history re-fetches while the live channel is down
    pub poll_interval_secs: u64,

    /// Messages requested per history page
    pub history_page_size: u32,

    /// Seconds to wait before reopening a dropped live channel
    pub reconnect_delay_secs: u64,

    /// Logging level
    pub log_level: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Values given on the command line; they win over every other source.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub server_url: Option<String>,
    pub user_id: Option<String>,
    pub poll_interval_secs: Option<u64>,
}

impl ClientConfig {
    /// Generates a default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            server_url: "http://localhost:8080".to_string(),
            user_id: None,
            auth_token: None,
            poll_interval_secs: 5,
            history_page_size: 50,
            reconnect_delay_secs: 1,
            log_level: "info".to_string(),
        }
    }

    /// Loads the configuration from a file, environment variables, or defaults.
    ///
    /// Environment variables only fill values the file left at their default;
    /// `overrides` are applied last.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, an environment
    /// variable is malformed, or the resolved configuration is invalid.
    pub fn load_config(
        config_path: Option<&Path>,
        overrides: &ConfigOverrides,
    ) -> Result<Self, ConfigError> {
        let mut config = match config_path {
            Some(path) => Self::from_file(path)?,
            None => Self::with_defaults(),
        };

        config.apply_env_overrides()?;

        if let Some(server_url) = &overrides.server_url {
            config.server_url.clone_from(server_url);
        }
        if let Some(user_id) = &overrides.user_id {
            config.user_id = Some(user_id.clone());
        }
        if let Some(secs) = overrides.poll_interval_secs {
            config.poll_interval_secs = secs;
        }

        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        let parse_error = |message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        };

        match extension {
            "yaml" | "yml" => serde_yml::from_str(&content).map_err(|e| parse_error(e.to_string())),
            "json" => serde_json::from_str(&content).map_err(|e| parse_error(e.to_string())),
            "toml" => toml::from_str(&content).map_err(|e| parse_error(e.to_string())),
            other => Err(ConfigError::UnsupportedFormat {
                extension: other.to_string(),
            }),
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        let defaults = Self::with_defaults();

        if self.server_url == defaults.server_url
            && let Ok(url) = env::var(ENV_SERVER_URL)
        {
            self.server_url = url;
        }
        if self.user_id.is_none()
            && let Ok(user_id) = env::var(ENV_USER_ID)
        {
            self.user_id = Some(user_id);
        }
        if self.auth_token.is_none()
            && let Ok(token) = env::var(ENV_AUTH_TOKEN)
        {
            self.auth_token = Some(token);
        }
        if self.poll_interval_secs == defaults.poll_interval_secs
            && let Ok(secs) = env::var(ENV_POLL_INTERVAL_SECS)
        {
            self.poll_interval_secs = secs.parse().map_err(|_| ConfigError::InvalidEnv {
                name: ENV_POLL_INTERVAL_SECS,
                message: format!("'{secs}' is not a whole number of seconds"),
            })?;
        }
        if self.log_level == defaults.log_level
            && let Ok(level) = env::var(ENV_LOG_LEVEL)
        {
            self.log_level = level;
        }
        Ok(())
    }

    /// Checks the resolved configuration.
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_secs must be greater than 0".to_string(),
            ));
        }
        if self.history_page_size == 0 {
            return Err(ConfigError::Invalid(
                "history_page_size must be greater than 0".to_string(),
            ));
        }
        if self.reconnect_delay_secs == 0 {
            return Err(ConfigError::Invalid(
                "reconnect_delay_secs must be greater than 0".to_string(),
            ));
        }
        self.server_base()?;
        Ok(())
    }

    /// The server URL, normalized to end with a slash so relative joins
    /// keep any path prefix.
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] when `server_url` is not a valid URL.
    pub fn server_base(&self) -> Result<Url, ConfigError> {
        let mut raw = self.server_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Url::parse(&raw)
            .map_err(|err| ConfigError::Invalid(format!("server_url '{}': {err}", self.server_url)))
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    #[must_use]
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}
