//! core::config
//!
//! Crate configuration.
//!
//! # Location
//!
//! Configuration is read from (in order of precedence):
//! 1. `$GITFARM_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/gitfarm/config.toml`
//!
//! A missing file yields the defaults; a malformed file is an error.
//!
//! # GitHub token
//!
//! The API token is never stored in the config file. It is read from
//! `$GITFARM_GITHUB_TOKEN`, falling back to `$GITHUB_TOKEN`.
//!
//! # Example
//!
//! ```toml
//! upstream_branch = "master"
//! api_base = "https://api.github.com"
//! accept_unknown_hosts = true
//!
//! [poll]
//! attempts = 24
//! interval_secs = 5
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::BranchName;

/// Environment variable naming an explicit config file path.
pub const CONFIG_ENV: &str = "GITFARM_CONFIG";

/// Environment variables consulted for the GitHub token, in order.
pub const TOKEN_ENVS: [&str; 2] = ["GITFARM_GITHUB_TOKEN", "GITHUB_TOKEN"];

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("cannot read config {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML or has unknown fields.
    #[error("cannot parse config {path}: {message}")]
    ParseFailed { path: PathBuf, message: String },

    /// A config value failed validation.
    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Polling policy overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct PollConfig {
    /// Maximum poll attempts for lock and checkout waits
    pub attempts: Option<u32>,

    /// Seconds between poll attempts
    pub interval_secs: Option<u64>,
}

/// Crate configuration (user scope).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Default upstream branch name when not given explicitly
    pub upstream_branch: Option<String>,

    /// GitHub API base URL (override for GitHub Enterprise)
    pub api_base: Option<String>,

    /// Accept SSH host keys not present in known_hosts
    pub accept_unknown_hosts: Option<bool>,

    /// Polling overrides
    pub poll: Option<PollConfig>,
}

impl Config {
    /// Load the configuration from disk.
    ///
    /// A missing file is not an error; defaults are returned.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::ReadFailed`] if the file exists but cannot be read
    /// - [`ConfigError::ParseFailed`] for malformed TOML
    /// - [`ConfigError::InvalidValue`] if a value fails validation
    pub fn load() -> Result<Self, ConfigError> {
        let Some(path) = Self::path() else {
            return Ok(Self::default());
        };

        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(&path).map_err(|e| ConfigError::ReadFailed {
            path: path.clone(),
            source: e,
        })?;

        let config: Self = toml::from_str(&raw).map_err(|e| ConfigError::ParseFailed {
            path,
            message: e.to_string(),
        })?;

        config.validate()?;

        Ok(config)
    }

    /// The config file path: `$GITFARM_CONFIG` or the platform config dir.
    pub fn path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }

        dirs::config_dir().map(|dir| dir.join("gitfarm").join("config.toml"))
    }

    /// Validate the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(branch) = &self.upstream_branch {
            BranchName::new(branch.as_str())
                .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;
        }

        if let Some(api_base) = &self.api_base {
            if !api_base.starts_with("https://") && !api_base.starts_with("http://") {
                return Err(ConfigError::InvalidValue(format!(
                    "api_base must be an http(s) URL, got '{api_base}'"
                )));
            }
        }

        if let Some(poll) = &self.poll {
            if poll.attempts == Some(0) {
                return Err(ConfigError::InvalidValue(
                    "poll.attempts must be at least 1".into(),
                ));
            }
        }

        Ok(())
    }

    /// Parse a config from a TOML string. Used by tests and `load`.
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw).map_err(|e| ConfigError::ParseFailed {
            path: PathBuf::from("<inline>"),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }
}

/// Read the GitHub token from the environment.
///
/// Checks `GITFARM_GITHUB_TOKEN` first, then `GITHUB_TOKEN`. Returns `None`
/// when neither is set; unauthenticated requests still work for public
/// repositories.
pub fn github_token() -> Option<String> {
    TOKEN_ENVS
        .iter()
        .find_map(|name| std::env::var(name).ok())
        .filter(|token| !token.is_empty())
}
