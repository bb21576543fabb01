//! Job store configuration.

use std::fs;
use std::path::Path;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Environment variable not set: {0}")]
    EnvVarNotSet(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

/// Job store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStoreConfig {
    /// Prefix of every store key.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Separator between key segments.
    #[serde(default = "default_key_delimiter")]
    pub key_delimiter: String,

    /// Identity of this scheduler instance; holder of its leases.
    #[serde(default = "default_instance_id")]
    pub instance_id: String,

    /// How late a trigger may be before it counts as misfired.
    #[serde(default = "default_misfire_threshold")]
    pub misfire_threshold_ms: u64,

    /// TTL of trigger and instance leases, also the recovery sweep interval.
    #[serde(default = "default_trigger_lock_timeout")]
    pub trigger_lock_timeout_ms: u64,

    /// TTL of the global named lock.
    #[serde(default = "default_lock_timeout")]
    pub lock_timeout_ms: u64,
}

fn default_key_prefix() -> String {
    "triggerstore".to_string()
}

fn default_key_delimiter() -> String {
    ":".to_string()
}

fn default_instance_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn default_misfire_threshold() -> u64 {
    60_000
}

fn default_trigger_lock_timeout() -> u64 {
    300_000
}

fn default_lock_timeout() -> u64 {
    30_000
}

impl Default for JobStoreConfig {
    fn default() -> Self {
        Self {
            key_prefix: default_key_prefix(),
            key_delimiter: default_key_delimiter(),
            instance_id: default_instance_id(),
            misfire_threshold_ms: default_misfire_threshold(),
            trigger_lock_timeout_ms: default_trigger_lock_timeout(),
            lock_timeout_ms: default_lock_timeout(),
        }
    }
}

impl JobStoreConfig {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from a TOML string.
    ///
    /// `${VAR}` references are replaced by environment variables first.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(content)?;
        let config: Self = toml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// Override the instance id.
    pub fn with_instance_id(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = instance_id.into();
        self
    }

    /// Override the key prefix.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Check invariants the engine relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_empty = [
            ("key_prefix", &self.key_prefix),
            ("key_delimiter", &self.key_delimiter),
            ("instance_id", &self.instance_id),
        ];
        for (field, value) in non_empty {
            if value.is_empty() {
                return Err(invalid(field, "must not be empty"));
            }
        }
        if self.trigger_lock_timeout_ms == 0 {
            return Err(invalid("trigger_lock_timeout_ms", "must be positive"));
        }
        if self.lock_timeout_ms == 0 {
            return Err(invalid("lock_timeout_ms", "must be positive"));
        }
        Ok(())
    }

    pub fn trigger_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.trigger_lock_timeout_ms)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
}

/// Expand environment variables in the format `${VAR}`.
fn expand_env_vars(content: &str) -> Result<String, ConfigError> {
    let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ConfigError::InvalidValue {
        field: "pattern".to_string(),
        message: e.to_string(),
    })?;

    let mut result = content.to_string();
    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        let var_value = std::env::var(var_name)
            .map_err(|_| ConfigError::EnvVarNotSet(var_name.to_string()))?;
        result = result.replace(&cap[0], &var_value);
    }
    Ok(result)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
