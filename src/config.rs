//! Configuration loading via `ortho-config`.

use std::ffi::OsString;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::poll::PollPolicy;

/// Lowest vCloud Director API version the adapter speaks.
pub const MINIMUM_API_VERSION: &str = "5.1";

/// Longest task wait accepted from configuration: one week.
pub const MAX_TASK_TIMEOUT_SECS: u64 = 7 * 24 * 60 * 60;

/// vCloud Director connection settings derived from environment variables,
/// configuration files, and CLI flags.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "VCD",
    discovery(
        app_name = "vcloud-disks",
        env_var = "VCD_CONFIG_PATH",
        config_file_name = "vcloud-disks.toml",
        dotfile_name = ".vcloud-disks.toml",
        project_file_name = "vcloud-disks.toml"
    )
)]
pub struct VcloudConfig {
    /// Base URL of the API, for example `https://vcd.example.com/api`.
    pub api_url: String,
    /// Session token sent in the `x-vcloud-authorization` header. Session
    /// negotiation happens outside this tool.
    pub auth_token: String,
    /// API version requested in the `Accept` header. Defaults to `5.1`.
    #[ortho_config(default = MINIMUM_API_VERSION.to_owned())]
    pub api_version: String,
    /// Organisation that acts as the region.
    pub region_id: String,
    /// Virtual data center used when a create request names none.
    pub default_data_center_id: Option<String>,
    /// Seconds between task status probes.
    #[ortho_config(default = 5)]
    pub task_poll_interval_secs: u64,
    /// Upper bound in seconds on waiting for a single task.
    #[ortho_config(default = 1200)]
    pub task_timeout_secs: u64,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }

    fn missing(&self) -> ConfigError {
        ConfigError::MissingField(format!(
            "missing {}: set {} or add {} to [vcloud] in vcloud-disks.toml",
            self.description, self.env_var, self.toml_key
        ))
    }
}

impl VcloudConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(metadata.missing());
        }
        Ok(())
    }

    /// Loads configuration using the `ortho-config` derive. Values merge
    /// defaults, configuration files, environment variables, and CLI flags in
    /// that order of precedence.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the loader fails to merge sources.
    pub fn load_from_sources() -> Result<Self, ConfigError> {
        Self::load().map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Loads configuration without attempting to parse CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from("vcloud-disks")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Returns the polling policy applied while waiting on vendor tasks.
    #[must_use]
    pub const fn task_poll_policy(&self) -> PollPolicy {
        PollPolicy::task_completion()
            .with_interval(Duration::from_secs(self.task_poll_interval_secs))
            .with_timeout(Duration::from_secs(self.task_timeout_secs))
    }

    /// Performs semantic validation on required fields. Error messages include
    /// guidance on how to provide missing values via environment variables or
    /// configuration files.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty and
    /// [`ConfigError::InvalidValue`] when a value cannot be used.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            &self.api_url,
            &FieldMetadata::new("vCloud API URL", "VCD_API_URL", "api_url"),
        )?;
        Self::require_field(
            &self.auth_token,
            &FieldMetadata::new("vCloud session token", "VCD_AUTH_TOKEN", "auth_token"),
        )?;
        Self::require_field(
            &self.api_version,
            &FieldMetadata::new("API version", "VCD_API_VERSION", "api_version"),
        )?;
        Self::require_field(
            &self.region_id,
            &FieldMetadata::new("organisation (region) ID", "VCD_REGION_ID", "region_id"),
        )?;

        if reqwest::Url::parse(self.api_url.trim()).is_err() {
            return Err(ConfigError::InvalidValue(format!(
                "api_url '{}' is not an absolute URL (VCD_API_URL)",
                self.api_url
            )));
        }
        if self.task_poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(String::from(
                "task_poll_interval_secs must be greater than zero (VCD_TASK_POLL_INTERVAL_SECS)",
            )));
        }
        if self.task_timeout_secs < self.task_poll_interval_secs {
            return Err(ConfigError::InvalidValue(String::from(
                "task_timeout_secs must not be shorter than task_poll_interval_secs",
            )));
        }
        if self.task_timeout_secs > MAX_TASK_TIMEOUT_SECS {
            return Err(ConfigError::InvalidValue(format!(
                "task_timeout_secs must not exceed {MAX_TASK_TIMEOUT_SECS} (VCD_TASK_TIMEOUT_SECS)"
            )));
        }
        Ok(())
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a configuration value is present but unusable.
    #[error("invalid configuration value: {0}")]
    InvalidValue(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
