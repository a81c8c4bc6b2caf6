//! Configuration loading via `ortho-config`.

use std::ffi::OsString;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::api::{ApiSettings, DEFAULT_API_ENDPOINT};
use crate::keys::{DeployKeys, KeyError, resolve_key};

/// Name of the configuration file searched for by the loader.
pub const CONFIG_FILE_NAME: &str = "csi-clouddk.toml";

/// Driver settings merged from defaults, configuration files, environment
/// variables, and CLI flags.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "CLOUDDK",
    discovery(
        app_name = "csi-clouddk",
        env_var = "CLOUDDK_CONFIG_PATH",
        config_file_name = "csi-clouddk.toml",
        dotfile_name = ".csi-clouddk.toml",
        project_file_name = "csi-clouddk.toml"
    )
)]
pub struct DriverConfig {
    /// Base URL of the Cloud.dk API.
    #[ortho_config(default = DEFAULT_API_ENDPOINT.to_owned())]
    pub api_endpoint: String,
    /// API key sent with every request. Required.
    pub api_key: String,
    /// OpenSSH public key authorised on provisioned servers.
    pub ssh_public_key: Option<String>,
    /// Path to the public key; alternative to `ssh_public_key`.
    pub ssh_public_key_file: Option<String>,
    /// Private key used for sessions after bootstrap.
    pub ssh_private_key: Option<String>,
    /// Path to the private key; alternative to `ssh_private_key`.
    pub ssh_private_key_file: Option<String>,
    /// Interval multiplied by each call site's retry delay, in milliseconds.
    #[ortho_config(default = 1000)]
    pub retry_unit_ms: u64,
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
            "missing {}: set {} or add {} to {CONFIG_FILE_NAME}",
            self.description, self.env_var, self.toml_key
        ))
    }
}

const API_KEY: FieldMetadata = FieldMetadata::new("Cloud.dk API key", "CLOUDDK_API_KEY", "api_key");
const API_ENDPOINT: FieldMetadata =
    FieldMetadata::new("Cloud.dk API endpoint", "CLOUDDK_API_ENDPOINT", "api_endpoint");
const PUBLIC_KEY: FieldMetadata = FieldMetadata::new(
    "SSH public key",
    "CLOUDDK_SSH_PUBLIC_KEY or CLOUDDK_SSH_PUBLIC_KEY_FILE",
    "ssh_public_key or ssh_public_key_file",
);
const PRIVATE_KEY: FieldMetadata = FieldMetadata::new(
    "SSH private key",
    "CLOUDDK_SSH_PRIVATE_KEY or CLOUDDK_SSH_PRIVATE_KEY_FILE",
    "ssh_private_key or ssh_private_key_file",
);

impl DriverConfig {
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
        Self::load_from_iter([OsString::from("csi-clouddk")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Checks required fields and key source exclusivity. Error messages name
    /// the environment variable and configuration key to set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required value is absent
    /// and [`ConfigError::InvalidField`] when a value is unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_field(&self.api_key, &API_KEY)?;
        require_field(&self.api_endpoint, &API_ENDPOINT)?;
        require_source(
            self.ssh_public_key.as_deref(),
            self.ssh_public_key_file.as_deref(),
            &PUBLIC_KEY,
        )?;
        require_source(
            self.ssh_private_key.as_deref(),
            self.ssh_private_key_file.as_deref(),
            &PRIVATE_KEY,
        )?;
        if self.retry_unit_ms == 0 {
            return Err(ConfigError::InvalidField {
                field: String::from("retry_unit_ms"),
                message: String::from("must be greater than zero"),
            });
        }
        Ok(())
    }

    /// Returns the retry unit as a duration.
    #[must_use]
    pub const fn retry_unit(&self) -> Duration {
        Duration::from_millis(self.retry_unit_ms)
    }

    /// Builds the API client settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation fails.
    pub fn api_settings(&self) -> Result<ApiSettings, ConfigError> {
        self.validate()?;
        Ok(
            ApiSettings::new(self.api_endpoint.trim(), self.api_key.trim())
                .with_retry_unit(self.retry_unit()),
        )
    }

    /// Resolves the deploy key pair, reading key files where configured.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation fails or a key cannot be
    /// resolved.
    pub fn deploy_keys(&self) -> Result<DeployKeys, ConfigError> {
        self.validate()?;
        let public_key = resolve_key(
            "public key",
            self.ssh_public_key.as_deref(),
            self.ssh_public_key_file.as_deref(),
        )?;
        let private_key = resolve_key(
            "private key",
            self.ssh_private_key.as_deref(),
            self.ssh_private_key_file.as_deref(),
        )?;
        DeployKeys::new(public_key, private_key).map_err(ConfigError::from)
    }
}

fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(metadata.missing());
    }
    Ok(())
}

fn require_source(
    inline: Option<&str>,
    file: Option<&str>,
    metadata: &FieldMetadata,
) -> Result<(), ConfigError> {
    match (inline, file) {
        (None, None) => Err(metadata.missing()),
        (Some(_), Some(_)) => Err(ConfigError::InvalidField {
            field: metadata.toml_key.to_owned(),
            message: String::from("set either the inline key or the key file, not both"),
        }),
        _ => Ok(()),
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a configuration value cannot be used.
    #[error("invalid configuration field {field}: {message}")]
    InvalidField {
        /// Offending field.
        field: String,
        /// Reason the value was rejected.
        message: String,
    },
    /// Raised when a deploy key cannot be resolved.
    #[error(transparent)]
    Key(#[from] KeyError),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
