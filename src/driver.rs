//! Wiring of configuration, control-plane client, and shell connector.

use thiserror::Error;
use tracing::debug;

use crate::api::{ApiError, CloudApi};
use crate::config::{ConfigError, DriverConfig};
use crate::identity::IdentityService;
use crate::keys::DeployKeys;
use crate::server::CloudServer;
use crate::shell::SshConnector;

/// Errors raised while assembling a [`Driver`].
#[derive(Debug, Error, Eq, PartialEq)]
pub enum DriverError {
    /// Configuration is incomplete or a key cannot be resolved.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The API client cannot be built from the configured endpoint.
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Entry point holding the validated configuration and shared clients.
#[derive(Clone, Debug)]
pub struct Driver {
    config: DriverConfig,
    api: CloudApi,
    shell: SshConnector,
    keys: DeployKeys,
    identity: IdentityService,
}

impl Driver {
    /// Validates `config`, resolves the deploy keys, and builds the clients.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Config`] when validation or key resolution
    /// fails and [`DriverError::Api`] when the endpoint is not a usable URL.
    pub fn new(config: DriverConfig) -> Result<Self, DriverError> {
        let keys = config.deploy_keys()?;
        let api = CloudApi::new(config.api_settings()?)?;
        debug!(endpoint = %config.api_endpoint, "driver configured");
        Ok(Self {
            config,
            api,
            shell: SshConnector::new(),
            keys,
            identity: IdentityService::new(),
        })
    }

    /// Returns a fresh, unbound server handle.
    #[must_use]
    pub fn server(&self) -> CloudServer<CloudApi, SshConnector> {
        CloudServer::new(self.api.clone(), self.shell.clone(), self.keys.clone())
    }

    /// Returns the identity service.
    #[must_use]
    pub const fn identity(&self) -> &IdentityService {
        &self.identity
    }

    /// Returns the validated configuration.
    #[must_use]
    pub const fn config(&self) -> &DriverConfig {
        &self.config
    }
}
