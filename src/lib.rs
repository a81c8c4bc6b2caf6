//! Cloud server lifecycle management for the Cloud.dk CSI driver.
//!
//! The crate creates, looks up, and destroys Cloud.dk cloud servers through
//! the provider's HTTP API and bootstraps fresh servers over SSH
//! (create → wait for SSH readiness → bootstrap, deleting the server again if
//! a later step fails). It also answers the plugin identity queries.

pub mod api;
pub mod config;
pub mod driver;
pub mod identity;
pub mod keys;
pub mod secret;
pub mod server;
pub mod shell;
#[cfg(test)]
pub mod test_helpers;
pub mod test_support;

pub use api::{ApiError, ApiSettings, CloudApi, ControlPlane, RetryPolicy, ServerBody};
pub use config::{ConfigError, DriverConfig};
pub use driver::{Driver, DriverError};
pub use identity::{
    DRIVER_NAME, DRIVER_VERSION, IdentityService, PluginCapability, PluginInfo, ProbeResponse,
};
pub use keys::{DeployKeys, KeyError};
pub use server::{BoundServer, CloudServer, ReadinessProbe, ServerError, ServerState};
pub use shell::{
    CommandOutput, Credentials, ShellConnector, ShellError, ShellSession, SshConnector,
};
