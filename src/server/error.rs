//! Error types for the cloud server lifecycle.

use std::net::SocketAddr;

use thiserror::Error;

use crate::api::ApiError;
use crate::shell::ShellError;

/// Errors raised by [`CloudServer`](super::CloudServer) operations.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ServerError {
    /// Raised when an operation needs an unbound server but it is bound.
    #[error("the cloud server has already been initialized")]
    AlreadyInitialized,
    /// Raised when an operation needs a bound server but it is unbound.
    #[error("the cloud server has not been initialized")]
    NotInitialized,
    /// Raised when a required argument is empty.
    #[error("a non-empty {field} is required")]
    InvalidArgument {
        /// Name of the offending argument.
        field: String,
    },
    /// Raised when the control plane request or its decoding fails.
    #[error("control-plane request failed: {0}")]
    Transport(#[from] ApiError),
    /// Raised when a lookup finds no server.
    #[error("no cloud server found for {lookup}")]
    NotFound {
        /// Description of the lookup, for example `hostname 'host-a'`.
        lookup: String,
    },
    /// Raised when a created server cannot be reached because of how it was
    /// provisioned, for example without network interfaces.
    #[error("cloud server '{instance_id}' was provisioned incorrectly: {reason}")]
    ProvisioningDefect {
        /// Provider server identifier.
        instance_id: String,
        /// What is missing or malformed.
        reason: String,
    },
    /// Raised when the server does not accept SSH connections in time.
    #[error(
        "cloud server at {address} did not accept SSH connections within {waited_secs}s: {last_error}"
    )]
    ReadinessTimeout {
        /// Endpoint that was probed.
        address: SocketAddr,
        /// Probe budget in seconds.
        waited_secs: u64,
        /// Error from the final connection attempt.
        last_error: String,
    },
    /// Raised when the SSH server rejects the credentials or the key is
    /// unusable.
    #[error("SSH authentication failed: {message}")]
    AuthenticationFailure {
        /// Underlying error message.
        message: String,
    },
    /// Raised when the SSH endpoint cannot be reached.
    #[error("SSH connection failed: {message}")]
    DialFailure {
        /// Underlying error message.
        message: String,
    },
    /// Raised when the first-boot configuration fails.
    #[error("bootstrap of cloud server '{instance_id}' failed: {message}")]
    BootstrapFailure {
        /// Provider server identifier.
        instance_id: String,
        /// Exit code of the bootstrap script, when it ran to completion.
        exit_code: Option<i32>,
        /// Transport error or captured stderr.
        message: String,
    },
}

impl From<ShellError> for ServerError {
    fn from(value: ShellError) -> Self {
        match value {
            ShellError::Authentication { .. } | ShellError::Key { .. } => {
                Self::AuthenticationFailure {
                    message: value.to_string(),
                }
            }
            ShellError::Dial { .. } | ShellError::Session { .. } => Self::DialFailure {
                message: value.to_string(),
            },
        }
    }
}
