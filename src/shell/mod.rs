//! Remote shell sessions used to bootstrap and operate cloud servers.
//!
//! [`ShellConnector`] opens authenticated sessions and [`ShellSession`] runs
//! commands on them. The production implementation is [`SshConnector`];
//! tests substitute scripted doubles.

mod ssh;

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;

use thiserror::Error;

pub use ssh::{SshConnector, SshSession};

/// Future returned by shell operations.
pub type ShellFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ShellError>> + Send + 'a>>;

/// Credentials presented when opening a session.
#[derive(Clone, Eq, PartialEq)]
pub enum Credentials {
    /// Password authentication, used once while bootstrapping.
    Password {
        /// Remote account.
        user: String,
        /// Account password.
        password: String,
    },
    /// Public-key authentication with a PEM/OpenSSH encoded private key.
    PrivateKey {
        /// Remote account.
        user: String,
        /// Encoded private key.
        pem: String,
    },
}

impl Credentials {
    /// Returns the remote account name.
    #[must_use]
    pub fn user(&self) -> &str {
        match self {
            Self::Password { user, .. } | Self::PrivateKey { user, .. } => user,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password { user, .. } => f
                .debug_struct("Password")
                .field("user", user)
                .field("password", &"<redacted>")
                .finish(),
            Self::PrivateKey { user, .. } => f
                .debug_struct("PrivateKey")
                .field("user", user)
                .field("pem", &"<redacted>")
                .finish(),
        }
    }
}

/// Result of running a remote command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandOutput {
    /// Exit code reported by the remote process, if available.
    pub code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Returns `true` when the exit code equals zero.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.code, Some(0))
    }
}

/// An open, authenticated remote shell session.
pub trait ShellSession: Send {
    /// Runs `command` and waits for it to finish.
    fn exec<'a>(&'a mut self, command: &'a str) -> ShellFuture<'a, CommandOutput>;

    /// Closes the session.
    fn close(self) -> ShellFuture<'static, ()>;
}

/// Opens remote shell sessions.
pub trait ShellConnector: Send + Sync {
    /// Session type produced by this connector.
    type Session: ShellSession + 'static;

    /// Dials `address` and authenticates with `credentials`.
    fn connect<'a>(
        &'a self,
        address: SocketAddr,
        credentials: &'a Credentials,
    ) -> ShellFuture<'a, Self::Session>;
}

/// Errors raised by shell connectors and sessions.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ShellError {
    /// Raised when the remote endpoint cannot be reached.
    #[error("failed to reach {address}: {message}")]
    Dial {
        /// Endpoint that was dialled.
        address: SocketAddr,
        /// Underlying error message.
        message: String,
    },
    /// Raised when the server rejects the presented credentials.
    #[error("authentication as {user} on {address} was rejected")]
    Authentication {
        /// Remote account.
        user: String,
        /// Endpoint that rejected the credentials.
        address: SocketAddr,
    },
    /// Raised when the private key cannot be parsed.
    #[error("invalid private key: {message}")]
    Key {
        /// Parser error message.
        message: String,
    },
    /// Raised when an established session fails.
    #[error("session error: {message}")]
    Session {
        /// Underlying error message.
        message: String,
    },
}
