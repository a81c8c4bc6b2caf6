//! `russh` backed implementation of the shell traits.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::{ChannelMsg, Disconnect};
use russh_keys::key::{KeyPair, PublicKey};
use tokio::time::timeout;
use tracing::debug;

use super::{CommandOutput, Credentials, ShellConnector, ShellError, ShellFuture, ShellSession};

const DIAL_TIMEOUT: Duration = Duration::from_secs(10);
const INACTIVITY_TIMEOUT: Duration = Duration::from_secs(300);
const STDERR_STREAM: u32 = 1;

/// Client handler that accepts whatever host key the server presents.
///
/// Freshly provisioned servers generate their host keys on first boot, so
/// there is nothing to pin against. The fingerprint is logged instead.
struct UnverifiedHostKey {
    address: SocketAddr,
}

#[async_trait]
impl client::Handler for UnverifiedHostKey {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        debug!(
            address = %self.address,
            fingerprint = %server_public_key.fingerprint(),
            "accepting unverified host key"
        );
        Ok(true)
    }
}

/// Opens SSH sessions with `russh`.
#[derive(Clone)]
pub struct SshConnector {
    config: Arc<client::Config>,
    dial_timeout: Duration,
}

impl fmt::Debug for SshConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshConnector")
            .field("dial_timeout", &self.dial_timeout)
            .finish_non_exhaustive()
    }
}

impl Default for SshConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl SshConnector {
    /// Creates a connector with a ten second dial timeout.
    #[must_use]
    pub fn new() -> Self {
        let config = client::Config {
            inactivity_timeout: Some(INACTIVITY_TIMEOUT),
            ..client::Config::default()
        };
        Self {
            config: Arc::new(config),
            dial_timeout: DIAL_TIMEOUT,
        }
    }

    /// Overrides the dial timeout.
    #[must_use]
    pub const fn with_dial_timeout(mut self, dial_timeout: Duration) -> Self {
        self.dial_timeout = dial_timeout;
        self
    }

    async fn open(
        &self,
        address: SocketAddr,
        credentials: &Credentials,
    ) -> Result<SshSession, ShellError> {
        let method = match credentials {
            Credentials::Password { password, .. } => AuthMethod::Password(password.as_str()),
            Credentials::PrivateKey { pem, .. } => AuthMethod::Key(Arc::new(
                russh_keys::decode_secret_key(pem, None).map_err(|err| ShellError::Key {
                    message: err.to_string(),
                })?,
            )),
        };

        // The timeout covers the handshake and authentication together.
        match timeout(
            self.dial_timeout,
            self.handshake(address, credentials.user(), method),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ShellError::Dial {
                address,
                message: format!("timed out after {:?}", self.dial_timeout),
            }),
        }
    }

    async fn handshake(
        &self,
        address: SocketAddr,
        user: &str,
        method: AuthMethod<'_>,
    ) -> Result<SshSession, ShellError> {
        let handler = UnverifiedHostKey { address };
        let mut handle = client::connect(Arc::clone(&self.config), address, handler)
            .await
            .map_err(|err| ShellError::Dial {
                address,
                message: err.to_string(),
            })?;

        let accepted = match method {
            AuthMethod::Password(password) => handle.authenticate_password(user, password).await,
            AuthMethod::Key(key) => handle.authenticate_publickey(user, key).await,
        }
        .map_err(session_error)?;

        if !accepted {
            return Err(ShellError::Authentication {
                user: user.to_owned(),
                address,
            });
        }

        Ok(SshSession { handle, address })
    }
}

enum AuthMethod<'a> {
    Password(&'a str),
    Key(Arc<KeyPair>),
}

impl ShellConnector for SshConnector {
    type Session = SshSession;

    fn connect<'a>(
        &'a self,
        address: SocketAddr,
        credentials: &'a Credentials,
    ) -> ShellFuture<'a, Self::Session> {
        Box::pin(self.open(address, credentials))
    }
}

/// Authenticated SSH connection.
pub struct SshSession {
    handle: Handle<UnverifiedHostKey>,
    address: SocketAddr,
}

impl SshSession {
    /// Returns the remote endpoint of this session.
    #[must_use]
    pub const fn address(&self) -> SocketAddr {
        self.address
    }

    async fn run(&mut self, command: &str) -> Result<CommandOutput, ShellError> {
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(session_error)?;
        channel.exec(true, command).await.map_err(session_error)?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut code = None;
        while let Some(message) = channel.wait().await {
            match message {
                ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
                ChannelMsg::ExtendedData { ref data, ext } if ext == STDERR_STREAM => {
                    stderr.extend_from_slice(data);
                }
                ChannelMsg::ExitStatus { exit_status } => {
                    code = i32::try_from(exit_status).ok();
                }
                _ => {}
            }
        }

        Ok(CommandOutput {
            code,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }
}

impl ShellSession for SshSession {
    fn exec<'a>(&'a mut self, command: &'a str) -> ShellFuture<'a, CommandOutput> {
        Box::pin(self.run(command))
    }

    fn close(self) -> ShellFuture<'static, ()> {
        Box::pin(async move {
            self.handle
                .disconnect(Disconnect::ByApplication, "", "en")
                .await
                .map_err(session_error)
        })
    }
}

fn session_error(err: russh::Error) -> ShellError {
    ShellError::Session {
        message: err.to_string(),
    }
}
