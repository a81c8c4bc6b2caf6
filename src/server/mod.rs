//! Lifecycle management for Cloud.dk cloud servers.
//!
//! A [`CloudServer`] starts unbound and is bound to exactly one remote
//! server by [`CloudServer::create`], [`CloudServer::initialize_by_hostname`]
//! or [`CloudServer::initialize_by_id`]. Creation runs the full provisioning
//! workflow (create → wait for SSH → bootstrap) and deletes the remote
//! server again if any step after the create request fails.

mod bootstrap;
mod error;
mod readiness;

use std::net::{IpAddr, SocketAddr};

use rand::Rng;
use tracing::{error, info, warn};

use crate::api::{ApiError, ControlPlane, ServerBody, ServerCreateBody};
use crate::keys::DeployKeys;
use crate::secret;
use crate::shell::{Credentials, ShellConnector};

pub use bootstrap::{Bootstrapper, PACKAGE_MIRROR, bootstrap_script};
pub use error::ServerError;
pub use readiness::{READINESS_POLL, READINESS_TICK, READINESS_TIMEOUT, ReadinessProbe};

/// OS template every server is created from.
pub const SERVER_TEMPLATE: &str = "ubuntu-18.04-x64";
/// Port the SSH daemon listens on.
pub const SSH_PORT: u16 = 22;
/// Account used for bootstrap and later sessions.
pub const SSH_USER: &str = "root";

/// Server description held by a bound [`CloudServer`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BoundServer {
    description: ServerBody,
    booted: bool,
}

impl BoundServer {
    /// Returns the provider identifier. Never empty.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.description.identifier
    }

    /// Returns the description reported by the control plane.
    #[must_use]
    pub const fn description(&self) -> &ServerBody {
        &self.description
    }

    /// Returns `true` once the server has been bootstrapped.
    #[must_use]
    pub const fn booted(&self) -> bool {
        self.booted
    }
}

/// Binding state of a [`CloudServer`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum ServerState {
    /// Not associated with any remote server.
    #[default]
    Unbound,
    /// Associated with one remote server.
    Bound(BoundServer),
}

/// Handle that creates, looks up, and destroys one remote server.
pub struct CloudServer<A, S> {
    api: A,
    shell: S,
    keys: DeployKeys,
    readiness: ReadinessProbe,
    state: ServerState,
}

impl<A, S> CloudServer<A, S>
where
    A: ControlPlane,
    S: ShellConnector,
{
    /// Creates an unbound handle.
    #[must_use]
    pub fn new(api: A, shell: S, keys: DeployKeys) -> Self {
        Self {
            api,
            shell,
            keys,
            readiness: ReadinessProbe::default(),
            state: ServerState::Unbound,
        }
    }

    /// Overrides the readiness probe timings.
    #[must_use]
    pub fn with_readiness(mut self, readiness: ReadinessProbe) -> Self {
        self.readiness = readiness;
        self
    }

    /// Returns the binding state.
    #[must_use]
    pub const fn state(&self) -> &ServerState {
        &self.state
    }

    /// Returns the bound server, if any.
    #[must_use]
    pub const fn server(&self) -> Option<&BoundServer> {
        match &self.state {
            ServerState::Bound(bound) => Some(bound),
            ServerState::Unbound => None,
        }
    }

    /// Returns `true` when bound to a remote server.
    #[must_use]
    pub const fn is_bound(&self) -> bool {
        matches!(self.state, ServerState::Bound(_))
    }

    /// Returns `true` when bound and bootstrapped.
    #[must_use]
    pub fn is_booted(&self) -> bool {
        self.server().is_some_and(BoundServer::booted)
    }

    /// Returns the provider identifier of the bound server.
    #[must_use]
    pub fn identifier(&self) -> Option<&str> {
        self.server().map(BoundServer::identifier)
    }

    /// Returns the hostname of the bound server.
    #[must_use]
    pub fn hostname(&self) -> Option<&str> {
        self.server()
            .map(|bound| bound.description.hostname.as_str())
    }

    /// Returns the label of the bound server.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.server().map(|bound| bound.description.label.as_str())
    }

    /// Returns the SSH endpoint: the first address of the first network
    /// interface, on port 22.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::NotInitialized`] when unbound and
    /// [`ServerError::ProvisioningDefect`] when the server has no usable
    /// address.
    pub fn ssh_address(&self) -> Result<SocketAddr, ServerError> {
        let bound = self.server().ok_or(ServerError::NotInitialized)?;
        let defect = |reason: &str| ServerError::ProvisioningDefect {
            instance_id: bound.identifier().to_owned(),
            reason: reason.to_owned(),
        };

        if bound.description.network_interfaces.is_empty() {
            return Err(defect("no network interfaces were created"));
        }
        let address = bound
            .description
            .first_address()
            .ok_or_else(|| defect("the first network interface has no IP address"))?;
        let ip: IpAddr = address
            .parse()
            .map_err(|_| defect(&format!("'{address}' is not an IP address")))?;
        Ok(SocketAddr::new(ip, SSH_PORT))
    }

    /// Creates, waits for, and bootstraps a new server.
    ///
    /// A fresh 64 character root password is drawn from `rng`; it is only
    /// used for the bootstrap session, which replaces password logins with
    /// the deploy key. When anything fails after the server was created, the
    /// server is deleted again and the handle ends up unbound.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::AlreadyInitialized`] when already bound,
    /// [`ServerError::InvalidArgument`] for empty arguments,
    /// [`ServerError::Transport`] when the create request fails, and
    /// [`ServerError::ProvisioningDefect`],
    /// [`ServerError::ReadinessTimeout`] or
    /// [`ServerError::BootstrapFailure`] after rolling back.
    pub async fn create<R: Rng>(
        &mut self,
        rng: &mut R,
        location: &str,
        package: &str,
        hostname: &str,
    ) -> Result<(), ServerError> {
        self.ensure_unbound()?;
        require_argument(location, "location")?;
        require_argument(package, "package")?;
        require_argument(hostname, "hostname")?;

        info!(hostname, location, package, "creating cloud server");

        let password = secret::initial_root_password(rng);
        let body = ServerCreateBody {
            hostname: hostname.to_owned(),
            label: hostname.to_owned(),
            initial_root_password: password.clone(),
            package: package.to_owned(),
            template: SERVER_TEMPLATE.to_owned(),
            location: location.to_owned(),
        };
        let credentials = Credentials::Password {
            user: SSH_USER.to_owned(),
            password,
        };

        let created = self.api.create_server(&body).await.map_err(|err| {
            warn!(hostname, error = %err, "failed to create cloud server");
            ServerError::Transport(err)
        })?;
        self.bind(created, false)?;

        let provisioned = self.provision(&credentials).await;
        if let Err(err) = provisioned {
            return Err(self.rollback(err).await);
        }

        if let ServerState::Bound(bound) = &mut self.state {
            bound.booted = true;
        }
        info!(
            hostname,
            instance_id = self.identifier().unwrap_or_default(),
            "cloud server created"
        );
        Ok(())
    }

    /// Deletes the bound server and unbinds the handle.
    ///
    /// Deleting a server the control plane no longer knows counts as
    /// success. On failure the handle stays bound so the call can be
    /// repeated.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::NotInitialized`] when unbound and
    /// [`ServerError::Transport`] when the delete request fails.
    pub async fn destroy(&mut self) -> Result<(), ServerError> {
        let bound = self.server().ok_or(ServerError::NotInitialized)?;
        let instance_id = bound.identifier().to_owned();
        let hostname = bound.description.hostname.clone();

        info!(hostname, instance_id, "destroying cloud server");
        self.api.delete_server(&instance_id).await.map_err(|err| {
            warn!(hostname, instance_id, error = %err, "failed to destroy cloud server");
            ServerError::Transport(err)
        })?;

        self.state = ServerState::Unbound;
        Ok(())
    }

    /// Binds the handle to the server whose hostname equals `hostname`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::AlreadyInitialized`] when already bound,
    /// [`ServerError::InvalidArgument`] for an empty hostname,
    /// [`ServerError::NotFound`] when no server matches exactly, and
    /// [`ServerError::Transport`] for request or decoding failures.
    pub async fn initialize_by_hostname(&mut self, hostname: &str) -> Result<(), ServerError> {
        self.ensure_unbound()?;
        require_argument(hostname, "hostname")?;

        let servers = self.api.list_servers(hostname).await?;
        let Some(found) = servers
            .into_iter()
            .find(|server| server.hostname == hostname)
        else {
            return Err(ServerError::NotFound {
                lookup: format!("hostname '{hostname}'"),
            });
        };

        let booted = found.booted;
        self.bind(found, booted)
    }

    /// Binds the handle to the server with identifier `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::AlreadyInitialized`] when already bound,
    /// [`ServerError::InvalidArgument`] for an empty identifier,
    /// [`ServerError::NotFound`] when the control plane answers 404, and
    /// [`ServerError::Transport`] for other failures.
    pub async fn initialize_by_id(&mut self, id: &str) -> Result<(), ServerError> {
        self.ensure_unbound()?;
        require_argument(id, "identifier")?;

        match self.api.get_server(id).await {
            Ok(server) => {
                let booted = server.booted;
                self.bind(server, booted)
            }
            Err(err) if err.is_not_found() => Err(ServerError::NotFound {
                lookup: format!("identifier '{id}'"),
            }),
            Err(err) => Err(ServerError::Transport(err)),
        }
    }

    /// Opens a key-authenticated SSH session to the bound server.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::NotInitialized`] when unbound,
    /// [`ServerError::ProvisioningDefect`] when the server has no usable
    /// address, and [`ServerError::AuthenticationFailure`] or
    /// [`ServerError::DialFailure`] when the session cannot be opened.
    pub async fn ssh(&self) -> Result<S::Session, ServerError> {
        let address = self.ssh_address()?;
        let credentials = Credentials::PrivateKey {
            user: SSH_USER.to_owned(),
            pem: self.keys.private_key().to_owned(),
        };
        self.shell
            .connect(address, &credentials)
            .await
            .map_err(ServerError::from)
    }

    async fn provision(&self, credentials: &Credentials) -> Result<(), ServerError> {
        let address = self.ssh_address()?;
        let instance_id = self.identifier().unwrap_or_default();

        info!(instance_id, %address, "waiting for cloud server to accept SSH connections");
        let session = self
            .readiness
            .wait(&self.shell, address, credentials)
            .await?;

        info!(instance_id, "bootstrapping cloud server");
        Bootstrapper::new(self.keys.public_key())
            .run(instance_id, session)
            .await
    }

    /// Deletes a server whose creation failed part way and returns `cause`.
    ///
    /// The handle is unbound afterwards even when the delete fails; the
    /// failure is logged with the identifier of the server that may leak.
    async fn rollback(&mut self, cause: ServerError) -> ServerError {
        let instance_id = self.identifier().unwrap_or_default().to_owned();
        warn!(instance_id, error = %cause, "rolling back cloud server creation");

        if let Err(teardown) = self.destroy().await {
            error!(
                instance_id,
                error = %teardown,
                "rollback failed; cloud server may leak"
            );
            self.state = ServerState::Unbound;
        }
        cause
    }

    fn ensure_unbound(&self) -> Result<(), ServerError> {
        if self.is_bound() {
            return Err(ServerError::AlreadyInitialized);
        }
        Ok(())
    }

    fn bind(&mut self, description: ServerBody, booted: bool) -> Result<(), ServerError> {
        if description.identifier.is_empty() {
            return Err(ServerError::Transport(ApiError::Decode {
                path: String::from("cloudservers"),
                message: String::from("server description has no identifier"),
            }));
        }
        self.state = ServerState::Bound(BoundServer {
            description,
            booted,
        });
        Ok(())
    }
}

fn require_argument(value: &str, field: &str) -> Result<(), ServerError> {
    if value.is_empty() {
        return Err(ServerError::InvalidArgument {
            field: field.to_owned(),
        });
    }
    Ok(())
}
