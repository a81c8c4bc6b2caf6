//! Command-line interface definitions for the `csi-clouddk` binary.

use clap::{Args, Parser};

/// Top-level CLI for the `csi-clouddk` binary.
#[derive(Debug, Parser)]
#[command(
    name = "csi-clouddk",
    version,
    about = "Provision and manage Cloud.dk servers for the CSI driver",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Create and bootstrap a new server.
    #[command(name = "create", about = "Create and bootstrap a new server")]
    Create(CreateCommand),
    /// Delete an existing server.
    #[command(name = "destroy", about = "Delete an existing server")]
    Destroy(ServerSelector),
    /// Print the description of an existing server.
    #[command(name = "show", about = "Print the description of an existing server")]
    Show(ServerSelector),
    /// Run a command on an existing server over SSH.
    #[command(name = "exec", about = "Run a command on an existing server over SSH")]
    Exec(ExecCommand),
    /// Print the plugin identity.
    #[command(name = "identity", about = "Print the plugin identity")]
    Identity,
}

/// Arguments for the `csi-clouddk create` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct CreateCommand {
    /// Datacenter location identifier.
    #[arg(long, value_name = "LOCATION")]
    pub(crate) location: String,
    /// Hardware package identifier.
    #[arg(long, value_name = "PACKAGE")]
    pub(crate) package: String,
    /// Hostname and label of the new server. Defaults to `csi-<uuid>`.
    #[arg(long, value_name = "HOSTNAME")]
    pub(crate) hostname: Option<String>,
}

/// Selects an existing server by hostname or identifier.
#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
pub(crate) struct ServerSelector {
    /// Hostname of the server.
    #[arg(long, value_name = "HOSTNAME")]
    pub(crate) hostname: Option<String>,
    /// Provider identifier of the server.
    #[arg(long, value_name = "ID")]
    pub(crate) id: Option<String>,
}

/// Arguments for the `csi-clouddk exec` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct ExecCommand {
    /// Server to connect to.
    #[command(flatten)]
    pub(crate) server: ServerSelector,
    /// Command to execute on the remote host (use -- to separate flags).
    #[arg(required = true, trailing_var_arg = true)]
    pub(crate) command: Vec<String>,
}
