//! Binary entry point for the `csi-clouddk` CLI.

use std::borrow::Cow;
use std::env;
use std::io::{self, Write};
use std::process;

use clap::Parser;
use rand::SeedableRng;
use rand::rngs::StdRng;
use shell_escape::unix::escape;
use thiserror::Error;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use csi_clouddk::{
    CloudApi, CloudServer, ControlPlane, Driver, DriverConfig, DriverError, IdentityService,
    ServerError, ShellConnector, ShellSession, SshConnector,
};

mod cli;

use cli::{Cli, CreateCommand, ExecCommand, ServerSelector};

const NOISY_LIBRARIES: &str = "russh=warn,hyper=warn,reqwest=warn,rustls=warn";

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Driver(#[from] DriverError),
    #[error(transparent)]
    Server(#[from] ServerError),
    #[error("remote command failed: {0}")]
    Remote(String),
    #[error("remote command terminated without an exit status")]
    MissingExitCode,
    #[error("invalid command argument: {0}")]
    InvalidCommand(String),
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(code) => code,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    // RUST_LOG directives layer on top of the library defaults.
    let filter = match env::var("RUST_LOG") {
        Ok(directives) => EnvFilter::new(format!("{NOISY_LIBRARIES},{directives}")),
        Err(_) => EnvFilter::new(format!("{NOISY_LIBRARIES},info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init()
        .ok();
}

async fn dispatch(cli: Cli) -> Result<i32, CliError> {
    match cli {
        Cli::Identity => {
            write_identity(io::stdout(), &IdentityService::new());
            Ok(0)
        }
        Cli::Create(args) => create(&driver()?, args).await,
        Cli::Destroy(selector) => {
            let mut server = bind(&driver()?, &selector).await?;
            server.destroy().await?;
            Ok(0)
        }
        Cli::Show(selector) => {
            let server = bind(&driver()?, &selector).await?;
            write_server(io::stdout(), &server);
            Ok(0)
        }
        Cli::Exec(args) => exec(&driver()?, args).await,
    }
}

fn driver() -> Result<Driver, CliError> {
    let config =
        DriverConfig::load_without_cli_args().map_err(|err| CliError::Config(err.to_string()))?;
    Driver::new(config).map_err(CliError::from)
}

async fn create(driver: &Driver, args: CreateCommand) -> Result<i32, CliError> {
    let hostname = args.hostname.unwrap_or_else(default_hostname);
    let mut rng = StdRng::from_entropy();
    let mut server = driver.server();
    server
        .create(&mut rng, &args.location, &args.package, &hostname)
        .await?;
    write_server(io::stdout(), &server);
    Ok(0)
}

async fn exec(driver: &Driver, args: ExecCommand) -> Result<i32, CliError> {
    validate_command_args(&args.command)?;
    let server = bind(driver, &args.server).await?;
    let mut session = server.ssh().await?;
    let outcome = session.exec(&render_remote_command(&args.command)).await;
    session.close().await.ok();

    let output = outcome.map_err(|err| CliError::Remote(err.to_string()))?;
    write!(io::stdout(), "{}", output.stdout).ok();
    write!(io::stderr(), "{}", output.stderr).ok();
    output.code.ok_or(CliError::MissingExitCode)
}

async fn bind(
    driver: &Driver,
    selector: &ServerSelector,
) -> Result<CloudServer<CloudApi, SshConnector>, CliError> {
    let mut server = driver.server();
    match (&selector.hostname, &selector.id) {
        (_, Some(id)) => server.initialize_by_id(id).await?,
        (Some(hostname), None) => server.initialize_by_hostname(hostname).await?,
        (None, None) => {
            return Err(CliError::InvalidCommand(String::from(
                "one of --hostname or --id is required",
            )));
        }
    }
    Ok(server)
}

fn default_hostname() -> String {
    format!("csi-{}", Uuid::new_v4())
}

fn render_remote_command(args: &[String]) -> String {
    args.iter()
        .map(|arg| escape(Cow::from(arg.as_str())))
        .collect::<Vec<_>>()
        .join(" ")
}

fn validate_command_args(args: &[String]) -> Result<(), CliError> {
    for arg in args {
        if arg
            .chars()
            .any(|ch| matches!(ch, '\u{0000}'..='\u{001F}' | '\u{007F}'))
        {
            return Err(CliError::InvalidCommand(String::from(concat!(
                "command arguments must not contain control characters (ASCII ",
                "0x00-0x1F or 0x7F, e.g. newline, carriage return, tab, NUL)"
            ))));
        }
    }
    Ok(())
}

fn write_identity(mut target: impl Write, identity: &IdentityService) {
    let info = identity.plugin_info();
    writeln!(target, "name: {}", info.name).ok();
    writeln!(target, "version: {}", info.vendor_version).ok();
    for capability in identity.capabilities() {
        writeln!(target, "capability: {capability}").ok();
    }
    let ready = identity
        .probe()
        .ready
        .map_or_else(|| String::from("unknown"), |ready| ready.to_string());
    writeln!(target, "ready: {ready}").ok();
}

fn write_server<A, S>(mut target: impl Write, server: &CloudServer<A, S>)
where
    A: ControlPlane,
    S: ShellConnector,
{
    let Some(bound) = server.server() else {
        return;
    };
    let description = bound.description();
    writeln!(target, "id: {}", bound.identifier()).ok();
    writeln!(target, "hostname: {}", description.hostname).ok();
    writeln!(target, "label: {}", description.label).ok();
    writeln!(target, "booted: {}", bound.booted()).ok();
    if let Some(address) = description.first_address() {
        writeln!(target, "address: {address}").ok();
    }
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
