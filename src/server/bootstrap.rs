//! First-boot configuration of a freshly created server.

use std::borrow::Cow;

use shell_escape::unix::escape;
use tracing::{debug, warn};

use crate::shell::ShellSession;

use super::ServerError;

/// Package mirror the server's apt sources are pointed at.
pub const PACKAGE_MIRROR: &str = "mirrors.dotsrc.org";

const DEFAULT_MIRROR: &str = "us.archive.ubuntu.com";

/// Builds the bootstrap command authorising `public_key` for `root`.
///
/// Every step is safe to repeat, apart from the authorised key line which is
/// appended again on each run.
#[must_use]
pub fn bootstrap_script(public_key: &str) -> String {
    let quoted_key = escape(Cow::from(public_key.trim()));
    [
        String::from("swapoff -a"),
        String::from("sed -i '/ swap / s/^/#/' /etc/fstab"),
        format!("echo {quoted_key} >> ~/.ssh/authorized_keys"),
        format!("sed -i 's/{DEFAULT_MIRROR}/{PACKAGE_MIRROR}/' /etc/apt/sources.list"),
        String::from(
            "sed -i 's/#\\?PasswordAuthentication.*/PasswordAuthentication no/' /etc/ssh/sshd_config",
        ),
        String::from("systemctl restart ssh"),
    ]
    .join(" && ")
}

/// Runs the bootstrap script over an authenticated session.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Bootstrapper {
    script: String,
}

impl Bootstrapper {
    /// Creates a bootstrapper that authorises `public_key`.
    #[must_use]
    pub fn new(public_key: &str) -> Self {
        Self {
            script: bootstrap_script(public_key),
        }
    }

    /// Returns the command the bootstrapper runs.
    #[must_use]
    pub fn script(&self) -> &str {
        &self.script
    }

    /// Runs the script and closes `session`, whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::BootstrapFailure`] when the command cannot be
    /// run or exits with a non-zero or missing status.
    pub async fn run<T: ShellSession>(
        &self,
        instance_id: &str,
        mut session: T,
    ) -> Result<(), ServerError> {
        debug!(instance_id, "running bootstrap script");
        let outcome = session.exec(&self.script).await;
        let closed = session.close().await;

        let output = outcome.map_err(|err| ServerError::BootstrapFailure {
            instance_id: instance_id.to_owned(),
            exit_code: None,
            message: err.to_string(),
        })?;

        if !output.is_success() {
            let status_text = output
                .code
                .map_or_else(|| String::from("unknown"), |code| code.to_string());
            return Err(ServerError::BootstrapFailure {
                instance_id: instance_id.to_owned(),
                exit_code: output.code,
                message: format!(
                    "script exited with status {status_text}: {}",
                    output.stderr.trim()
                ),
            });
        }

        if let Err(err) = closed {
            warn!(instance_id, error = %err, "failed to close bootstrap session");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::shell::{CommandOutput, ShellConnector, ShellError};
    use crate::test_support::{StubConnector, StubSession, ssh_address};

    use super::*;

    const PUBLIC_KEY: &str = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIexample deploy@cluster";

    async fn open_session(connector: &StubConnector) -> StubSession {
        connector
            .connect(ssh_address(), &crate::test_support::password_credentials())
            .await
            .unwrap_or_else(|err| panic!("stub dial: {err}"))
    }

    #[test]
    fn script_chains_every_step_in_order() {
        let script = bootstrap_script(PUBLIC_KEY);
        let steps: Vec<&str> = script.split(" && ").collect();

        assert_eq!(steps.len(), 6, "unexpected script: {script}");
        assert_eq!(steps.first().copied(), Some("swapoff -a"));
        assert!(script.contains("/ swap / s/^/#/' /etc/fstab"));
        assert!(script.contains(&format!("echo '{PUBLIC_KEY}' >> ~/.ssh/authorized_keys")));
        assert!(script.contains("mirrors.dotsrc.org"));
        assert!(script.contains("PasswordAuthentication no/' /etc/ssh/sshd_config"));
        assert_eq!(steps.last().copied(), Some("systemctl restart ssh"));
    }

    #[test]
    fn script_trims_and_quotes_public_key() {
        let script = bootstrap_script("  ssh-rsa AAAA it's-me \n");
        assert!(
            script.contains("echo 'ssh-rsa AAAA it'\\''s-me' >> ~/.ssh/authorized_keys"),
            "unexpected script: {script}"
        );
    }

    #[tokio::test]
    async fn run_succeeds_and_closes_session() {
        let connector = StubConnector::new();
        connector.push_exec(Ok(CommandOutput {
            code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
        }));
        let session = open_session(&connector).await;
        let bootstrapper = Bootstrapper::new(PUBLIC_KEY);

        bootstrapper
            .run("srv-1", session)
            .await
            .unwrap_or_else(|err| panic!("bootstrap should succeed: {err}"));

        assert_eq!(connector.commands(), vec![bootstrapper.script().to_owned()]);
        assert_eq!(connector.closed_sessions(), 1);
    }

    #[tokio::test]
    async fn run_reports_non_zero_exit_and_still_closes() {
        let connector = StubConnector::new();
        connector.push_exec(Ok(CommandOutput {
            code: Some(4),
            stdout: String::new(),
            stderr: String::from("sed: can't read /etc/fstab\n"),
        }));
        let session = open_session(&connector).await;

        let err = Bootstrapper::new(PUBLIC_KEY)
            .run("srv-1", session)
            .await
            .expect_err("non-zero exit should fail");

        assert!(
            matches!(err, ServerError::BootstrapFailure { exit_code: Some(4), ref message, .. }
                if message.contains("can't read /etc/fstab")),
            "unexpected error: {err}"
        );
        assert_eq!(connector.closed_sessions(), 1);
    }

    #[tokio::test]
    async fn run_reports_transport_error_and_still_closes() {
        let connector = StubConnector::new();
        connector.push_exec(Err(ShellError::Session {
            message: String::from("channel closed"),
        }));
        let session = open_session(&connector).await;

        let err = Bootstrapper::new(PUBLIC_KEY)
            .run("srv-1", session)
            .await
            .expect_err("transport error should fail");

        assert!(matches!(
            err,
            ServerError::BootstrapFailure { exit_code: None, .. }
        ));
        assert_eq!(connector.closed_sessions(), 1);
    }
}
