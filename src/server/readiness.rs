//! SSH readiness probing for freshly created servers.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::time::{Instant, sleep, timeout};
use tracing::debug;

use crate::shell::{Credentials, ShellConnector};

use super::ServerError;

/// Total time a server gets to start accepting SSH connections.
pub const READINESS_TIMEOUT: Duration = Duration::from_secs(300);
/// Spacing of connection attempts, measured from the start of the wait.
pub const READINESS_TICK: Duration = Duration::from_secs(10);
/// Sleep between elapsed-time checks.
pub const READINESS_POLL: Duration = Duration::from_millis(200);

/// Waits for a server to accept authenticated SSH connections.
///
/// Connection attempts happen on ticks aligned to the start of the wait
/// (`0s`, `10s`, `20s`, ...). An attempt that overruns a tick moves the next
/// attempt to the following aligned tick, so a dial that takes as long as
/// the tick (for example a connector with a 10 s dial timeout) halves the
/// attempt rate to one every 20 s. Each attempt is cut off when the budget
/// runs out. The wait runs on the tokio timer, so dropping the future
/// cancels it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ReadinessProbe {
    timeout: Duration,
    tick: Duration,
    poll: Duration,
}

impl Default for ReadinessProbe {
    fn default() -> Self {
        Self::new(READINESS_TIMEOUT, READINESS_TICK, READINESS_POLL)
    }
}

impl ReadinessProbe {
    /// Creates a probe with explicit timings.
    #[must_use]
    pub const fn new(timeout: Duration, tick: Duration, poll: Duration) -> Self {
        Self {
            timeout,
            tick,
            poll,
        }
    }

    /// Returns the total wait budget.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Dials `address` until a session opens or the budget runs out.
    ///
    /// The open session is handed to the caller, which becomes responsible
    /// for closing it.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::ReadinessTimeout`] carrying the last dial error
    /// when no attempt succeeds within the budget.
    pub async fn wait<S: ShellConnector>(
        &self,
        connector: &S,
        address: SocketAddr,
        credentials: &Credentials,
    ) -> Result<S::Session, ServerError> {
        let start = Instant::now();
        let deadline = start + self.timeout;
        let mut next_attempt = start;
        let mut attempts: u32 = 0;
        let mut last_error = String::from("no connection attempt was made");

        while Instant::now() < deadline {
            if Instant::now() >= next_attempt {
                attempts += 1;
                debug!(%address, attempt = attempts, "probing SSH readiness");
                let remaining = deadline.saturating_duration_since(Instant::now());
                match timeout(remaining, connector.connect(address, credentials)).await {
                    Ok(Ok(session)) => {
                        debug!(
                            %address,
                            attempt = attempts,
                            elapsed_secs = start.elapsed().as_secs(),
                            "server accepted SSH connection"
                        );
                        return Ok(session);
                    }
                    Ok(Err(err)) => last_error = err.to_string(),
                    Err(_) => {
                        last_error =
                            format!("connection attempt still pending after {remaining:?}");
                    }
                }
                next_attempt = self.next_tick(next_attempt, Instant::now());
            }
            sleep(self.poll).await;
        }

        Err(ServerError::ReadinessTimeout {
            address,
            waited_secs: self.timeout.as_secs(),
            last_error,
        })
    }

    fn next_tick(&self, mut tick_at: Instant, now: Instant) -> Instant {
        if self.tick.is_zero() {
            return now;
        }
        while tick_at <= now {
            tick_at += self.tick;
        }
        tick_at
    }
}
