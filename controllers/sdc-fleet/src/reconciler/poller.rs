//! Installer Status Poller
//!
//! Polls until the target reports a terminal state, the deadline computed at
//! start (`start + timeout`) passes, or the cancellation token fires. The
//! outcome says which of those happened; callers treat anything but
//! `Available` as a failure.

use gateway_client::{GatewayError, InstallationStatus, TargetState};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How often and how long to poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollSettings {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

/// Result of a polling run
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Terminal success
    Available,
    /// Terminal failure, or the status could not be read
    Failed(String),
    /// Deadline passed while the target was still transitional
    TimedOut { last: InstallationStatus },
    Cancelled,
}

impl PollOutcome {
    /// Failure description, `None` for `Available`
    pub fn failure(&self) -> Option<String> {
        match self {
            PollOutcome::Available => None,
            PollOutcome::Failed(message) => Some(message.clone()),
            PollOutcome::TimedOut { last } => Some(format!(
                "timed out waiting for installer, last phase {} was {}",
                last.phase, last.state
            )),
            PollOutcome::Cancelled => Some("polling cancelled".to_string()),
        }
    }
}

/// Poll `probe` until a terminal state, the deadline or cancellation.
///
/// The first probe runs immediately; each further probe runs one interval
/// after the previous one, the last one no later than the deadline.
pub async fn poll_until_terminal<F, Fut>(
    mut probe: F,
    settings: PollSettings,
    cancel: &CancellationToken,
) -> PollOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<InstallationStatus, GatewayError>>,
{
    let deadline = Instant::now() + settings.timeout;

    loop {
        if cancel.is_cancelled() {
            return PollOutcome::Cancelled;
        }

        let status = match probe().await {
            Ok(status) => status,
            Err(e) => {
                warn!("Failed to read installer status: {}", e);
                return PollOutcome::Failed(format!("failed to read installer status: {}", e));
            }
        };

        match status.target_state() {
            TargetState::Available => {
                info!("Installer reached {} in phase {}", status.state, status.phase);
                return PollOutcome::Available;
            }
            TargetState::Error(state) => {
                let detail = if status.message.is_empty() {
                    String::new()
                } else {
                    format!(": {}", status.message)
                };
                return PollOutcome::Failed(format!("installer phase {} ended in {}{}", status.phase, state, detail));
            }
            TargetState::Transitional => {
                debug!("Installer phase {} is {}", status.phase, status.state);
            }
        }

        let now = Instant::now();
        if now >= deadline {
            return PollOutcome::TimedOut { last: status };
        }
        let wake = std::cmp::min(now + settings.interval, deadline);

        tokio::select! {
            _ = cancel.cancelled() => return PollOutcome::Cancelled,
            _ = sleep_until(wake) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_client::{GatewayClientTrait, MockGatewayClient};

    const MINUTE: Duration = Duration::from_secs(60);

    fn gateway(states: &[&str]) -> MockGatewayClient {
        let gateway = MockGatewayClient::new("https://gw");
        gateway.set_statuses(states);
        gateway
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_at_first_available() {
        let gateway = gateway(&["running", "copying", "completed"]);
        let start = Instant::now();

        let outcome = poll_until_terminal(
            || gateway.installation_status(),
            PollSettings::new(MINUTE, 5 * MINUTE),
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(outcome, PollOutcome::Available);
        assert_eq!(gateway.call_count("installation_status"), 3);
        assert_eq!(start.elapsed(), 2 * MINUTE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_at_deadline() {
        let gateway = gateway(&["running"]);
        let start = Instant::now();

        let outcome = poll_until_terminal(
            || gateway.installation_status(),
            PollSettings::new(MINUTE, 2 * MINUTE),
            &CancellationToken::new(),
        )
        .await;

        match &outcome {
            PollOutcome::TimedOut { last } => assert_eq!(last.state, "running"),
            other => panic!("expected timeout, got {:?}", other),
        }
        assert!(outcome.failure().is_some());
        assert!(start.elapsed() <= 2 * MINUTE);
        assert_eq!(gateway.call_count("installation_status"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_probe_is_clamped_to_deadline() {
        let gateway = gateway(&["running"]);
        let start = Instant::now();

        let outcome = poll_until_terminal(
            || gateway.installation_status(),
            PollSettings::new(MINUTE, Duration::from_secs(90)),
            &CancellationToken::new(),
        )
        .await;

        assert!(matches!(outcome, PollOutcome::TimedOut { .. }));
        assert_eq!(start.elapsed(), Duration::from_secs(90));
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_state_is_terminal_failure() {
        let gateway = gateway(&["running", "failed"]);

        let outcome = poll_until_terminal(
            || gateway.installation_status(),
            PollSettings::new(MINUTE, 10 * MINUTE),
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(outcome, PollOutcome::Failed("installer phase install ended in failed".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_wait() {
        let gateway = gateway(&["running"]);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(90)).await;
            trigger.cancel();
        });
        let start = Instant::now();

        let outcome = poll_until_terminal(
            || gateway.installation_status(),
            PollSettings::new(MINUTE, 30 * MINUTE),
            &cancel,
        )
        .await;

        assert_eq!(outcome, PollOutcome::Cancelled);
        assert_eq!(start.elapsed(), Duration::from_secs(90));
        assert_eq!(gateway.call_count("installation_status"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_error_fails_immediately() {
        let gateway = gateway(&["running"]);
        gateway.fail_on(gateway_client::MockStep::Status, "gateway unreachable");

        let outcome = poll_until_terminal(
            || gateway.installation_status(),
            PollSettings::new(MINUTE, 5 * MINUTE),
            &CancellationToken::new(),
        )
        .await;

        assert!(matches!(outcome, PollOutcome::Failed(msg) if msg.contains("gateway unreachable")));
    }
}
