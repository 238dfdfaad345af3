//! End-to-end run against a real server process.
//!
//! Launch, settle, converse under the run deadline, then always stop
//! the process before returning the verdict.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use probe_transport_stdio::{diagnostics, ServerCommand, ServerProcess, StderrCollector};
use probe_types::{ProbeError, StepKind, StepVerdict, Verdict};

use crate::error::ConformanceError;
use crate::sequencer::Sequencer;
use crate::step::ConversationConfig;

/// Everything one run needs.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// The server to launch.
    pub command: ServerCommand,
    /// Requests and per-step waits.
    pub conversation: ConversationConfig,
    /// Pause between launch and the first request.
    pub startup_delay: Duration,
    /// SIGTERM to kill grace during teardown.
    pub shutdown_grace: Duration,
    /// Bound on startup delay plus the whole conversation.
    pub run_deadline: Duration,
    /// Stderr lines retained for diagnostics.
    pub stderr_capacity: usize,
}

impl HarnessConfig {
    /// Default timing for the given server.
    pub fn new(command: ServerCommand) -> Self {
        Self {
            command,
            conversation: ConversationConfig::default(),
            startup_delay: Duration::from_secs(2),
            shutdown_grace: Duration::from_secs(3),
            run_deadline: Duration::from_secs(120),
            stderr_capacity: diagnostics::DEFAULT_CAPACITY,
        }
    }
}

/// Runs the conformance conversation against one server process.
pub struct Harness {
    config: HarnessConfig,
}

impl Harness {
    pub fn new(config: HarnessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Executes one full run. Never panics on server misbehaviour; every
    /// outcome is folded into the returned [`Verdict`].
    pub async fn run(&self) -> Verdict {
        let deadline = deadline_from_now(self.config.run_deadline);
        let mut verdict = Verdict::default();

        // 1. Launch
        let mut process = match ServerProcess::start(&self.config.command) {
            Ok(process) => process,
            Err(e) => {
                warn!(program = %self.config.command.display(), error = %e, "launch failed");
                verdict.failure = Some(ConformanceError::Launch(e).into());
                return verdict;
            }
        };
        verdict.process_reachable = true;

        // 2-3. Settle and converse
        match self.converse(&mut process, deadline).await {
            Ok(steps) => verdict.steps = steps,
            Err(failure) => verdict.failure = Some(failure),
        }

        // 4. Teardown, on every path
        match process.stop(self.config.shutdown_grace).await {
            Ok(report) => {
                if report.forced {
                    warn!("server had to be killed after the grace period");
                }
                info!(exit_code = ?report.exit_code, "server stopped");
                verdict.process_exited_cleanly = true;
            }
            Err(e) => {
                warn!(error = %e, "teardown failed");
                if verdict.failure.is_none() {
                    verdict.failure = Some(ConformanceError::Teardown(e).into());
                }
            }
        }

        verdict
    }

    async fn converse(
        &self,
        process: &mut ServerProcess,
        deadline: Instant,
    ) -> Result<Vec<StepVerdict>, ProbeError> {
        let transport = process.take_transport().map_err(ProbeError::from)?;
        let stderr = match process.take_stderr() {
            Ok(pipe) => Some(StderrCollector::spawn(pipe, self.config.stderr_capacity)),
            Err(e) => {
                warn!(error = %e, "stderr diagnostics unavailable");
                None
            }
        };

        let remaining = deadline.saturating_duration_since(Instant::now());
        if self.config.startup_delay >= remaining {
            tokio::time::sleep(remaining).await;
            let timeout = ConformanceError::Timeout {
                step: StepKind::Negotiate,
                deadline_ms: self.config.run_deadline.as_millis() as u64,
            };
            return Ok(vec![StepVerdict::fail(StepKind::Negotiate, timeout.into())]);
        }
        if !self.config.startup_delay.is_zero() {
            info!(
                delay_ms = self.config.startup_delay.as_millis() as u64,
                "waiting for server start-up"
            );
            tokio::time::sleep(self.config.startup_delay).await;
        }

        Ok(
            Sequencer::new(transport, self.config.conversation.clone())
                .with_stderr(stderr)
                .with_deadline(deadline, self.config.run_deadline)
                .run()
                .await,
        )
    }
}

/// `now + budget`, clamped to a far-future instant instead of overflowing.
fn deadline_from_now(budget: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(budget)
        .unwrap_or_else(|| now + Duration::from_secs(FAR_FUTURE_SECS))
}

/// About thirty years; the clamp target for unrepresentable deadlines.
const FAR_FUTURE_SECS: u64 = 86_400 * 365 * 30;

#[cfg(test)]
mod tests {
    use super::*;
    use probe_types::FailureKind;

    fn quick(command: ServerCommand) -> HarnessConfig {
        HarnessConfig {
            startup_delay: Duration::ZERO,
            shutdown_grace: Duration::from_secs(1),
            run_deadline: Duration::from_secs(5),
            ..HarnessConfig::new(command)
        }
    }

    #[test]
    fn defaults_match_documented_timing() {
        let config = HarnessConfig::new(ServerCommand::new("cunzhi-server"));
        assert_eq!(config.startup_delay, Duration::from_secs(2));
        assert_eq!(config.shutdown_grace, Duration::from_secs(3));
        assert_eq!(config.run_deadline, Duration::from_secs(120));
    }

    #[tokio::test]
    async fn missing_executable_is_launch_failure() {
        let harness = Harness::new(quick(ServerCommand::new("/nonexistent/mcp-probe-server")));
        let verdict = harness.run().await;

        assert!(!verdict.process_reachable);
        assert!(!verdict.process_exited_cleanly);
        assert!(verdict.steps.is_empty());
        assert_eq!(verdict.failure_kind(), Some(FailureKind::LaunchFailure));
        assert_eq!(verdict.exit_code(), 1);
    }

    #[test]
    fn unrepresentable_deadline_is_clamped() {
        let deadline = deadline_from_now(Duration::from_secs(u64::MAX));
        assert!(deadline > Instant::now() + Duration::from_secs(86_400 * 365));
    }

    #[tokio::test]
    async fn huge_run_deadline_does_not_panic() {
        let config = HarnessConfig {
            run_deadline: Duration::from_secs(u64::MAX),
            ..quick(ServerCommand::new("/nonexistent/stdio-server"))
        };
        let verdict = Harness::new(config).run().await;
        assert_eq!(verdict.failure_kind(), Some(FailureKind::LaunchFailure));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn startup_delay_past_deadline_is_timeout() {
        let config = HarnessConfig {
            startup_delay: Duration::from_secs(10),
            run_deadline: Duration::from_millis(200),
            ..quick(ServerCommand::new("sh").args(["-c", "exec sleep 30"]))
        };
        let verdict = Harness::new(config).run().await;

        assert_eq!(verdict.failure_kind(), Some(FailureKind::Timeout));
        assert!(verdict.process_exited_cleanly);
    }
}
