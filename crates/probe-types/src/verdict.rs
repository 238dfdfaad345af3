//! Per-step and overall conformance verdicts.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{FailureKind, ProbeError};

/// One step of the fixed conversation, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// `initialize` handshake.
    Negotiate,
    /// `tools/list` enumeration.
    Enumerate,
    /// `tools/call` invocation.
    Invoke,
}

impl StepKind {
    /// All steps in the order they are executed.
    pub const ALL: [StepKind; 3] = [Self::Negotiate, Self::Enumerate, Self::Invoke];

    /// One-based position of the step in the conversation.
    pub fn ordinal(self) -> usize {
        match self {
            Self::Negotiate => 1,
            Self::Enumerate => 2,
            Self::Invoke => 3,
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Negotiate => "negotiate",
            Self::Enumerate => "enumerate",
            Self::Invoke => "invoke",
        };
        f.write_str(name)
    }
}

/// Outcome of a single conversation step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepVerdict {
    /// Which step this verdict belongs to.
    pub step: StepKind,
    /// Failure, if the step did not pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<ProbeError>,
    /// Human-readable facts observed in the response.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
    /// Best-effort diagnostic captured from the server's stderr.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

impl StepVerdict {
    /// Creates a passing verdict.
    pub fn pass(step: StepKind) -> Self {
        Self {
            step,
            failure: None,
            details: Vec::new(),
            diagnostic: None,
        }
    }

    /// Creates a failing verdict.
    pub fn fail(step: StepKind, failure: ProbeError) -> Self {
        Self {
            step,
            failure: Some(failure),
            details: Vec::new(),
            diagnostic: None,
        }
    }

    /// Appends an observed detail line.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.details.push(detail.into());
        self
    }

    /// Attaches a stderr diagnostic line.
    pub fn with_diagnostic(mut self, diagnostic: impl Into<String>) -> Self {
        self.diagnostic = Some(diagnostic.into());
        self
    }

    /// Returns true if the step passed.
    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }
}

/// Aggregated result of one probe run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// Step verdicts in execution order. Steps after the first failure are absent.
    pub steps: Vec<StepVerdict>,
    /// The server process was launched.
    pub process_reachable: bool,
    /// The server process was terminated and reaped.
    pub process_exited_cleanly: bool,
    /// Failure outside any single step (launch, teardown).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<ProbeError>,
}

impl Verdict {
    /// Logical AND of every step, reachability and clean exit.
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
            && self.process_reachable
            && self.process_exited_cleanly
            && self.steps.len() == StepKind::ALL.len()
            && self.steps.iter().all(StepVerdict::passed)
    }

    /// The first failure encountered, step-level before run-level.
    pub fn first_failure(&self) -> Option<&ProbeError> {
        self.steps
            .iter()
            .find_map(|s| s.failure.as_ref())
            .or(self.failure.as_ref())
    }

    /// Kind of the first failure, if any.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.first_failure().map(|f| f.kind)
    }

    /// Process exit status for this verdict: 0 on success, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        if self.is_success() {
            0
        } else {
            1
        }
    }
}
