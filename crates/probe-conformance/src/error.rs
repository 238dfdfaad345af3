//! Conformance failure types.

use probe_protocol::{error_codes, JsonRpcError, RequestId};
use probe_transport_stdio::TransportError;
use probe_types::{DiagnosticError, FailureKind, ProbeError, StepKind};
use thiserror::Error;

/// Raw text longer than this is cut in diagnostics.
const RAW_PREVIEW_CHARS: usize = 512;

/// Why a step, or the run around it, failed.
#[derive(Debug, Error)]
pub enum ConformanceError {
    /// The server process could not be started.
    #[error("launch failed: {0}")]
    Launch(#[source] TransportError),
    /// No reply line arrived.
    #[error("{step}: no response ({reason})")]
    NoResponse { step: StepKind, reason: String },
    /// A line arrived but is not a valid reply, or the payload shape is wrong.
    #[error("{step}: malformed message: {reason}")]
    MalformedMessage {
        step: StepKind,
        reason: String,
        raw: String,
    },
    /// The reply id does not echo the request id.
    #[error("{step}: reply id {actual} does not match request id {expected}")]
    IdMismatch {
        step: StepKind,
        expected: RequestId,
        actual: RequestId,
    },
    /// `initialize` was answered with an error.
    #[error("negotiation rejected: {0}")]
    NegotiationRejected(JsonRpcError),
    /// `tools/list` was answered with an error.
    #[error("tools/list failed: {0}")]
    EnumerationRejected(JsonRpcError),
    /// The required tool is not listed.
    #[error("capability `{name}` not found (listed: {})", .available.join(", "))]
    CapabilityNotFound {
        name: String,
        available: Vec<String>,
    },
    /// `tools/call` was answered with an error.
    #[error("invocation failed: {0}")]
    InvocationFailed(JsonRpcError),
    /// The whole-run deadline expired while the step was in progress.
    #[error("{step}: run deadline of {deadline_ms}ms expired")]
    Timeout { step: StepKind, deadline_ms: u64 },
    /// A request could not be encoded.
    #[error("{step}: failed to encode request: {reason}")]
    Encode { step: StepKind, reason: String },
    /// Pipe I/O failed for a reason other than closure or timeout.
    #[error("{step}: transport error: {source}")]
    Transport {
        step: StepKind,
        #[source]
        source: TransportError,
    },
    /// The server could not be stopped or reaped.
    #[error("teardown failed: {0}")]
    Teardown(#[source] TransportError),
}

impl ConformanceError {
    /// The failure classification.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Launch(_) => FailureKind::LaunchFailure,
            Self::NoResponse { .. } => FailureKind::NoResponse,
            Self::MalformedMessage { .. } => FailureKind::MalformedMessage,
            Self::IdMismatch { .. } => FailureKind::IdMismatch,
            Self::NegotiationRejected(_) => FailureKind::NegotiationRejected,
            Self::EnumerationRejected(_) | Self::CapabilityNotFound { .. } => {
                FailureKind::CapabilityNotFound
            }
            Self::InvocationFailed(_) => FailureKind::InvocationFailed,
            Self::Timeout { .. } => FailureKind::Timeout,
            Self::Encode { .. } | Self::Transport { .. } => FailureKind::Transport,
            Self::Teardown(_) => FailureKind::Teardown,
        }
    }
}

impl From<ConformanceError> for ProbeError {
    fn from(e: ConformanceError) -> Self {
        let err = ProbeError::new(e.kind(), e.to_string()).with_advice(&e);
        match e {
            ConformanceError::MalformedMessage { raw, .. } => {
                err.with_context(format!("raw: {}", preview(&raw)))
            }
            _ => err,
        }
    }
}

impl DiagnosticError for ConformanceError {
    fn hint(&self) -> Option<String> {
        match self {
            Self::Launch(e) => e.hint(),
            Self::NoResponse { .. } => Some(
                "The server did not write a reply line to stdout. It may have crashed, \
                 be waiting for input elsewhere, or write replies without a trailing newline."
                    .into(),
            ),
            Self::MalformedMessage { .. } => Some(
                "Something other than a single-line JSON-RPC reply was written to stdout, \
                 often a log line or pretty-printed JSON."
                    .into(),
            ),
            Self::IdMismatch { .. } => {
                Some("Replies must echo the id of the request they answer.".into())
            }
            Self::NegotiationRejected(e) if e.code == error_codes::METHOD_NOT_FOUND => {
                Some("The server does not implement `initialize`.".into())
            }
            Self::CapabilityNotFound { .. } => Some(
                "Tool names are matched exactly and case-sensitively.".into(),
            ),
            Self::Timeout { .. } => {
                Some("The conversation did not finish within the run deadline.".into())
            }
            _ => None,
        }
    }

    fn fix(&self) -> Option<String> {
        match self {
            Self::Launch(e) => e.fix(),
            Self::NoResponse {
                step: StepKind::Invoke,
                ..
            } => Some(
                "Answer the interactive prompt, or raise the wait:\n  [timing]\n  invoke_timeout_ms = 60000"
                    .into(),
            ),
            Self::NoResponse { .. } => Some(
                "If the server is slow to start, raise the waits:\n  [timing]\n  startup_delay_ms = 5000\n  response_timeout_ms = 10000"
                    .into(),
            ),
            Self::MalformedMessage { .. } => {
                Some("Send logs to stderr and keep stdout for protocol messages only.".into())
            }
            Self::CapabilityNotFound { .. } => Some(
                "Register the tool on the server, or change it in config:\n  [invoke]\n  tool_name = \"...\""
                    .into(),
            ),
            Self::Timeout { .. } => Some(
                "Raise the deadline in config:\n  [timing]\n  run_deadline_secs = 300".into(),
            ),
            _ => None,
        }
    }
}

fn preview(raw: &str) -> String {
    if raw.chars().count() <= RAW_PREVIEW_CHARS {
        return raw.to_string();
    }
    let cut: String = raw.chars().take(RAW_PREVIEW_CHARS).collect();
    format!("{cut}…")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_keeps_raw_text_in_context() {
        let err: ProbeError = ConformanceError::MalformedMessage {
            step: StepKind::Negotiate,
            reason: "invalid JSON".into(),
            raw: "hello from server".into(),
        }
        .into();
        assert_eq!(err.kind, FailureKind::MalformedMessage);
        assert_eq!(err.context.as_deref(), Some("raw: hello from server"));
    }

    #[test]
    fn long_raw_text_is_cut() {
        let raw = "x".repeat(2_000);
        let err: ProbeError = ConformanceError::MalformedMessage {
            step: StepKind::Invoke,
            reason: "invalid JSON".into(),
            raw,
        }
        .into();
        let ctx = err.context.expect("context");
        assert!(ctx.chars().count() < 600);
        assert!(ctx.ends_with('…'));
    }

    #[test]
    fn enumeration_error_counts_as_capability_not_found() {
        let e = ConformanceError::EnumerationRejected(JsonRpcError {
            code: error_codes::METHOD_NOT_FOUND,
            message: "unknown method".into(),
            data: None,
        });
        assert_eq!(e.kind(), FailureKind::CapabilityNotFound);
    }

    #[test]
    fn capability_not_found_lists_available_tools() {
        let e = ConformanceError::CapabilityNotFound {
            name: "zhi".into(),
            available: vec!["other".into(), "ji".into()],
        };
        assert_eq!(e.to_string(), "capability `zhi` not found (listed: other, ji)");
        assert!(e.fix().expect("fix").contains("tool_name"));
    }

    #[test]
    fn method_not_found_negotiation_has_hint() {
        let e = ConformanceError::NegotiationRejected(JsonRpcError {
            code: error_codes::METHOD_NOT_FOUND,
            message: "nope".into(),
            data: None,
        });
        assert!(e.hint().expect("hint").contains("initialize"));
    }

    #[test]
    fn invoke_no_response_suggests_longer_wait() {
        let e = ConformanceError::NoResponse {
            step: StepKind::Invoke,
            reason: "stream closed".into(),
        };
        assert!(e.fix().expect("fix").contains("invoke_timeout_ms"));
    }
}
