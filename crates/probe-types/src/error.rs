//! Unified failure taxonomy for the probe.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of conformance failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The server process could not be started.
    LaunchFailure,
    /// The expected response line never arrived, or stdout was closed.
    NoResponse,
    /// A line arrived but is not a structurally valid JSON-RPC response.
    MalformedMessage,
    /// The server answered `initialize` with an error.
    NegotiationRejected,
    /// The enumerated tool list lacks the required capability.
    CapabilityNotFound,
    /// The server answered `tools/call` with an error.
    InvocationFailed,
    /// The response id does not echo the request id.
    IdMismatch,
    /// A wait or the overall run deadline expired.
    Timeout,
    /// Reading from or writing to the pipes failed.
    Transport,
    /// The server process could not be reaped.
    Teardown,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LaunchFailure => "LaunchFailure",
            Self::NoResponse => "NoResponse",
            Self::MalformedMessage => "MalformedMessage",
            Self::NegotiationRejected => "NegotiationRejected",
            Self::CapabilityNotFound => "CapabilityNotFound",
            Self::InvocationFailed => "InvocationFailed",
            Self::IdMismatch => "IdMismatch",
            Self::Timeout => "Timeout",
            Self::Transport => "Transport",
            Self::Teardown => "Teardown",
        };
        f.write_str(name)
    }
}

/// Domain-level failure with structured context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeError {
    /// The kind of failure.
    pub kind: FailureKind,
    /// Human-readable message.
    pub message: String,
    /// Optional additional context (raw line, stderr excerpt, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Likely cause, for the operator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Suggested remediation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix: Option<String>,
}

impl ProbeError {
    /// Creates a new `ProbeError`.
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: None,
            hint: None,
            fix: None,
        }
    }

    /// Copies the hint and fix of a diagnosable error.
    pub fn with_advice(mut self, source: &impl DiagnosticError) -> Self {
        self.hint = source.hint();
        self.fix = source.fix();
        self
    }

    /// Adds context to the error.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Creates a no-response error.
    pub fn no_response(message: impl Into<String>) -> Self {
        Self::new(FailureKind::NoResponse, message)
    }

    /// Creates a malformed-message error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(FailureKind::MalformedMessage, message)
    }

    /// Creates a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Timeout, message)
    }
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)?;
        if let Some(ctx) = &self.context {
            write!(f, " ({})", ctx)?;
        }
        Ok(())
    }
}

impl std::error::Error for ProbeError {}

/// Turns technical errors into operator-facing diagnostics.
///
/// Implementors provide an optional `hint` (likely cause) and `fix`
/// (concrete remediation) per variant.
pub trait DiagnosticError {
    /// A human-readable explanation of the likely cause.
    fn hint(&self) -> Option<String> {
        None
    }
    /// A concrete step the operator can take.
    fn fix(&self) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_without_context() {
        let err = ProbeError::new(FailureKind::NoResponse, "stdout closed");
        assert_eq!(err.to_string(), "[NoResponse] stdout closed");
    }

    #[test]
    fn error_display_with_context() {
        let err = ProbeError::malformed("bad json").with_context("raw: {oops");
        assert!(err.to_string().contains("raw: {oops"));
    }

    #[test]
    fn failure_kind_serializes_snake_case() {
        let json = serde_json::to_string(&FailureKind::CapabilityNotFound).expect("ser");
        assert_eq!(json, "\"capability_not_found\"");
    }

    #[test]
    fn error_serialization_roundtrip() {
        let err = ProbeError::timeout("run deadline expired").with_context("step: invoke");
        let json = serde_json::to_string(&err).expect("serialize");
        let back: ProbeError = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, err);
    }

    #[test]
    fn constructors_set_kind() {
        assert_eq!(ProbeError::no_response("x").kind, FailureKind::NoResponse);
        assert_eq!(ProbeError::malformed("x").kind, FailureKind::MalformedMessage);
        assert_eq!(ProbeError::timeout("x").kind, FailureKind::Timeout);
    }

    #[test]
    fn advice_is_copied_from_source() {
        struct Missing;
        impl DiagnosticError for Missing {
            fn hint(&self) -> Option<String> {
                Some("not on PATH".into())
            }
        }
        let err = ProbeError::new(FailureKind::LaunchFailure, "spawn failed").with_advice(&Missing);
        assert_eq!(err.hint.as_deref(), Some("not on PATH"));
        assert!(err.fix.is_none());
        let json = serde_json::to_string(&err).expect("serialize");
        assert!(!json.contains("\"fix\""));
    }

    #[test]
    fn diagnostic_trait_defaults_to_none() {
        struct Dummy;
        impl DiagnosticError for Dummy {}
        let d = Dummy;
        assert!(d.hint().is_none());
        assert!(d.fix().is_none());
    }
}
