//! Transport-layer error types.

use probe_types::{DiagnosticError, FailureKind, ProbeError};
use thiserror::Error;

/// Errors from process supervision and the stdio pipes.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The server executable could not be started.
    #[error("failed to launch `{program}`: {reason}")]
    Launch {
        program: String,
        reason: String,
        not_found: bool,
    },
    /// A stdio stream was not piped or was already taken.
    #[error("{0} pipe is not available")]
    PipeUnavailable(&'static str),
    /// Failed to read from the server's stdout.
    #[error("read error: {0}")]
    Read(String),
    /// A line arrived on stdout but is not valid UTF-8.
    #[error("received a line that is not valid UTF-8")]
    InvalidUtf8 { raw: String },
    /// Failed to write to the server's stdin.
    #[error("write error: {0}")]
    Write(String),
    /// The server closed its end of the pipe.
    #[error("connection closed")]
    ConnectionClosed,
    /// A bounded wait expired.
    #[error("timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    /// The server could not be terminated or reaped.
    #[error("shutdown error: {0}")]
    Shutdown(String),
}

impl From<TransportError> for ProbeError {
    fn from(e: TransportError) -> Self {
        let kind = match &e {
            TransportError::Launch { .. } | TransportError::PipeUnavailable(_) => {
                FailureKind::LaunchFailure
            }
            TransportError::ConnectionClosed => FailureKind::NoResponse,
            TransportError::InvalidUtf8 { .. } => FailureKind::MalformedMessage,
            TransportError::Timeout { .. } => FailureKind::Timeout,
            TransportError::Shutdown(_) => FailureKind::Teardown,
            TransportError::Read(_) | TransportError::Write(_) => FailureKind::Transport,
        };
        ProbeError::new(kind, e.to_string()).with_advice(&e)
    }
}

impl DiagnosticError for TransportError {
    fn hint(&self) -> Option<String> {
        match self {
            Self::Launch {
                not_found: true, ..
            } => Some("The server executable was not found on PATH.".into()),
            Self::Launch { .. } => {
                Some("The operating system refused to start the server.".into())
            }
            Self::ConnectionClosed => Some("The server exited or closed its stdio.".into()),
            Self::Timeout { .. } => Some("The server did not answer in time.".into()),
            _ => None,
        }
    }

    fn fix(&self) -> Option<String> {
        match self {
            Self::Launch { .. } => Some(
                "Set the server command in config:\n  [server]\n  program = \"/path/to/server\""
                    .into(),
            ),
            Self::Timeout { .. } => Some(
                "Increase the wait in config:\n  [timing]\n  response_timeout_ms = 10000".into(),
            ),
            _ => None,
        }
    }
}
