//! # probe-types
//!
//! Domain types for the conformance probe.
//! This crate contains pure data types with no I/O and no runtime
//! dependencies (except serde for serialization).

pub mod error;
pub mod verdict;

// Re-exports for convenience.
pub use error::{DiagnosticError, FailureKind, ProbeError};
pub use verdict::{StepKind, StepVerdict, Verdict};
