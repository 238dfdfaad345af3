//! # probe-conformance
//!
//! Drives one server through the fixed negotiate → enumerate → invoke
//! conversation and judges every reply.
//!
//! Provides [`Harness`] for a full run against a real process and
//! [`Sequencer`] for driving any line transport (used by tests with an
//! in-memory peer).

pub mod error;
pub mod harness;
pub mod sequencer;
pub mod step;
pub mod validator;

pub use error::ConformanceError;
pub use harness::{Harness, HarnessConfig};
pub use sequencer::{run_conversation, Sequencer};
pub use step::{ClientIdentity, ConversationConfig, ConversationStep, Expectation};
pub use validator::{check, validate};
