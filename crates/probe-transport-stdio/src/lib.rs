//! # probe-transport-stdio
//!
//! Launches the server under test with piped stdio and talks to it
//! one line at a time.
//!
//! - [`ServerProcess`] owns the child and is the only thing that stops it.
//! - [`LineTransport`] frames writes and bounded reads over stdin/stdout.
//! - [`StderrCollector`] drains stderr in the background for diagnostics.

pub mod diagnostics;
pub mod error;
pub mod process;
pub mod transport;

pub use diagnostics::StderrCollector;
pub use error::TransportError;
pub use process::{ServerCommand, ServerProcess, ShutdownReport};
pub use transport::LineTransport;
