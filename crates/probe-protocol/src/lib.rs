//! # probe-protocol
//!
//! JSON-RPC 2.0 and MCP type definitions used by the conformance probe,
//! plus the line codec that turns requests into wire lines and wire
//! lines back into replies.

pub mod codec;
pub mod jsonrpc;
pub mod mcp;

pub use codec::{decode_reply, encode_request, CodecError};
pub use jsonrpc::*;
pub use mcp::methods;
