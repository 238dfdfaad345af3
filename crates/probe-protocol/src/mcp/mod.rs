//! MCP (Model Context Protocol) payload types used by the probe.

pub mod initialize;
pub mod tools;

pub use initialize::*;
pub use tools::*;

/// MCP protocol method names.
pub mod methods {
    pub const INITIALIZE: &str = "initialize";
    pub const TOOLS_LIST: &str = "tools/list";
    pub const TOOLS_CALL: &str = "tools/call";
}
