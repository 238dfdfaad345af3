//! MCP initialize method types.
//!
//! The initialize handshake is the first message exchanged between
//! client and server to negotiate capabilities and protocol version.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// MCP protocol version requested by the probe.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Client capabilities declared during initialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientCapabilities {
    /// Filesystem roots capability.
    pub roots: RootsCapability,
    /// Sampling capability (no options).
    pub sampling: SamplingCapability,
}

/// Roots capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootsCapability {
    /// Whether the client emits roots/list_changed notifications.
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

impl Default for RootsCapability {
    fn default() -> Self {
        Self { list_changed: true }
    }
}

/// Sampling capability.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplingCapability {}

/// Client info sent during initialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientInfo {
    /// Client name.
    pub name: String,
    /// Client version.
    pub version: String,
}

/// Request params for `initialize`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitializeParams {
    /// Protocol version requested by client.
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    /// Client capabilities.
    pub capabilities: ClientCapabilities,
    /// Client info.
    #[serde(rename = "clientInfo")]
    pub client_info: ClientInfo,
}

impl InitializeParams {
    /// Builds params with default capabilities for the given client identity.
    pub fn new(
        protocol_version: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            protocol_version: protocol_version.into(),
            capabilities: ClientCapabilities::default(),
            client_info: ClientInfo {
                name: name.into(),
                version: version.into(),
            },
        }
    }
}

impl Default for InitializeParams {
    fn default() -> Self {
        Self::new(PROTOCOL_VERSION, "test-client", "1.0.0")
    }
}

/// Server info returned during initialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Server version.
    #[serde(default)]
    pub version: String,
}

/// Response for `initialize`.
///
/// Every field is optional: the probe accepts any result shape and only
/// reads these fields for the step trace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InitializeResult {
    /// Protocol version agreed by server.
    #[serde(default, rename = "protocolVersion")]
    pub protocol_version: Option<String>,
    /// Server capabilities, kept opaque.
    #[serde(default)]
    pub capabilities: Option<Value>,
    /// Server info.
    #[serde(default, rename = "serverInfo")]
    pub server_info: Option<ServerInfo>,
}
