//! The three conversation steps and the requests they send.

use std::time::Duration;

use probe_protocol::mcp::{
    methods, InitializeParams, ToolsCallParams, ToolsListParams, ZhiArguments,
};
use probe_protocol::{JsonRpcRequest, RequestId};
use probe_types::StepKind;
use serde_json::Value;

use crate::error::ConformanceError;

/// Identity declared in `initialize`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub name: String,
    pub version: String,
    pub protocol_version: String,
}

impl Default for ClientIdentity {
    fn default() -> Self {
        Self {
            name: "test-client".to_string(),
            version: "1.0.0".to_string(),
            protocol_version: probe_protocol::mcp::PROTOCOL_VERSION.to_string(),
        }
    }
}

/// What the conversation sends and how long it waits for each reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationConfig {
    /// Identity for the negotiate step.
    pub client: ClientIdentity,
    /// Tool that must be listed and is then invoked.
    pub tool_name: String,
    /// Arguments of the invoke step.
    pub arguments: ZhiArguments,
    /// Bound on negotiate and enumerate reads (and on every write).
    pub response_timeout: Duration,
    /// Bound on the invoke read.
    pub invoke_timeout: Duration,
    /// How long to wait for a stderr diagnostic after a missing reply.
    pub stderr_wait: Duration,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            client: ClientIdentity::default(),
            tool_name: "zhi".to_string(),
            arguments: ZhiArguments {
                message: "这是一个测试消息".to_string(),
                predefined_options: vec![
                    "选项1".to_string(),
                    "选项2".to_string(),
                    "取消".to_string(),
                ],
                is_markdown: false,
                terminal_mode: false,
            },
            response_timeout: Duration::from_secs(5),
            invoke_timeout: Duration::from_secs(30),
            stderr_wait: Duration::from_millis(500),
        }
    }
}

impl ConversationConfig {
    /// Read bound for a given step.
    pub fn read_timeout(&self, step: StepKind) -> Duration {
        match step {
            StepKind::Invoke => self.invoke_timeout,
            StepKind::Negotiate | StepKind::Enumerate => self.response_timeout,
        }
    }
}

/// What a reply must show for its step to pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expectation {
    /// A `result` of any shape.
    Result,
    /// A `result.tools` list containing this exact name.
    Capability(String),
}

/// A request paired with what its reply must satisfy.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationStep {
    pub kind: StepKind,
    pub request: JsonRpcRequest,
    pub expectation: Expectation,
}

impl ConversationStep {
    /// Builds the request for `kind` with the given id.
    pub fn build(
        kind: StepKind,
        id: i64,
        config: &ConversationConfig,
    ) -> Result<Self, ConformanceError> {
        match kind {
            StepKind::Negotiate => Self::negotiate(id, &config.client),
            StepKind::Enumerate => Self::enumerate(id, &config.tool_name),
            StepKind::Invoke => Self::invoke(id, &config.tool_name, &config.arguments),
        }
    }

    /// `initialize` with client capabilities and identity.
    pub fn negotiate(id: i64, client: &ClientIdentity) -> Result<Self, ConformanceError> {
        let params = InitializeParams::new(
            client.protocol_version.clone(),
            client.name.clone(),
            client.version.clone(),
        );
        Ok(Self {
            kind: StepKind::Negotiate,
            request: request(StepKind::Negotiate, id, methods::INITIALIZE, &params)?,
            expectation: Expectation::Result,
        })
    }

    /// `tools/list` with empty params, expecting `tool_name` to be listed.
    pub fn enumerate(id: i64, tool_name: &str) -> Result<Self, ConformanceError> {
        Ok(Self {
            kind: StepKind::Enumerate,
            request: request(
                StepKind::Enumerate,
                id,
                methods::TOOLS_LIST,
                &ToolsListParams::default(),
            )?,
            expectation: Expectation::Capability(tool_name.to_string()),
        })
    }

    /// `tools/call` of `tool_name` with the interactive arguments.
    pub fn invoke(
        id: i64,
        tool_name: &str,
        arguments: &ZhiArguments,
    ) -> Result<Self, ConformanceError> {
        let arguments = to_value(StepKind::Invoke, arguments)?;
        let params = ToolsCallParams {
            name: tool_name.to_string(),
            arguments,
        };
        Ok(Self {
            kind: StepKind::Invoke,
            request: request(StepKind::Invoke, id, methods::TOOLS_CALL, &params)?,
            expectation: Expectation::Result,
        })
    }

    /// The request id.
    pub fn id(&self) -> &RequestId {
        &self.request.id
    }
}

fn request<P: serde::Serialize>(
    step: StepKind,
    id: i64,
    method: &str,
    params: &P,
) -> Result<JsonRpcRequest, ConformanceError> {
    Ok(JsonRpcRequest::new(
        RequestId::Number(id),
        method,
        Some(to_value(step, params)?),
    ))
}

fn to_value<P: serde::Serialize>(step: StepKind, params: &P) -> Result<Value, ConformanceError> {
    serde_json::to_value(params).map_err(|e| ConformanceError::Encode {
        step,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use probe_protocol::encode_request;

    fn encoded(kind: StepKind, id: i64) -> String {
        let step =
            ConversationStep::build(kind, id, &ConversationConfig::default()).expect("build");
        encode_request(&step.request).expect("encode")
    }

    #[test]
    fn negotiate_matches_reference_payload() {
        assert_eq!(
            encoded(StepKind::Negotiate, 1),
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","capabilities":{"roots":{"listChanged":true},"sampling":{}},"clientInfo":{"name":"test-client","version":"1.0.0"}}}"#
        );
    }

    #[test]
    fn enumerate_matches_reference_payload() {
        assert_eq!(
            encoded(StepKind::Enumerate, 2),
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list","params":{}}"#
        );
    }

    #[test]
    fn invoke_matches_reference_payload() {
        assert_eq!(
            encoded(StepKind::Invoke, 3),
            r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"zhi","arguments":{"message":"这是一个测试消息","predefined_options":["选项1","选项2","取消"],"is_markdown":false,"terminal_mode":false}}}"#
        );
    }

    #[test]
    fn enumerate_expects_configured_capability() {
        let step = ConversationStep::enumerate(2, "ask").expect("build");
        assert_eq!(step.expectation, Expectation::Capability("ask".into()));
        assert_eq!(step.id(), &RequestId::Number(2));
    }

    #[test]
    fn invoke_read_waits_longer() {
        let config = ConversationConfig::default();
        assert!(config.read_timeout(StepKind::Invoke) > config.read_timeout(StepKind::Negotiate));
    }
}
