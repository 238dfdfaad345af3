//! MCP tools/* method types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request params for `tools/list`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolsListParams {
    /// Optional cursor for pagination.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// A single tool definition in the `tools/list` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpToolDefinition {
    /// Tool name.
    pub name: String,
    /// Tool description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for input parameters.
    #[serde(default, rename = "inputSchema")]
    pub input_schema: Value,
}

/// Response for `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolsListResult {
    /// Available tools, in server order.
    pub tools: Vec<McpToolDefinition>,
    /// Pagination cursor for next page.
    #[serde(default, rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

impl ToolsListResult {
    /// Finds a tool by exact, case-sensitive name.
    pub fn find(&self, name: &str) -> Option<&McpToolDefinition> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// Tool names in server order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }
}

/// Request params for `tools/call`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolsCallParams {
    /// Name of the tool to invoke.
    pub name: String,
    /// Arguments to pass.
    #[serde(default)]
    pub arguments: Value,
}

/// Arguments of the interactive `zhi` tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZhiArguments {
    /// Message shown to the user.
    pub message: String,
    /// Options offered for selection.
    #[serde(default)]
    pub predefined_options: Vec<String>,
    /// Whether `message` is Markdown.
    #[serde(default)]
    pub is_markdown: bool,
    /// Whether the server should prompt in its terminal instead of a popup.
    #[serde(default)]
    pub terminal_mode: bool,
}

/// Content item in a tool call response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    /// Text content.
    Text { text: String },
    /// Any other content type (image, resource, ...); only text is reported.
    #[serde(other)]
    Other,
}

/// Response for `tools/call`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolsCallResult {
    /// Content items returned by the tool.
    #[serde(default)]
    pub content: Vec<ToolContent>,
    /// Whether the tool call resulted in an error.
    #[serde(default, rename = "isError")]
    pub is_error: bool,
}

impl ToolsCallResult {
    /// Text of every text content item, in order.
    pub fn texts(&self) -> Vec<&str> {
        self.content
            .iter()
            .filter_map(|c| match c {
                ToolContent::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tools_list_params_default_is_empty_object() {
        let s = serde_json::to_string(&ToolsListParams::default()).expect("ser");
        assert_eq!(s, "{}");
    }

    #[test]
    fn tool_definition_reads_input_schema() {
        let def: McpToolDefinition = serde_json::from_value(json!({
            "name": "zhi",
            "description": "interactive prompt",
            "inputSchema": {"type": "object"}
        }))
        .expect("de");
        assert_eq!(def.input_schema["type"], "object");
    }

    #[test]
    fn tool_definition_tolerates_missing_schema() {
        let def: McpToolDefinition =
            serde_json::from_value(json!({"name": "other"})).expect("de");
        assert!(def.description.is_none());
        assert!(def.input_schema.is_null());
    }

    #[test]
    fn find_is_exact_and_case_sensitive() {
        let res: ToolsListResult = serde_json::from_value(json!({
            "tools": [{"name": "Zhi"}, {"name": "zhi_extra"}, {"name": "zhi"}]
        }))
        .expect("de");
        assert_eq!(res.find("zhi").map(|t| t.name.as_str()), Some("zhi"));
        assert!(res.find("ZHI").is_none());
        assert_eq!(res.names(), vec!["Zhi", "zhi_extra", "zhi"]);
    }

    #[test]
    fn zhi_arguments_keep_field_order() {
        let args = ZhiArguments {
            message: "hi".into(),
            predefined_options: vec!["a".into(), "b".into()],
            is_markdown: false,
            terminal_mode: false,
        };
        let s = serde_json::to_string(&args).expect("ser");
        assert_eq!(
            s,
            r#"{"message":"hi","predefined_options":["a","b"],"is_markdown":false,"terminal_mode":false}"#
        );
    }

    #[test]
    fn call_result_collects_text_and_skips_unknown_content() {
        let res: ToolsCallResult = serde_json::from_value(json!({
            "content": [
                {"type": "text", "text": "用户选择: 选项1"},
                {"type": "resource", "resource": {"uri": "file:///x"}},
                {"type": "image", "data": "AAAA", "mimeType": "image/png"}
            ]
        }))
        .expect("de");
        assert!(!res.is_error);
        assert_eq!(res.texts(), vec!["用户选择: 选项1"]);
        assert_eq!(res.content[1], ToolContent::Other);
        assert_eq!(res.content[2], ToolContent::Other);
    }
}
