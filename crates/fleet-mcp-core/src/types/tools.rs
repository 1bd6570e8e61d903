//! Tool descriptors and tool invocation results.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Snapshot of every connected server's advertised tools, keyed by server id.
/// Handed to the planner as an immutable view; never a live reference into
/// the registry.
pub type ToolCatalog = HashMap<String, Vec<Tool>>;

/// Tool definition advertised by a server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tool {
    /// Server-unique tool name
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// JSON Schema for input parameters
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Value,

    /// Optional JSON Schema for output
    #[serde(rename = "outputSchema", skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
}

impl Tool {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            output_schema: None,
        }
    }

    pub fn with_output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }
}

/// `tools/call` request params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
}

/// `tools/call` result: ordered content items plus an error flag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallResponse {
    pub content: Vec<ToolContent>,

    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl ToolCallResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: None,
        }
    }

    /// Failure rendered as a flagged result, keeping the executor uniform.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: message.into(),
            }],
            is_error: Some(true),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.is_error.unwrap_or(false)
    }
}

/// One content item of a tool result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ToolContent {
    #[serde(rename = "text")]
    Text { text: String },

    /// Structured data payload.
    #[serde(rename = "data")]
    Data {
        data: Value,
        #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },

    /// Binary payload, base64-encoded on the wire.
    #[serde(rename = "blob")]
    Blob {
        blob: String,
        #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },
}

/// `tools/list` result shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListToolsResponse {
    pub tools: Vec<Tool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_wire_names() {
        let tool = Tool::new("echo", "echoes input", json!({"type": "object"}))
            .with_output_schema(json!({"type": "string"}));
        let wire = serde_json::to_value(&tool).unwrap();
        assert!(wire.get("inputSchema").is_some());
        assert!(wire.get("outputSchema").is_some());
    }

    #[test]
    fn error_result_is_flagged() {
        let result = ToolCallResponse::error("tool blew up");
        assert!(result.is_failure());
        assert_eq!(
            result.content[0],
            ToolContent::Text {
                text: "tool blew up".to_string()
            }
        );
    }

    #[test]
    fn content_type_tags() {
        let items = vec![
            ToolContent::Text { text: "1".into() },
            ToolContent::Data {
                data: json!({"rows": 3}),
                mime_type: Some("application/json".into()),
            },
        ];
        let wire = serde_json::to_value(&items).unwrap();
        assert_eq!(wire[0]["type"], "text");
        assert_eq!(wire[1]["type"], "data");
        assert_eq!(wire[1]["mimeType"], "application/json");
    }
}
