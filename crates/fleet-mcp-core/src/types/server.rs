//! Server identity exchanged during the initialize handshake.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Identity of this client, sent with `initialize`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            name: "fleet-mcp".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// `initialize` request params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeRequest {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    #[serde(rename = "clientInfo")]
    pub client_info: ClientInfo,
}

/// Server identity parsed from the `initialize` reply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerInfo {
    pub name: String,

    #[serde(default)]
    pub version: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,

    /// Anything else the server volunteered.
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_request_wire_names() {
        let request = InitializeRequest {
            protocol_version: crate::protocol::PROTOCOL_VERSION.to_string(),
            client_info: ClientInfo::default(),
        };
        let wire = serde_json::to_value(&request).unwrap();
        assert_eq!(wire["protocolVersion"], "2024-11-05");
        assert_eq!(wire["clientInfo"]["name"], "fleet-mcp");
    }

    #[test]
    fn server_info_tolerates_extra_fields() {
        let wire = r#"{"name":"mock","version":"1.0","protocolVersion":"2024-11-05"}"#;
        let info: ServerInfo = serde_json::from_str(wire).unwrap();
        assert_eq!(info.name, "mock");
        assert!(info.extra.contains_key("protocolVersion"));
    }
}
