//! Resource descriptors and resource contents.

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::error::{FleetError, FleetResult};

/// Resource advertised by a server; the URI is unique per server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Resource {
    pub uri: String,

    #[serde(default)]
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    /// Opaque server-defined annotations.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub annotations: HashMap<String, Value>,
}

/// One content block returned by `resources/read`: text or binary, never
/// both.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceContent {
    pub uri: String,

    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Base64-encoded binary payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blob: Option<String>,
}

impl ResourceContent {
    /// Decode the binary payload, if present.
    pub fn decode_blob(&self) -> FleetResult<Option<Vec<u8>>> {
        match &self.blob {
            None => Ok(None),
            Some(encoded) => base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .map(Some)
                .map_err(|e| FleetError::Parse(format!("invalid base64 resource blob: {e}"))),
        }
    }
}

/// `resources/read` request params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResourceRequest {
    pub uri: String,
}

/// `resources/read` result shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResourceResponse {
    pub contents: Vec<ResourceContent>,
}

/// `resources/list` result shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResourcesResponse {
    pub resources: Vec<Resource>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_decodes() {
        let content = ResourceContent {
            uri: "file:///tmp/x".into(),
            mime_type: Some("application/octet-stream".into()),
            text: None,
            blob: Some("aGVsbG8=".into()),
        };
        assert_eq!(content.decode_blob().unwrap().unwrap(), b"hello");
    }

    #[test]
    fn bad_blob_is_a_parse_error() {
        let content = ResourceContent {
            uri: "file:///tmp/x".into(),
            mime_type: None,
            text: None,
            blob: Some("@@not-base64@@".into()),
        };
        assert!(matches!(
            content.decode_blob(),
            Err(FleetError::Parse(_))
        ));
    }

    #[test]
    fn mime_type_wire_name() {
        let resource = Resource {
            uri: "db://admin".into(),
            name: "admin".into(),
            description: None,
            mime_type: Some("application/json".into()),
            annotations: HashMap::new(),
        };
        let wire = serde_json::to_value(&resource).unwrap();
        assert_eq!(wire["mimeType"], "application/json");
    }
}
