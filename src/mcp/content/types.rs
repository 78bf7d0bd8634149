//! Core content types for MCP tool responses.

use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Binary payload attached to a tool result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddedResource {
    pub uri: String,
    pub mime_type: String,
    /// Base64-encoded file data
    pub blob: String,
}

impl EmbeddedResource {
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64.decode(&self.blob)
    }
}

/// Content item in tool result (MCP spec compatible).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentItem {
    #[serde(rename = "type")]
    pub content_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<EmbeddedResource>,
}

impl ContentItem {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content_type: "text".to_string(),
            text: Some(text.into()),
            resource: None,
        }
    }

    pub fn resource(data: &[u8], mime_type: &str, uri: impl Into<String>) -> Self {
        Self {
            content_type: "resource".to_string(),
            text: None,
            resource: Some(EmbeddedResource {
                uri: uri.into(),
                mime_type: mime_type.to_string(),
                blob: BASE64.encode(data),
            }),
        }
    }

    /// Resource for a file on disk, typed from its extension.
    pub fn file(path: &Path, data: &[u8]) -> Self {
        let mime = mime_guess::from_path(path).first_or_octet_stream();
        Self::resource(data, mime.essence_str(), file_uri(path))
    }
}

/// Result of a tool call (MCP spec compatible).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: Vec<ContentItem>,
    #[serde(rename = "structuredContent", skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
    #[serde(rename = "isError")]
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(content: Vec<ContentItem>) -> Self {
        Self {
            content,
            structured_content: None,
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ContentItem::text(message)],
            structured_content: None,
            is_error: true,
        }
    }

    pub fn with_structured(mut self, value: Value) -> Self {
        self.structured_content = Some(value);
        self
    }
}

fn file_uri(path: &Path) -> String {
    let raw = path.to_string_lossy();
    if raw.starts_with('/') {
        format!("file://{raw}")
    } else {
        format!("file:///{}", raw.replace('\\', "/"))
    }
}
