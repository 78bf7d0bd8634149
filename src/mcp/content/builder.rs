//! Builder pattern for constructing tool responses.

use std::path::Path;

use serde_json::Value;

use super::types::{ContentItem, ToolResult};

/// Builder for constructing ToolResult with fluent API.
#[derive(Debug, Default)]
pub struct ContentBuilder {
    items: Vec<ContentItem>,
    structured: Option<Value>,
    is_error: bool,
}

impl ContentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, message: impl Into<String>) -> Self {
        self.items.push(ContentItem::text(message));
        self
    }

    /// Attach a produced file as an embedded resource.
    pub fn file(mut self, path: &Path, data: &[u8]) -> Self {
        self.items.push(ContentItem::file(path, data));
        self
    }

    /// Machine-readable copy of the result.
    pub fn structured(mut self, value: Value) -> Self {
        self.structured = Some(value);
        self
    }

    pub fn error_if(mut self, is_error: bool) -> Self {
        self.is_error = is_error;
        self
    }

    pub fn build(self) -> ToolResult {
        ToolResult {
            content: self.items,
            structured_content: self.structured,
            is_error: self.is_error,
        }
    }
}
