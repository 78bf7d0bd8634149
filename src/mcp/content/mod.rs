//! Content types for MCP tool outputs.

pub mod builder;
pub mod types;

pub use builder::ContentBuilder;
pub use types::{ContentItem, EmbeddedResource, ToolResult};
