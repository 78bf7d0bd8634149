//! MCP tools exposed via JSON-RPC.
//!
//! Each tool module provides a descriptor (name, description, input schema),
//! its argument type and an `execute` function over the shared services.

pub mod convert_docx_to_pdf;
pub mod generate_form_letters;
pub mod registry;

pub use registry::{ToolDescriptor, ToolError, ToolOutput, ToolRegistry};
