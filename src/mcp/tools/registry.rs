//! Tool registry - central routing for MCP tools.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::convert_docx_to_pdf;
use super::generate_form_letters;
use crate::converter::Converter;
use crate::error::ConvertError;
use crate::letters::FormLetterGenerator;
use crate::mcp::content::{ContentBuilder, ToolResult};
use crate::AppState;

/// Tool descriptor conforming to MCP specification.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// What a tool produced, before it is shaped for a transport.
#[derive(Debug)]
pub struct ToolOutput {
    pub summary: String,
    pub structured: Value,
    pub files: Vec<PathBuf>,
    pub embed: bool,
    pub is_error: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Tool '{0}' is not available. Available tools: {}", available_tools())]
    UnknownTool(String),
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
    #[error(transparent)]
    Failed(#[from] ConvertError),
}

impl ToolError {
    /// Structured form shared by both transports.
    pub fn to_value(&self) -> Value {
        let kind = match self {
            Self::UnknownTool(_) => "UnknownTool",
            Self::InvalidArguments(_) => "InvalidInput",
            Self::Failed(err) => err.kind().as_str(),
        };
        json!({ "error": kind, "message": self.to_string() })
    }
}

fn available_tools() -> String {
    [convert_docx_to_pdf::TOOL_NAME, generate_form_letters::TOOL_NAME].join(", ")
}

/// Central registry for all MCP tools.
#[derive(Clone)]
pub struct ToolRegistry {
    converter: Converter,
    generator: FormLetterGenerator,
}

impl ToolRegistry {
    pub fn new(converter: Converter, generator: FormLetterGenerator) -> Self {
        Self {
            converter,
            generator,
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(state.converter.clone(), state.generator.clone())
    }

    /// List all available tools per MCP spec.
    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        vec![
            convert_docx_to_pdf::descriptor(),
            generate_form_letters::descriptor(),
        ]
    }

    /// Run a tool and return its raw output.
    pub async fn invoke(&self, name: &str, arguments: Option<Value>) -> Result<ToolOutput, ToolError> {
        log::info!("Invoking tool {}", name);
        match name {
            convert_docx_to_pdf::TOOL_NAME => {
                let args = parse_arguments(arguments)?;
                Ok(convert_docx_to_pdf::execute(&self.converter, args).await?)
            }
            generate_form_letters::TOOL_NAME => {
                let args = parse_arguments(arguments)?;
                Ok(generate_form_letters::execute(&self.generator, args).await?)
            }
            _ => Err(ToolError::UnknownTool(name.to_string())),
        }
    }

    /// Call a tool by name and shape the outcome as an MCP tool result.
    ///
    /// Tool failures become results with `isError: true`, never RPC errors.
    pub async fn call_tool(&self, name: &str, arguments: Option<Value>) -> ToolResult {
        match self.invoke(name, arguments).await {
            Ok(output) => into_tool_result(output).await,
            Err(err) => {
                log::warn!("Tool {} failed: {}", name, err);
                ToolResult::error(err.to_string()).with_structured(err.to_value())
            }
        }
    }
}

async fn into_tool_result(output: ToolOutput) -> ToolResult {
    let mut builder = ContentBuilder::new().text(output.summary);

    if output.embed {
        for path in &output.files {
            match tokio::fs::read(path).await {
                Ok(data) => builder = builder.file(path, &data),
                Err(err) => {
                    log::warn!("Could not embed {}: {}", path.display(), err);
                    builder = builder.text(format!("Could not attach {}: {}", path.display(), err));
                }
            }
        }
    }

    builder
        .structured(output.structured)
        .error_if(output.is_error)
        .build()
}

fn parse_arguments<T: for<'de> Deserialize<'de>>(arguments: Option<Value>) -> Result<T, ToolError> {
    let value = arguments.unwrap_or_else(|| Value::Object(Default::default()));
    serde_json::from_value(value).map_err(|err| ToolError::InvalidArguments(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn registry() -> ToolRegistry {
        ToolRegistry::from_state(&AppState::new(AppConfig::default()).unwrap())
    }

    #[test]
    fn test_lists_both_tools_with_schemas() {
        let tools = registry().list_tools();
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["convert_docx_to_pdf", "generate_form_letters"]);
        for tool in &tools {
            assert_eq!(tool.input_schema["type"], "object");
            assert!(tool.input_schema["required"].is_array());
        }
    }

    #[tokio::test]
    async fn test_unknown_tool_is_reported() {
        let err = registry().invoke("format_disk", None).await.unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool(_)));
        assert!(err.to_string().contains("convert_docx_to_pdf"));
    }

    #[tokio::test]
    async fn test_missing_arguments_are_invalid() {
        let result = registry().call_tool("convert_docx_to_pdf", None).await;
        assert!(result.is_error);
        let structured = result.structured_content.unwrap();
        assert_eq!(structured["error"], "InvalidInput");
        assert!(structured["message"].as_str().unwrap().contains("file_path"));
    }

    #[tokio::test]
    async fn test_recipients_must_be_an_array() {
        let result = registry()
            .call_tool(
                "generate_form_letters",
                Some(json!({"template_path": "/tmp/t.docx", "recipients": {"name": "x"}})),
            )
            .await;
        assert!(result.is_error);
        assert_eq!(result.structured_content.unwrap()["error"], "InvalidInput");
    }
}
