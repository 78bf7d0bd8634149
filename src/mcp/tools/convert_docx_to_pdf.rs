//! Tool definition for single document conversion.

use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{json, Value};

use super::registry::{ToolDescriptor, ToolOutput};
use crate::api::models::ConversionResponse;
use crate::converter::{ConversionRequest, Converter};
use crate::error::ConvertError;

pub const TOOL_NAME: &str = "convert_docx_to_pdf";

#[derive(Debug, Deserialize)]
pub struct ConvertArguments {
    pub file_path: PathBuf,
    #[serde(default)]
    pub output_directory: Option<PathBuf>,
    #[serde(default)]
    pub embed_output: bool,
}

/// Get the tool descriptor for MCP tools/list.
pub fn descriptor() -> ToolDescriptor {
    ToolDescriptor {
        name: TOOL_NAME.to_string(),
        description: concat!(
            "Convert a document on the server's filesystem to PDF using LibreOffice. ",
            "Accepts DOCX and other formats LibreOffice can open (doc, odt, rtf, txt, html, ",
            "xlsx, pptx, ...). Returns the absolute path of the PDF. When output_directory ",
            "is omitted a fresh temporary directory is used. Set embed_output to receive ",
            "the PDF itself as a base64 resource."
        )
        .to_string(),
        input_schema: input_schema(),
    }
}

fn input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "file_path": {
                "type": "string",
                "description": "Absolute path to the document to convert"
            },
            "output_directory": {
                "type": "string",
                "description": "Directory for the PDF; created if it does not exist"
            },
            "embed_output": {
                "type": "boolean",
                "description": "Attach the produced PDF to the result",
                "default": false
            }
        },
        "required": ["file_path"]
    })
}

pub async fn execute(
    converter: &Converter,
    args: ConvertArguments,
) -> Result<ToolOutput, ConvertError> {
    let mut request = ConversionRequest::new(args.file_path);
    if let Some(dir) = args.output_directory {
        request = request.with_output_directory(dir);
    }

    let result = converter.convert(&request).await?;
    let summary = format!(
        "{}. PDF written to {}",
        result.message,
        result.output_path.display()
    );
    let files = vec![result.output_path.clone()];
    let structured = serde_json::to_value(ConversionResponse::from(result))
        .unwrap_or(Value::Null);

    Ok(ToolOutput {
        summary,
        structured,
        files,
        embed: args.embed_output,
        is_error: false,
    })
}
