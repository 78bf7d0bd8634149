//! Tool definition for templated form letters.

use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{json, Value};

use super::registry::{ToolDescriptor, ToolOutput};
use crate::api::models::FormLetterResponse;
use crate::error::ConvertError;
use crate::letters::{parse_recipients, FormLetterBatch, FormLetterGenerator, OutputFormat};

pub const TOOL_NAME: &str = "generate_form_letters";

#[derive(Debug, Deserialize)]
pub struct FormLetterArguments {
    pub template_path: PathBuf,
    pub recipients: Vec<Value>,
    #[serde(default)]
    pub output_format: Option<String>,
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
            "Generate one letter per recipient from a DOCX template. ",
            "The template marks fields as {{field_name}} (letters, digits and underscores, ",
            "case-sensitive) anywhere in paragraphs, tables, headers or footers. ",
            "Each recipient is an object mapping field names to text values. ",
            "A recipient that is malformed or misses a field is reported as failed ",
            "while the others are still produced. Files are named ",
            "letter-<number>-<name>.<pdf|docx> in input order."
        )
        .to_string(),
        input_schema: input_schema(),
    }
}

fn input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "template_path": {
                "type": "string",
                "description": "Absolute path to the .docx template"
            },
            "recipients": {
                "type": "array",
                "description": "One object per letter, e.g. {\"name\": \"John Doe\", \"city\": \"Anytown\"}",
                "items": {
                    "type": "object",
                    "additionalProperties": { "type": ["string", "number", "boolean"] }
                },
                "minItems": 1
            },
            "output_format": {
                "type": "string",
                "enum": ["pdf", "docx"],
                "default": "pdf"
            },
            "output_directory": {
                "type": "string",
                "description": "Directory for the letters; created if it does not exist"
            },
            "embed_output": {
                "type": "boolean",
                "description": "Attach every produced letter to the result",
                "default": false
            }
        },
        "required": ["template_path", "recipients"]
    })
}

pub async fn execute(
    generator: &FormLetterGenerator,
    args: FormLetterArguments,
) -> Result<ToolOutput, ConvertError> {
    let output_format = args
        .output_format
        .as_deref()
        .unwrap_or("pdf")
        .parse::<OutputFormat>()?;

    let mut batch = FormLetterBatch::new(args.template_path, parse_recipients(&args.recipients))
        .with_format(output_format);
    if let Some(dir) = args.output_directory {
        batch = batch.with_output_directory(dir);
    }

    let report = generator.generate(batch).await?;

    let mut summary = format!(
        "{}. Output directory: {}",
        report.summary(),
        report.output_directory.display()
    );
    for outcome in report.outcomes.iter().filter(|o| !o.is_success()) {
        summary.push_str(&format!(
            "\nrecipient {}: {}",
            outcome.index,
            outcome.error.as_deref().unwrap_or("failed")
        ));
    }

    let structured = serde_json::to_value(FormLetterResponse::from(&report)).unwrap_or(Value::Null);

    Ok(ToolOutput {
        summary,
        structured,
        files: report.output_paths(),
        embed: args.embed_output,
        is_error: report.succeeded() == 0,
    })
}
