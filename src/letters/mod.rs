//! Form letters: one rendered document per recipient.

pub mod generator;
pub mod naming;
pub mod validation;

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::error::{ConvertError, ErrorKind};

pub use generator::FormLetterGenerator;
pub use validation::{ValidationError, ValidationErrors};

/// Field used to derive output file names.
pub const NAME_FIELD: &str = "name";

/// A recipient record that passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recipient {
    fields: BTreeMap<String, String>,
}

impl Recipient {
    pub fn from_value(value: &Value, index: usize) -> Result<Self, ValidationErrors> {
        validation::validate_record(value, &format!("recipients[{index}]"))
            .map(|fields| Self { fields })
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn display_name(&self) -> Option<&str> {
        self.get(NAME_FIELD).filter(|name| !name.trim().is_empty())
    }
}

/// A recipient as received: validated, or the reason it was rejected.
pub type RecipientEntry = Result<Recipient, ValidationErrors>;

/// Validate every record independently. A bad record never hides the others.
pub fn parse_recipients(values: &[Value]) -> Vec<RecipientEntry> {
    values
        .iter()
        .enumerate()
        .map(|(index, value)| Recipient::from_value(value, index))
        .collect()
}

/// Parse a JSON document that must be an array of recipient objects.
pub fn parse_recipients_json(raw: &str) -> Result<Vec<RecipientEntry>, ConvertError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|err| ConvertError::invalid(format!("recipients is not valid JSON: {err}")))?;
    match value {
        Value::Array(items) => Ok(parse_recipients(&items)),
        _ => Err(ConvertError::invalid(
            "recipients must be a JSON array of objects",
        )),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pdf,
    Docx,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "pdf" => Ok(Self::Pdf),
            "docx" | "native" => Ok(Self::Docx),
            other => Err(ConvertError::invalid(format!(
                "unsupported output format '{other}' (expected pdf or docx)"
            ))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Debug, Clone)]
pub struct FormLetterBatch {
    pub template_path: PathBuf,
    pub recipients: Vec<RecipientEntry>,
    pub output_format: OutputFormat,
    pub output_directory: Option<PathBuf>,
}

impl FormLetterBatch {
    pub fn new(template_path: impl Into<PathBuf>, recipients: Vec<RecipientEntry>) -> Self {
        Self {
            template_path: template_path.into(),
            recipients,
            output_format: OutputFormat::default(),
            output_directory: None,
        }
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    pub fn with_output_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_directory = Some(dir.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RecipientStatus {
    Succeeded,
    Failed,
}

/// Result for one recipient, reported in input order.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RecipientOutcome {
    pub index: usize,
    pub status: RecipientStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub output_path: Option<PathBuf>,
    /// DOCX kept next to the PDF when intermediates are retained.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub intermediate_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RecipientOutcome {
    pub fn succeeded(index: usize, output_path: PathBuf, intermediate_path: Option<PathBuf>) -> Self {
        Self {
            index,
            status: RecipientStatus::Succeeded,
            output_path: Some(output_path),
            intermediate_path,
            error_kind: None,
            error: None,
        }
    }

    pub fn failed(index: usize, kind: ErrorKind, error: impl Into<String>) -> Self {
        Self {
            index,
            status: RecipientStatus::Failed,
            output_path: None,
            intermediate_path: None,
            error_kind: Some(kind),
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RecipientStatus::Succeeded
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BatchReport {
    #[schema(value_type = String)]
    pub output_directory: PathBuf,
    pub output_format: OutputFormat,
    pub outcomes: Vec<RecipientOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }

    pub fn is_partial_failure(&self) -> bool {
        self.succeeded() > 0 && self.failed() > 0
    }

    /// Produced files, in recipient order.
    pub fn output_paths(&self) -> Vec<PathBuf> {
        self.outcomes
            .iter()
            .filter_map(|o| o.output_path.clone())
            .collect()
    }

    pub fn summary(&self) -> String {
        let total = self.outcomes.len();
        if self.all_succeeded() {
            format!("Generated {total} form letter(s) as {}", self.output_format)
        } else {
            format!(
                "Generated {} of {total} form letter(s) as {}; {} failed",
                self.succeeded(),
                self.output_format,
                self.failed()
            )
        }
    }
}
