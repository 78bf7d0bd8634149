use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::converter::ConversionResult;
use crate::letters::{BatchReport, OutputFormat, RecipientOutcome};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConversionResponse {
    pub output_path: String,
    pub success: bool,
    pub message: String,
}

impl From<ConversionResult> for ConversionResponse {
    fn from(result: ConversionResult) -> Self {
        Self {
            output_path: result.output_path.to_string_lossy().into_owned(),
            success: result.success,
            message: result.message,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FormLetterResponse {
    /// Files produced, in recipient order.
    pub output_paths: Vec<String>,
    pub output_directory: String,
    /// One entry per recipient, in input order.
    pub results: Vec<RecipientOutcome>,
    /// `true` only when every recipient succeeded.
    pub success: bool,
    pub message: String,
}

impl From<&BatchReport> for FormLetterResponse {
    fn from(report: &BatchReport) -> Self {
        Self {
            output_paths: report
                .output_paths()
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect(),
            output_directory: report.output_directory.to_string_lossy().into_owned(),
            results: report.outcomes.clone(),
            success: report.all_succeeded(),
            message: report.summary(),
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct DownloadQuery {
    /// Return the PDF itself instead of a JSON description.
    #[serde(default)]
    pub download: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ConvertUploadForm {
    #[allow(unused)]
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
    #[allow(unused)]
    pub output_directory: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct FormLetterUploadForm {
    #[allow(unused)]
    #[schema(value_type = String, format = Binary)]
    pub template_file: Vec<u8>,
    /// JSON array of objects, e.g. `[{"name": "John Doe", "city": "Anytown"}]`.
    #[allow(unused)]
    pub recipients_json: String,
    #[allow(unused)]
    pub output_format: Option<OutputFormat>,
    #[allow(unused)]
    pub output_directory: Option<String>,
}
