use std::path::PathBuf;

use actix_multipart::{Field, Multipart};
use actix_web::HttpResponse;
use futures::StreamExt;
use log::error;

use crate::ErrorResponse;

/// Largest single field accepted from a client.
pub const MAX_FIELD_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug)]
pub struct UploadedFile {
    pub filename: String,
    pub data: Vec<u8>,
}

#[derive(Debug)]
pub struct ConversionUpload {
    pub file: UploadedFile,
    pub output_directory: Option<PathBuf>,
}

#[derive(Debug)]
pub struct FormLetterUpload {
    pub template: UploadedFile,
    pub recipients_json: String,
    pub output_format: Option<String>,
    pub output_directory: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum MultipartParseError {
    #[error("Multipart field error: {0}")]
    FieldError(String),
    #[error("Missing required field '{0}'")]
    MissingField(&'static str),
    #[error("Field '{0}' exceeds the {} byte limit", MAX_FIELD_BYTES)]
    TooLarge(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Invalid UTF-8 data in field '{0}'")]
    Utf8Error(String),
}

impl From<MultipartParseError> for HttpResponse {
    fn from(error: MultipartParseError) -> Self {
        match error {
            MultipartParseError::TooLarge(_) => HttpResponse::PayloadTooLarge()
                .json(ErrorResponse::new("InvalidInput", &error.to_string())),
            MultipartParseError::IoError(_) => {
                error!("Multipart read failed: {}", error);
                HttpResponse::InternalServerError()
                    .json(ErrorResponse::internal_error(&error.to_string()))
            }
            _ => HttpResponse::BadRequest()
                .json(ErrorResponse::new("InvalidInput", &error.to_string())),
        }
    }
}

pub struct MultipartParser;

impl MultipartParser {
    /// Fields: `file` (required), `output_directory`.
    pub async fn parse_conversion(
        mut multipart: Multipart,
    ) -> Result<ConversionUpload, MultipartParseError> {
        let mut file: Option<UploadedFile> = None;
        let mut output_directory: Option<PathBuf> = None;

        while let Some(item) = multipart.next().await {
            let mut field = item.map_err(|e| MultipartParseError::FieldError(e.to_string()))?;
            let (name, filename) = field_names(&field)?;

            match name.as_str() {
                "file" => {
                    let data = read_bytes(&mut field, &name).await?;
                    file = Some(UploadedFile {
                        filename: filename.unwrap_or_default(),
                        data,
                    });
                }
                "output_directory" => {
                    output_directory = optional_path(read_text(&mut field, &name).await?);
                }
                _ => drain(&mut field).await?,
            }
        }

        Ok(ConversionUpload {
            file: file.ok_or(MultipartParseError::MissingField("file"))?,
            output_directory,
        })
    }

    /// Fields: `template_file` and `recipients_json` (required),
    /// `output_format`, `output_directory`.
    pub async fn parse_form_letters(
        mut multipart: Multipart,
    ) -> Result<FormLetterUpload, MultipartParseError> {
        let mut template: Option<UploadedFile> = None;
        let mut recipients_json: Option<String> = None;
        let mut output_format: Option<String> = None;
        let mut output_directory: Option<PathBuf> = None;

        while let Some(item) = multipart.next().await {
            let mut field = item.map_err(|e| MultipartParseError::FieldError(e.to_string()))?;
            let (name, filename) = field_names(&field)?;

            match name.as_str() {
                "template_file" => {
                    let data = read_bytes(&mut field, &name).await?;
                    template = Some(UploadedFile {
                        filename: filename.unwrap_or_default(),
                        data,
                    });
                }
                "recipients_json" => {
                    recipients_json = Some(read_text(&mut field, &name).await?);
                }
                "output_format" => {
                    let value = read_text(&mut field, &name).await?;
                    output_format = Some(value.trim().to_string()).filter(|v| !v.is_empty());
                }
                "output_directory" => {
                    output_directory = optional_path(read_text(&mut field, &name).await?);
                }
                _ => drain(&mut field).await?,
            }
        }

        Ok(FormLetterUpload {
            template: template.ok_or(MultipartParseError::MissingField("template_file"))?,
            recipients_json: recipients_json
                .ok_or(MultipartParseError::MissingField("recipients_json"))?,
            output_format,
            output_directory,
        })
    }
}

fn field_names(field: &Field) -> Result<(String, Option<String>), MultipartParseError> {
    let content_disposition = field
        .content_disposition()
        .ok_or_else(|| MultipartParseError::FieldError("Content disposition not found".to_string()))?;
    let name = content_disposition
        .get_name()
        .ok_or_else(|| MultipartParseError::FieldError("Field name not found".to_string()))?;
    Ok((
        name.to_string(),
        content_disposition.get_filename().map(|s| s.to_string()),
    ))
}

async fn read_bytes(field: &mut Field, name: &str) -> Result<Vec<u8>, MultipartParseError> {
    let mut buffer = Vec::new();
    while let Some(chunk) = field.next().await {
        let data_chunk = chunk.map_err(|e| MultipartParseError::IoError(e.to_string()))?;
        if buffer.len() + data_chunk.len() > MAX_FIELD_BYTES {
            return Err(MultipartParseError::TooLarge(name.to_string()));
        }
        buffer.extend_from_slice(&data_chunk);
    }
    Ok(buffer)
}

async fn read_text(field: &mut Field, name: &str) -> Result<String, MultipartParseError> {
    let bytes = read_bytes(field, name).await?;
    String::from_utf8(bytes).map_err(|_| MultipartParseError::Utf8Error(name.to_string()))
}

async fn drain(field: &mut Field) -> Result<(), MultipartParseError> {
    while let Some(chunk) = field.next().await {
        chunk.map_err(|e| MultipartParseError::IoError(e.to_string()))?;
    }
    Ok(())
}

fn optional_path(value: String) -> Option<PathBuf> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(PathBuf::from(trimmed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;
    use actix_web::http::StatusCode;

    #[actix_web::test]
    async fn test_errors_map_to_status_codes() {
        let response: HttpResponse = MultipartParseError::MissingField("file").into();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "InvalidInput");
        assert_eq!(json["message"], "Missing required field 'file'");

        let response: HttpResponse = MultipartParseError::TooLarge("file".into()).into();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let response: HttpResponse = MultipartParseError::IoError("reset".into()).into();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_optional_path() {
        assert_eq!(optional_path("  ".into()), None);
        assert_eq!(optional_path(" /tmp/out ".into()), Some(PathBuf::from("/tmp/out")));
    }
}
