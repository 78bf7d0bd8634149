use actix_multipart::Multipart;
use actix_web::http::{header, StatusCode};
use actix_web::{web, HttpResponse};
use log::{debug, error, info};

use super::models::{
    ConversionResponse, ConvertUploadForm, DownloadQuery, FormLetterResponse,
    FormLetterUploadForm,
};
use super::multipart_parser::MultipartParser;
use crate::converter::ConversionRequest;
use crate::error::ConvertError;
use crate::letters::{parse_recipients_json, BatchReport, FormLetterBatch, OutputFormat};
use crate::workspace::store_upload;
use crate::{AppState, ErrorResponse};

#[utoipa::path(
    post,
    path = "/api/convert-to-pdf",
    tag = "Conversion",
    params(DownloadQuery),
    request_body(content = inline(ConvertUploadForm), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Document converted", body = ConversionResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 502, description = "LibreOffice failed to convert the document", body = ErrorResponse),
        (status = 503, description = "LibreOffice is not available", body = ErrorResponse),
        (status = 500, description = "Internal Server Error", body = ErrorResponse)
    )
)]
pub async fn convert_to_pdf(
    payload: Multipart,
    query: web::Query<DownloadQuery>,
    state: web::Data<AppState>,
) -> HttpResponse {
    info!("Executing convert_to_pdf handler");

    let upload = match MultipartParser::parse_conversion(payload).await {
        Ok(upload) => upload,
        Err(err) => return err.into(),
    };
    debug!(
        "Received '{}' ({} bytes)",
        upload.file.filename,
        upload.file.data.len()
    );

    let source = match store_upload(
        &state.config.converter.work_root,
        &upload.file.filename,
        "upload.docx",
        &upload.file.data,
    ) {
        Ok(path) => path,
        Err(err) => return err.into(),
    };

    let mut request = ConversionRequest::new(source);
    if let Some(dir) = upload.output_directory {
        request = request.with_output_directory(dir);
    }

    match state.converter.convert(&request).await {
        Ok(result) if query.download => pdf_attachment(&result.output_path).await,
        Ok(result) => HttpResponse::Ok().json(ConversionResponse::from(result)),
        Err(err) => err.into(),
    }
}

#[utoipa::path(
    post,
    path = "/api/generate-form-letters",
    tag = "Form Letters",
    request_body(content = inline(FormLetterUploadForm), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Every letter was generated", body = FormLetterResponse),
        (status = 207, description = "Some recipients failed", body = FormLetterResponse),
        (status = 422, description = "No recipient succeeded", body = FormLetterResponse),
        (status = 400, description = "Invalid template, recipients or format", body = ErrorResponse),
        (status = 503, description = "LibreOffice is not available", body = ErrorResponse),
        (status = 500, description = "Internal Server Error", body = ErrorResponse)
    )
)]
pub async fn generate_form_letters(
    payload: Multipart,
    state: web::Data<AppState>,
) -> HttpResponse {
    info!("Executing generate_form_letters handler");

    let upload = match MultipartParser::parse_form_letters(payload).await {
        Ok(upload) => upload,
        Err(err) => return err.into(),
    };

    let batch = match build_batch(&state, upload) {
        Ok(batch) => batch,
        Err(err) => return err.into(),
    };

    match state.generator.generate(batch).await {
        Ok(report) => HttpResponse::build(batch_status(&report)).json(FormLetterResponse::from(&report)),
        Err(err) => err.into(),
    }
}

fn build_batch(
    state: &AppState,
    upload: super::multipart_parser::FormLetterUpload,
) -> Result<FormLetterBatch, ConvertError> {
    let output_format = upload
        .output_format
        .as_deref()
        .unwrap_or("pdf")
        .parse::<OutputFormat>()?;
    let recipients = parse_recipients_json(&upload.recipients_json)?;
    let template = store_upload(
        &state.config.converter.work_root,
        &upload.template.filename,
        "template.docx",
        &upload.template.data,
    )?;

    let mut batch = FormLetterBatch::new(template, recipients).with_format(output_format);
    if let Some(dir) = upload.output_directory {
        batch = batch.with_output_directory(dir);
    }
    Ok(batch)
}

/// 200 when every recipient succeeded, 207 on a mix, 422 when none did.
pub fn batch_status(report: &BatchReport) -> StatusCode {
    if report.all_succeeded() {
        StatusCode::OK
    } else if report.succeeded() > 0 {
        StatusCode::MULTI_STATUS
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    }
}

async fn pdf_attachment(path: &std::path::Path) -> HttpResponse {
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "document.pdf".to_string());
            HttpResponse::Ok()
                .content_type("application/pdf")
                .insert_header((
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", filename.replace('"', "")),
                ))
                .body(bytes)
        }
        Err(err) => {
            error!("Could not read converted file {}: {}", path.display(), err);
            HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error("Converted file could not be read"))
        }
    }
}

/// Prometheus text exposition of the conversion metrics.
pub async fn metrics(state: web::Data<AppState>) -> HttpResponse {
    match crate::metrics::encode(&state.registry) {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4; charset=utf-8")
            .body(body),
        Err(err) => {
            error!("Failed to encode metrics: {}", err);
            HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error("Failed to encode metrics"))
        }
    }
}
