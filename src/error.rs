//! Error taxonomy shared by the converter, the form-letter generator and both
//! dispatch surfaces.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use actix_web::HttpResponse;
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::docx::TemplateError;
use crate::ErrorResponse;

/// Why a conversion subprocess did not produce a usable PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    ExitStatus(Option<i32>),
    MissingOutput(PathBuf),
    TimedOut(Duration),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExitStatus(Some(code)) => write!(f, "converter exited with status {code}"),
            Self::ExitStatus(None) => write!(f, "converter was terminated by a signal"),
            Self::MissingOutput(path) => {
                write!(f, "converter produced no output at {}", path.display())
            }
            Self::TimedOut(limit) => write!(f, "timed out after {}s", limit.as_secs()),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("conversion failed: {reason}{}", diagnostics_suffix(.diagnostics))]
    ConversionFailed {
        reason: FailureReason,
        diagnostics: String,
    },
    #[error("{0}")]
    Environment(String),
    #[error("invalid template: {0}")]
    Template(#[from] TemplateError),
    #[error("failed to {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

/// Stable, machine-readable error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub enum ErrorKind {
    InvalidInput,
    ConversionFailed,
    EnvironmentError,
    InternalError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidInput => "InvalidInput",
            Self::ConversionFailed => "ConversionFailed",
            Self::EnvironmentError => "EnvironmentError",
            Self::InternalError => "InternalError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ConvertError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn missing_binary(binary: &std::path::Path) -> Self {
        Self::Environment(format!(
            "LibreOffice executable '{}' was not found. Install LibreOffice or point \
             LIBREOFFICE_PATH / --libreoffice-path at the soffice binary.",
            binary.display()
        ))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) | Self::Template(_) => ErrorKind::InvalidInput,
            Self::ConversionFailed { .. } => ErrorKind::ConversionFailed,
            Self::Environment(_) => ErrorKind::EnvironmentError,
            Self::Io { .. } => ErrorKind::InternalError,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ConversionFailed {
                reason: FailureReason::TimedOut(_),
                ..
            }
        )
    }
}

fn diagnostics_suffix(diagnostics: &str) -> String {
    let trimmed = diagnostics.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {trimmed}")
    }
}

impl From<ConvertError> for HttpResponse {
    fn from(error: ConvertError) -> Self {
        let body = ErrorResponse::new(error.kind().as_str(), &error.to_string());
        match error.kind() {
            ErrorKind::InvalidInput => HttpResponse::BadRequest().json(body),
            ErrorKind::ConversionFailed => HttpResponse::BadGateway().json(body),
            ErrorKind::EnvironmentError => HttpResponse::ServiceUnavailable().json(body),
            ErrorKind::InternalError => HttpResponse::InternalServerError().json(body),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;

    #[test]
    fn test_conversion_failed_includes_diagnostics() {
        let err = ConvertError::ConversionFailed {
            reason: FailureReason::ExitStatus(Some(81)),
            diagnostics: "  Error: source file could not be loaded\n".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "conversion failed: converter exited with status 81: Error: source file could not be loaded"
        );
        assert_eq!(err.kind(), ErrorKind::ConversionFailed);
    }

    #[test]
    fn test_timeout_reason_is_reported() {
        let err = ConvertError::ConversionFailed {
            reason: FailureReason::TimedOut(Duration::from_secs(3)),
            diagnostics: String::new(),
        };
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "conversion failed: timed out after 3s");
    }

    #[test]
    fn test_http_status_mapping() {
        let cases = [
            (ConvertError::invalid("nope"), StatusCode::BAD_REQUEST),
            (
                ConvertError::missing_binary(std::path::Path::new("soffice")),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ConvertError::ConversionFailed {
                    reason: FailureReason::ExitStatus(None),
                    diagnostics: String::new(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                ConvertError::io("write", std::io::Error::other("disk full")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            let response: HttpResponse = err.into();
            assert_eq!(response.status(), status);
        }
    }
}
