use actix_cors::Cors;
use actix_web::middleware::Compress;
use actix_web::{http::header, web, App, HttpServer};
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

pub mod api;
pub mod config;
pub mod converter;
pub mod docx;
pub mod error;
pub mod letters;
pub mod mcp;
pub mod metrics;
pub mod state;
pub mod workspace;

pub use crate::config::AppConfig;
pub use crate::error::ConvertError;
pub use crate::state::AppState;

/// Request bodies above this size are rejected for JSON and raw payloads.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_type: &str, message: &str) -> Self {
        Self {
            error: error_type.to_string(),
            message: message.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn not_found(message: &str) -> Self {
        Self::new("NotFound", message)
    }

    pub fn internal_error(message: &str) -> Self {
        Self::new("InternalError", message)
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::handlers::convert_to_pdf,
        crate::api::handlers::generate_form_letters,
    ),
    components(
        schemas(
            api::models::ConversionResponse,
            api::models::FormLetterResponse,
            api::models::ConvertUploadForm,
            api::models::FormLetterUploadForm,
            letters::RecipientOutcome,
            letters::RecipientStatus,
            letters::OutputFormat,
            error::ErrorKind,
            ErrorResponse,
        )
    ),
    tags(
        (name = "Conversion", description = "Document to PDF conversion through LibreOffice."),
        (name = "Form Letters", description = "DOCX template mail merge.")
    )
)]
pub struct ApiDoc;

/// Mount every HTTP route: REST API, MCP endpoints and metrics.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().limit(MAX_BODY_BYTES))
        .app_data(web::PayloadConfig::new(MAX_BODY_BYTES))
        .configure(api::config)
        .configure(mcp::config);
}

fn cors(allowed_origins: &[String]) -> Cors {
    let cors = if allowed_origins.iter().any(|o| o == "*") {
        Cors::default().allow_any_origin()
    } else {
        allowed_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
    };

    cors.allowed_methods(vec!["GET", "POST", "OPTIONS"])
        .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
        .max_age(3600)
}

pub async fn run(config: AppConfig) -> std::io::Result<()> {
    let state = AppState::new(config)
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err))?;

    match state.converter.check_environment().await {
        Ok(version) => log::info!("Using {}", version),
        Err(err) => log::warn!("LibreOffice check failed, conversions will fail: {}", err),
    }

    let mcp_service = web::Data::new(mcp::McpService::new(mcp::ToolRegistry::from_state(&state)));
    let server = state.config.server.clone();
    let app_state = web::Data::new(state);

    log::info!("Starting server at http://{}:{}", server.host, server.port);

    let origins = server.allowed_origins.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(Compress::default())
            .wrap(cors(&origins))
            .app_data(app_state.clone())
            .app_data(mcp_service.clone())
            .configure(configure)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
    })
    .keep_alive(actix_web::http::KeepAlive::Os)
    .bind((server.host.as_str(), server.port))?
    .run()
    .await
}
