//! HTTP surface: multipart uploads in, JSON (or the PDF itself) out.

pub mod handlers;
pub mod models;
pub mod multipart_parser;

use actix_web::web;

/// Register conversion routes under `/api` and at the root.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(
                web::resource("/convert-to-pdf").route(web::post().to(handlers::convert_to_pdf)),
            )
            .service(
                web::resource("/generate-form-letters")
                    .route(web::post().to(handlers::generate_form_letters)),
            ),
    )
    .service(web::resource("/convert-to-pdf").route(web::post().to(handlers::convert_to_pdf)))
    .service(
        web::resource("/generate-form-letters")
            .route(web::post().to(handlers::generate_form_letters)),
    )
    .service(web::resource("/metrics").route(web::get().to(handlers::metrics)));
}
