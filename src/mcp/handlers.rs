//! MCP over HTTP.
//!
//! `/mcp` (and `/sse`) take stateless JSON-RPC POSTs; every request is
//! independent. `/mcp/list-tools` and `/mcp/invoke/{tool_name}` offer the same
//! tools as plain REST calls.

use actix_web::{web, HttpResponse, Responder};
use serde_json::{json, Value};

use crate::mcp::rpc::OutboundResponse;
use crate::mcp::service::McpService;
use crate::mcp::tools::ToolError;
use crate::ErrorResponse;

/// RPC handler - POST /mcp
pub async fn rpc_handler(service: web::Data<McpService>, body: web::Bytes) -> impl Responder {
    let message = match std::str::from_utf8(&body) {
        Ok(message) => message,
        Err(err) => {
            return HttpResponse::Ok().json(OutboundResponse::parse_error(format!(
                "Parse error: {err}"
            )))
        }
    };
    log::info!("Received MCP message ({} bytes)", body.len());

    match service.handle_message(message).await {
        Some(response) => HttpResponse::Ok().json(response),
        // Notifications return 202 Accepted
        None => HttpResponse::Accepted().finish(),
    }
}

/// GET /mcp/list-tools
pub async fn list_tools(service: web::Data<McpService>) -> impl Responder {
    let tools: Vec<Value> = service
        .registry()
        .list_tools()
        .into_iter()
        .map(|tool| {
            json!({
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.input_schema,
            })
        })
        .collect();
    HttpResponse::Ok().json(json!({ "tools": tools }))
}

/// POST /mcp/invoke/{tool_name}
pub async fn invoke_tool(
    service: web::Data<McpService>,
    path: web::Path<String>,
    body: Option<web::Json<Value>>,
) -> HttpResponse {
    let tool_name = path.into_inner();
    let arguments = body.map(web::Json::into_inner);

    match service.registry().invoke(&tool_name, arguments).await {
        Ok(output) => HttpResponse::Ok().json(json!({
            "result": output.structured,
            "message": output.summary,
            "isError": output.is_error,
        })),
        Err(err @ ToolError::UnknownTool(_)) => {
            HttpResponse::NotFound().json(ErrorResponse::not_found(&err.to_string()))
        }
        Err(err @ ToolError::InvalidArguments(_)) => {
            HttpResponse::BadRequest().json(ErrorResponse::new("InvalidInput", &err.to_string()))
        }
        Err(ToolError::Failed(err)) => err.into(),
    }
}

/// Configure MCP routes.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/mcp").route(web::post().to(rpc_handler)))
        .service(web::resource("/mcp/list-tools").route(web::get().to(list_tools)))
        .service(web::resource("/mcp/invoke/{tool_name}").route(web::post().to(invoke_tool)));

    // Same endpoint under the legacy SSE path.
    cfg.service(web::resource("/sse").route(web::post().to(rpc_handler)));
}
