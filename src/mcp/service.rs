//! MCP Service - core JSON-RPC 2.0 request handler shared by the HTTP and
//! stdio transports.

use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::mcp::rpc::{OutboundResponse, RpcRequest};
use crate::mcp::tools::{ToolDescriptor, ToolRegistry};

pub const PROTOCOL_VERSION: &str = "2024-11-05";
const SERVER_TITLE: &str = "LibreOffice Document Server";
const INSTRUCTIONS: &str = concat!(
    "Converts office documents to PDF and fills DOCX templates with ",
    "{{field}} placeholders. Paths refer to the server's filesystem."
);

#[derive(Clone)]
pub struct McpService {
    registry: Arc<ToolRegistry>,
}

impl McpService {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Handle one request. Notifications yield `None`.
    pub async fn handle_request(&self, request: RpcRequest) -> Option<OutboundResponse> {
        if request.jsonrpc != "2.0" {
            warn!("received unsupported jsonrpc version: {}", request.jsonrpc);
            return Some(OutboundResponse::invalid_request(
                request.id.clone(),
                "Unsupported jsonrpc version (expected 2.0)",
            ));
        }

        let RpcRequest {
            method, params, id, ..
        } = request;
        debug!("dispatching {}", method);

        match method.as_str() {
            "initialize" => Some(self.handle_initialize(id, params)),
            "tools/list" => Some(self.handle_list_tools(id)),
            "tools/call" => Some(self.handle_call_tool(id, params).await),
            "ping" => Some(OutboundResponse::success(id, json!({}))),
            method if method.starts_with("notifications/") => {
                info!("received client notification: {}", method);
                None
            }
            other => Some(OutboundResponse::method_not_found(id, other)),
        }
    }

    /// Parse and handle one raw JSON-RPC message.
    pub async fn handle_message(&self, raw: &str) -> Option<OutboundResponse> {
        let value: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(err) => return Some(OutboundResponse::parse_error(format!("Parse error: {err}"))),
        };
        let id = value.get("id").cloned();
        match serde_json::from_value::<RpcRequest>(value) {
            Ok(request) => self.handle_request(request).await,
            Err(err) => Some(OutboundResponse::invalid_request(
                id,
                format!("Invalid request: {err}"),
            )),
        }
    }

    fn handle_initialize(&self, id: Option<Value>, params: Option<Value>) -> OutboundResponse {
        let parsed: InitializeParams = match parse_optional_params(params) {
            Ok(value) => value,
            Err(message) => return OutboundResponse::invalid_params(id, message),
        };

        let client = parsed.client_info.unwrap_or_default();
        info!(
            "client requested initialization: {} v{} (protocol {})",
            client.name.as_deref().unwrap_or("unknown"),
            client.version.as_deref().unwrap_or("unknown"),
            parsed.protocol_version.as_deref().unwrap_or("unspecified")
        );

        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            server_info: ImplementationInfo {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: Some(SERVER_TITLE.to_string()),
            },
            capabilities: ServerCapabilities {
                tools: ToolsCapability {
                    list_changed: false,
                },
            },
            instructions: INSTRUCTIONS.to_string(),
        };

        success(id, result)
    }

    fn handle_list_tools(&self, id: Option<Value>) -> OutboundResponse {
        let payload = ListToolsResult {
            tools: self.registry.list_tools(),
            next_cursor: None,
        };
        success(id, payload)
    }

    async fn handle_call_tool(&self, id: Option<Value>, params: Option<Value>) -> OutboundResponse {
        let parsed: CallToolParams = match parse_params(params) {
            Ok(value) => value,
            Err(message) => return OutboundResponse::invalid_params(id, message),
        };

        let result = self.registry.call_tool(&parsed.name, parsed.arguments).await;
        success(id, result)
    }
}

fn success<T: Serialize>(id: Option<Value>, payload: T) -> OutboundResponse {
    match serde_json::to_value(payload) {
        Ok(value) => OutboundResponse::success(id, value),
        Err(err) => OutboundResponse::internal_error(id, format!("Failed to encode result: {err}")),
    }
}

#[derive(Debug, Default, Deserialize)]
struct InitializeParams {
    #[serde(rename = "protocolVersion", default)]
    protocol_version: Option<String>,
    #[serde(rename = "clientInfo", default)]
    client_info: Option<ClientInfo>,
}

#[derive(Debug, Default, Deserialize)]
struct ClientInfo {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<String>,
}

#[derive(Debug, Serialize)]
struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    protocol_version: String,
    #[serde(rename = "serverInfo")]
    server_info: ImplementationInfo,
    capabilities: ServerCapabilities,
    instructions: String,
}

#[derive(Debug, Serialize)]
struct ImplementationInfo {
    name: String,
    version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
}

#[derive(Debug, Serialize)]
struct ServerCapabilities {
    tools: ToolsCapability,
}

#[derive(Debug, Serialize)]
struct ToolsCapability {
    #[serde(rename = "listChanged")]
    list_changed: bool,
}

#[derive(Debug, Serialize)]
struct ListToolsResult {
    tools: Vec<ToolDescriptor>,
    #[serde(rename = "nextCursor")]
    #[serde(skip_serializing_if = "Option::is_none")]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CallToolParams {
    name: String,
    #[serde(default)]
    arguments: Option<Value>,
}

fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, String> {
    match params {
        Some(value) => serde_json::from_value(value).map_err(|err| err.to_string()),
        None => serde_json::from_value(Value::Null).map_err(|err| err.to_string()),
    }
}

/// Like `parse_params`, but absent params mean defaults.
fn parse_optional_params<T: DeserializeOwned + Default>(params: Option<Value>) -> Result<T, String> {
    match params {
        None | Some(Value::Null) => Ok(T::default()),
        Some(value) => serde_json::from_value(value).map_err(|err| err.to_string()),
    }
}
