//! MCP (Model Context Protocol) Module
//!
//! JSON-RPC 2.0 over HTTP and over stdio, both backed by one `McpService`.

pub mod content;
pub mod handlers;
pub mod rpc;
pub mod service;
pub mod stdio;
pub mod tools;

pub use handlers::config;
pub use service::McpService;
pub use tools::ToolRegistry;
