//! Newline-delimited JSON-RPC over stdin/stdout.
//!
//! stdout carries protocol messages only; logging goes to stderr.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::mcp::service::McpService;

/// Serve the process's stdin/stdout until stdin closes.
pub async fn serve_stdio(service: McpService) -> std::io::Result<()> {
    log::info!("MCP stdio transport ready");
    serve(service, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await
}

/// Serve any line-oriented reader/writer pair.
pub async fn serve<R, W>(service: McpService, reader: R, mut writer: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(response) = service.handle_message(line).await {
            let mut encoded = serde_json::to_vec(&response)?;
            encoded.push(b'\n');
            writer.write_all(&encoded).await?;
            writer.flush().await?;
        }
    }
    log::info!("stdin closed, MCP stdio transport stopping");
    Ok(())
}
