use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{ArgAction, Parser, Subcommand};

use libreoffice_mcp_server::config::AppConfig;
use libreoffice_mcp_server::mcp::{stdio, McpService, ToolRegistry};
use libreoffice_mcp_server::AppState;

#[derive(Debug, Parser)]
#[command(
    name = "libreoffice-mcp-server",
    version,
    about = "Convert documents to PDF and generate form letters with LibreOffice, over HTTP or MCP stdio"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to the soffice executable (overrides LIBREOFFICE_PATH)
    #[arg(short = 'r', long, global = true)]
    libreoffice_path: Option<PathBuf>,

    /// Conversion timeout in seconds (overrides CONVERSION_TIMEOUT_SECS)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Address to bind the HTTP server to
    #[arg(long, global = true)]
    host: Option<String>,

    /// Port for the HTTP server
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum Command {
    /// Serve the REST API and MCP over HTTP (default)
    Serve,
    /// Speak MCP over stdin/stdout
    Stdio,
}

impl Cli {
    fn apply(&self, config: &mut AppConfig) -> anyhow::Result<()> {
        if let Some(path) = &self.libreoffice_path {
            config.converter.libreoffice_path = path.clone();
        }
        if let Some(secs) = self.timeout {
            if secs == 0 {
                bail!("--timeout must be at least one second");
            }
            config.converter.timeout = Duration::from_secs(secs);
        }
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        Ok(())
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .target(env_logger::Target::Stderr)
        .init();
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = AppConfig::from_env().context("invalid configuration")?;
    cli.apply(&mut config)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => libreoffice_mcp_server::run(config)
            .await
            .context("HTTP server failed")?,
        Command::Stdio => {
            let state = AppState::new(config).context("failed to initialise metrics")?;
            let service = McpService::new(ToolRegistry::from_state(&state));
            stdio::serve_stdio(service)
                .await
                .context("stdio transport failed")?;
        }
    }
    Ok(())
}
