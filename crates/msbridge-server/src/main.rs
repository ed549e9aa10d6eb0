//! msbridge - MCP stdio server for Microsoft Graph and Azure Resource Manager
//!
//! Wires configuration, the dispatch engine, and the tool registry into a
//! line-delimited JSON-RPC loop on stdio. All diagnostics go to stderr;
//! stdout carries only JSON-RPC frames.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use msbridge_core::config::Config;
use msbridge_core::logging;
use msbridge_dispatch::Engine;
use msbridge_tools::ToolRegistry;

mod rpc;

#[derive(Debug, Parser)]
#[command(
    name = "msbridge",
    version,
    about = "MCP server bridging Microsoft Graph and Azure Resource Manager"
)]
struct Cli {
    /// Use alternate config file (credentials still come from the environment)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Verbose diagnostics on stderr (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::from_env(),
    };

    let level = match cli.verbose {
        0 => config.logging.level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    logging::init(&level);

    let errors = config.validate();
    if !errors.is_empty() {
        for error in &errors {
            tracing::error!(%error, "invalid configuration");
        }
        anyhow::bail!("invalid configuration ({} errors)", errors.len());
    }

    if !config.auth.is_complete() {
        tracing::warn!(
            "credentials not configured; dispatching tools will fail until \
             MSBRIDGE_TENANT_ID / MSBRIDGE_CLIENT_ID / MSBRIDGE_CLIENT_SECRET are set"
        );
    }

    let engine = Arc::new(Engine::new(config));
    let registry = Arc::new(ToolRegistry::with_defaults(engine));

    tracing::info!(tools = registry.len(), "msbridge ready on stdio");
    rpc::serve(registry).await
}
