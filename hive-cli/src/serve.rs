//! Serve command - start the match server

use anyhow::Result;
use clap::Args;

use hive_server::{run_server, ServerConfig};

#[derive(Args)]
pub struct ServeArgs {
    /// Port number to listen on
    #[arg(long, default_value = "8002")]
    pub port: u16,

    /// Allowed browser origin (repeatable)
    #[arg(long = "origin")]
    pub origins: Vec<String>,

    /// Development mode: relax origin enforcement
    #[arg(long)]
    pub dev: bool,
}

/// Run serve command
pub fn run(args: ServeArgs) -> Result<()> {
    let config = configure_server(&args);

    tracing::info!("Starting Hive match server on port {}", config.port);
    if config.dev_mode {
        tracing::warn!("development mode: origin checks are off");
    }

    start_server(config)
}

fn configure_server(args: &ServeArgs) -> ServerConfig {
    ServerConfig {
        port: args.port,
        allowed_origins: args.origins.clone(),
        dev_mode: args.dev,
    }
}

/// Start the server (blocking)
fn start_server(config: ServerConfig) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;

    runtime.block_on(async { run_server(config).await })
}
