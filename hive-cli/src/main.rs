//! Hive CLI - Command-line interface for the Hive match server
//!
//! ## Commands
//!
//! - `serve`: Start the match server
//! - `selfplay`: Play bot-vs-bot games on the same engine

mod selfplay;
mod serve;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "hive")]
#[command(version, about = "Hive king-of-the-hill match server")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the match server
    Serve(serve::ServeArgs),

    /// Play bot-vs-bot games on the engine
    Selfplay(selfplay::SelfplayArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    initialize_logging(cli.verbose);

    dispatch_command(cli)
}

/// Initialize tracing/logging based on verbosity
fn initialize_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("hive=debug,info")
    } else {
        EnvFilter::new("hive=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Dispatch to the appropriate command handler
fn dispatch_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve(args) => serve::run(args),
        Commands::Selfplay(args) => selfplay::run(args),
    }
}
