//! Entry point for the `gatewatch` binary.

use anyhow::Result;
use clap::{Parser, Subcommand};
use gatewatch_cli::commands;
use gatewatch_core::{PipelineConfig, StateStore};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gatewatch")]
#[command(about = "Three-phase CI integration for a quality-gate analysis server")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to gatewatch.toml, then the XDG path)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the endpoint, negotiate capabilities, stage the scanner
    Prepare,
    /// Invoke the scanner and sanitize the persisted property map
    Analyze,
    /// Poll analyses, render quality gates, aggregate the build outcome
    Publish,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        tracing::error!("{e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = PipelineConfig::load_with_env(cli.config.as_deref())?;
    let state = StateStore::new(config.state_path());

    match cli.command {
        Commands::Prepare => commands::prepare::execute(&config, &state).await?,
        Commands::Analyze => commands::analyze::execute(&config, &state).await?,
        Commands::Publish => commands::publish::execute(&config, &state).await?,
    }
    Ok(())
}
