mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| level.into()),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Inspect {
            file,
            tolerance,
            params,
        } => commands::inspect(&file, tolerance, params, cli.format).await,
        Commands::Codegen { file, tolerance } => {
            commands::codegen(&file, tolerance, cli.format).await
        }
    }
}
