//! Command-line entry point for serplens.

use clap::Parser;
use serplens::cli::{cmd_analyze, cmd_info, cmd_interactive, cmd_serve, Cli, Commands};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "serplens=info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    match Cli::parse().command {
        Some(Commands::Analyze { data, model, top }) => cmd_analyze(&data, model.as_deref(), top),
        Some(Commands::Info { data }) => cmd_info(&data),
        Some(Commands::Serve { port, host }) => cmd_serve(&host, port).await,
        // No subcommand drops into the interactive launcher
        None => cmd_interactive().await,
    }
}
