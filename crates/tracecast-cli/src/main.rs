//! CLI entry point - the composition root.

use std::sync::Arc;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use tracecast_cli::{Cli, Commands, JsonFilePreferenceStore, handlers};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise info, or debug with --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let store = Arc::new(JsonFilePreferenceStore::new(cli.prefs));

    match command {
        Commands::Demo {
            algorithm,
            playback,
        } => handlers::demo::execute(store, algorithm, playback).await?,
        Commands::Prefs { command } => handlers::prefs::execute(store, command).await?,
    }

    Ok(())
}
