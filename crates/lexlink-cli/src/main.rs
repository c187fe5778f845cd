//! Lexlink CLI entry point.

use anyhow::Result;
use clap::Parser;
use lexlink::{Cli, commands, config::CliConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::new(log_level))
        .init();

    let config = match &cli.config {
        Some(path) => CliConfig::from_file(path)?,
        None => CliConfig::load(),
    };

    commands::dispatch(cli.command, &config).await
}
