mod api_client;
mod chat;
mod cli;
mod commands;
mod config;
mod errors;
mod models;
mod session;
mod stub;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::Cli;
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first (every variable has a default)
    let config = Config::from_env()?;

    // -v / -vv override RUST_LOG for our own target
    let level = match cli.verbose {
        0 => config.rust_log.as_str(),
        1 => "debug",
        _ => "trace",
    };

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={level}", env!("CARGO_PKG_NAME")))
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting MMD client v{}", env!("CARGO_PKG_VERSION"));

    commands::dispatch(cli, config).await
}
