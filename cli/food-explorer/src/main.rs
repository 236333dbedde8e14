use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;

use crate::commands::FoodExplorerCli;
use crate::config::Config;
use crate::logger::init_logger;

mod commands;
mod config;
mod logger;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = FoodExplorerCli::parse();
    init_logger(cli.verbose).context("failed to initialize logger")?;

    let config = Config::parse()?;
    debug!(?config, "loaded configuration");

    cli.command.handle(config).await
}
