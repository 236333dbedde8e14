use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use food_catalog::CatalogClient;
use tracing::debug;

use crate::config::Config;

mod categories;
mod search;
mod show;

pub use categories::Categories;
pub use search::Search;
pub use show::Show;

const SHORT_HELP: &str = "Browse the Open Food Facts product catalog.";
const LONG_HELP: &str = "Browse the Open Food Facts product catalog.

Search products by name and category, inspect a product's nutrition facts by
its barcode and list the categories to filter by. Responses are cached in
memory and, unless disabled, on disk.";

#[derive(Debug, Parser)]
#[command(version, about = SHORT_HELP, long_about = LONG_HELP)]
pub struct FoodExplorerCli {
    /// Increase logging verbosity (repeatable)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Search(Search),
    Show(Show),
    Categories(Categories),
}

impl Command {
    pub async fn handle(self, config: Config) -> Result<()> {
        let client = CatalogClient::new(config.catalog_client_config())
            .context("failed to create catalog client")?;
        debug!(?client, "created catalog client");

        match self {
            Command::Search(args) => args.handle(client, config.controller_config()).await,
            Command::Show(args) => args.handle(client).await,
            Command::Categories(args) => args.handle(client).await,
        }
    }
}
