use anyhow::Result;
use clap::Args;
use food_catalog::ClientTrait;
use tracing::instrument;

/// List categories to filter searches by
#[derive(Debug, Args)]
pub struct Categories {
    /// Display categories as a JSON array
    #[arg(long)]
    pub json: bool,
}

impl Categories {
    #[instrument(name = "categories", skip_all)]
    pub async fn handle(self, client: impl ClientTrait) -> Result<()> {
        let categories = client.list_categories().await;
        if self.json {
            println!("{}", serde_json::to_string_pretty(&categories)?);
        } else {
            for category in categories {
                println!("{category}");
            }
        }
        Ok(())
    }
}
