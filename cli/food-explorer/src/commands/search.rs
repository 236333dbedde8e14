use anyhow::Result;
use clap::Args;
use food_catalog::{ClientTrait, Product, SearchController, SearchControllerConfig, SortKey};
use tracing::{debug, instrument};

/// Search the catalog
#[derive(Debug, Args)]
pub struct Search {
    /// Free text to search for; omit to browse popular products
    pub term: Option<String>,

    /// Only show products in this category
    #[arg(short, long)]
    pub category: Option<String>,

    /// Order of the results: name-asc, name-desc, nutrition-asc, nutrition-desc
    #[arg(short, long, value_name = "KEY")]
    pub sort: Option<SortKey>,

    /// Number of result pages to load
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub pages: u32,

    /// Display results as a JSON array
    #[arg(long)]
    pub json: bool,
}

impl Search {
    #[instrument(name = "search", skip_all, fields(term = ?self.term, category = ?self.category, pages = self.pages))]
    pub async fn handle<C>(self, client: C, config: SearchControllerConfig) -> Result<()>
    where
        C: ClientTrait + Send + Sync + 'static,
    {
        let json = self.json;
        let (products, has_more) = self.load(client, config).await;

        if json {
            debug!("printing search results as JSON");
            println!("{}", serde_json::to_string_pretty(&products)?);
        } else {
            print!("{}", render_results(&products, has_more));
        }
        Ok(())
    }

    /// Load the requested pages and return the sorted results, and whether
    /// more are available.
    async fn load<C>(self, client: C, config: SearchControllerConfig) -> (Vec<Product>, bool)
    where
        C: ClientTrait + Send + Sync + 'static,
    {
        let controller = SearchController::with_filters(
            client,
            config,
            self.term.unwrap_or_default(),
            self.category.unwrap_or_default(),
        );
        controller.set_sort(self.sort.unwrap_or_default());

        for _ in 0..self.pages {
            controller.load_next_page().await;
            if !controller.snapshot().has_more {
                break;
            }
        }

        (controller.products(), controller.snapshot().has_more)
    }
}

fn render_results(products: &[Product], has_more: bool) -> String {
    if products.is_empty() {
        return "No products found\n".to_string();
    }

    let code_width = products.iter().map(|p| p.code.len()).max().unwrap_or(0);
    let mut out = String::new();
    for product in products {
        out.push_str(&format!(
            "{code:<code_width$}  [{grade:>3}]  {name}",
            code = product.code,
            grade = product.grade_label(),
            name = product.name.as_deref().unwrap_or_default(),
        ));
        if let Some(brands) = &product.brands {
            out.push_str(&format!(" ({brands})"));
        }
        if let Some(category) = product.primary_category() {
            out.push_str(&format!(" - {category}"));
        }
        out.push('\n');
    }

    out.push_str(&format!("\n{} products\n", products.len()));
    if has_more {
        out.push_str("Use '--pages' to load more results\n");
    }
    out
}
