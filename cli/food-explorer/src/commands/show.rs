use anyhow::{Context, Result};
use clap::Args;
use food_catalog::{ClientTrait, NUTRITION_FACTS, Product};
use indoc::formatdoc;
use itertools::Itertools;
use tracing::instrument;

const NOT_FOUND: &str = "Product not found in our database";
const INGREDIENTS_EXCERPT_CHARS: usize = 80;
const SHOWN_CATEGORIES: usize = 3;

/// Show the details of a product
#[derive(Debug, Args)]
pub struct Show {
    /// Barcode of the product
    pub barcode: String,

    /// Display the product as JSON
    #[arg(long)]
    pub json: bool,
}

impl Show {
    #[instrument(name = "show", skip_all, fields(barcode = self.barcode))]
    pub async fn handle(self, client: impl ClientTrait) -> Result<()> {
        let product = client
            .product_by_code(&self.barcode)
            .await
            .with_context(|| format!("failed to look up product '{}'", self.barcode))?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&product)?);
            return Ok(());
        }

        match product {
            Some(product) => print!("{}", render_product(&product)),
            None => println!("{NOT_FOUND}"),
        }
        Ok(())
    }
}

fn render_product(product: &Product) -> String {
    let mut out = formatdoc! {"
        {name}
        Barcode:     {code}
        Brand:       {brands}
        Quantity:    {quantity}
        Nutri-Score: {grade}
        Image:       {image}

        Nutrition facts (per 100g)
        ",
        name = product.name.as_deref().unwrap_or("Unnamed product"),
        code = product.code,
        brands = product.brands.as_deref().unwrap_or("N/A"),
        quantity = product.quantity.as_deref().unwrap_or("N/A"),
        grade = product.grade_label(),
        image = product.detail_image_url(),
    };

    for fact in NUTRITION_FACTS {
        let amount = product
            .nutriments
            .per_100g(fact.nutrient)
            .map(|amount| format!("{amount} {}", fact.unit))
            .unwrap_or_else(|| "N/A".to_string());
        out.push_str(&format!("  {:<14}{amount}\n", fact.label));
    }

    if let Some(ingredients) = product.ingredients_excerpt(INGREDIENTS_EXCERPT_CHARS) {
        out.push_str(&format!("\nIngredients: {ingredients}\n"));
    }

    let labels = product.labels().join(", ");
    if !labels.is_empty() {
        out.push_str(&format!("Labels:      {labels}\n"));
    }

    let categories = product.categories_list().take(SHOWN_CATEGORIES).join(", ");
    if !categories.is_empty() {
        out.push_str(&format!("Categories:  {categories}\n"));
    }
    out
}
