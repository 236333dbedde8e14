//! Catalog interaction types.
//!
//! These types represent the domain model for catalog operations. Upstream
//! records are loosely typed (fields go missing, numbers arrive as strings and
//! vice versa), so decoding is lenient and normalizes into the shapes below.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Image shown when a product has no image of its own.
pub const PLACEHOLDER_IMAGE_URL: &str =
    "https://images.unsplash.com/photo-1546069901-ba9599a7e63c?w=800&h=800&fit=crop";

/// Fields requested for search results.
pub(crate) const SEARCH_FIELDS: &str = "code,product_name,image_front_small_url,categories,ingredients_text,nutrition_grade_fr,brands";

/// Fields requested for a single product.
pub(crate) const PRODUCT_FIELDS: &str = "code,product_name,image_front_url,image_front_small_url,categories,ingredients_text,nutrition_grade_fr,nutriments,labels,brands,quantity";

/// Fields requested when sampling products for their categories.
pub(crate) const CATEGORY_SAMPLE_FIELDS: &str = "categories";

/// Upstream ordering requested for searches: most scanned first.
pub(crate) const UPSTREAM_SORT: &str = "unique_scans_n";

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

/// A product record as returned by the catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(default, deserialize_with = "text_or_number")]
    pub code: String,
    #[serde(rename = "product_name", default, deserialize_with = "optional_text")]
    pub name: Option<String>,
    #[serde(
        rename = "image_front_small_url",
        default,
        deserialize_with = "optional_text"
    )]
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub image_front_url: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub categories: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub ingredients_text: Option<String>,
    #[serde(
        rename = "nutrition_grade_fr",
        default,
        deserialize_with = "optional_grade"
    )]
    pub nutrition_grade: Option<NutritionGrade>,
    #[serde(default)]
    pub nutriments: Nutriments,
    #[serde(rename = "labels", default, deserialize_with = "optional_text")]
    pub labels_text: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub brands: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub quantity: Option<String>,
}

impl Product {
    /// Whether the record carries everything a result listing displays.
    pub fn is_listable(&self) -> bool {
        !self.code.is_empty() && self.name.is_some() && self.image_url.is_some()
    }

    /// The first listed category, used as the product's tag.
    pub fn primary_category(&self) -> Option<&str> {
        self.categories_list().next()
    }

    pub fn categories_list(&self) -> impl Iterator<Item = &str> {
        split_list(self.categories.as_deref())
    }

    /// Certification labels, e.g. "Organic", "Fair trade".
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        split_list(self.labels_text.as_deref())
    }

    /// The first `max_chars` characters of the ingredients, followed by an
    /// ellipsis when anything was cut.
    pub fn ingredients_excerpt(&self, max_chars: usize) -> Option<String> {
        let text = self.ingredients_text.as_deref()?;
        match text.char_indices().nth(max_chars) {
            Some((cut, _)) => Some(format!("{}...", &text[..cut])),
            None => Some(text.to_string()),
        }
    }

    /// Large image for detail views, falling back to the thumbnail and then to
    /// a placeholder.
    pub fn detail_image_url(&self) -> &str {
        self.image_front_url
            .as_deref()
            .or(self.image_url.as_deref())
            .unwrap_or(PLACEHOLDER_IMAGE_URL)
    }

    /// Upper case grade letter, or `N/A` for unrated products.
    pub fn grade_label(&self) -> String {
        self.nutrition_grade
            .map(|grade| grade.to_string())
            .unwrap_or_else(|| "N/A".to_string())
    }
}

fn split_list(list: Option<&str>) -> impl Iterator<Item = &str> {
    list.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
}

// ---------------------------------------------------------------------------
// Nutrition grade
// ---------------------------------------------------------------------------

/// Nutritional classification from A (best) to E (worst).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NutritionGrade {
    A,
    B,
    C,
    D,
    E,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("'{0}' is not a nutrition grade")]
pub struct InvalidGrade(String);

impl NutritionGrade {
    /// Lower case letter, the form upstream uses.
    pub fn letter(self) -> char {
        match self {
            NutritionGrade::A => 'a',
            NutritionGrade::B => 'b',
            NutritionGrade::C => 'c',
            NutritionGrade::D => 'd',
            NutritionGrade::E => 'e',
        }
    }
}

impl FromStr for NutritionGrade {
    type Err = InvalidGrade;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a" => Ok(NutritionGrade::A),
            "b" => Ok(NutritionGrade::B),
            "c" => Ok(NutritionGrade::C),
            "d" => Ok(NutritionGrade::D),
            "e" => Ok(NutritionGrade::E),
            _ => Err(InvalidGrade(s.to_string())),
        }
    }
}

impl Display for NutritionGrade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.letter().to_ascii_uppercase())
    }
}

// ---------------------------------------------------------------------------
// Nutrient panel
// ---------------------------------------------------------------------------

/// Nutrient amounts keyed by upstream name, e.g. `fat_100g`.
///
/// Non-numeric entries (units, labels) are dropped while decoding.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Nutriments(BTreeMap<String, f64>);

impl Nutriments {
    /// Amount per 100g/ml of the nutrient called `name`, e.g. `energy-kcal`.
    pub fn per_100g(&self, name: &str) -> Option<f64> {
        self.0.get(&format!("{name}_100g")).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, f64)> for Nutriments {
    fn from_iter<T: IntoIterator<Item = (String, f64)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'de> Deserialize<'de> for Nutriments {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<serde_json::Map<String, Value>>::deserialize(deserializer)?;
        Ok(raw
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(key, value)| {
                let amount = match value {
                    Value::Number(number) => number.as_f64(),
                    Value::String(text) => text.trim().parse().ok(),
                    _ => None,
                };
                amount.map(|amount| (key, amount))
            })
            .collect())
    }
}

/// A nutrient shown on a product's detail view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NutritionFact {
    pub label: &'static str,
    pub nutrient: &'static str,
    pub unit: &'static str,
}

/// The nutrients displayed for a product, in display order.
pub const NUTRITION_FACTS: [NutritionFact; 6] = [
    NutritionFact {
        label: "Energy",
        nutrient: "energy-kcal",
        unit: "kcal",
    },
    NutritionFact {
        label: "Fat",
        nutrient: "fat",
        unit: "g",
    },
    NutritionFact {
        label: "Carbohydrates",
        nutrient: "carbohydrates",
        unit: "g",
    },
    NutritionFact {
        label: "Sugars",
        nutrient: "sugars",
        unit: "g",
    },
    NutritionFact {
        label: "Proteins",
        nutrient: "proteins",
        unit: "g",
    },
    NutritionFact {
        label: "Salt",
        nutrient: "salt",
        unit: "g",
    },
];

// ---------------------------------------------------------------------------
// Requests and upstream responses
// ---------------------------------------------------------------------------

/// The effective parameters of a search page request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchQuery {
    /// Free text; blank means "no text filter".
    pub text: String,
    /// Category the results must contain; blank means "no category filter".
    pub category: String,
    /// 1-based page number.
    pub page: u32,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            category: String::new(),
            page: 1,
        }
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self::new("")
    }
}

/// Body of `GET /search`.
#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default, deserialize_with = "lenient_products")]
    pub products: Vec<Product>,
}

/// Body of `GET /product/{code}.json`.
#[derive(Debug, Deserialize)]
pub(crate) struct ProductResponse {
    #[serde(default)]
    pub status: Option<i64>,
    #[serde(default)]
    pub product: Option<Product>,
}

// ---------------------------------------------------------------------------
// Lenient field decoding
// ---------------------------------------------------------------------------

fn optional_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(text)) if !text.trim().is_empty() => Some(text),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    })
}

fn text_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(optional_text(deserializer)?
        .map(|code| code.trim().to_string())
        .unwrap_or_default())
}

fn optional_grade<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<NutritionGrade>, D::Error> {
    Ok(optional_text(deserializer)?.and_then(|grade| grade.parse().ok()))
}

/// Decode a product list, skipping entries that are not objects at all.
fn lenient_products<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Product>, D::Error> {
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|value| serde_json::from_value(value).ok())
        .collect())
}
