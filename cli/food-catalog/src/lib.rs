//! Client and browsing core for the Open Food Facts product catalog.
//!
//! This crate provides:
//! - A cache-checked catalog client for product search, product lookup by
//!   barcode and category sampling
//! - In-memory and durable response caches with time based expiry
//! - A search controller with debounced text input, de-duplicating
//!   pagination and client side sorting
//! - A mock client for tests (feature-gated)
//!
//! ## Usage
//!
//! ```ignore
//! use food_catalog::{CatalogClient, CatalogClientConfig, SearchController};
//!
//! let client = CatalogClient::new(CatalogClientConfig::default())?;
//! let controller = SearchController::new(client, Default::default());
//! controller.submit_text("chocolate").await;
//! let products = controller.products();
//! ```

mod cache;
mod client;
mod config;
mod controller;
mod debounce;
mod error;
mod fetcher;
mod sort;
mod types;

#[cfg(any(test, feature = "tests"))]
mod mock;

// Public exports
pub use cache::{CacheKey, DurableCache, ResponseCache};
pub use client::{
    CatalogClient,
    ClientTrait,
    FALLBACK_CATEGORIES,
    aggregate_categories,
    fallback_categories,
};
pub use config::*;
pub use controller::{SearchController, SearchState};
pub use debounce::Debouncer;
pub use error::{CatalogClientError, FetchError};
pub use fetcher::HttpFetcher;
#[cfg(any(test, feature = "tests"))]
pub use mock::MockClient;
pub use sort::{SortKey, UnknownSortKey, sort_products};
pub use types::{
    InvalidGrade,
    NUTRITION_FACTS,
    Nutriments,
    NutritionFact,
    NutritionGrade,
    PLACEHOLDER_IMAGE_URL,
    Product,
    SearchQuery,
};
