use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::client::{ClientTrait, fallback_categories};
use crate::error::CatalogClientError;
use crate::types::{Product, SearchQuery};

pub type MockField<T> = Arc<Mutex<T>>;

/// A catalog client that can be seeded with mock responses.
///
/// Clones share their state, so a test can keep a handle to inspect the
/// requests a consumer made through another clone.
#[derive(Debug, Default, Clone)]
pub struct MockClient {
    /// Pages returned by successive searches; an exhausted queue yields
    /// empty pages.
    pub search_pages: MockField<VecDeque<Vec<Product>>>,
    /// Every search request, in the order it was made.
    pub search_requests: MockField<Vec<SearchQuery>>,
    pub products: MockField<HashMap<String, Product>>,
    pub categories: MockField<Option<Vec<String>>>,
    /// Simulated upstream latency for searches.
    pub search_delay: MockField<Option<Duration>>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a new page into the list of mock search responses
    pub fn push_search_page(&self, page: Vec<Product>) {
        self.search_pages
            .lock()
            .expect("couldn't acquire mock lock")
            .push_back(page);
    }

    /// Make `product` known under its code
    pub fn insert_product(&self, product: Product) {
        self.products
            .lock()
            .expect("couldn't acquire mock lock")
            .insert(product.code.clone(), product);
    }

    pub fn set_categories(&self, categories: Vec<String>) {
        *self.categories.lock().expect("couldn't acquire mock lock") = Some(categories);
    }

    pub fn set_search_delay(&self, delay: Duration) {
        *self.search_delay.lock().expect("couldn't acquire mock lock") = Some(delay);
    }

    /// The search requests made so far.
    pub fn search_requests(&self) -> Vec<SearchQuery> {
        self.search_requests
            .lock()
            .expect("couldn't acquire mock lock")
            .clone()
    }
}

impl ClientTrait for MockClient {
    async fn search_products(&self, query: &SearchQuery) -> Vec<Product> {
        self.search_requests
            .lock()
            .expect("couldn't acquire mock lock")
            .push(query.clone());
        let delay = *self.search_delay.lock().expect("couldn't acquire mock lock");
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.search_pages
            .lock()
            .expect("couldn't acquire mock lock")
            .pop_front()
            .unwrap_or_default()
    }

    async fn product_by_code(&self, code: &str) -> Result<Option<Product>, CatalogClientError> {
        Ok(self
            .products
            .lock()
            .expect("couldn't acquire mock lock")
            .get(code.trim())
            .cloned())
    }

    async fn list_categories(&self) -> Vec<String> {
        self.categories
            .lock()
            .expect("couldn't acquire mock lock")
            .clone()
            .unwrap_or_else(fallback_categories)
    }
}
