//! Catalog client: cache-checked reads against the product database API.

use std::collections::BTreeSet;
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::cache::{CacheKey, DurableCache, ResponseCache};
use crate::config::CatalogClientConfig;
use crate::error::{CatalogClientError, FetchError};
use crate::fetcher::HttpFetcher;
use crate::types::*;

/// Categories offered when the catalog cannot be sampled.
pub const FALLBACK_CATEGORIES: [&str; 20] = [
    "Beverages",
    "Snacks",
    "Dairy",
    "Breakfasts",
    "Frozen foods",
    "Organic",
    "Gluten-free",
    "Vegetarian",
    "Chocolate",
    "Cookies",
    "Pasta",
    "Rice",
    "Sauces",
    "Soups",
    "Spices",
    "Tea",
    "Coffee",
    "Juices",
    "Water",
    "Yogurts",
];

// ---------------------------------------------------------------------------
// Catalog trait
// ---------------------------------------------------------------------------

/// The read operations the browsing layer needs from a catalog.
///
/// This trait enables alternate implementations:
/// - **HTTP**: [`CatalogClient`] against the product database API
/// - **Mock** (tests): canned pages without HTTP, see `MockClient`
pub trait ClientTrait {
    /// One page of listable products in upstream order.
    ///
    /// Never fails: an unreachable or misbehaving catalog yields an empty page,
    /// which callers treat as the end of the result set.
    fn search_products(&self, query: &SearchQuery) -> impl Future<Output = Vec<Product>> + Send;

    /// A single product by barcode, `None` if the catalog does not know it.
    fn product_by_code(
        &self,
        code: &str,
    ) -> impl Future<Output = Result<Option<Product>, CatalogClientError>> + Send;

    /// Category names for filtering, falling back to a fixed list on failure.
    fn list_categories(&self) -> impl Future<Output = Vec<String>> + Send;
}

impl<C: ClientTrait + Send + Sync> ClientTrait for Arc<C> {
    fn search_products(&self, query: &SearchQuery) -> impl Future<Output = Vec<Product>> + Send {
        (**self).search_products(query)
    }

    fn product_by_code(
        &self,
        code: &str,
    ) -> impl Future<Output = Result<Option<Product>, CatalogClientError>> + Send {
        (**self).product_by_code(code)
    }

    fn list_categories(&self) -> impl Future<Output = Vec<String>> + Send {
        (**self).list_categories()
    }
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

/// A client for the product database API.
///
/// Every request is looked up in the in-memory cache, then in the durable
/// cache (if configured), and only then sent upstream. Successful responses
/// are stored in both tiers.
pub struct CatalogClient {
    fetcher: HttpFetcher,
    memory_cache: Arc<ResponseCache>,
    durable_cache: Option<Arc<DurableCache>>,
    config: CatalogClientConfig,
}

impl Debug for CatalogClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogClient")
            .field("catalog_url", &self.config.catalog_url)
            .field("durable_cache", &self.durable_cache.as_ref().map(|c| c.path()))
            .finish_non_exhaustive()
    }
}

impl CatalogClient {
    /// Create a new catalog client with its own in-memory cache.
    pub fn new(config: CatalogClientConfig) -> Result<Self, CatalogClientError> {
        let memory_cache = Arc::new(ResponseCache::new(config.memory_cache_ttl));
        Self::with_cache(config, memory_cache)
    }

    /// Create a catalog client sharing an existing in-memory cache.
    pub fn with_cache(
        config: CatalogClientConfig,
        memory_cache: Arc<ResponseCache>,
    ) -> Result<Self, CatalogClientError> {
        // Fail early on an unusable base url rather than on the first request.
        base_url(&config.catalog_url)?;
        let fetcher = HttpFetcher::new(&config)?;
        let durable_cache = config
            .durable_cache
            .as_ref()
            .map(|durable| Arc::new(DurableCache::new(durable)));

        Ok(Self {
            fetcher,
            memory_cache,
            durable_cache,
            config,
        })
    }

    pub fn memory_cache(&self) -> &Arc<ResponseCache> {
        &self.memory_cache
    }

    /// Like [`ClientTrait::search_products`] but reports why a page could not
    /// be fetched.
    #[instrument(skip_all, fields(text = %query.text, category = %query.category, page = query.page))]
    pub async fn try_search_products(
        &self,
        query: &SearchQuery,
    ) -> Result<Vec<Product>, CatalogClientError> {
        let url = self.search_url(query)?;
        let response: SearchResponse = self.get_json(&url).await?;
        let received = response.products.len();

        let products = response
            .products
            .into_iter()
            .filter(Product::is_listable)
            .collect::<Vec<_>>();

        debug!(
            received,
            listable = products.len(),
            "received search page"
        );
        Ok(products)
    }

    /// Like [`ClientTrait::list_categories`] but reports why the sample could
    /// not be fetched instead of falling back.
    #[instrument(skip_all)]
    pub async fn try_list_categories(&self) -> Result<Vec<String>, CatalogClientError> {
        let url = self.category_sample_url()?;
        let response: SearchResponse = self.get_json(&url).await?;
        Ok(aggregate_categories(
            &response.products,
            self.config.category_limit,
        ))
    }

    fn search_url(&self, query: &SearchQuery) -> Result<Url, CatalogClientError> {
        let mut url = endpoint(&self.config.catalog_url, &["search"])?;
        {
            let mut params = url.query_pairs_mut();
            params
                .append_pair("json", "1")
                .append_pair("page", &query.page.max(1).to_string())
                .append_pair("page_size", &self.config.page_size.to_string())
                .append_pair("fields", SEARCH_FIELDS)
                .append_pair("sort_by", UPSTREAM_SORT);

            let text = query.text.trim();
            if !text.is_empty() {
                params.append_pair("search_terms", text);
            }

            let category = query.category.trim();
            if !category.is_empty() {
                params
                    .append_pair("tagtype_0", "categories")
                    .append_pair("tag_contains_0", "contains")
                    .append_pair("tag_0", category);
            }
        }
        Ok(url)
    }

    fn product_url(&self, code: &str) -> Result<Url, CatalogClientError> {
        let mut url = endpoint(&self.config.catalog_url, &["product", &format!("{code}.json")])?;
        url.query_pairs_mut().append_pair("fields", PRODUCT_FIELDS);
        Ok(url)
    }

    fn category_sample_url(&self) -> Result<Url, CatalogClientError> {
        let mut url = endpoint(&self.config.catalog_url, &["search"])?;
        url.query_pairs_mut()
            .append_pair("json", "1")
            .append_pair("page_size", &self.config.category_sample_size.to_string())
            .append_pair("fields", CATEGORY_SAMPLE_FIELDS)
            .append_pair("sort_by", UPSTREAM_SORT);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, CatalogClientError> {
        let value = self.fetch_cached(url).await?;
        Ok(serde_json::from_value(value).map_err(FetchError::Decode)?)
    }

    /// Serve `url` from the caches or fetch and remember it.
    async fn fetch_cached(&self, url: &Url) -> Result<Value, FetchError> {
        let key = CacheKey::from_url(url);

        if let Some(value) = self.memory_cache.get(&key) {
            debug!(%key, "serving response from memory cache");
            return Ok(value);
        }

        if let Some((value, remaining)) = self.durable_get(&key).await {
            debug!(%key, "serving response from durable cache");
            // Not past the durable entry's own expiry.
            self.memory_cache.put_for(key, value.clone(), remaining);
            return Ok(value);
        }

        let value = self.fetcher.fetch(url, self.config.request_timeout).await?;

        self.durable_put(&key, &value).await;
        self.memory_cache.put(key, value.clone());

        Ok(value)
    }

    /// Look `key` up in the durable cache off the async runtime.
    async fn durable_get(&self, key: &CacheKey) -> Option<(Value, Duration)> {
        let durable = Arc::clone(self.durable_cache.as_ref()?);
        let key = key.clone();
        tokio::task::spawn_blocking(move || durable.get(&key))
            .await
            .unwrap_or_else(|err| {
                warn!(%err, "durable cache lookup failed");
                None
            })
    }

    async fn durable_put(&self, key: &CacheKey, value: &Value) {
        let Some(durable) = self.durable_cache.as_ref().map(Arc::clone) else {
            return;
        };
        let key = key.clone();
        let value = value.clone();
        if let Err(err) = tokio::task::spawn_blocking(move || durable.put(&key, value)).await {
            warn!(%err, "durable cache store failed");
        }
    }
}

impl ClientTrait for CatalogClient {
    async fn search_products(&self, query: &SearchQuery) -> Vec<Product> {
        match self.try_search_products(query).await {
            Ok(products) => products,
            Err(err) => {
                // Indistinguishable from "no results" for callers.
                warn!(error = %err, text = %query.text, page = query.page, "search failed");
                Vec::new()
            },
        }
    }

    #[instrument(skip(self))]
    async fn product_by_code(&self, code: &str) -> Result<Option<Product>, CatalogClientError> {
        let code = code.trim();
        if code.is_empty() {
            return Ok(None);
        }

        let url = self.product_url(code)?;
        let response = match self.get_json::<ProductResponse>(&url).await {
            Ok(response) => response,
            // The live API answers unknown barcodes with a 404.
            Err(err) if err.is_not_found() => {
                debug!("catalog does not know product");
                return Ok(None);
            },
            Err(err) => return Err(err),
        };

        if response.status == Some(0) {
            debug!("catalog does not know product");
            return Ok(None);
        }

        let mut product = response.product.ok_or(CatalogClientError::MissingProduct)?;
        if product.code.is_empty() {
            product.code = code.to_string();
        }
        Ok(Some(product))
    }

    async fn list_categories(&self) -> Vec<String> {
        match self.try_list_categories().await {
            Ok(categories) => categories,
            Err(err) => {
                warn!(error = %err, "failed to sample categories, using fallback list");
                fallback_categories()
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

pub fn fallback_categories() -> Vec<String> {
    FALLBACK_CATEGORIES.iter().map(|s| s.to_string()).collect()
}

/// Distinct category names across `products`, sorted and capped at `limit`.
pub fn aggregate_categories(products: &[Product], limit: usize) -> Vec<String> {
    products
        .iter()
        .flat_map(Product::categories_list)
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .take(limit)
        .collect()
}

fn base_url(catalog_url: &str) -> Result<Url, CatalogClientError> {
    let url = Url::parse(catalog_url)?;
    if url.cannot_be_a_base() {
        return Err(CatalogClientError::Other(format!(
            "catalog url {catalog_url} cannot be used as a base url"
        )));
    }
    Ok(url)
}

/// Append path `segments` to the base url, escaping each segment.
fn endpoint(catalog_url: &str, segments: &[&str]) -> Result<Url, CatalogClientError> {
    let mut url = base_url(catalog_url)?;
    url.set_query(None);
    url.path_segments_mut()
        .map_err(|_| CatalogClientError::Other("catalog url cannot be a base".to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
