//! Configuration types for catalog client construction.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Base URL of the public product database API.
pub const DEFAULT_CATALOG_URL: &str = "https://world.openfoodfacts.org/api/v2";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_PAGE_SIZE: u32 = 24;
pub const DEFAULT_CATEGORY_SAMPLE_SIZE: u32 = 50;
pub const DEFAULT_CATEGORY_LIMIT: usize = 20;
pub const DEFAULT_MEMORY_CACHE_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_DURABLE_CACHE_TTL: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Configuration for catalog client construction.
#[derive(Debug, Clone)]
pub struct CatalogClientConfig {
    /// Base URL for the catalog API.
    // Validated when the client is constructed.
    pub catalog_url: String,
    /// Optional `User-Agent` header value.
    pub user_agent: Option<String>,
    /// Additional headers to include in requests.
    pub extra_headers: BTreeMap<String, String>,
    /// Hard limit for a single request, including reading the body.
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// Number of products requested per search page.
    pub page_size: u32,
    /// Number of products sampled to derive the category list.
    pub category_sample_size: u32,
    /// Maximum number of categories returned from a sample.
    pub category_limit: usize,
    /// Age after which in-memory responses are no longer served.
    pub memory_cache_ttl: Duration,
    /// Optional second cache tier that survives across sessions.
    pub durable_cache: Option<DurableCacheConfig>,
}

impl Default for CatalogClientConfig {
    fn default() -> Self {
        Self {
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            user_agent: None,
            extra_headers: BTreeMap::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            page_size: DEFAULT_PAGE_SIZE,
            category_sample_size: DEFAULT_CATEGORY_SAMPLE_SIZE,
            category_limit: DEFAULT_CATEGORY_LIMIT,
            memory_cache_ttl: DEFAULT_MEMORY_CACHE_TTL,
            durable_cache: None,
        }
    }
}

/// Location and lifetime of the on-disk response cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DurableCacheConfig {
    pub path: PathBuf,
    pub ttl: Duration,
}

impl DurableCacheConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ttl: DEFAULT_DURABLE_CACHE_TTL,
        }
    }
}

/// Configuration for [`crate::SearchController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchControllerConfig {
    /// Quiet period a text change has to survive before it triggers a search.
    pub debounce: Duration,
}

impl Default for SearchControllerConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}
