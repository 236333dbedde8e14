//! Search state machine driving paginated browsing of the catalog.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{debug, instrument, trace};

use crate::client::ClientTrait;
use crate::config::SearchControllerConfig;
use crate::debounce::Debouncer;
use crate::sort::{SortKey, sort_products};
use crate::types::{Product, SearchQuery};

/// Observable state of a [`SearchController`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchState {
    pub text: String,
    pub category: String,
    pub sort: SortKey,
    /// The next page to request, 1-based.
    pub page: u32,
    /// Results in fetch order, unique by code.
    pub products: Vec<Product>,
    pub has_more: bool,
    pub loading: bool,
}

impl Default for SearchState {
    fn default() -> Self {
        Self {
            text: String::new(),
            category: String::new(),
            sort: SortKey::default(),
            page: 1,
            products: Vec::new(),
            has_more: true,
            loading: false,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    state: SearchState,
    codes: HashSet<String>,
    /// Bumped by every reset. A page fetched for an older epoch is stale.
    epoch: u64,
}

impl Inner {
    fn query(&self) -> SearchQuery {
        SearchQuery::new(self.state.text.clone())
            .category(self.state.category.clone())
            .page(self.state.page)
    }

    /// Start over at page 1 with the current filters.
    fn reset(&mut self) {
        self.epoch += 1;
        self.codes.clear();
        self.state.products.clear();
        self.state.page = 1;
        self.state.has_more = true;
    }

    /// Append the products not seen yet in this epoch.
    fn merge(&mut self, page: Vec<Product>) {
        if page.is_empty() {
            debug!(page = self.state.page, "no more results");
            self.state.has_more = false;
            return;
        }

        let received = page.len();
        for product in page {
            if self.codes.insert(product.code.clone()) {
                self.state.products.push(product);
            }
        }
        trace!(
            received,
            total = self.state.products.len(),
            "merged result page"
        );
        self.state.page += 1;
    }
}

/// Owns the search, filter, sort and pagination state of one browsing
/// session.
///
/// Text edits are debounced; category changes and explicit submissions take
/// effect immediately. At most one page request is in flight per controller.
/// A reset while a page is loading discards that page once it arrives and
/// loads the first page for the new filters instead.
#[derive(Debug)]
pub struct SearchController<C> {
    client: C,
    inner: Mutex<Inner>,
    debouncer: Debouncer,
}

impl<C> SearchController<C>
where
    C: ClientTrait + Send + Sync + 'static,
{
    pub fn new(client: C, config: SearchControllerConfig) -> Arc<Self> {
        Self::with_filters(client, config, "", "")
    }

    /// A controller starting out with the given filters. Nothing is fetched
    /// until [`Self::load_next_page`] is called.
    pub fn with_filters(
        client: C,
        config: SearchControllerConfig,
        text: impl Into<String>,
        category: impl Into<String>,
    ) -> Arc<Self> {
        let mut inner = Inner::default();
        inner.state.text = text.into();
        inner.state.category = category.into();

        Arc::new(Self {
            client,
            inner: Mutex::new(inner),
            debouncer: Debouncer::new(config.debounce),
        })
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Change the search text once typing has paused.
    ///
    /// Supersedes any text change still waiting for its debounce window.
    pub fn set_text(self: &Arc<Self>, text: impl Into<String>) {
        let text = text.into();
        let this = Arc::downgrade(self);
        trace!(%text, "debouncing text change");
        self.debouncer.schedule(async move {
            // Gone if the controller was dropped in the meantime.
            if let Some(this) = this.upgrade() {
                this.apply(|state| state.text = text).await;
            }
        });
    }

    /// Change the search text right away, e.g. when the user submits it.
    pub async fn submit_text(&self, text: impl Into<String>) {
        let text = text.into();
        self.debouncer.cancel();
        self.apply(|state| state.text = text).await;
    }

    pub async fn set_category(&self, category: impl Into<String>) {
        let category = category.into();
        self.apply(|state| state.category = category).await;
    }

    /// Change the order of [`Self::products`]. Stored results are untouched.
    pub fn set_sort(&self, sort: SortKey) {
        self.lock().state.sort = sort;
    }

    /// Reset text, category and sort in a single transition.
    pub async fn clear_all(&self) {
        self.debouncer.cancel();
        self.apply(|state| {
            state.text.clear();
            state.category.clear();
            state.sort = SortKey::Server;
        })
        .await;
    }

    /// Fetch the next page and merge it into the results.
    ///
    /// Does nothing while another page is loading or once the catalog ran
    /// out of results.
    #[instrument(skip(self))]
    pub async fn load_next_page(&self) {
        let mut next = {
            let mut inner = self.lock();
            if inner.state.loading || !inner.state.has_more {
                trace!(
                    loading = inner.state.loading,
                    has_more = inner.state.has_more,
                    "not loading next page"
                );
                return;
            }
            inner.state.loading = true;
            Some((inner.query(), inner.epoch))
        };
        let _loading = LoadingGuard(&self.inner);

        while let Some((query, epoch)) = next.take() {
            debug!(text = %query.text, category = %query.category, page = query.page, "loading page");
            let page = self.client.search_products(&query).await;

            let mut inner = self.lock();
            if inner.epoch != epoch {
                debug!("discarding page of superseded search");
                next = Some((inner.query(), inner.epoch));
            } else {
                inner.merge(page);
            }
        }
    }

    /// The results in the selected order.
    pub fn products(&self) -> Vec<Product> {
        let inner = self.lock();
        sort_products(&inner.state.products, inner.state.sort)
    }

    pub fn snapshot(&self) -> SearchState {
        self.lock().state.clone()
    }

    /// Whether a text change is waiting for typing to pause.
    pub fn is_debouncing(&self) -> bool {
        self.debouncer.is_pending()
    }

    /// Update the filters, start over and load the first page.
    async fn apply(&self, update: impl FnOnce(&mut SearchState)) {
        {
            let mut inner = self.lock();
            update(&mut inner.state);
            inner.reset();
        }
        // While a page is in flight this is a no-op; that load picks up the
        // new filters when it completes.
        self.load_next_page().await;
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the loading flag once a load finishes or is cancelled.
struct LoadingGuard<'a>(&'a Mutex<Inner>);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        inner.state.loading = false;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::mock::MockClient;
    use crate::types::NutritionGrade;

    fn product(code: &str, name: &str) -> Product {
        Product {
            code: code.to_string(),
            name: Some(name.to_string()),
            image_url: Some(format!("https://images.example/{code}.jpg")),
            ..Default::default()
        }
    }

    fn codes(products: &[Product]) -> Vec<&str> {
        products.iter().map(|p| p.code.as_str()).collect()
    }

    fn controller(client: &MockClient) -> Arc<SearchController<MockClient>> {
        SearchController::new(client.clone(), SearchControllerConfig::default())
    }

    #[test]
    fn initial_state() {
        let state = SearchState::default();
        assert_eq!(state.page, 1);
        assert!(state.has_more);
        assert!(!state.loading);
        assert!(state.products.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn text_burst_triggers_one_search_with_last_text() {
        let client = MockClient::new();
        client.push_search_page(vec![product("1", "Chocolate")]);
        let controller = controller(&client);

        for text in ["c", "ch", "cho"] {
            controller.set_text(text);
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(controller.is_debouncing());
        assert!(client.search_requests().is_empty());

        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(!controller.is_debouncing());
        assert_eq!(client.search_requests(), vec![SearchQuery::new("cho")]);
        let state = controller.snapshot();
        assert_eq!(state.text, "cho");
        assert_eq!(codes(&state.products), vec!["1"]);
        assert_eq!(state.page, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn submitted_text_supersedes_pending_edit() {
        let client = MockClient::new();
        let controller = controller(&client);

        controller.set_text("te");
        controller.submit_text("tea").await;
        assert!(!controller.is_debouncing());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(client.search_requests(), vec![SearchQuery::new("tea")]);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_controller_abandons_pending_edit() {
        let client = MockClient::new();
        let controller = controller(&client);

        controller.set_text("tea");
        drop(controller);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(client.search_requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_loads_fetch_once() {
        let client = MockClient::new();
        client.set_search_delay(Duration::from_millis(200));
        client.push_search_page(vec![product("1", "Tea"), product("2", "Coffee")]);
        client.push_search_page(vec![product("3", "Juice")]);
        let controller = controller(&client);

        tokio::join!(controller.load_next_page(), controller.load_next_page());

        assert_eq!(client.search_requests().len(), 1);
        let state = controller.snapshot();
        assert_eq!(codes(&state.products), vec!["1", "2"]);
        assert_eq!(state.page, 2);
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn overlapping_pages_are_deduplicated() {
        let client = MockClient::new();
        client.push_search_page(vec![product("a", "A"), product("b", "B")]);
        client.push_search_page(vec![product("b", "B"), product("c", "C")]);
        let controller = controller(&client);

        controller.load_next_page().await;
        controller.load_next_page().await;

        let state = controller.snapshot();
        assert_eq!(codes(&state.products), vec!["a", "b", "c"]);
        assert_eq!(state.page, 3);
        assert_eq!(
            client
                .search_requests()
                .iter()
                .map(|query| query.page)
                .collect::<Vec<_>>(),
            vec![1, 2]
        );
    }

    #[tokio::test]
    async fn empty_page_ends_pagination() {
        let client = MockClient::new();
        client.push_search_page(vec![product("a", "A")]);
        let controller = controller(&client);

        controller.load_next_page().await;
        controller.load_next_page().await;
        assert!(!controller.snapshot().has_more);

        controller.load_next_page().await;
        assert_eq!(client.search_requests().len(), 2);

        let state = controller.snapshot();
        assert_eq!(codes(&state.products), vec!["a"]);
        assert_eq!(state.page, 2);
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn sorting_is_a_view_over_fetch_order() {
        let client = MockClient::new();
        client.push_search_page(vec![
            Product {
                nutrition_grade: Some(NutritionGrade::B),
                ..product("banana", "Banana")
            },
            product("apple", "Apple"),
            Product {
                nutrition_grade: Some(NutritionGrade::A),
                ..product("cherry", "cherry")
            },
        ]);
        let controller = controller(&client);
        controller.load_next_page().await;

        controller.set_sort(SortKey::NameAsc);
        assert_eq!(codes(&controller.products()), vec![
            "apple", "banana", "cherry"
        ]);
        controller.set_sort(SortKey::NutritionAsc);
        assert_eq!(codes(&controller.products()), vec![
            "cherry", "banana", "apple"
        ]);
        controller.set_sort(SortKey::NutritionDesc);
        assert_eq!(codes(&controller.products()), vec![
            "apple", "banana", "cherry"
        ]);

        controller.set_sort(SortKey::Server);
        assert_eq!(codes(&controller.products()), vec![
            "banana", "apple", "cherry"
        ]);
        assert_eq!(client.search_requests().len(), 1);
        assert_eq!(controller.snapshot().page, 2);
    }

    #[tokio::test]
    async fn category_change_starts_over() {
        let client = MockClient::new();
        client.push_search_page(vec![product("1", "Tea")]);
        client.push_search_page(vec![product("2", "Chips")]);
        let controller = SearchController::with_filters(
            client.clone(),
            SearchControllerConfig::default(),
            "salt",
            "",
        );

        controller.load_next_page().await;
        controller.set_category("Snacks").await;

        assert_eq!(client.search_requests(), vec![
            SearchQuery::new("salt"),
            SearchQuery::new("salt").category("Snacks"),
        ]);
        let state = controller.snapshot();
        assert_eq!(codes(&state.products), vec!["2"]);
        assert_eq!(state.page, 2);
        assert_eq!(state.category, "Snacks");
    }

    #[tokio::test]
    async fn products_seen_before_a_reset_are_accepted_again() {
        let client = MockClient::new();
        client.push_search_page(vec![product("1", "Tea")]);
        client.push_search_page(vec![product("1", "Tea")]);
        let controller = controller(&client);

        controller.load_next_page().await;
        controller.set_category("Beverages").await;

        assert_eq!(codes(&controller.snapshot().products), vec!["1"]);
    }

    #[tokio::test]
    async fn clear_all_is_a_single_reset() {
        let client = MockClient::new();
        client.push_search_page(vec![product("1", "Tea")]);
        let controller = SearchController::with_filters(
            client.clone(),
            SearchControllerConfig::default(),
            "tea",
            "Beverages",
        );
        controller.set_sort(SortKey::NameDesc);

        controller.clear_all().await;

        assert_eq!(client.search_requests(), vec![SearchQuery::new("")]);
        let state = controller.snapshot();
        assert_eq!(state.text, "");
        assert_eq!(state.category, "");
        assert_eq!(state.sort, SortKey::Server);
        assert_eq!(codes(&state.products), vec!["1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn page_of_superseded_search_is_discarded() {
        let client = MockClient::new();
        client.set_search_delay(Duration::from_millis(200));
        client.push_search_page(vec![product("old", "Old")]);
        client.push_search_page(vec![product("new", "New")]);
        let controller = controller(&client);

        let loading = tokio::spawn({
            let controller = Arc::clone(&controller);
            async move { controller.load_next_page().await }
        });
        tokio::task::yield_now().await;
        assert!(controller.snapshot().loading);

        // The in-flight load is responsible for fetching the new first page.
        controller.set_category("Snacks").await;
        assert_eq!(client.search_requests().len(), 1);

        loading.await.unwrap();

        assert_eq!(client.search_requests(), vec![
            SearchQuery::new(""),
            SearchQuery::new("").category("Snacks"),
        ]);
        let state = controller.snapshot();
        assert_eq!(codes(&state.products), vec!["new"]);
        assert_eq!(state.page, 2);
        assert!(!state.loading);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_load_does_not_block_later_loads() {
        let client = MockClient::new();
        client.set_search_delay(Duration::from_millis(200));
        client.push_search_page(vec![product("1", "Crackers")]);
        let controller = controller(&client);

        let cancelled =
            tokio::time::timeout(Duration::from_millis(50), controller.load_next_page()).await;
        assert!(cancelled.is_err());
        assert!(!controller.snapshot().loading);

        controller.set_category("Snacks").await;

        let state = controller.snapshot();
        assert_eq!(codes(&state.products), vec!["1"]);
        assert!(!state.loading);
        assert_eq!(client.search_requests(), vec![
            SearchQuery::new(""),
            SearchQuery::new("").category("Snacks"),
        ]);
    }
}
