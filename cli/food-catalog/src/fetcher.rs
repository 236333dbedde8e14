//! Single upstream request with a hard timeout and JSON decoding.

use std::str::FromStr;
use std::time::Duration;

use reqwest::header::{self, HeaderMap};
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use crate::config::CatalogClientConfig;
use crate::error::{CatalogClientError, FetchError};

/// Performs GET requests against the catalog.
///
/// Retries and logging policy are left to the caller; every failure is
/// returned as a [`FetchError`].
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &CatalogClientConfig) -> Result<Self, CatalogClientError> {
        Ok(Self {
            client: build_http_client(config)?,
        })
    }

    /// Fetch `url` and decode the body as JSON.
    ///
    /// The request is dropped, and with it the connection, if no complete
    /// response arrived within `timeout`.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn fetch(&self, url: &Url, timeout: Duration) -> Result<Value, FetchError> {
        let request = async {
            let response = self
                .client
                .get(url.clone())
                .header(header::ACCEPT, "application/json")
                .send()
                .await
                .map_err(|err| FetchError::from_transport(url.as_str(), timeout, err))?;

            let status = response.status();
            if !status.is_success() {
                debug!(%status, "catalog responded with error status");
                return Err(FetchError::UpstreamStatus(status));
            }

            let body = response
                .bytes()
                .await
                .map_err(|err| FetchError::from_transport(url.as_str(), timeout, err))?;
            serde_json::from_slice::<Value>(&body).map_err(FetchError::Decode)
        };

        match tokio::time::timeout(timeout, request).await {
            Ok(result) => result,
            Err(_elapsed) => {
                debug!(timeout_ms = timeout.as_millis() as u64, "request timed out");
                Err(FetchError::Timeout {
                    url: url.to_string(),
                    timeout,
                })
            },
        }
    }
}

/// Build the HTTP client with the configured headers and connect timeout.
fn build_http_client(config: &CatalogClientConfig) -> Result<reqwest::Client, CatalogClientError> {
    let mut headers = HeaderMap::new();

    for (key, value) in &config.extra_headers {
        headers.insert(
            header::HeaderName::from_str(key).map_err(
                |e: reqwest::header::InvalidHeaderName| CatalogClientError::Other(e.to_string()),
            )?,
            header::HeaderValue::from_str(value).map_err(
                |e: reqwest::header::InvalidHeaderValue| CatalogClientError::Other(e.to_string()),
            )?,
        );
    }

    debug!(
        catalog_url = %config.catalog_url,
        extra_headers = config.extra_headers.len(),
        "building catalog HTTP client"
    );

    let client_builder = reqwest::Client::builder()
        .default_headers(headers)
        .connect_timeout(config.connect_timeout);

    let client_builder = if let Some(ref user_agent) = config.user_agent {
        client_builder.user_agent(user_agent)
    } else {
        client_builder
    };

    client_builder
        .build()
        .map_err(|e| CatalogClientError::Other(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use httpmock::MockServer;
    use serde_json::json;

    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(10);

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(&CatalogClientConfig::default()).unwrap()
    }

    fn url(server: &MockServer, path: &str) -> Url {
        Url::parse(&server.url(path)).unwrap()
    }

    #[tokio::test]
    async fn decodes_json_body() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.path("/search").header("accept", "application/json");
            then.status(200).json_body(json!({ "products": [] }));
        });

        let value = fetcher()
            .fetch(&url(&server, "/search"), TIMEOUT)
            .await
            .unwrap();
        assert_eq!(value, json!({ "products": [] }));
        mock.assert();
    }

    #[tokio::test]
    async fn non_success_status_is_upstream_status() {
        let server = MockServer::start_async().await;
        server.mock(|_, then| {
            then.status(503).body("maintenance");
        });

        let result = fetcher().fetch(&url(&server, "/search"), TIMEOUT).await;
        assert!(
            matches!(result, Err(FetchError::UpstreamStatus(status)) if status.as_u16() == 503),
            "expected UpstreamStatus(503), found: {result:?}"
        );
    }

    #[tokio::test]
    async fn malformed_body_is_decode_error() {
        let server = MockServer::start_async().await;
        server.mock(|_, then| {
            then.status(200).body("<html>oops</html>");
        });

        let result = fetcher().fetch(&url(&server, "/search"), TIMEOUT).await;
        assert!(
            matches!(result, Err(FetchError::Decode(_))),
            "expected Decode, found: {result:?}"
        );
    }

    #[tokio::test]
    async fn slow_response_times_out() {
        let server = MockServer::start_async().await;
        server.mock(|_, then| {
            then.status(200)
                .delay(Duration::from_secs(2))
                .json_body(json!({}));
        });

        let result = fetcher()
            .fetch(&url(&server, "/search"), Duration::from_millis(100))
            .await;
        assert!(
            matches!(result, Err(FetchError::Timeout { timeout, .. }) if timeout == Duration::from_millis(100)),
            "expected Timeout, found: {result:?}"
        );
    }

    #[tokio::test]
    async fn refused_connection_is_network_error() {
        // Bind and immediately release a port so nothing listens on it.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let url = Url::parse(&format!("http://127.0.0.1:{port}/search")).unwrap();

        let result = fetcher().fetch(&url, TIMEOUT).await;
        assert!(
            matches!(result, Err(FetchError::Network(_))),
            "expected Network, found: {result:?}"
        );
    }

    #[tokio::test]
    async fn configured_headers_are_sent() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.header("user-agent", "food-explorer/test")
                .header("x-client", "tests");
            then.status(200).json_body(json!({}));
        });

        let config = CatalogClientConfig {
            user_agent: Some("food-explorer/test".to_string()),
            extra_headers: BTreeMap::from([("x-client".to_string(), "tests".to_string())]),
            ..Default::default()
        };
        let _ = HttpFetcher::new(&config)
            .unwrap()
            .fetch(&url(&server, "/search"), TIMEOUT)
            .await;
        mock.assert();
    }

    #[test]
    fn invalid_header_fails_construction() {
        let config = CatalogClientConfig {
            extra_headers: BTreeMap::from([("bad header".to_string(), "x".to_string())]),
            ..Default::default()
        };
        assert!(matches!(
            HttpFetcher::new(&config),
            Err(CatalogClientError::Other(_))
        ));
    }
}
