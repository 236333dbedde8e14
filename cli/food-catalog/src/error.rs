//! Error handling for catalog API operations.

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// Failure of a single upstream request.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} timed out after {}ms", timeout.as_millis())]
    Timeout { url: String, timeout: Duration },
    #[error("could not reach the catalog")]
    Network(#[source] reqwest::Error),
    #[error("catalog responded with status {0}")]
    UpstreamStatus(StatusCode),
    #[error("catalog response could not be decoded")]
    Decode(#[source] serde_json::Error),
}

impl FetchError {
    /// Classify a transport error raised by `reqwest`.
    pub(crate) fn from_transport(url: &str, timeout: Duration, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return FetchError::Timeout {
                url: url.to_string(),
                timeout,
            };
        }
        if let Some(status) = err.status() {
            return FetchError::UpstreamStatus(status);
        }
        FetchError::Network(err)
    }
}

/// Common error type for catalog client operations.
#[derive(Debug, Error)]
pub enum CatalogClientError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("invalid catalog url")]
    InvalidUrl(#[from] url::ParseError),
    #[error("catalog reported a product but did not include it")]
    MissingProduct,
    #[error("{}", .0)]
    Other(String),
}

impl CatalogClientError {
    /// Whether upstream answered with a 404.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CatalogClientError::Fetch(FetchError::UpstreamStatus(StatusCode::NOT_FOUND))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_names_url_and_limit() {
        let err = FetchError::Timeout {
            url: "https://example.org/search".to_string(),
            timeout: Duration::from_secs(10),
        };
        assert_eq!(
            err.to_string(),
            "request to https://example.org/search timed out after 10000ms"
        );
    }

    #[test]
    fn not_found_is_detected_through_fetch_error() {
        let err = CatalogClientError::from(FetchError::UpstreamStatus(StatusCode::NOT_FOUND));
        assert!(err.is_not_found());

        let err = CatalogClientError::from(FetchError::UpstreamStatus(StatusCode::BAD_GATEWAY));
        assert!(!err.is_not_found());
    }
}
