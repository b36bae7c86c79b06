//! HTTP polling source for the upstream standings scraper.
//!
//! Each fetch is one `GET` against the configured feed URL. The client
//! carries a request timeout so a hung scraper cannot pile up fetch tasks
//! indefinitely.

use std::time::Duration;

use racecast_core::source::{SnapshotSource, SourceError};

/// Polls a JSON standings endpoint.
pub struct HttpSource {
    client: reqwest::Client,
    url: String,
}

impl HttpSource {
    /// Create a source for `url` with a per-request `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the HTTP client cannot be built.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Http(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.to_owned(),
        })
    }

    /// The polled URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl SnapshotSource for HttpSource {
    async fn fetch(&self) -> Result<serde_json::Value, SourceError> {
        let response = self
            .client
            .get(&self.url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| SourceError::Http(format!("GET {} failed: {e}", self.url)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| SourceError::Decode(format!("feed response parse failed: {e}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn builds_client_for_url() {
        let source = HttpSource::new("http://localhost:8080/api/standings", Duration::from_secs(2)).unwrap();
        assert_eq!(source.url(), "http://localhost:8080/api/standings");
    }

    #[tokio::test]
    async fn unreachable_feed_is_an_http_error() {
        // Port 9 (discard) on localhost is closed in test environments.
        let source = HttpSource::new("http://127.0.0.1:9/standings", Duration::from_millis(500)).unwrap();
        assert!(matches!(source.fetch().await, Err(SourceError::Http(_))));
    }
}
