use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::types::Result;

/// Thin HTTP wrapper shared by the feed adapter and the content extractor.
/// Calls are bounded by the configured timeout and never retried here; the
/// orchestrator and pipeline decide what a failure means.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(timeout_secs: u64, user_agent: &str) -> Self {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(timeout_secs))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()
            .expect("Failed to create HTTP client");
        Self { client }
    }

    /// GET a document as text, treating any non-2xx status as an error.
    pub async fn fetch_document(&self, url: &str) -> Result<String> {
        debug!(url, "fetching document");
        let response = self.client.get(url).send().await?.error_for_status()?;
        let body = response.text().await?;
        debug!(url, bytes = body.len(), "fetched document");
        Ok(body)
    }
}
