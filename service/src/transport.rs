//! Executes select urls against the search backend.

use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use common::search_result::SearchResponse;
use tracing::{debug, info};


/// Fetches and decodes a result envelope. Implementations report network
/// failures, non-success statuses and undecodable bodies as errors; the
/// registry turns those into query state.
#[async_trait]
pub trait SearchTransport: Send + Sync {
    async fn fetch(&self, url: &str) -> anyhow::Result<SearchResponse>;
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(request_timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .context("Failed to build http client")?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SearchTransport for HttpTransport {
    async fn fetch(&self, url: &str) -> anyhow::Result<SearchResponse> {
        debug!("SEARCH REQUEST: {}", url);
        let t0 = Instant::now();
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let response_txt = response.text().await?;
        if status.is_client_error() || status.is_server_error() {
            anyhow::bail!("Error: {}: {}", status, response_txt);
        }
        let elapsed = t0.elapsed();
        info!("SEARCH RESPONSE: len = {} ({:?})", response_txt.len(), elapsed);
        let envelope = serde_json::from_str(strip_jsonp_wrapper(&response_txt))
            .context("Failed to decode search response")?;
        Ok(envelope)
    }
}

/// `callback({...});` -> `{...}`. Plain JSON bodies are returned untouched.
pub fn strip_jsonp_wrapper(body: &str) -> &str {
    let trimmed = body.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return trimmed;
    }
    let (Some(open), Some(close)) = (trimmed.find('('), trimmed.rfind(')')) else {
        return trimmed;
    };
    let callback = &trimmed[..open];
    let is_callback = !callback.is_empty()
        && callback
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '.');
    if is_callback && open < close {
        &trimmed[open + 1..close]
    } else {
        trimmed
    }
}
