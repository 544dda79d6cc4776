//! Dictionary API client

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use reqwest::{Client, Url};
use serde_json::Value;
use tracing::debug;

/// HTTPS client for the dictionary definition API.
pub struct Definitions {
    client: Client,
    endpoint: Url,
    api_key: String,
}

impl Definitions {
    pub fn new(endpoint: &str, api_key: String) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .with_context(|| format!("invalid API endpoint: {endpoint}"))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }

    /// Fetch the definition entries for one word.
    pub async fn fetch(&self, word: &str) -> Result<Value> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("API endpoint cannot be a base URL"))?
            .push(word);
        url.query_pairs_mut().append_pair("key", &self.api_key);

        debug!("fetching definition for {word:?}");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("requesting definition for {word:?}"))?;
        let status = response.status();
        if !status.is_success() {
            bail!("API returned {status} for {word:?}");
        }

        let body = response
            .bytes()
            .await
            .with_context(|| format!("reading response body for {word:?}"))?;
        serde_json::from_slice(&body)
            .with_context(|| format!("parsing definition JSON for {word:?}"))
    }
}
