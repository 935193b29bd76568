// src/ingest/scrape.rs
use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use std::time::Duration;

use crate::config::ScrapeConfig;

/// Upstream automation that turns (query, location) into a CSV of leads.
#[async_trait::async_trait]
pub trait ScrapeProvider: Send + Sync {
    async fn fetch_csv(&self, query: &str, location: &str) -> Result<Vec<u8>>;
    fn name(&self) -> &'static str;
}

/// Posts `{query, location}` to a webhook (n8n-style) and reads the CSV body.
#[derive(Clone)]
pub struct WebhookScraper {
    url: String,
    client: Client,
    timeout: Duration,
}

impl WebhookScraper {
    pub fn new(url: String) -> Self {
        Self {
            url,
            client: Client::new(),
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }
}

#[async_trait::async_trait]
impl ScrapeProvider for WebhookScraper {
    async fn fetch_csv(&self, query: &str, location: &str) -> Result<Vec<u8>> {
        let body = serde_json::json!({ "query": query, "location": location });
        let rsp = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    anyhow!("scrape webhook timed out after {}s", self.timeout.as_secs())
                } else {
                    anyhow!("scrape webhook request failed: {e}")
                }
            })?
            .error_for_status()
            .context("scrape webhook non-2xx")?;
        let bytes = rsp.bytes().await.context("reading scrape webhook body")?;
        Ok(bytes.to_vec())
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}

/// Used when no webhook URL is configured; every call fails as upstream.
pub struct DisabledScraper;

#[async_trait::async_trait]
impl ScrapeProvider for DisabledScraper {
    async fn fetch_csv(&self, _query: &str, _location: &str) -> Result<Vec<u8>> {
        Err(anyhow!("scrape webhook not configured"))
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

pub fn from_config(cfg: &ScrapeConfig) -> std::sync::Arc<dyn ScrapeProvider> {
    match cfg.webhook_url.as_deref() {
        Some(url) => {
            std::sync::Arc::new(WebhookScraper::new(url.to_string()).with_timeout(cfg.timeout_secs))
        }
        None => {
            tracing::debug!(target: "ingest", "scrape webhook disabled (no URL)");
            std::sync::Arc::new(DisabledScraper)
        }
    }
}
