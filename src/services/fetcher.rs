//! Listing page fetcher.

use async_trait::async_trait;
use reqwest::Client;

use crate::error::Result;
use crate::models::CrawlerConfig;
use crate::utils::http::{create_async_client, fetch_text};

/// Retrieves the raw body of a listing page.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// HTTP fetcher backed by a shared `reqwest` client.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a fetcher with the configured user agent and request timeout.
    pub fn from_config(config: &CrawlerConfig) -> Result<Self> {
        Ok(Self::new(create_async_client(config)?))
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        log::debug!("GET {}", url);
        fetch_text(&self.client, url).await
    }
}
