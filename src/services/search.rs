//! Search index client.
//!
//! Talks to an Elasticsearch-compatible REST API: `_delete_by_query` to drop a
//! previous generation and `_bulk` to load a new one.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use serde_json::Value;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::SearchConfig;

/// Operations the publisher needs from a search index.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Delete the documents of `doc_type` in `index` matching `query`.
    async fn delete_by_query(&self, index: &str, doc_type: &str, query: &Value) -> Result<Value>;

    /// Load an alternating action/body sequence through the bulk API.
    async fn bulk(&self, index: &str, actions: &[Value], refresh: bool) -> Result<Value>;
}

/// Elasticsearch REST client.
#[derive(Clone)]
pub struct ElasticsearchClient {
    client: Client,
    base_url: Url,
    username: Option<String>,
    password: Option<String>,
}

impl ElasticsearchClient {
    pub fn new(config: &SearchConfig, timeout: Duration) -> Result<Self> {
        let mut base = config.url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(AppError::config(format!(
                "search url must be http(s): {}",
                config.url
            )));
        }

        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    fn post(&self, url: Url) -> reqwest::RequestBuilder {
        let request = self.client.post(url);
        match &self.username {
            Some(user) => request.basic_auth(user, self.password.as_deref()),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(AppError::Search(format!("{status}: {body}")));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl SearchIndex for ElasticsearchClient {
    async fn delete_by_query(&self, index: &str, doc_type: &str, query: &Value) -> Result<Value> {
        let url = self.endpoint(&format!("{index}/{doc_type}/_delete_by_query"))?;
        log::debug!("POST {}", url);
        self.send(self.post(url).json(query)).await
    }

    async fn bulk(&self, index: &str, actions: &[Value], refresh: bool) -> Result<Value> {
        let mut url = self.endpoint(&format!("{index}/_bulk"))?;
        if refresh {
            url.query_pairs_mut().append_pair("refresh", "true");
        }
        log::debug!("POST {} ({} lines)", url, actions.len());

        let request = self
            .post(url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/x-ndjson"))
            .body(to_ndjson(actions)?);
        let response = self.send(request).await?;

        if let Some(reason) = first_item_error(&response) {
            return Err(AppError::Search(format!("bulk item rejected: {reason}")));
        }
        Ok(response)
    }
}

/// Newline-delimited JSON body; the bulk API needs a trailing newline.
pub fn to_ndjson(lines: &[Value]) -> Result<String> {
    let mut body = String::new();
    for line in lines {
        body.push_str(&serde_json::to_string(line)?);
        body.push('\n');
    }
    Ok(body)
}

/// First error reason of a bulk response flagged with `"errors": true`.
fn first_item_error(response: &Value) -> Option<String> {
    if !response.get("errors").and_then(Value::as_bool).unwrap_or(false) {
        return None;
    }
    let items = response.get("items")?.as_array()?;
    let reason = items
        .iter()
        .filter_map(|item| item.as_object()?.values().next())
        .find_map(|result| result.get("error"))
        .map(|error| {
            error
                .get("reason")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string())
        });
    Some(reason.unwrap_or_else(|| "unknown item error".to_string()))
}
