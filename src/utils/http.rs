// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use crate::error::Result;
use crate::models::CrawlerConfig;

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &CrawlerConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Fetch a page body, failing on non-success status codes.
pub async fn fetch_text(client: &reqwest::Client, url: &str) -> Result<String> {
    let text = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    Ok(text)
}

/// Exponential backoff delay before retry `attempt` (1-based), capped at 32x.
pub fn retry_backoff(base_ms: u64, attempt: u32) -> Duration {
    let capped = attempt.saturating_sub(1).min(5);
    Duration::from_millis(base_ms.saturating_mul(1 << capped))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_backoff_doubles_and_caps() {
        assert_eq!(retry_backoff(100, 1), Duration::from_millis(100));
        assert_eq!(retry_backoff(100, 2), Duration::from_millis(200));
        assert_eq!(retry_backoff(100, 3), Duration::from_millis(400));
        assert_eq!(retry_backoff(100, 20), Duration::from_millis(3200));
    }

    #[test]
    fn test_zero_backoff_is_immediate() {
        assert_eq!(retry_backoff(0, 4), Duration::ZERO);
    }

    #[test]
    fn test_create_async_client() {
        assert!(create_async_client(&CrawlerConfig::default()).is_ok());
    }
}
