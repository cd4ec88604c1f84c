//! Alert delivery.
//!
//! The pipeline only produces `Alert` values; a sink decides where they go.
//! Delivery is best effort and never retried.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use crate::error::{AppError, Result};
use crate::models::{Alert, AlertConfig};

/// Receives alerts raised by the pipeline.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send(&self, alert: &Alert) -> Result<()>;
}

/// Sink that relies on the log line written by [`report`].
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl AlertSink for LogSink {
    async fn send(&self, _alert: &Alert) -> Result<()> {
        Ok(())
    }
}

/// Slack-compatible incoming webhook.
#[derive(Clone)]
pub struct SlackWebhook {
    client: Client,
    url: String,
}

impl SlackWebhook {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl AlertSink for SlackWebhook {
    async fn send(&self, alert: &Alert) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&slack_payload(alert))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Alert(format!("webhook returned {status}")));
        }
        Ok(())
    }
}

/// Attachment layout posted to the webhook.
pub fn slack_payload(alert: &Alert) -> Value {
    json!({
        "attachments": [{
            "author_name": alert.source,
            "color": "danger",
            "pretext": format!("[SCRAPER] New Alert for {}: {}", alert.source, alert.stage),
            "fields": [
                {"title": "Message", "value": alert.message, "short": false},
                {"title": "Machine Location", "value": alert.machine, "short": true},
                {
                    "title": "Time",
                    "value": alert.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                    "short": true
                },
                {"title": "Severity", "value": alert.severity.as_str(), "short": true}
            ]
        }]
    })
}

/// Sink for the configured alert settings.
pub fn sink_from_config(config: &AlertConfig) -> Result<Arc<dyn AlertSink>> {
    match &config.webhook_url {
        Some(url) => Ok(Arc::new(SlackWebhook::new(
            url.clone(),
            Duration::from_secs(config.timeout_secs),
        )?)),
        None => Ok(Arc::new(LogSink)),
    }
}

/// Log an alert and hand it to the sink.
pub async fn report(sink: &dyn AlertSink, alert: Alert) {
    log::error!("{}", alert.log_line());
    if let Err(e) = sink.send(&alert).await {
        log::warn!("Alert delivery failed: {}", e);
    }
}
