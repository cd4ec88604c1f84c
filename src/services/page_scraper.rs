//! Page scraper service.
//!
//! Fetches one listing page, extracts its rows and formats them into
//! index-ready document pairs. Every page gets its own bounded retry budget.

use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::{DocumentIds, DocumentMeta, IndexDocument, Record, SourceConfig};
use crate::services::{PageFetcher, RecordExtractor};
use crate::utils::http::retry_backoff;

/// Body field that carries a source's classification tag.
pub const DOCTOR_TYPE_FIELD: &str = "doctor_type";

/// Scrapes listing pages of a single source.
pub struct PageScraper {
    source: Arc<SourceConfig>,
    index: String,
    fetcher: Arc<dyn PageFetcher>,
    extractor: Arc<dyn RecordExtractor>,
    max_retries: u32,
    backoff_ms: u64,
}

impl PageScraper {
    /// Create a scraper with 5 retries and no backoff.
    pub fn new(
        source: Arc<SourceConfig>,
        index: impl Into<String>,
        fetcher: Arc<dyn PageFetcher>,
        extractor: Arc<dyn RecordExtractor>,
    ) -> Self {
        Self {
            source,
            index: index.into(),
            fetcher,
            extractor,
            max_retries: 5,
            backoff_ms: 0,
        }
    }

    /// Override the retry budget and the exponential backoff base.
    pub fn with_retry(mut self, max_retries: u32, backoff_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.backoff_ms = backoff_ms;
        self
    }

    /// Scrape one page into documents, numbering them from `ids`.
    ///
    /// Ids are only consumed once the page succeeds.
    pub async fn scrape_page(
        &self,
        url: &str,
        ids: &mut DocumentIds,
    ) -> Result<Vec<IndexDocument>> {
        let rows = self.fetch_rows(url).await?;
        Ok(self.build_documents(rows, ids))
    }

    /// Fetch and extract a page's rows, retrying failed attempts.
    ///
    /// Site structure errors are returned at once. Any other failure is
    /// retried up to `max_retries` times; when the budget is spent the last
    /// failure comes back as `AppError::PageParse`.
    pub async fn fetch_rows(&self, url: &str) -> Result<Vec<Vec<String>>> {
        let attempts = self.max_retries.saturating_add(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.attempt(url).await {
                Ok(rows) => {
                    if attempt > 1 {
                        log::info!("{} succeeded on attempt {}/{}", url, attempt, attempts);
                    }
                    return Ok(rows);
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    log::warn!("Attempt {}/{} failed for {}: {}", attempt, attempts, url, err);
                    last_error = err.to_string();

                    if attempt < attempts {
                        let delay = retry_backoff(self.backoff_ms, attempt);
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            }
        }

        Err(AppError::PageParse {
            url: url.to_string(),
            attempts,
            message: last_error,
        })
    }

    async fn attempt(&self, url: &str) -> Result<Vec<Vec<String>>> {
        let body = self.fetcher.fetch(url).await?;
        self.extractor.extract_rows(url, &body)
    }

    /// Turn extracted rows into documents, in row order.
    pub fn build_documents(
        &self,
        rows: Vec<Vec<String>>,
        ids: &mut DocumentIds,
    ) -> Vec<IndexDocument> {
        rows.into_iter()
            .map(|cells| {
                let record = Record::from_cells(&self.source.fields, &cells, ids.next_id());
                self.format_document(record)
            })
            .collect()
    }

    /// Attach bulk metadata to a record.
    fn format_document(&self, record: Record) -> IndexDocument {
        let record = match &self.source.doctor_type {
            Some(doctor_type) => record.with_tag(DOCTOR_TYPE_FIELD, doctor_type),
            None => record,
        };

        IndexDocument {
            meta: DocumentMeta {
                index: self.index.clone(),
                doc_type: self.source.category,
                id: format!("{}-{}", self.source.name, record.id()),
            },
            body: record.into_body(),
        }
    }
}
