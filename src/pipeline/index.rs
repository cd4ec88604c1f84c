//! Search index publishing.
//!
//! A reindex replaces a source's documents in two independent phases:
//!
//! 1. **Delete**: delete-by-query scoped to the source's category and, when
//!    set, its `doctor_type` tag
//! 2. **Insert**: one bulk request of every metadata/body pair, refreshed
//!
//! The phases are not atomic. A failed delete does not block the insert and a
//! failed insert leaves the index without the source's documents until the
//! next run. Both failures are alerted.

use std::sync::Arc;

use serde_json::{Value, json};

use crate::error::AppError;
use crate::models::{Alert, CrawlResult, SourceConfig};
use crate::services::{AlertSink, DOCTOR_TYPE_FIELD, SearchIndex, report};

/// Outcome of one publish call.
#[derive(Debug, Default)]
pub struct PublishReport {
    /// Documents removed by the delete phase; `None` if it failed
    pub deleted: Option<u64>,

    /// Documents sent by the insert phase; 0 if it failed
    pub inserted: usize,

    pub errors: Vec<AppError>,
}

impl PublishReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Replaces a source's documents in the search index.
pub struct IndexPublisher {
    search: Arc<dyn SearchIndex>,
    alerts: Arc<dyn AlertSink>,
}

impl IndexPublisher {
    pub fn new(search: Arc<dyn SearchIndex>, alerts: Arc<dyn AlertSink>) -> Self {
        Self { search, alerts }
    }

    /// Delete the previous generation of `source` from `index`, then insert `result`.
    pub async fn publish(
        &self,
        index: &str,
        source: &SourceConfig,
        result: &CrawlResult,
    ) -> PublishReport {
        let mut report = PublishReport::default();
        if result.is_empty() {
            log::warn!("[{}] Nothing to publish", source.name);
            return report;
        }

        let doc_type = source.category.as_str();
        let query = delete_query(source.doctor_type.as_deref());

        match self.search.delete_by_query(index, doc_type, &query).await {
            Ok(response) => {
                let deleted = response.get("deleted").and_then(Value::as_u64).unwrap_or(0);
                log::info!(
                    "[{}] Deleted {} documents from {}/{}",
                    source.name,
                    deleted,
                    index,
                    doc_type
                );
                report.deleted = Some(deleted);
            }
            Err(e) => {
                let err = AppError::IndexDelete {
                    index: index.to_string(),
                    doc_type: doc_type.to_string(),
                    message: e.to_string(),
                };
                self.alert(source, "elasticsearch_delete", &err).await;
                report.errors.push(err);
            }
        }

        match self.search.bulk(index, &result.flatten(), true).await {
            Ok(_) => {
                log::info!(
                    "[{}] Indexed {} documents into {}",
                    source.name,
                    result.len(),
                    index
                );
                report.inserted = result.len();
            }
            Err(e) => {
                let err = AppError::IndexInsert {
                    index: index.to_string(),
                    message: e.to_string(),
                };
                self.alert(source, "elasticsearch_insert", &err).await;
                report.errors.push(err);
            }
        }

        report
    }

    async fn alert(&self, source: &SourceConfig, stage: &str, err: &AppError) {
        report(
            self.alerts.as_ref(),
            Alert::from_error(&source.name, stage, err),
        )
        .await;
    }
}

/// Delete-by-query body for a source.
pub fn delete_query(doctor_type: Option<&str>) -> Value {
    match doctor_type {
        Some(value) => json!({"query": {"match": {DOCTOR_TYPE_FIELD: value}}}),
        None => json!({"query": {"match_all": {}}}),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentIds, IndexDocument, Severity};
    use crate::services::{PageScraper, TableExtractor};
    use crate::testing::{MemoryAlerts, MemoryIndex, ScriptedFetcher, sample_source};

    fn crawl_result(rows: &[&[&str]]) -> CrawlResult {
        let source = Arc::new(sample_source());
        let extractor = Arc::new(TableExtractor::for_source(&source).unwrap());
        let scraper = PageScraper::new(
            Arc::clone(&source),
            "healthtools",
            Arc::new(ScriptedFetcher::new()),
            extractor,
        );
        let rows = rows
            .iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect();
        let documents: Vec<IndexDocument> = scraper.build_documents(rows, &mut DocumentIds::new());
        CrawlResult {
            documents,
            pages_total: 1,
            skipped_pages: 0,
        }
    }

    #[test]
    fn delete_query_is_scoped_by_doctor_type() {
        assert_eq!(
            delete_query(Some("foreign_doctor")),
            json!({"query": {"match": {"doctor_type": "foreign_doctor"}}})
        );
        assert_eq!(delete_query(None), json!({"query": {"match_all": {}}}));
    }

    #[tokio::test]
    async fn deletes_then_inserts_flattened_pairs() {
        let index = Arc::new(MemoryIndex::default());
        let alerts = Arc::new(MemoryAlerts::default());
        let publisher = IndexPublisher::new(index.clone(), alerts.clone());

        let result = crawl_result(&[&["Jane Doe", "LIC-100"], &["John Roe", "LIC-101"]]);
        let report = publisher
            .publish("healthtools", &sample_source(), &result)
            .await;

        assert!(report.is_clean());
        assert_eq!(report.deleted, Some(0));
        assert_eq!(report.inserted, 2);

        let deletes = index.deletes();
        assert_eq!(deletes.len(), 1);
        assert_eq!(deletes[0].0, "healthtools");
        assert_eq!(deletes[0].1, "doctors");
        assert_eq!(deletes[0].2, delete_query(Some("local_doctor")));

        let bulks = index.bulks();
        assert_eq!(bulks.len(), 1);
        let (_, actions, refresh) = &bulks[0];
        assert!(*refresh);
        assert_eq!(actions.len(), 4);
        assert_eq!(actions[0]["index"]["_id"], "sample-0");
        assert_eq!(actions[1]["name"], "Jane Doe");
        assert_eq!(actions[2]["index"]["_id"], "sample-1");
        assert!(alerts.alerts().is_empty());
    }

    #[tokio::test]
    async fn failed_delete_still_inserts() {
        let index = Arc::new(MemoryIndex::failing_delete());
        let alerts = Arc::new(MemoryAlerts::default());
        let publisher = IndexPublisher::new(index.clone(), alerts.clone());

        let report = publisher
            .publish("healthtools", &sample_source(), &crawl_result(&[&["A", "1"]]))
            .await;

        assert_eq!(report.deleted, None);
        assert_eq!(report.inserted, 1);
        assert!(matches!(report.errors[..], [AppError::IndexDelete { .. }]));
        assert_eq!(index.bulks().len(), 1);

        let alerts = alerts.alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].stage, "elasticsearch_delete");
        assert_eq!(alerts[0].severity, Severity::High);
    }

    #[tokio::test]
    async fn failed_insert_is_reported() {
        let index = Arc::new(MemoryIndex::failing_bulk());
        let alerts = Arc::new(MemoryAlerts::default());
        let publisher = IndexPublisher::new(index, alerts.clone());

        let report = publisher
            .publish("healthtools", &sample_source(), &crawl_result(&[&["A", "1"]]))
            .await;

        assert_eq!(report.inserted, 0);
        assert!(matches!(report.errors[..], [AppError::IndexInsert { .. }]));
        assert_eq!(alerts.alerts()[0].stage, "elasticsearch_insert");
    }

    #[tokio::test]
    async fn empty_result_touches_nothing() {
        let index = Arc::new(MemoryIndex::default());
        let publisher = IndexPublisher::new(index.clone(), Arc::new(MemoryAlerts::default()));

        let report = publisher
            .publish("healthtools", &sample_source(), &CrawlResult::default())
            .await;

        assert!(report.is_clean());
        assert!(index.deletes().is_empty());
        assert!(index.bulks().is_empty());
    }
}
