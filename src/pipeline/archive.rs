//! Hash-gated snapshot archiving.
//!
//! The canonical payload of a run is compared against the stored current
//! snapshot. Identical payloads write nothing; changed payloads write the run
//! date's historical entry and then overwrite the current snapshot.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::{Alert, CrawlResult, Snapshot, SourceConfig};
use crate::services::{AlertSink, report};
use crate::storage::SnapshotStore;
use crate::utils::date_key;

/// What an archive call did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ArchiveOutcome {
    /// Payload changed; both snapshots were written
    Written {
        hash: String,
        current: String,
        historical: String,
    },
    /// Payload identical to the stored current snapshot
    Unchanged { hash: String },
}

pub struct ArchiveManager {
    store: Arc<dyn SnapshotStore>,
    alerts: Arc<dyn AlertSink>,
}

impl ArchiveManager {
    pub fn new(store: Arc<dyn SnapshotStore>, alerts: Arc<dyn AlertSink>) -> Self {
        Self { store, alerts }
    }

    /// Archive `result` for `source` under `run_date`.
    ///
    /// Failures are alerted and returned; nothing already written is rolled back.
    pub async fn archive(
        &self,
        source: &SourceConfig,
        result: &CrawlResult,
        run_date: NaiveDate,
    ) -> Result<ArchiveOutcome> {
        match self.try_archive(source, result, run_date).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                report(
                    self.alerts.as_ref(),
                    Alert::from_error(&source.name, "archive_data", &err),
                )
                .await;
                Err(err)
            }
        }
    }

    async fn try_archive(
        &self,
        source: &SourceConfig,
        result: &CrawlResult,
        run_date: NaiveDate,
    ) -> Result<ArchiveOutcome> {
        let current_key = source.archive_key.as_str();
        let snapshot = Snapshot::new(result.to_payload()?);

        let stored = self
            .store
            .stored_hash(current_key)
            .await
            .map_err(|e| AppError::archive(current_key, e))?;

        if !snapshot.differs_from(stored.as_deref()) {
            log::info!(
                "[{}] Archive unchanged ({}), nothing written",
                source.name,
                short_hash(&snapshot.hash)
            );
            return Ok(ArchiveOutcome::Unchanged {
                hash: snapshot.hash,
            });
        }

        // Current moves last: until it holds the new hash, a rerun retries both.
        let historical_key = source.historical_key_for(&date_key(run_date));
        self.store
            .write_historical(&historical_key, &snapshot)
            .await
            .map_err(|e| AppError::archive(&historical_key, e))?;

        self.store
            .write_current(current_key, &snapshot)
            .await
            .map_err(|e| AppError::archive(current_key, e))?;

        log::info!(
            "[{}] Archived {} documents ({}, {}) to {}",
            source.name,
            result.len(),
            short_hash(&snapshot.hash),
            snapshot.created_at.format("%Y-%m-%d %H:%M:%S"),
            self.store.location(current_key)
        );

        Ok(ArchiveOutcome::Written {
            hash: snapshot.hash,
            current: current_key.to_string(),
            historical: historical_key,
        })
    }
}

fn short_hash(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::models::{DocumentIds, Severity};
    use crate::services::{PageScraper, TableExtractor};
    use crate::testing::{MemoryAlerts, MemoryStore, ScriptedFetcher, sample_source};

    fn crawl_result(names: &[&str]) -> CrawlResult {
        let source = Arc::new(sample_source());
        let extractor = Arc::new(TableExtractor::for_source(&source).unwrap());
        let scraper = PageScraper::new(
            source,
            "healthtools",
            Arc::new(ScriptedFetcher::new()),
            extractor,
        );
        let rows = names
            .iter()
            .map(|n| vec![n.to_string(), "LIC".to_string()])
            .collect();
        CrawlResult {
            documents: scraper.build_documents(rows, &mut DocumentIds::new()),
            pages_total: 1,
            skipped_pages: 0,
        }
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
    }

    fn manager(store: Arc<MemoryStore>, alerts: Arc<MemoryAlerts>) -> ArchiveManager {
        ArchiveManager::new(store, alerts)
    }

    #[tokio::test]
    async fn first_run_writes_current_and_historical() {
        let store = Arc::new(MemoryStore::default());
        let archive = manager(store.clone(), Arc::new(MemoryAlerts::default()));
        let result = crawl_result(&["Jane Doe"]);

        let outcome = archive
            .archive(&sample_source(), &result, date(1))
            .await
            .unwrap();

        assert!(matches!(outcome, ArchiveOutcome::Written { .. }));
        assert_eq!(
            store.writes(),
            vec![
                "data/archive/sample-20250301.json".to_string(),
                "data/sample.json".to_string()
            ]
        );
        assert_eq!(
            store.get("data/sample.json"),
            Some(result.to_payload().unwrap())
        );
    }

    #[tokio::test]
    async fn same_payload_twice_is_unchanged() {
        let store = Arc::new(MemoryStore::default());
        let archive = manager(store.clone(), Arc::new(MemoryAlerts::default()));
        let result = crawl_result(&["Jane Doe"]);

        archive
            .archive(&sample_source(), &result, date(1))
            .await
            .unwrap();
        let second = archive
            .archive(&sample_source(), &result, date(2))
            .await
            .unwrap();

        assert!(matches!(second, ArchiveOutcome::Unchanged { .. }));
        assert_eq!(store.writes().len(), 2);
        assert!(store.get("data/archive/sample-20250302.json").is_none());
    }

    #[tokio::test]
    async fn changed_payload_same_day_overwrites_entry() {
        let store = Arc::new(MemoryStore::default());
        let archive = manager(store.clone(), Arc::new(MemoryAlerts::default()));

        archive
            .archive(&sample_source(), &crawl_result(&["Jane Doe"]), date(1))
            .await
            .unwrap();
        let changed = crawl_result(&["Jane Doe", "John Roe"]);
        archive
            .archive(&sample_source(), &changed, date(1))
            .await
            .unwrap();

        let historical = "data/archive/sample-20250301.json";
        let historical_writes = store
            .writes()
            .iter()
            .filter(|k| k.as_str() == historical)
            .count();
        assert_eq!(historical_writes, 2);
        assert_eq!(store.get(historical), Some(changed.to_payload().unwrap()));
    }

    #[tokio::test]
    async fn storage_failure_is_alerted() {
        let store = Arc::new(MemoryStore::default());
        store.fail_writes.store(true, Ordering::SeqCst);
        let alerts = Arc::new(MemoryAlerts::default());
        let archive = manager(store, alerts.clone());

        let err = archive
            .archive(&sample_source(), &crawl_result(&["Jane Doe"]), date(1))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Archive { .. }));
        let alerts = alerts.alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].stage, "archive_data");
        assert_eq!(alerts[0].severity, Severity::High);
    }

    #[tokio::test]
    async fn failed_historical_write_is_retried_next_run() {
        let store = Arc::new(MemoryStore::default());
        store.fail_next_historical.store(true, Ordering::SeqCst);
        let archive = manager(store.clone(), Arc::new(MemoryAlerts::default()));
        let result = crawl_result(&["Jane Doe"]);

        let err = archive
            .archive(&sample_source(), &result, date(1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Archive { .. }));
        assert!(store.get("data/sample.json").is_none());

        let retry = archive
            .archive(&sample_source(), &result, date(1))
            .await
            .unwrap();
        assert!(matches!(retry, ArchiveOutcome::Written { .. }));
        assert_eq!(
            store.get("data/archive/sample-20250301.json"),
            Some(result.to_payload().unwrap())
        );
    }

    #[tokio::test]
    async fn previous_run_snapshot_is_replaced_when_payload_changes() {
        let store = Arc::new(MemoryStore::default());
        let result = crawl_result(&["Jane Doe"]);
        store.seed("data/sample.json", "[]");
        let archive = manager(store.clone(), Arc::new(MemoryAlerts::default()));

        let outcome = archive
            .archive(&sample_source(), &result, date(4))
            .await
            .unwrap();
        assert!(matches!(outcome, ArchiveOutcome::Written { .. }));
        assert_eq!(
            store.get("data/sample.json"),
            Some(result.to_payload().unwrap())
        );

        store.seed("data/sample.json", &result.to_payload().unwrap());
        let again = archive
            .archive(&sample_source(), &result, date(5))
            .await
            .unwrap();
        assert!(matches!(again, ArchiveOutcome::Unchanged { .. }));
    }

    #[test]
    fn short_hash_handles_short_input() {
        assert_eq!(short_hash("abc"), "abc");
        assert_eq!(short_hash("0123456789abcdef"), "0123456789ab");
    }
}
