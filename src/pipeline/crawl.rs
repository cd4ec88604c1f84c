//! Crawl run orchestration.
//!
//! One run covers a single source:
//!
//! ```text
//! NotStarted -> ResolvingPages -> ScrapingPage(1..=n) -> Publishing -> Archiving -> Done
//!                     |                  |
//!                     +------------------+--> Aborted
//! ```
//!
//! Pages that exhaust their retries are skipped and alerted. Pagination
//! failures, site structure changes and the run deadline abort the run before
//! anything is published. An empty result ends the run without side effects.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::{Alert, CrawlResult, CrawlerConfig, DocumentIds, SourceConfig};
use crate::pipeline::archive::{ArchiveManager, ArchiveOutcome};
use crate::pipeline::index::IndexPublisher;
use crate::pipeline::pagination::PaginationResolver;
use crate::services::{
    AlertSink, PageFetcher, PageScraper, RecordExtractor, SearchIndex, TableExtractor, report,
};
use crate::storage::SnapshotStore;
use crate::utils::log::{header, inline, summary};

/// Position of a run in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    NotStarted,
    ResolvingPages,
    ScrapingPage(u32),
    Publishing,
    Archiving,
    Done,
    Aborted,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Documents were published and archived, possibly with reported errors
    Completed,
    /// No documents were scraped; nothing was touched
    Empty,
    /// A fatal error stopped the run before publishing
    Aborted,
}

/// Summary of one run.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub source: String,
    pub outcome: RunOutcome,
    pub state: RunState,
    pub pages_total: u32,
    pub documents: usize,
    pub skipped_pages: usize,
    pub deleted: Option<u64>,
    pub inserted: usize,
    pub archive: Option<ArchiveOutcome>,
    pub errors: Vec<String>,
    pub elapsed_ms: u64,

    /// Error that aborted the run
    #[serde(skip)]
    pub fatal: Option<AppError>,
}

impl RunReport {
    fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            outcome: RunOutcome::Aborted,
            state: RunState::NotStarted,
            pages_total: 0,
            documents: 0,
            skipped_pages: 0,
            deleted: None,
            inserted: 0,
            archive: None,
            errors: Vec::new(),
            elapsed_ms: 0,
            fatal: None,
        }
    }

    /// Whether the run finished without any reported error.
    pub fn is_success(&self) -> bool {
        self.outcome != RunOutcome::Aborted && self.errors.is_empty()
    }

    fn archive_label(&self) -> &'static str {
        match &self.archive {
            Some(ArchiveOutcome::Written { .. }) => "written",
            Some(ArchiveOutcome::Unchanged { .. }) => "unchanged",
            None => "none",
        }
    }

    fn summary_items(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Outcome", format!("{:?}", self.outcome)),
            ("Final state", format!("{:?}", self.state)),
            ("Pages", self.pages_total.to_string()),
            ("Skipped pages", self.skipped_pages.to_string()),
            ("Documents", self.documents.to_string()),
            ("Inserted", self.inserted.to_string()),
            ("Archive", self.archive_label().to_string()),
            ("Errors", self.errors.len().to_string()),
            ("Elapsed", format!("{} ms", self.elapsed_ms)),
        ]
    }
}

/// Run-time knobs taken from `[crawler]`.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub small_batch: bool,
    pub max_concurrent: usize,
    pub request_delay: Duration,
    /// Limit on the scraping phase; `None` disables it
    pub deadline: Option<Duration>,
}

impl RunOptions {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            small_batch: config.small_batch,
            max_concurrent: config.max_concurrent.max(1),
            request_delay: Duration::from_millis(config.request_delay_ms),
            deadline: (config.run_deadline_secs > 0)
                .then(|| Duration::from_secs(config.run_deadline_secs)),
        }
    }
}

/// Collaborators shared by every source of a run.
#[derive(Clone)]
pub struct Collaborators {
    pub fetcher: Arc<dyn PageFetcher>,
    pub search: Arc<dyn SearchIndex>,
    pub store: Arc<dyn SnapshotStore>,
    pub alerts: Arc<dyn AlertSink>,
}

/// Drives one source through a full crawl run.
pub struct CrawlOrchestrator {
    source: Arc<SourceConfig>,
    index: String,
    resolver: PaginationResolver,
    scraper: PageScraper,
    publisher: IndexPublisher,
    archiver: ArchiveManager,
    alerts: Arc<dyn AlertSink>,
    options: RunOptions,
}

impl CrawlOrchestrator {
    pub fn new(
        source: Arc<SourceConfig>,
        index: impl Into<String>,
        services: Collaborators,
        crawler: &CrawlerConfig,
    ) -> Result<Self> {
        let extractor: Arc<dyn RecordExtractor> = Arc::new(TableExtractor::for_source(&source)?);
        let index = index.into();

        let resolver = PaginationResolver::new(
            Arc::clone(&services.fetcher),
            Arc::clone(&extractor),
            crawler.small_batch_pages,
        )?;
        let scraper = PageScraper::new(
            Arc::clone(&source),
            index.clone(),
            Arc::clone(&services.fetcher),
            extractor,
        )
        .with_retry(crawler.max_retries, crawler.retry_backoff_ms);

        Ok(Self {
            source,
            index,
            resolver,
            scraper,
            publisher: IndexPublisher::new(services.search, Arc::clone(&services.alerts)),
            archiver: ArchiveManager::new(services.store, Arc::clone(&services.alerts)),
            alerts: services.alerts,
            options: RunOptions::from_config(crawler),
        })
    }

    /// Replace the run options taken from the crawler config.
    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Execute one run. Never fails: every error ends up in the report.
    pub async fn run(&self, run_date: NaiveDate) -> RunReport {
        let started = Instant::now();
        let mut report = RunReport::new(&self.source.name);
        header(&format!("Crawling {}", self.source.name));

        self.transition(&mut report, RunState::ResolvingPages);
        match self
            .resolver
            .resolve(&self.source, self.options.small_batch)
            .await
        {
            Ok(pages) => {
                report.pages_total = pages;
                self.crawl_and_publish(&mut report, pages, run_date).await;
            }
            Err(err) => self.abort(&mut report, "get_total_page_numbers", err).await,
        }

        report.elapsed_ms = started.elapsed().as_millis() as u64;
        self.log_summary(&report);
        report
    }

    async fn crawl_and_publish(&self, report: &mut RunReport, pages: u32, run_date: NaiveDate) {
        let scraped = match self.options.deadline {
            Some(limit) => {
                match tokio::time::timeout(limit, self.scrape_all(report, pages)).await {
                    Ok(scraped) => scraped,
                    Err(_) => Err(AppError::Deadline {
                        secs: limit.as_secs(),
                    }),
                }
            }
            None => self.scrape_all(report, pages).await,
        };

        let result = match scraped {
            Ok(result) => result,
            Err(err) => {
                let stage = match err {
                    AppError::Deadline { .. } => "run_deadline",
                    _ => "scrape_page",
                };
                return self.abort(report, stage, err).await;
            }
        };

        report.documents = result.len();
        report.skipped_pages = result.skipped_pages;

        if result.is_empty() {
            log::warn!(
                "[{}] No documents scraped; index and archive left untouched",
                self.source.name
            );
            report.outcome = RunOutcome::Empty;
            self.transition(report, RunState::Done);
            return;
        }

        self.transition(report, RunState::Publishing);
        let published = self
            .publisher
            .publish(&self.index, &self.source, &result)
            .await;
        report.deleted = published.deleted;
        report.inserted = published.inserted;
        report
            .errors
            .extend(published.errors.iter().map(ToString::to_string));

        self.transition(report, RunState::Archiving);
        match self.archiver.archive(&self.source, &result, run_date).await {
            Ok(outcome) => report.archive = Some(outcome),
            Err(err) => report.errors.push(err.to_string()),
        }

        report.outcome = RunOutcome::Completed;
        self.transition(report, RunState::Done);
    }

    /// Scrape every page in order, skipping pages that exhaust their retries.
    ///
    /// Up to `max_concurrent` pages are fetched at once; documents and ids are
    /// still assigned in page order. `request_delay` spaces out request starts
    /// regardless of concurrency.
    async fn scrape_all(&self, report: &mut RunReport, pages: u32) -> Result<CrawlResult> {
        let mut result = CrawlResult {
            pages_total: pages,
            ..CrawlResult::default()
        };
        let mut ids = DocumentIds::new();

        let delay = self.options.request_delay;
        let fetched = stream::iter(1..=pages)
            .then(move |page| async move {
                if page > 1 && !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                page
            })
            .map(|page| async move {
                let url = self.source.page_url(page);
                log::debug!("[{}] Fetching page {}/{}", self.source.name, page, pages);
                let rows = self.scraper.fetch_rows(&url).await;
                (page, url, rows)
            })
            .buffered(self.options.max_concurrent);
        let mut fetched = std::pin::pin!(fetched);

        while let Some((page, url, rows)) = fetched.next().await {
            self.transition(report, RunState::ScrapingPage(page));
            match rows {
                Ok(rows) => {
                    let documents = self.scraper.build_documents(rows, &mut ids);
                    log::info!(
                        "[{}] Page {}/{}: {} documents",
                        self.source.name,
                        page,
                        pages,
                        documents.len()
                    );
                    result.documents.extend(documents);
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    log::warn!("[{}] Skipping page {} ({})", self.source.name, page, url);
                    result.skipped_pages += 1;
                    report.skipped_pages = result.skipped_pages;
                    report.errors.push(err.to_string());
                    self.alert("scrape_page", &err).await;
                }
            }
        }

        Ok(result)
    }

    async fn abort(&self, report: &mut RunReport, stage: &str, err: AppError) {
        self.alert(stage, &err).await;
        report.errors.push(err.to_string());
        report.outcome = RunOutcome::Aborted;
        report.fatal = Some(err);
        self.transition(report, RunState::Aborted);
    }

    async fn alert(&self, stage: &str, err: &AppError) {
        report(
            self.alerts.as_ref(),
            Alert::from_error(&self.source.name, stage, err),
        )
        .await;
    }

    fn transition(&self, report: &mut RunReport, next: RunState) {
        log::debug!("[{}] {:?} -> {:?}", self.source.name, report.state, next);
        report.state = next;
    }

    fn log_summary(&self, report: &RunReport) {
        let items = report.summary_items();
        match report.outcome {
            RunOutcome::Aborted => {
                log::error!("[{}] Run aborted: {}", self.source.name, inline(&items))
            }
            _ => summary(&format!("Run finished for {}", self.source.name), &items),
        }
    }
}
