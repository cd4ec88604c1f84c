//! Service layer for the crawler application.
//!
//! This module contains the collaborators of a crawl run:
//! - Page fetching (`PageFetcher`, `HttpFetcher`)
//! - Row extraction (`RecordExtractor`, `TableExtractor`)
//! - Page scraping with retries (`PageScraper`)
//! - Search index access (`SearchIndex`, `ElasticsearchClient`)
//! - Alert delivery (`AlertSink`, `SlackWebhook`, `LogSink`)

pub mod alert;
mod extractor;
mod fetcher;
mod page_scraper;
pub mod search;

pub use alert::{AlertSink, LogSink, SlackWebhook, report};
pub use extractor::{RecordExtractor, TableExtractor};
pub use fetcher::{HttpFetcher, PageFetcher};
pub use page_scraper::{DOCTOR_TYPE_FIELD, PageScraper};
pub use search::{ElasticsearchClient, SearchIndex};
