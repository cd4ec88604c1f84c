//! Page count discovery.

use std::sync::Arc;

use regex::Regex;

use crate::error::{AppError, Result};
use crate::models::SourceConfig;
use crate::services::{PageFetcher, RecordExtractor};

/// Determines how many listing pages a run covers.
pub struct PaginationResolver {
    fetcher: Arc<dyn PageFetcher>,
    extractor: Arc<dyn RecordExtractor>,
    small_batch_pages: u32,
    pattern: Regex,
}

impl PaginationResolver {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        extractor: Arc<dyn RecordExtractor>,
        small_batch_pages: u32,
    ) -> Result<Self> {
        let pattern = Regex::new(r"(\d+) pages?")
            .map_err(|e| AppError::config(format!("pagination pattern: {e}")))?;
        Ok(Self {
            fetcher,
            extractor,
            small_batch_pages,
            pattern,
        })
    }

    /// Number of pages to scrape for `source`.
    ///
    /// Small-batch runs use the configured constant without touching the
    /// network. Otherwise page 1 is fetched once and its pagination indicator
    /// is read; any failure on the way is a `PaginationParse` error.
    pub async fn resolve(&self, source: &SourceConfig, small_batch: bool) -> Result<u32> {
        if small_batch {
            log::info!(
                "[{}] Small batch mode: scraping {} pages",
                source.name,
                self.small_batch_pages
            );
            return Ok(self.small_batch_pages);
        }

        let url = source.page_url(1);
        let body = self
            .fetcher
            .fetch(&url)
            .await
            .map_err(|e| AppError::pagination(&url, e))?;

        let text = self
            .extractor
            .pagination_text(&body)
            .ok_or_else(|| AppError::pagination(&url, "pagination indicator not found"))?;

        let pages = self.page_count(&text).ok_or_else(|| {
            AppError::pagination(&url, format!("no page count in {text:?}"))
        })?;

        log::info!("[{}] {} pages to scrape", source.name, pages);
        Ok(pages)
    }

    /// First `N page(s)` count in an indicator text.
    pub fn page_count(&self, text: &str) -> Option<u32> {
        self.pattern
            .captures(text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::TableExtractor;
    use crate::testing::{ScriptedFetcher, listing_page, sample_source};

    const PAGE_1: &str = "http://registry.test/?page=1";

    fn resolver(fetcher: Arc<ScriptedFetcher>) -> PaginationResolver {
        let extractor = Arc::new(TableExtractor::for_source(&sample_source()).unwrap());
        PaginationResolver::new(fetcher, extractor, 3).unwrap()
    }

    #[test]
    fn page_count_matches_singular_and_plural() {
        let resolver = resolver(Arc::new(ScriptedFetcher::new()));
        assert_eq!(resolver.page_count("Page 1 of 42 pages"), Some(42));
        assert_eq!(resolver.page_count("1 page"), Some(1));
        assert_eq!(resolver.page_count("Showing 7 pages of 70 pages"), Some(7));
        assert_eq!(resolver.page_count("no count here"), None);
    }

    #[tokio::test]
    async fn small_batch_skips_network() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        let pages = resolver(Arc::clone(&fetcher))
            .resolve(&sample_source(), true)
            .await
            .unwrap();

        assert_eq!(pages, 3);
        assert!(fetcher.calls().is_empty());
    }

    #[tokio::test]
    async fn reads_indicator_from_first_page() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.page(PAGE_1, listing_page(&[], Some("Page 1 of\n 12 pages")));

        let pages = resolver(Arc::clone(&fetcher))
            .resolve(&sample_source(), false)
            .await
            .unwrap();

        assert_eq!(pages, 12);
        assert_eq!(fetcher.calls(), vec![PAGE_1.to_string()]);
    }

    #[tokio::test]
    async fn missing_indicator_is_pagination_error() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.page(PAGE_1, listing_page(&[&["Jane Doe", "LIC-100"]], None));

        let err = resolver(fetcher)
            .resolve(&sample_source(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PaginationParse { .. }));
    }

    #[tokio::test]
    async fn unreadable_indicator_is_pagination_error() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.page(PAGE_1, listing_page(&[], Some("Next »")));

        let err = resolver(fetcher)
            .resolve(&sample_source(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PaginationParse { .. }));
    }

    #[tokio::test]
    async fn fetch_failure_is_pagination_error() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.broken(PAGE_1);

        let err = resolver(fetcher)
            .resolve(&sample_source(), false)
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }
}
