//! Row extraction from listing pages.
//!
//! Extraction is per source: the default `TableExtractor` reads a results
//! table with configurable CSS selectors, but any `RecordExtractor` can be
//! plugged into the scraper.

use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};
use crate::models::SourceConfig;
use crate::utils::normalize_whitespace;

/// Turns a fetched page body into raw cell rows.
pub trait RecordExtractor: Send + Sync {
    /// Cell texts of every result row, trimmed to the scraped columns.
    ///
    /// Returns `AppError::SiteStructure` when the page no longer matches the
    /// source layout; any other error is treated as a page failure.
    fn extract_rows(&self, url: &str, body: &str) -> Result<Vec<Vec<String>>>;

    /// Text of the pagination indicator, if the page has one.
    fn pagination_text(&self, body: &str) -> Option<String>;
}

/// Extractor for class-identified HTML result tables.
#[derive(Debug)]
pub struct TableExtractor {
    table: Selector,
    row: Selector,
    cell: Selector,
    pagination: Selector,
    columns: usize,
}

impl TableExtractor {
    /// Build an extractor from a source's selectors and field list.
    pub fn for_source(source: &SourceConfig) -> Result<Self> {
        Ok(Self {
            table: Self::parse_selector(&source.table_selector)?,
            row: Self::parse_selector(&source.row_selector)?,
            cell: Self::parse_selector(&source.cell_selector)?,
            pagination: Self::parse_selector(&source.pagination_selector)?,
            columns: source.column_count(),
        })
    }

    fn parse_selector(s: &str) -> Result<Selector> {
        Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
    }

    /// A lone spanning cell marks an empty-result or separator row.
    fn is_placeholder(cells: &[ElementRef<'_>]) -> bool {
        cells.len() == 1 && cells[0].value().attr("colspan").is_some()
    }
}

impl RecordExtractor for TableExtractor {
    fn extract_rows(&self, url: &str, body: &str) -> Result<Vec<Vec<String>>> {
        let document = Html::parse_document(body);
        let table = document
            .select(&self.table)
            .next()
            .ok_or_else(|| AppError::crawl(url, "results table not found"))?;

        let mut rows = Vec::new();
        for (position, row) in table.select(&self.row).enumerate() {
            let cells: Vec<ElementRef<'_>> = row.select(&self.cell).collect();
            if cells.is_empty() || Self::is_placeholder(&cells) {
                continue;
            }
            if cells.len() < self.columns {
                return Err(AppError::site_structure(
                    url,
                    format!(
                        "row {} has {} cells, expected at least {}",
                        position + 1,
                        cells.len(),
                        self.columns
                    ),
                ));
            }
            rows.push(
                cells
                    .iter()
                    .take(self.columns)
                    .map(|cell| cell.text().collect::<String>().trim().to_string())
                    .collect(),
            );
        }
        Ok(rows)
    }

    fn pagination_text(&self, body: &str) -> Option<String> {
        let document = Html::parse_document(body);
        document
            .select(&self.pagination)
            .next()
            .map(|el| normalize_whitespace(&el.text().collect::<String>()))
    }
}
