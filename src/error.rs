// src/error.rs

//! Unified error handling for the crawler application.

use std::fmt;

use thiserror::Error;

use crate::models::Severity;

/// Result type alias for crawler operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Page count could not be read from the first listing page
    #[error("Pagination parse error for {url}: {message}")]
    PaginationParse { url: String, message: String },

    /// A listing page could not be fetched or parsed
    #[error("Page parse error for {url} after {attempts} attempt(s): {message}")]
    PageParse {
        url: String,
        attempts: u32,
        message: String,
    },

    /// The listing layout no longer matches the configured fields
    #[error("Site structure error for {url}: {message}")]
    SiteStructure { url: String, message: String },

    /// Deleting the previous generation of documents failed
    #[error("Index delete error on {index}/{doc_type}: {message}")]
    IndexDelete {
        index: String,
        doc_type: String,
        message: String,
    },

    /// Bulk inserting the new generation of documents failed
    #[error("Index insert error on {index}: {message}")]
    IndexInsert { index: String, message: String },

    /// Snapshot storage failed
    #[error("Archive error for {key}: {message}")]
    Archive { key: String, message: String },

    /// The scraping phase ran past the configured run deadline
    #[error("Run deadline of {secs}s exceeded")]
    Deadline { secs: u64 },

    /// Crawling error
    #[error("Crawl error for {context}: {message}")]
    Crawl { context: String, message: String },

    /// Search index service rejected a request
    #[error("Search index error: {0}")]
    Search(String),

    /// AWS S3 error
    #[error("S3 error: {0}")]
    S3(String),

    /// Alert delivery failed
    #[error("Alert delivery error: {0}")]
    Alert(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a crawl error with context.
    pub fn crawl(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Crawl {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a pagination parse error.
    pub fn pagination(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::PaginationParse {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create a site structure error.
    pub fn site_structure(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::SiteStructure {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create an archive error for a storage key.
    pub fn archive(key: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Archive {
            key: key.into(),
            message: message.to_string(),
        }
    }

    /// Whether this error must abort the whole run instead of a single page.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::PaginationParse { .. } | Self::SiteStructure { .. } | Self::Deadline { .. }
        )
    }

    /// Severity attached to alerts raised for this error.
    pub fn severity(&self) -> Severity {
        match self {
            Self::PaginationParse { .. } | Self::SiteStructure { .. } => Severity::Critical,
            Self::IndexDelete { .. }
            | Self::IndexInsert { .. }
            | Self::Archive { .. }
            | Self::S3(_)
            | Self::Deadline { .. } => Severity::High,
            Self::PageParse { .. } => Severity::Medium,
            _ => Severity::Low,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_errors_abort_the_run() {
        assert!(AppError::pagination("u", "missing").is_fatal());
        assert!(AppError::site_structure("u", "columns").is_fatal());
        assert!(AppError::Deadline { secs: 5 }.is_fatal());

        let page = AppError::PageParse {
            url: "u".into(),
            attempts: 6,
            message: "timeout".into(),
        };
        assert!(!page.is_fatal());
        assert_eq!(page.severity(), Severity::Medium);
    }

    #[test]
    fn index_errors_are_high_severity() {
        let err = AppError::IndexInsert {
            index: "healthtools".into(),
            message: "503".into(),
        };
        assert_eq!(err.severity(), Severity::High);
        assert_eq!(err.to_string(), "Index insert error on healthtools: 503");
    }
}
