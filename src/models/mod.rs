// src/models/mod.rs

//! Domain models for the crawler application.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod alert;
mod config;
mod document;
mod snapshot;
pub(crate) mod source;

// Re-export all public types
pub use alert::{Alert, Severity, machine_identity};
pub use config::{
    AlertConfig, ArchiveBackend, ArchiveConfig, Config, CrawlerConfig, LoggingConfig,
    SearchConfig,
};
pub use document::{CrawlResult, DocumentIds, DocumentMeta, IndexDocument, Record};
pub use snapshot::Snapshot;
pub use source::{Category, SourceConfig};
