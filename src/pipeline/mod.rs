//! Pipeline entry points for crawl runs.
//!
//! - `run_pipeline`: Crawl, reindex and archive every configured source
//! - `CrawlOrchestrator`: Drive a single source through one run

pub mod archive;
pub mod crawl;
pub mod index;
pub mod pagination;
#[allow(clippy::module_inception)]
pub mod pipeline;

pub use archive::{ArchiveManager, ArchiveOutcome};
pub use crawl::{Collaborators, CrawlOrchestrator, RunOptions, RunOutcome, RunReport, RunState};
pub use index::{IndexPublisher, PublishReport};
pub use pagination::PaginationResolver;
pub use pipeline::{build_collaborators, open_store, run_pipeline, run_sources, select_sources};
