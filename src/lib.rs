// src/lib.rs

//! Registry Crawler Library
//!
//! Crawls paginated public registry listings, reindexes the records into an
//! Elasticsearch-compatible search index and archives every changed run.

pub mod config;
pub mod error;
#[cfg(feature = "lambda")]
pub mod lambda;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;
