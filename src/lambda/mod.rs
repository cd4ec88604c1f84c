// src/lambda/mod.rs

//! AWS Lambda handler for the crawler.
//!
//! This module provides the Lambda function entry point that:
//! 1. Loads configuration from S3 (`CONFIG_S3_KEY`) or the environment
//! 2. Crawls the selected registry sources
//! 3. Reindexes them into the search index
//! 4. Archives changed payloads to S3

use lambda_runtime::{Error as LambdaError, LambdaEvent};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::config::LambdaConfigLoader;
use crate::error::{AppError, Result};
use crate::models::{ArchiveBackend, Config};
use crate::pipeline::{RunReport, run_pipeline};
use crate::storage::S3Storage;

/// Lambda invocation payload.
#[derive(Debug, Default, Deserialize)]
pub struct CrawlRequest {
    /// Crawl a single source by name (all sources if not specified)
    #[serde(default)]
    pub source: Option<String>,

    /// Scrape only the configured small batch of pages
    #[serde(default)]
    pub small_batch: bool,
}

/// Lambda response payload.
#[derive(Debug, Default, Serialize)]
pub struct CrawlResponse {
    /// Whether every selected source ran without errors
    pub success: bool,

    /// Per-source run summaries
    pub runs: Vec<RunReport>,

    /// Error message if the pipeline could not start
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Execution time in milliseconds
    pub execution_time_ms: u64,
}

/// Main Lambda handler function.
#[instrument(skip(event))]
pub async fn handler(
    event: LambdaEvent<CrawlRequest>,
) -> std::result::Result<CrawlResponse, LambdaError> {
    let start = std::time::Instant::now();
    let (request, _context) = event.into_parts();

    info!(
        "Starting crawl: source={:?}, small_batch={}",
        request.source, request.small_batch
    );

    match run_crawl(&request).await {
        Ok(runs) => {
            let response = CrawlResponse {
                success: runs.iter().all(RunReport::is_success),
                runs,
                error: None,
                execution_time_ms: start.elapsed().as_millis() as u64,
            };
            info!(
                "Crawl completed: {} sources, success={} in {}ms",
                response.runs.len(),
                response.success,
                response.execution_time_ms
            );
            Ok(response)
        }
        Err(e) => {
            error!("Crawl failed: {}", e);
            Ok(CrawlResponse {
                error: Some(e.to_string()),
                execution_time_ms: start.elapsed().as_millis() as u64,
                ..Default::default()
            })
        }
    }
}

async fn run_crawl(request: &CrawlRequest) -> Result<Vec<RunReport>> {
    let mut config = load_lambda_config().await?;
    apply_request(&mut config, request);
    run_pipeline(&config, request.source.as_deref()).await
}

/// Load configuration suitable for Lambda environment.
async fn load_lambda_config() -> Result<Config> {
    let bucket = std::env::var("S3_BUCKET").ok();

    let mut config = match (std::env::var("CONFIG_S3_KEY").ok(), bucket.clone()) {
        (Some(key), Some(bucket)) => {
            let storage = S3Storage::from_env(bucket, "").await?;
            LambdaConfigLoader::new(storage).load_config(&key).await?
        }
        (Some(_), None) => {
            return Err(AppError::config("CONFIG_S3_KEY is set but S3_BUCKET is not"));
        }
        (None, _) => {
            let mut config = Config::default();
            config.apply_process_env();
            config
        }
    };

    // Lambda has no persistent filesystem
    config.archive.backend = ArchiveBackend::S3;
    if config.archive.bucket.is_none() {
        config.archive.bucket = bucket;
    }
    config.validate()?;
    Ok(config)
}

fn apply_request(config: &mut Config, request: &CrawlRequest) {
    if request.small_batch {
        config.crawler.small_batch = true;
    }
}
