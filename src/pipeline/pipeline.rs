// src/pipeline/pipeline.rs

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};

use crate::error::{AppError, Result};
use crate::models::{ArchiveBackend, ArchiveConfig, Config, SourceConfig};
use crate::services::{ElasticsearchClient, HttpFetcher, alert::sink_from_config};
use crate::storage::{LocalStorage, SnapshotStore};
use crate::utils::log;

use super::crawl::{Collaborators, CrawlOrchestrator, RunReport};

/// Open the configured snapshot store.
pub async fn open_store(config: &ArchiveConfig) -> Result<Arc<dyn SnapshotStore>> {
    match config.backend {
        ArchiveBackend::Local => {
            let storage = if config.test_mode {
                LocalStorage::for_tests(&config.data_dir)
            } else {
                LocalStorage::new(&config.data_dir)
            };
            Ok(Arc::new(storage))
        }
        ArchiveBackend::S3 => open_s3(config).await,
    }
}

#[cfg(feature = "s3")]
async fn open_s3(config: &ArchiveConfig) -> Result<Arc<dyn SnapshotStore>> {
    let bucket = config
        .bucket
        .clone()
        .ok_or_else(|| AppError::config("archive.bucket is required for the s3 backend"))?;
    let storage = crate::storage::S3Storage::from_env(bucket, config.prefix.clone()).await?;
    Ok(Arc::new(storage))
}

#[cfg(not(feature = "s3"))]
async fn open_s3(_config: &ArchiveConfig) -> Result<Arc<dyn SnapshotStore>> {
    Err(AppError::config("archive backend 's3' requires the `s3` feature"))
}

/// Build the shared collaborators of a run from configuration.
pub async fn build_collaborators(config: &Config) -> Result<Collaborators> {
    let fetcher = HttpFetcher::from_config(&config.crawler)?;
    let search = ElasticsearchClient::new(
        &config.search,
        Duration::from_secs(config.crawler.timeout_secs),
    )?;

    Ok(Collaborators {
        fetcher: Arc::new(fetcher),
        search: Arc::new(search),
        store: open_store(&config.archive).await?,
        alerts: sink_from_config(&config.alert)?,
    })
}

/// Sources selected for a run: one by name, or all of them.
pub fn select_sources<'a>(config: &'a Config, only: Option<&str>) -> Result<Vec<&'a SourceConfig>> {
    match only {
        Some(name) => config
            .source(name)
            .map(|source| vec![source])
            .ok_or_else(|| AppError::config(format!("unknown source '{name}'"))),
        None => Ok(config.sources.iter().collect()),
    }
}

/// Run the selected sources one after another.
pub async fn run_pipeline(config: &Config, only: Option<&str>) -> Result<Vec<RunReport>> {
    let services = build_collaborators(config).await?;
    run_sources(config, only, services, Local::now().date_naive()).await
}

/// Run the selected sources with the given collaborators and run date.
pub async fn run_sources(
    config: &Config,
    only: Option<&str>,
    services: Collaborators,
    run_date: NaiveDate,
) -> Result<Vec<RunReport>> {
    let sources = select_sources(config, only)?;
    let total = sources.len();
    let mut reports = Vec::with_capacity(total);

    for (position, source) in sources.into_iter().enumerate() {
        ::log::info!("[STEP {}/{}] {}", position + 1, total, source.name);
        let orchestrator = CrawlOrchestrator::new(
            Arc::new(source.clone()),
            config.search.index.clone(),
            services.clone(),
            &config.crawler,
        )?;
        reports.push(orchestrator.run(run_date).await);
    }

    let failed = reports.iter().filter(|r| !r.is_success()).count();
    log::summary(
        "Pipeline",
        &[
            ("Sources", total.to_string()),
            ("With errors", failed.to_string()),
            (
                "Documents",
                reports.iter().map(|r| r.documents).sum::<usize>().to_string(),
            ),
        ],
    );

    Ok(reports)
}
