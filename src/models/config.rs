//! Application configuration structures.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::SourceConfig;
use crate::models::source::defaults as source_defaults;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP and crawling behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Search index connection
    #[serde(default)]
    pub search: SearchConfig,

    /// Snapshot archive backend
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// Alert webhook
    #[serde(default)]
    pub alert: AlertConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Registry listings to crawl
    #[serde(default = "source_defaults::default_sources")]
    pub sources: Vec<SourceConfig>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Apply environment overrides through a lookup function.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("ES_HOST") {
            self.search.url = url;
        }
        if let Some(index) = lookup("ES_INDEX") {
            self.search.index = index;
        }
        if let Some(username) = lookup("ES_USERNAME") {
            self.search.username = Some(username);
        }
        if let Some(password) = lookup("ES_PASSWORD") {
            self.search.password = Some(password);
        }
        if let Some(bucket) = lookup("S3_BUCKET").filter(|b| !b.trim().is_empty()) {
            self.archive.backend = ArchiveBackend::S3;
            self.archive.bucket = Some(bucket);
        }
        if let Some(prefix) = lookup("S3_PREFIX") {
            self.archive.prefix = prefix;
        }
        if let Some(dir) = lookup("DATA_DIR") {
            self.archive.data_dir = PathBuf::from(dir);
        }
        if let Some(url) = lookup("SLACK_URL").filter(|u| !u.trim().is_empty()) {
            self.alert.webhook_url = Some(url);
        }
        if let Some(flag) = lookup("SMALL_BATCH") {
            self.crawler.small_batch = matches!(flag.trim(), "1" | "true" | "yes");
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    /// Log level for a config file: the file's setting, then `LOG_LEVEL`.
    ///
    /// Read before any logger exists, so load failures fall back silently.
    pub fn log_level_from<F>(path: impl AsRef<Path>, lookup: F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::load(path).unwrap_or_default();
        config.apply_env(lookup);
        config.logging.level
    }

    /// Apply overrides from the process environment.
    pub fn apply_process_env(&mut self) {
        self.apply_env(|key| std::env::var(key).ok());
    }

    /// Find a source by name.
    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.name == name)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.max_concurrent == 0 {
            return Err(AppError::validation("crawler.max_concurrent must be > 0"));
        }
        if self.crawler.small_batch_pages == 0 {
            return Err(AppError::validation("crawler.small_batch_pages must be > 0"));
        }
        if self.search.index.trim().is_empty() {
            return Err(AppError::validation("search.index is empty"));
        }
        url::Url::parse(&self.search.url)?;
        if self.archive.backend == ArchiveBackend::S3 && self.archive.bucket.is_none() {
            return Err(AppError::validation("archive.bucket is required for the s3 backend"));
        }
        if self.sources.is_empty() {
            return Err(AppError::validation("No sources defined"));
        }

        let mut names = HashSet::new();
        for source in &self.sources {
            source.validate()?;
            if !names.insert(source.name.as_str()) {
                return Err(AppError::validation(format!(
                    "duplicate source name '{}'",
                    source.name
                )));
            }
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            crawler: CrawlerConfig::default(),
            search: SearchConfig::default(),
            archive: ArchiveConfig::default(),
            alert: AlertConfig::default(),
            logging: LoggingConfig::default(),
            sources: source_defaults::default_sources(),
        }
    }
}

/// HTTP client and crawling behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Extra attempts after the first failure of a page
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// Base delay of the exponential retry backoff; 0 retries immediately
    #[serde(default = "defaults::retry_backoff")]
    pub retry_backoff_ms: u64,

    /// Scrape only `small_batch_pages` pages, without reading the page count
    #[serde(default)]
    pub small_batch: bool,

    #[serde(default = "defaults::small_batch_pages")]
    pub small_batch_pages: u32,

    /// Maximum pages fetched concurrently
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Delay between pages in milliseconds
    #[serde(default)]
    pub request_delay_ms: u64,

    /// Deadline for the scraping phase of one run; 0 disables it
    #[serde(default = "defaults::run_deadline")]
    pub run_deadline_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_retries: defaults::max_retries(),
            retry_backoff_ms: defaults::retry_backoff(),
            small_batch: false,
            small_batch_pages: defaults::small_batch_pages(),
            max_concurrent: defaults::max_concurrent(),
            request_delay_ms: 0,
            run_deadline_secs: defaults::run_deadline(),
        }
    }
}

/// Search index connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Base URL of the Elasticsearch-compatible service
    #[serde(default = "defaults::search_url")]
    pub url: String,

    #[serde(default = "defaults::search_index")]
    pub index: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            url: defaults::search_url(),
            index: defaults::search_index(),
            username: None,
            password: None,
        }
    }
}

/// Where snapshots are stored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveBackend {
    #[default]
    Local,
    S3,
}

/// Snapshot archive settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    #[serde(default)]
    pub backend: ArchiveBackend,

    /// Root directory of the local backend
    #[serde(default = "defaults::data_dir")]
    pub data_dir: PathBuf,

    /// Bucket of the S3 backend
    #[serde(default)]
    pub bucket: Option<String>,

    /// Key prefix of the S3 backend
    #[serde(default)]
    pub prefix: String,

    /// Write local snapshots under a `test/` prefix
    #[serde(default)]
    pub test_mode: bool,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            backend: ArchiveBackend::Local,
            data_dir: defaults::data_dir(),
            bucket: None,
            prefix: String::new(),
            test_mode: false,
        }
    }
}

/// Alert webhook settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Slack-compatible incoming webhook; alerts are only logged when unset
    #[serde(default)]
    pub webhook_url: Option<String>,

    #[serde(default = "defaults::alert_timeout")]
    pub timeout_secs: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_secs: defaults::alert_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; registry-crawler/1.0)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn max_retries() -> u32 {
        5
    }
    pub fn retry_backoff() -> u64 {
        250
    }
    pub fn small_batch_pages() -> u32 {
        3
    }
    pub fn max_concurrent() -> usize {
        1
    }
    pub fn run_deadline() -> u64 {
        3600
    }

    // Search defaults
    pub fn search_url() -> String {
        "http://127.0.0.1:9200".into()
    }
    pub fn search_index() -> String {
        "healthtools".into()
    }

    // Archive defaults
    pub fn data_dir() -> PathBuf {
        PathBuf::from("storage")
    }

    pub fn alert_timeout() -> u64 {
        10
    }

    pub fn log_level() -> String {
        "info".into()
    }
}
