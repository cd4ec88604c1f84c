//! Registry Crawler CLI
//!
//! Local execution entry point. For AWS Lambda, use `registry-crawler-lambda`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use registry_crawler::{
    config::load_config,
    error::Result,
    models::Config,
    pipeline::{self, RunOutcome},
};

/// Registry Crawler - scrape, reindex and archive public registries
#[derive(Parser, Debug)]
#[command(
    name = "registry-crawler",
    version,
    about = "Crawls registry listings into a search index"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "storage/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl, reindex and archive registry sources
    Crawl {
        /// Only crawl the named source
        #[arg(long)]
        source: Option<String>,

        /// Scrape only the configured small batch of pages
        #[arg(long)]
        small_batch: bool,
    },

    /// Validate the configuration file
    Validate,

    /// Show current snapshot info per source
    Info,
}

/// Initialize logging based on verbosity flag and configured level.
fn init_logging(verbose: bool, configured: &str) {
    let level = if verbose { "debug" } else { configured };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = Config::log_level_from(&cli.config, |key| std::env::var(key).ok());
    init_logging(cli.verbose, &level);

    log::info!("Registry crawler starting...");

    match cli.command {
        Command::Crawl {
            source,
            small_batch,
        } => {
            let mut config = load_config(&cli.config)?;
            if small_batch {
                config.crawler.small_batch = true;
            }

            let reports = pipeline::run_pipeline(&config, source.as_deref()).await?;
            let aborted = reports
                .iter()
                .filter(|r| r.outcome == RunOutcome::Aborted)
                .count();

            for report in &reports {
                log::info!(
                    "{}: {:?}, {} documents, {} skipped pages",
                    report.source,
                    report.outcome,
                    report.documents,
                    report.skipped_pages
                );
            }

            if aborted > 0 {
                log::warn!("{} of {} sources aborted", aborted, reports.len());
            }
            log::info!("Crawl complete!");
        }

        Command::Validate => {
            log::info!("Validating {}...", cli.config.display());

            let mut config = Config::load(&cli.config)?;
            config.apply_process_env();
            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("Config OK ({} sources)", config.sources.len());

            log::info!("All validations passed!");
        }

        Command::Info => {
            let config = load_config(&cli.config)?;
            let store = pipeline::open_store(&config.archive).await?;

            for source in &config.sources {
                let location = store.location(&source.archive_key);
                match store.read(&source.archive_key).await? {
                    Some(bytes) => log::info!(
                        "{}: {} ({} bytes, sha256 {})",
                        source.name,
                        location,
                        bytes.len(),
                        registry_crawler::utils::content_hash(&bytes)
                    ),
                    None => log::info!("{}: no snapshot at {}", source.name, location),
                }
            }
        }
    }

    log::info!("Done!");

    Ok(())
}
