// src/config.rs

//! Configuration loading utilities.
//!
//! Configuration comes from a TOML file (local path, or an S3 object in
//! Lambda) with environment overrides applied on top.

use std::path::Path;

use crate::error::Result;
use crate::models::Config;

/// Load configuration from a TOML file and the process environment.
///
/// Falls back to defaults if the file cannot be loaded. The result is validated.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = Config::load_or_default(path);
    config.apply_process_env();
    config.validate()?;
    Ok(config)
}

#[cfg(feature = "s3")]
pub use lambda_loader::LambdaConfigLoader;

#[cfg(feature = "s3")]
mod lambda_loader {
    use crate::error::{AppError, Result};
    use crate::models::Config;
    use crate::storage::{S3Storage, SnapshotStore};

    /// Config loader for Lambda environment.
    pub struct LambdaConfigLoader {
        storage: S3Storage,
    }

    impl LambdaConfigLoader {
        pub fn new(storage: S3Storage) -> Self {
            Self { storage }
        }

        /// Read `key` from the bucket, apply environment overrides and validate.
        pub async fn load_config(&self, key: &str) -> Result<Config> {
            log::info!("Loading config file from {}", self.storage.location(key));
            let bytes = self
                .storage
                .read(key)
                .await?
                .ok_or_else(|| AppError::config(format!("Config file not found in S3: {key}")))?;

            let content = String::from_utf8(bytes).map_err(|e| {
                AppError::config(format!("Config file {key} is not valid UTF-8: {e}"))
            })?;

            let mut config = Config::from_toml(&content)?;
            config.apply_process_env();
            config.validate()?;
            Ok(config)
        }
    }
}
