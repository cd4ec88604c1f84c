//! AWS S3 storage implementation.
//!
//! The current snapshot carries its content hash in object metadata so the
//! unchanged check needs only a HEAD request. Historical snapshots are
//! written with the same metadata, before the current object moves.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;

use crate::error::{AppError, Result};
use crate::models::Snapshot;
use crate::storage::SnapshotStore;
use crate::utils::content_hash;

/// Object metadata key holding the payload hash.
pub const HASH_METADATA_KEY: &str = "content-sha256";
const CREATED_AT_METADATA_KEY: &str = "created-at";

/// S3-based snapshot storage.
pub struct S3Storage {
    client: Client,
    bucket: String,
    prefix: String,
}

impl S3Storage {
    /// Create a new S3 storage instance.
    pub fn new(client: Client, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }

    /// Create S3 storage using the default AWS credential chain.
    pub async fn from_env(bucket: impl Into<String>, prefix: impl Into<String>) -> Result<Self> {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Ok(Self::new(Client::new(&config), bucket, prefix))
    }

    /// Full object key including the configured prefix.
    fn object_key(&self, key: &str) -> String {
        let prefix = self.prefix.trim_matches('/');
        let key = key.trim_start_matches('/');
        if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{prefix}/{key}")
        }
    }

    async fn put_snapshot(&self, key: &str, snapshot: &Snapshot) -> Result<()> {
        let bytes = ByteStream::from(snapshot.payload.clone().into_bytes());

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(self.object_key(key))
            .body(bytes)
            .content_type("application/json")
            .metadata(HASH_METADATA_KEY, &snapshot.hash)
            .metadata(CREATED_AT_METADATA_KEY, snapshot.created_at.to_rfc3339())
            .send()
            .await
            .map_err(|e| Self::s3_error(e.into_service_error()))?;
        Ok(())
    }

    fn s3_error(err: impl std::fmt::Display) -> AppError {
        AppError::S3(err.to_string())
    }
}

#[async_trait]
impl SnapshotStore for S3Storage {
    async fn stored_hash(&self, key: &str) -> Result<Option<String>> {
        let object_key = self.object_key(key);
        let result = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let hash = output
                    .metadata()
                    .and_then(|m| m.get(HASH_METADATA_KEY))
                    .cloned();
                match hash {
                    Some(hash) => Ok(Some(hash)),
                    // Objects written before the metadata existed
                    None => Ok(self.read(key).await?.map(|bytes| content_hash(&bytes))),
                }
            }
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_not_found() {
                    log::info!("No existing snapshot at {}", self.location(key));
                    Ok(None)
                } else {
                    Err(Self::s3_error(service_err))
                }
            }
        }
    }

    async fn write_current(&self, key: &str, snapshot: &Snapshot) -> Result<()> {
        self.put_snapshot(key, snapshot).await?;
        log::info!("Current snapshot written to {}", self.location(key));
        Ok(())
    }

    async fn write_historical(&self, key: &str, snapshot: &Snapshot) -> Result<()> {
        self.put_snapshot(key, snapshot).await?;
        log::info!("Historical snapshot written to {}", self.location(key));
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.object_key(key))
            .send()
            .await;

        match result {
            Ok(output) => {
                let bytes = output.body.collect().await.map_err(Self::s3_error)?;
                Ok(Some(bytes.into_bytes().to_vec()))
            }
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    Ok(None)
                } else {
                    Err(Self::s3_error(service_err))
                }
            }
        }
    }

    fn location(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, self.object_key(key))
    }
}
