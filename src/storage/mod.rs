//! Storage abstractions for snapshot persistence.
//!
//! Every source owns two kinds of snapshot keys:
//! - Current: the latest published payload, overwritten in place
//! - Historical: one copy per run date, keyed `YYYYMMDD`
//!
//! ## Directory Structure
//!
//! ```text
//! storage/
//! └── data/
//!     ├── doctors.json                    # Current
//!     └── archive/
//!         ├── doctors-20250301.json       # Historical
//!         └── doctors-20250302.json
//! ```

pub mod local;
#[cfg(feature = "s3")]
pub mod s3;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Snapshot;

// Re-export for convenience
pub use local::LocalStorage;
#[cfg(feature = "s3")]
pub use s3::S3Storage;

/// Trait for snapshot storage backends.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Content hash of the snapshot stored at `key`, `None` if there is none.
    async fn stored_hash(&self, key: &str) -> Result<Option<String>>;

    /// Overwrite the current snapshot.
    async fn write_current(&self, key: &str, snapshot: &Snapshot) -> Result<()>;

    /// Create or overwrite a dated historical snapshot.
    async fn write_historical(&self, key: &str, snapshot: &Snapshot) -> Result<()>;

    /// Raw snapshot bytes, `None` if absent.
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Human-readable location of a key, for logs.
    fn location(&self, key: &str) -> String;
}
