//! Archived payload snapshots.

use chrono::{DateTime, Utc};

use crate::utils::content_hash;

/// A crawl payload together with its content hash.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub payload: String,
    pub hash: String,
    pub created_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(payload: String) -> Self {
        let hash = content_hash(payload.as_bytes());
        Self {
            payload,
            hash,
            created_at: Utc::now(),
        }
    }

    /// Whether the stored hash differs from this snapshot's hash.
    pub fn differs_from(&self, stored_hash: Option<&str>) -> bool {
        stored_hash != Some(self.hash.as_str())
    }
}
