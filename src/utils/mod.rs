//! Utility functions and helpers.

pub mod http;
pub mod log;

use chrono::NaiveDate;
use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of a payload.
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Calendar-date key of a run, `YYYYMMDD`.
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
