//! In-memory collaborators shared by unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::{Alert, Category, Snapshot, SourceConfig};
use crate::services::{AlertSink, PageFetcher, SearchIndex};
use crate::storage::SnapshotStore;
use crate::utils::content_hash;

/// A small doctors source served from `registry.test`.
pub fn sample_source() -> SourceConfig {
    SourceConfig {
        name: "sample".into(),
        category: Category::Doctors,
        site_url: "http://registry.test/?page={page}".into(),
        fields: vec!["name".into(), "license".into(), "id".into()],
        doctor_type: Some("local_doctor".into()),
        archive_key: "data/sample.json".into(),
        historical_key: "data/archive/sample-{date}.json".into(),
        table_selector: "table.zebra".into(),
        row_selector: "tbody tr".into(),
        cell_selector: "td".into(),
        pagination_selector: "div#tnt_pagination".into(),
    }
}

/// Render a listing page with the given rows and pagination text.
pub fn listing_page(rows: &[&[&str]], pagination: Option<&str>) -> String {
    let mut html = String::from("<html><body><table class=\"zebra\"><tbody>");
    for row in rows {
        html.push_str("<tr>");
        for cell in *row {
            html.push_str("<td>");
            html.push_str(cell);
            html.push_str("</td>");
        }
        html.push_str("</tr>");
    }
    html.push_str("</tbody></table>");
    if let Some(text) = pagination {
        html.push_str("<div id=\"tnt_pagination\">");
        html.push_str(text);
        html.push_str("</div>");
    }
    html.push_str("</body></html>");
    html
}

enum Reply {
    Body(String),
    Fail,
}

/// Fetcher that replays scripted responses per URL.
///
/// Unknown URLs fail. The last scripted reply of a URL repeats forever.
#[derive(Default)]
pub struct ScriptedFetcher {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for every request to `url`.
    pub fn page(&self, url: &str, body: String) {
        self.script(url, vec![Reply::Body(body)]);
    }

    /// Fail `failures` times, then serve `body`.
    pub fn flaky(&self, url: &str, failures: usize, body: String) {
        let mut replies: Vec<Reply> = (0..failures).map(|_| Reply::Fail).collect();
        replies.push(Reply::Body(body));
        self.script(url, replies);
    }

    /// Fail every request to `url`.
    pub fn broken(&self, url: &str) {
        self.script(url, vec![Reply::Fail]);
    }

    fn script(&self, url: &str, replies: Vec<Reply>) {
        self.replies
            .lock()
            .unwrap()
            .insert(url.to_string(), replies.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == url).count()
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.calls.lock().unwrap().push(url.to_string());

        let mut replies = self.replies.lock().unwrap();
        let queue = replies
            .get_mut(url)
            .ok_or_else(|| AppError::crawl(url, "no scripted response"))?;
        let reply = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().map(|r| match r {
                Reply::Body(body) => Reply::Body(body.clone()),
                Reply::Fail => Reply::Fail,
            })
        };

        match reply {
            Some(Reply::Body(body)) => Ok(body),
            _ => Err(AppError::crawl(url, "connection reset")),
        }
    }
}

/// Search index that records requests.
#[derive(Default)]
pub struct MemoryIndex {
    pub deletes: Mutex<Vec<(String, String, Value)>>,
    pub bulks: Mutex<Vec<(String, Vec<Value>, bool)>>,
    pub fail_delete: AtomicBool,
    pub fail_bulk: AtomicBool,
}

impl MemoryIndex {
    pub fn failing_delete() -> Self {
        let index = Self::default();
        index.fail_delete.store(true, Ordering::SeqCst);
        index
    }

    pub fn failing_bulk() -> Self {
        let index = Self::default();
        index.fail_bulk.store(true, Ordering::SeqCst);
        index
    }

    pub fn deletes(&self) -> Vec<(String, String, Value)> {
        self.deletes.lock().unwrap().clone()
    }

    pub fn bulks(&self) -> Vec<(String, Vec<Value>, bool)> {
        self.bulks.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchIndex for MemoryIndex {
    async fn delete_by_query(&self, index: &str, doc_type: &str, query: &Value) -> Result<Value> {
        self.deletes
            .lock()
            .unwrap()
            .push((index.to_string(), doc_type.to_string(), query.clone()));
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(AppError::Search("index_not_found_exception".into()));
        }
        Ok(serde_json::json!({"deleted": 0}))
    }

    async fn bulk(&self, index: &str, actions: &[Value], refresh: bool) -> Result<Value> {
        self.bulks
            .lock()
            .unwrap()
            .push((index.to_string(), actions.to_vec(), refresh));
        if self.fail_bulk.load(Ordering::SeqCst) {
            return Err(AppError::Search("cluster_block_exception".into()));
        }
        Ok(serde_json::json!({"errors": false, "items": []}))
    }
}

/// Snapshot store backed by a map.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    writes: Mutex<Vec<String>>,
    pub fail_writes: AtomicBool,
    /// Fail the next historical write only.
    pub fail_next_historical: AtomicBool,
}

impl MemoryStore {
    /// Pre-populate a key, as if a previous run had written it.
    pub fn seed(&self, key: &str, payload: &str) {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), payload.as_bytes().to_vec());
    }

    /// Keys written so far, in order.
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::S3("AccessDenied".into()));
        }
        self.objects.lock().unwrap().insert(key.to_string(), bytes);
        self.writes.lock().unwrap().push(key.to_string());
        Ok(())
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn stored_hash(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .get(key)
            .map(|bytes| content_hash(bytes)))
    }

    async fn write_current(&self, key: &str, snapshot: &Snapshot) -> Result<()> {
        self.put(key, snapshot.payload.as_bytes().to_vec())
    }

    async fn write_historical(&self, key: &str, snapshot: &Snapshot) -> Result<()> {
        if self.fail_next_historical.swap(false, Ordering::SeqCst) {
            return Err(AppError::S3("SlowDown".into()));
        }
        self.put(key, snapshot.payload.as_bytes().to_vec())
    }

    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.objects.lock().unwrap().get(key).cloned())
    }

    fn location(&self, key: &str) -> String {
        format!("memory://{key}")
    }
}

/// Alert sink that keeps everything it receives.
#[derive(Default)]
pub struct MemoryAlerts {
    received: Mutex<Vec<Alert>>,
}

impl MemoryAlerts {
    pub fn alerts(&self) -> Vec<Alert> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertSink for MemoryAlerts {
    async fn send(&self, alert: &Alert) -> Result<()> {
        self.received.lock().unwrap().push(alert.clone());
        Ok(())
    }
}
