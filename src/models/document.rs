//! Records and index-ready documents produced by a crawl.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::Result;
use crate::models::Category;

/// Run-scoped document id counter.
///
/// Starts at 0 for every run; ids are never persisted across runs.
#[derive(Debug, Default)]
pub struct DocumentIds {
    next: u64,
}

impl DocumentIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the next id.
    pub fn next_id(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }

    /// Number of ids handed out so far.
    pub fn issued(&self) -> u64 {
        self.next
    }
}

/// One registry entry extracted from a listing row.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    id: u64,
    values: Map<String, Value>,
}

impl Record {
    /// Build a record by zipping cell texts with field names.
    ///
    /// The last field name receives the document id. Extra cells are ignored
    /// and missing cells leave their fields out.
    pub fn from_cells(fields: &[String], cells: &[String], id: u64) -> Self {
        let mut values = Map::new();
        if let Some((id_field, columns)) = fields.split_last() {
            for (field, cell) in columns.iter().zip(cells) {
                values.insert(field.clone(), Value::String(cell.trim().to_string()));
            }
            values.insert(id_field.clone(), Value::from(id));
        }
        Self { id, values }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Field text by name.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.values.get(field).and_then(Value::as_str)
    }

    /// Tag the record with a classification field.
    pub fn with_tag(mut self, field: &str, value: &str) -> Self {
        self.values
            .insert(field.to_string(), Value::String(value.to_string()));
        self
    }

    pub fn into_body(self) -> Map<String, Value> {
        self.values
    }
}

/// Bulk metadata identifying where a document body goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub index: String,
    pub doc_type: Category,
    pub id: String,
}

impl DocumentMeta {
    /// Bulk action line for this document.
    pub fn to_action(&self) -> Value {
        json!({
            "index": {
                "_index": self.index,
                "_type": self.doc_type.as_str(),
                "_id": self.id,
            }
        })
    }
}

/// A (metadata, body) pair for the bulk index API.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDocument {
    pub meta: DocumentMeta,
    pub body: Map<String, Value>,
}

/// Documents accumulated over one crawl run, in scrape order.
#[derive(Debug, Default)]
pub struct CrawlResult {
    pub documents: Vec<IndexDocument>,
    pub pages_total: u32,
    pub skipped_pages: usize,
}

impl CrawlResult {
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Alternating metadata/body sequence; every body directly follows its metadata.
    pub fn flatten(&self) -> Vec<Value> {
        self.documents
            .iter()
            .flat_map(|doc| [doc.meta.to_action(), Value::Object(doc.body.clone())])
            .collect()
    }

    /// Canonical archive payload: the flattened sequence as one JSON array.
    pub fn to_payload(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.flatten())?)
    }
}
