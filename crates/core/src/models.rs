use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobRecord {
    pub storage_name: String,
    pub original_name: String,
    pub size_bytes: u64,
    pub modified_at: DateTime<Utc>,
}

/// Payload submitted to the index; the entry id is assigned index-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDocument {
    pub original_name: String,
    pub content: String,
    pub storage_name: String,
    pub indexed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedEntry {
    pub id: String,
    pub document: IndexDocument,
}

/// A raw hit, before the gateway checks the file still exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentHit {
    pub id: String,
    pub original_name: String,
    pub storage_name: String,
    pub highlights: Vec<String>,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchMatch {
    pub original_name: String,
    pub storage_name: String,
    pub highlights: Vec<String>,
    pub score: f64,
}

/// `warning` is set when the file was persisted but not indexed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub original_name: String,
    pub storage_name: String,
    pub warning: Option<String>,
}

impl UploadReceipt {
    pub fn indexed(&self) -> bool {
        self.warning.is_none()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub files_in_directory: usize,
    pub documents_scanned: usize,
    pub orphans_removed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HighlightConfig {
    pub fragment_size: usize,
    pub number_of_fragments: usize,
    pub pre_tag: String,
    pub post_tag: String,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            fragment_size: 200,
            number_of_fragments: 10,
            pre_tag: "<em>".to_string(),
            post_tag: "</em>".to_string(),
        }
    }
}
