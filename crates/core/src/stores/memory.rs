//! In-memory search index used by tests and local runs.
//!
//! Mirrors the visibility rules of the real backend: additions and id
//! deletions surface only on refresh, while delete-by-storage-name acts on
//! the visible set and leaves the index refreshed behind it.

use crate::error::IndexError;
use crate::models::{ContentHit, HighlightConfig, IndexDocument, IndexedEntry};
use crate::traits::SearchIndex;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct MemoryIndex {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Default)]
struct Inner {
    live: BTreeMap<String, IndexDocument>,
    staged: BTreeMap<String, IndexDocument>,
    tombstones: BTreeSet<String>,
}

impl Inner {
    fn apply_pending(&mut self) {
        let staged = std::mem::take(&mut self.staged);
        self.live.extend(staged);
        for id in std::mem::take(&mut self.tombstones) {
            self.live.remove(&id);
        }
    }
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SearchIndex for MemoryIndex {
    async fn index_document(&self, document: &IndexDocument) -> Result<(), IndexError> {
        let id = Uuid::new_v4().to_string();
        let mut inner = self.inner.write().await;
        debug!(%id, storage_name = %document.storage_name, "staged document");
        inner.staged.insert(id, document.clone());
        Ok(())
    }

    async fn all_documents(&self, page_size: usize) -> Result<Vec<IndexedEntry>, IndexError> {
        let inner = self.inner.read().await;
        Ok(inner
            .live
            .iter()
            .take(page_size)
            .map(|(id, document)| IndexedEntry {
                id: id.clone(),
                document: document.clone(),
            })
            .collect())
    }

    async fn query_content(
        &self,
        term: &str,
        highlight: &HighlightConfig,
    ) -> Result<Vec<ContentHit>, IndexError> {
        let tokens: Vec<&str> = term.split_whitespace().collect();
        let inner = self.inner.read().await;

        let mut hits = Vec::new();
        for (id, document) in &inner.live {
            let mut spans = Vec::new();
            for token in &tokens {
                spans.extend(match_spans(&document.content, token));
            }
            if spans.is_empty() {
                continue;
            }
            spans.sort_unstable();

            let highlights = spans
                .iter()
                .take(highlight.number_of_fragments)
                .map(|span| fragment_around(&document.content, *span, highlight))
                .collect();

            hits.push(ContentHit {
                id: id.clone(),
                original_name: document.original_name.clone(),
                storage_name: document.storage_name.clone(),
                highlights,
                score: spans.len() as f64,
            });
        }

        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        Ok(hits)
    }

    async fn find_by_storage_name(
        &self,
        storage_name: &str,
    ) -> Result<Vec<IndexedEntry>, IndexError> {
        let inner = self.inner.read().await;
        Ok(inner
            .live
            .iter()
            .filter(|(_, document)| document.storage_name == storage_name)
            .map(|(id, document)| IndexedEntry {
                id: id.clone(),
                document: document.clone(),
            })
            .collect())
    }

    async fn delete_by_id(&self, id: &str) -> Result<(), IndexError> {
        let mut inner = self.inner.write().await;
        if inner.staged.remove(id).is_none() && inner.live.contains_key(id) {
            inner.tombstones.insert(id.to_string());
        }
        Ok(())
    }

    async fn delete_by_storage_name(&self, storage_name: &str) -> Result<u64, IndexError> {
        let mut inner = self.inner.write().await;
        let doomed: Vec<String> = inner
            .live
            .iter()
            .filter(|(_, document)| document.storage_name == storage_name)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &doomed {
            inner.live.remove(id);
            inner.tombstones.remove(id);
        }
        inner.apply_pending();

        debug!(storage_name, deleted = doomed.len(), "deleted by storage name");
        Ok(doomed.len() as u64)
    }

    async fn refresh(&self) -> Result<(), IndexError> {
        self.inner.write().await.apply_pending();
        Ok(())
    }
}

/// Byte spans of case-insensitive occurrences of `token` in `content`.
/// Case folding is ASCII-only; non-ASCII text matches exactly.
fn match_spans(content: &str, token: &str) -> Vec<(usize, usize)> {
    let width = token.len();
    if width == 0 || width > content.len() {
        return Vec::new();
    }

    let bytes = content.as_bytes();
    let needle = token.as_bytes();
    let mut spans = Vec::new();
    let mut at = 0;
    while at + width <= bytes.len() {
        if content.is_char_boundary(at)
            && content.is_char_boundary(at + width)
            && bytes[at..at + width].eq_ignore_ascii_case(needle)
        {
            spans.push((at, at + width));
            at += width;
        } else {
            at += 1;
        }
    }
    spans
}

fn fragment_around(content: &str, span: (usize, usize), config: &HighlightConfig) -> String {
    let (start, end) = span;
    let window = config.fragment_size.max(end - start);
    let pad = (window - (end - start)) / 2;

    let mut lo = start.saturating_sub(pad);
    while !content.is_char_boundary(lo) {
        lo -= 1;
    }
    let mut hi = (end + pad).min(content.len());
    while !content.is_char_boundary(hi) {
        hi += 1;
    }

    format!(
        "{}{}{}{}{}",
        html_escape(&content[lo..start]),
        config.pre_tag,
        html_escape(&content[start..end]),
        config.post_tag,
        html_escape(&content[end..hi])
    )
}

fn html_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
