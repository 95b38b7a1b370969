use crate::error::IndexError;
use crate::models::{ContentHit, HighlightConfig, IndexDocument, IndexedEntry};
use async_trait::async_trait;

/// A full-text index over extracted PDF content.
///
/// Writes become visible lazily; `refresh` forces everything indexed or
/// deleted so far into view. The one exception is `delete_by_storage_name`,
/// whose effect is immediate.
#[async_trait]
pub trait SearchIndex {
    async fn index_document(&self, document: &IndexDocument) -> Result<(), IndexError>;

    async fn all_documents(&self, page_size: usize) -> Result<Vec<IndexedEntry>, IndexError>;

    async fn query_content(
        &self,
        term: &str,
        highlight: &HighlightConfig,
    ) -> Result<Vec<ContentHit>, IndexError>;

    async fn find_by_storage_name(&self, storage_name: &str)
        -> Result<Vec<IndexedEntry>, IndexError>;

    /// Removing an absent id is a no-op.
    async fn delete_by_id(&self, id: &str) -> Result<(), IndexError>;

    /// Returns how many entries went away.
    async fn delete_by_storage_name(&self, storage_name: &str) -> Result<u64, IndexError>;

    async fn refresh(&self) -> Result<(), IndexError>;
}
