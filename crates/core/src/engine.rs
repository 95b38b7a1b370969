use crate::blobs::BlobStore;
use crate::error::{ArchiveError, Result};
use crate::extractor::TextExtractor;
use crate::models::{IndexDocument, IndexedEntry, ReconcileReport, UploadReceipt};
use crate::traits::SearchIndex;
use chrono::Utc;
use std::collections::HashSet;
use tracing::{info, warn};

/// How many index entries one reconcile pass examines.
pub const DEFAULT_RECONCILE_PAGE_SIZE: usize = 1000;

pub const MEDIA_TYPE_PDF: &str = "application/pdf";

/// Keeps the blob store and the search index telling the same story.
pub struct ReconciliationEngine<I, X>
where
    I: SearchIndex,
    X: TextExtractor,
{
    blobs: BlobStore,
    index: I,
    extractor: X,
    page_size: usize,
}

impl<I, X> ReconciliationEngine<I, X>
where
    I: SearchIndex + Send + Sync,
    X: TextExtractor + Send + Sync,
{
    pub fn new(blobs: BlobStore, index: I, extractor: X) -> Self {
        Self {
            blobs,
            index,
            extractor,
            page_size: DEFAULT_RECONCILE_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Extraction or index trouble downgrades to a warning on the receipt;
    /// the stored file is kept either way.
    pub async fn upload(
        &self,
        original_name: &str,
        media_type: &str,
        bytes: &[u8],
    ) -> Result<UploadReceipt> {
        if media_type != MEDIA_TYPE_PDF {
            return Err(ArchiveError::UnsupportedMediaType(media_type.to_string()));
        }

        let storage_name = self.blobs.allocate_name().await;
        self.blobs.store(&storage_name, bytes).await?;

        let warning = match self.index_blob(original_name, &storage_name, bytes).await {
            Ok(()) => None,
            Err(error) => {
                warn!(original_name, %storage_name, %error, "stored but not indexed");
                Some(format!("stored but not indexed: {error}"))
            }
        };

        info!(
            original_name,
            %storage_name,
            size_bytes = bytes.len(),
            indexed = warning.is_none(),
            "upload complete"
        );
        Ok(UploadReceipt {
            original_name: original_name.to_string(),
            storage_name,
            warning,
        })
    }

    async fn index_blob(&self, original_name: &str, storage_name: &str, bytes: &[u8]) -> Result<()> {
        let content = self.extractor.extract(bytes)?;
        self.index
            .index_document(&IndexDocument {
                original_name: original_name.to_string(),
                content,
                storage_name: storage_name.to_string(),
                indexed_at: Utc::now(),
            })
            .await?;
        Ok(())
    }

    /// Returns whether a file came off disk; index entries are cleaned up
    /// either way.
    pub async fn delete(&self, storage_name: &str) -> Result<bool> {
        let removed = self.blobs.delete(storage_name).await?;

        let entries = self.index.find_by_storage_name(storage_name).await?;
        for entry in &entries {
            self.index.delete_by_id(&entry.id).await?;
        }
        if !entries.is_empty() {
            self.index.refresh().await?;
        }

        info!(
            storage_name,
            removed_file = removed,
            removed_entries = entries.len(),
            "delete complete"
        );
        Ok(removed)
    }

    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let entries = self.index.all_documents(self.page_size).await?;
        let files = self.blobs.list().await?;

        let on_disk: HashSet<String> = files.iter().map(|f| f.storage_name.clone()).collect();
        let orphans = compute_orphans(&on_disk, &entries);

        let mut orphans_removed = 0usize;
        for storage_name in &orphans {
            let deleted = self.index.delete_by_storage_name(storage_name).await?;
            orphans_removed += deleted as usize;
        }

        let report = ReconcileReport {
            files_in_directory: files.len(),
            documents_scanned: entries.len(),
            orphans_removed,
        };
        info!(
            files_in_directory = report.files_in_directory,
            documents_scanned = report.documents_scanned,
            orphans_removed = report.orphans_removed,
            "reconcile complete"
        );
        Ok(report)
    }

    pub async fn sync(&self) -> Result<ReconcileReport> {
        self.reconcile().await
    }

    /// Reconcile, then force all pending index changes visible.
    pub async fn cleanup(&self) -> Result<ReconcileReport> {
        let report = self.reconcile().await?;
        self.index.refresh().await?;
        Ok(report)
    }
}

/// Storage names the index references but the directory no longer holds.
/// Deduplicated, in the order the index returned them.
pub fn compute_orphans(on_disk: &HashSet<String>, entries: &[IndexedEntry]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut orphans = Vec::new();
    for entry in entries {
        let name = &entry.document.storage_name;
        if !on_disk.contains(name) && seen.insert(name.clone()) {
            orphans.push(name.clone());
        }
    }
    orphans
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IndexError;
    use crate::models::{ContentHit, HighlightConfig};
    use crate::stores::memory::MemoryIndex;
    use async_trait::async_trait;
    use chrono::Utc;
    use tempfile::{tempdir, TempDir};

    struct Utf8Extractor;

    impl TextExtractor for Utf8Extractor {
        fn extract(&self, bytes: &[u8]) -> Result<String, ArchiveError> {
            String::from_utf8(bytes.to_vec())
                .map_err(|error| ArchiveError::Extraction(error.to_string()))
        }
    }

    struct FailingExtractor;

    impl TextExtractor for FailingExtractor {
        fn extract(&self, _bytes: &[u8]) -> Result<String, ArchiveError> {
            Err(ArchiveError::Extraction("unreadable page stream".to_string()))
        }
    }

    struct RefusingIndex;

    #[async_trait]
    impl SearchIndex for RefusingIndex {
        async fn index_document(&self, _document: &IndexDocument) -> Result<(), IndexError> {
            Err(IndexError::Request("index offline".to_string()))
        }

        async fn all_documents(&self, _page_size: usize) -> Result<Vec<IndexedEntry>, IndexError> {
            Ok(Vec::new())
        }

        async fn query_content(
            &self,
            _term: &str,
            _highlight: &HighlightConfig,
        ) -> Result<Vec<ContentHit>, IndexError> {
            Ok(Vec::new())
        }

        async fn find_by_storage_name(
            &self,
            _storage_name: &str,
        ) -> Result<Vec<IndexedEntry>, IndexError> {
            Ok(Vec::new())
        }

        async fn delete_by_id(&self, _id: &str) -> Result<(), IndexError> {
            Ok(())
        }

        async fn delete_by_storage_name(&self, _storage_name: &str) -> Result<u64, IndexError> {
            Ok(0)
        }

        async fn refresh(&self) -> Result<(), IndexError> {
            Ok(())
        }
    }

    async fn engine_in(
        dir: &TempDir,
    ) -> (
        ReconciliationEngine<MemoryIndex, Utf8Extractor>,
        BlobStore,
        MemoryIndex,
    ) {
        let blobs = BlobStore::open(dir.path()).await.expect("open store");
        let index = MemoryIndex::new();
        let engine = ReconciliationEngine::new(blobs.clone(), index.clone(), Utf8Extractor);
        (engine, blobs, index)
    }

    #[tokio::test]
    async fn upload_stores_and_indexes() {
        let dir = tempdir().unwrap();
        let (engine, blobs, index) = engine_in(&dir).await;

        let receipt = engine
            .upload("report.pdf", MEDIA_TYPE_PDF, b"quarterly tax summary")
            .await
            .expect("upload should succeed");

        assert_eq!(receipt.storage_name, "001.pdf");
        assert!(receipt.indexed());
        assert!(blobs.exists("001.pdf").await);

        index.refresh().await.unwrap();
        let entries = index.find_by_storage_name("001.pdf").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].document.original_name, "report.pdf");
        assert_eq!(entries[0].document.content, "quarterly tax summary");
    }

    #[tokio::test]
    async fn upload_rejects_non_pdf_media_before_writing() {
        let dir = tempdir().unwrap();
        let (engine, blobs, _index) = engine_in(&dir).await;

        let err = engine
            .upload("notes.txt", "text/plain", b"plain text")
            .await
            .unwrap_err();
        assert!(matches!(err, ArchiveError::UnsupportedMediaType(_)));
        assert!(blobs.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn upload_keeps_the_file_when_extraction_fails() {
        let dir = tempdir().unwrap();
        let blobs = BlobStore::open(dir.path()).await.unwrap();
        let index = MemoryIndex::new();
        let engine = ReconciliationEngine::new(blobs.clone(), index.clone(), FailingExtractor);

        let receipt = engine
            .upload("scan.pdf", MEDIA_TYPE_PDF, b"\xff\xfe")
            .await
            .expect("upload should still succeed");

        let warning = receipt.warning.expect("receipt should carry a warning");
        assert!(warning.contains("stored but not indexed"));
        assert!(blobs.exists("001.pdf").await);

        index.refresh().await.unwrap();
        assert!(index.all_documents(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn upload_keeps_the_file_when_the_index_is_down() {
        let dir = tempdir().unwrap();
        let blobs = BlobStore::open(dir.path()).await.unwrap();
        let engine = ReconciliationEngine::new(blobs.clone(), RefusingIndex, Utf8Extractor);

        let receipt = engine
            .upload("report.pdf", MEDIA_TYPE_PDF, b"text")
            .await
            .expect("upload should still succeed");

        assert!(!receipt.indexed());
        assert!(blobs.exists("001.pdf").await);
    }

    #[tokio::test]
    async fn storage_names_keep_rising_after_deletes() {
        let dir = tempdir().unwrap();
        let (engine, _blobs, _index) = engine_in(&dir).await;

        let first = engine.upload("a.pdf", MEDIA_TYPE_PDF, b"a").await.unwrap();
        assert_eq!(first.storage_name, "001.pdf");

        engine.delete("001.pdf").await.unwrap();
        let second = engine.upload("b.pdf", MEDIA_TYPE_PDF, b"b").await.unwrap();
        assert_eq!(second.storage_name, "002.pdf");
    }

    #[tokio::test]
    async fn delete_removes_file_and_index_entries() {
        let dir = tempdir().unwrap();
        let (engine, blobs, index) = engine_in(&dir).await;

        engine.upload("a.pdf", MEDIA_TYPE_PDF, b"alpha").await.unwrap();
        index.refresh().await.unwrap();

        assert!(engine.delete("001.pdf").await.unwrap());
        assert!(!blobs.exists("001.pdf").await);
        assert!(index.find_by_storage_name("001.pdf").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn repeated_delete_reports_nothing_left() {
        let dir = tempdir().unwrap();
        let (engine, _blobs, index) = engine_in(&dir).await;

        engine.upload("a.pdf", MEDIA_TYPE_PDF, b"alpha").await.unwrap();
        index.refresh().await.unwrap();

        assert!(engine.delete("001.pdf").await.unwrap());
        assert!(!engine.delete("001.pdf").await.unwrap());
    }

    #[tokio::test]
    async fn listing_shows_newest_upload_first() {
        let dir = tempdir().unwrap();
        let (engine, blobs, _index) = engine_in(&dir).await;

        engine.upload("a.pdf", MEDIA_TYPE_PDF, b"a").await.unwrap();
        engine.upload("b.pdf", MEDIA_TYPE_PDF, b"b").await.unwrap();

        let names: Vec<_> = blobs
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.storage_name)
            .collect();
        assert_eq!(names, ["002.pdf", "001.pdf"]);
    }

    #[tokio::test]
    async fn reconcile_sweeps_entries_without_files() {
        let dir = tempdir().unwrap();
        let (engine, blobs, index) = engine_in(&dir).await;

        engine.upload("keep.pdf", MEDIA_TYPE_PDF, b"keep").await.unwrap();
        engine.upload("drop.pdf", MEDIA_TYPE_PDF, b"drop").await.unwrap();
        index.refresh().await.unwrap();

        // The file disappears outside the engine's control.
        assert!(blobs.delete("002.pdf").await.unwrap());

        let report = engine.reconcile().await.unwrap();
        assert_eq!(report.files_in_directory, 1);
        assert_eq!(report.documents_scanned, 2);
        assert_eq!(report.orphans_removed, 1);
        assert!(index.find_by_storage_name("002.pdf").await.unwrap().is_empty());
        assert_eq!(index.find_by_storage_name("001.pdf").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn sync_reports_clean_state_untouched() {
        let dir = tempdir().unwrap();
        let (engine, _blobs, index) = engine_in(&dir).await;

        engine.upload("a.pdf", MEDIA_TYPE_PDF, b"alpha").await.unwrap();
        index.refresh().await.unwrap();

        let report = engine.sync().await.unwrap();
        assert_eq!(report.files_in_directory, 1);
        assert_eq!(report.documents_scanned, 1);
        assert_eq!(report.orphans_removed, 0);
    }

    #[tokio::test]
    async fn reconcile_handles_one_page_per_pass() {
        let dir = tempdir().unwrap();
        let blobs = BlobStore::open(dir.path()).await.unwrap();
        let index = MemoryIndex::new();
        let engine =
            ReconciliationEngine::new(blobs, index.clone(), Utf8Extractor).with_page_size(1);

        for name in ["101.pdf", "102.pdf"] {
            index
                .index_document(&IndexDocument {
                    original_name: name.to_string(),
                    content: "orphaned".to_string(),
                    storage_name: name.to_string(),
                    indexed_at: Utc::now(),
                })
                .await
                .unwrap();
        }
        index.refresh().await.unwrap();

        let first = engine.reconcile().await.unwrap();
        assert_eq!(first.documents_scanned, 1);
        assert_eq!(first.orphans_removed, 1);

        let second = engine.reconcile().await.unwrap();
        assert_eq!(second.orphans_removed, 1);
        assert!(index.all_documents(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cleanup_makes_pending_writes_visible() {
        let dir = tempdir().unwrap();
        let (engine, _blobs, index) = engine_in(&dir).await;

        engine.upload("a.pdf", MEDIA_TYPE_PDF, b"alpha").await.unwrap();
        // Not refreshed yet, so the pass scans nothing and removes nothing.
        let report = engine.cleanup().await.unwrap();
        assert_eq!(report.documents_scanned, 0);
        assert_eq!(report.orphans_removed, 0);
        assert_eq!(index.all_documents(10).await.unwrap().len(), 1);
    }

    #[test]
    fn orphans_are_deduplicated_and_ordered() {
        let entry = |id: &str, name: &str| IndexedEntry {
            id: id.to_string(),
            document: IndexDocument {
                original_name: name.to_string(),
                content: String::new(),
                storage_name: name.to_string(),
                indexed_at: Utc::now(),
            },
        };

        let on_disk: HashSet<String> = ["001.pdf".to_string()].into_iter().collect();
        let entries = vec![
            entry("a", "002.pdf"),
            entry("b", "001.pdf"),
            entry("c", "002.pdf"),
            entry("d", "003.pdf"),
        ];

        assert_eq!(compute_orphans(&on_disk, &entries), ["002.pdf", "003.pdf"]);
    }

    #[test]
    fn no_entries_means_no_orphans() {
        let on_disk = HashSet::new();
        assert!(compute_orphans(&on_disk, &[]).is_empty());
    }
}
