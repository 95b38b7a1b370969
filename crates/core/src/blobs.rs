//! Filesystem store for uploaded PDFs. Files live flat in one directory;
//! the storage name doubles as the join key into the search index.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::fs;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{ArchiveError, Result};
use crate::models::BlobRecord;
use crate::naming::{
    fallback_storage_name, highest_number, is_valid_storage_name, NameAllocator,
};

#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
    allocator: Arc<NameAllocator>,
}

impl BlobStore {
    /// A failed seeding scan leaves the allocator unseeded rather than
    /// failing the open.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        let allocator = match pdf_names_on_disk(&root) {
            Ok(names) => {
                let highest = highest_number(names.iter().map(String::as_str));
                debug!(root = %root.display(), highest, "seeded name allocator");
                Arc::new(NameAllocator::seeded(highest))
            }
            Err(error) => {
                warn!(root = %root.display(), %error, "storage scan failed, deferring allocator seed");
                Arc::new(NameAllocator::unseeded())
            }
        };
        Ok(Self { root, allocator })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All stored PDFs, newest first.
    pub async fn list(&self) -> Result<Vec<BlobRecord>> {
        let mut records = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if !has_pdf_extension(&name) {
                continue;
            }
            let metadata = entry.metadata().map_err(std::io::Error::from)?;
            let modified_at: DateTime<Utc> = metadata.modified()?.into();
            records.push(BlobRecord {
                storage_name: name.clone(),
                original_name: name,
                size_bytes: metadata.len(),
                modified_at,
            });
        }
        records.sort_by(|a, b| {
            b.modified_at
                .cmp(&a.modified_at)
                .then_with(|| b.storage_name.cmp(&a.storage_name))
        });
        Ok(records)
    }

    /// Never fails: an unseeded allocator triggers a rescan here, and a
    /// failed rescan yields a timestamp name.
    pub async fn allocate_name(&self) -> String {
        if let Some(name) = self.allocator.allocate().await {
            return name;
        }
        match pdf_names_on_disk(&self.root) {
            Ok(names) => {
                let highest = highest_number(names.iter().map(String::as_str));
                self.allocator.seed_and_allocate(highest).await
            }
            Err(error) => {
                warn!(%error, "storage scan failed, issuing timestamp name");
                fallback_storage_name()
            }
        }
    }

    pub async fn store(&self, storage_name: &str, bytes: &[u8]) -> Result<()> {
        let path = self.blob_path(storage_name)?;
        fs::write(&path, bytes).await?;
        debug!(storage_name, size_bytes = bytes.len(), "stored blob");
        Ok(())
    }

    pub async fn read(&self, storage_name: &str) -> Result<Vec<u8>> {
        let path = self.blob_path(storage_name)?;
        Ok(fs::read(&path).await?)
    }

    /// Returns `false` when the blob was already gone.
    pub async fn delete(&self, storage_name: &str) -> Result<bool> {
        let path = self.blob_path(storage_name)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(storage_name, "deleted blob");
                Ok(true)
            }
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(error) => Err(error.into()),
        }
    }

    pub async fn exists(&self, storage_name: &str) -> bool {
        match self.blob_path(storage_name) {
            Ok(path) => fs::metadata(&path)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    fn blob_path(&self, storage_name: &str) -> Result<PathBuf> {
        if !is_valid_storage_name(storage_name) {
            return Err(ArchiveError::InvalidStorageName(storage_name.to_string()));
        }
        Ok(self.root.join(storage_name))
    }
}

fn has_pdf_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("pdf"))
}

fn pdf_names_on_disk(root: &Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).max_depth(1) {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if has_pdf_extension(&name) {
            names.push(name);
        }
    }
    Ok(names)
}
