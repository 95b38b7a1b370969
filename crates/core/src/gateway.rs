use crate::blobs::BlobStore;
use crate::error::{ArchiveError, Result};
use crate::models::{HighlightConfig, SearchMatch};
use crate::traits::SearchIndex;
use tracing::debug;

pub struct SearchGateway<I>
where
    I: SearchIndex,
{
    blobs: BlobStore,
    index: I,
    highlight: HighlightConfig,
}

impl<I> SearchGateway<I>
where
    I: SearchIndex + Send + Sync,
{
    pub fn new(blobs: BlobStore, index: I) -> Self {
        Self {
            blobs,
            index,
            highlight: HighlightConfig::default(),
        }
    }

    pub fn with_highlight(mut self, highlight: HighlightConfig) -> Self {
        self.highlight = highlight;
        self
    }

    /// Hits whose file has gone missing since indexing are dropped, not
    /// surfaced as broken links.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchMatch>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ArchiveError::EmptyQuery);
        }

        let hits = self.index.query_content(query, &self.highlight).await?;

        let mut matches = Vec::new();
        for hit in hits {
            if !self.blobs.exists(&hit.storage_name).await {
                debug!(storage_name = %hit.storage_name, "dropping hit for missing file");
                continue;
            }
            matches.push(SearchMatch {
                original_name: hit.original_name,
                storage_name: hit.storage_name,
                highlights: hit.highlights,
                score: hit.score,
            });
        }

        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(matches)
    }
}
