use lopdf::Document;

use crate::error::ArchiveError;

/// Pulls plain text out of an uploaded PDF payload.
pub trait TextExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String, ArchiveError>;
}

#[derive(Default)]
pub struct LopdfExtractor;

impl TextExtractor for LopdfExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String, ArchiveError> {
        let document = Document::load_mem(bytes)
            .map_err(|error| ArchiveError::Extraction(error.to_string()))?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| ArchiveError::Extraction(error.to_string()))?;

            if !text.trim().is_empty() {
                pages.push(text);
            }
        }

        if pages.is_empty() {
            return Err(ArchiveError::Extraction(
                "pdf had no readable page text".to_string(),
            ));
        }

        Ok(pages.join("\n"))
    }
}
