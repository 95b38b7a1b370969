pub mod blobs;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod gateway;
pub mod models;
pub mod naming;
pub mod stores;
pub mod traits;

pub use blobs::BlobStore;
pub use engine::{
    compute_orphans, ReconciliationEngine, DEFAULT_RECONCILE_PAGE_SIZE, MEDIA_TYPE_PDF,
};
pub use error::{ArchiveError, IndexError};
pub use extractor::{LopdfExtractor, TextExtractor};
pub use gateway::SearchGateway;
pub use models::{
    BlobRecord, ContentHit, HighlightConfig, IndexDocument, IndexedEntry, ReconcileReport,
    SearchMatch, UploadReceipt,
};
pub use naming::NameAllocator;
pub use stores::{ElasticIndex, MemoryIndex};
pub use traits::SearchIndex;
