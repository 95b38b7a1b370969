use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported media type: {0} (only application/pdf is accepted)")]
    UnsupportedMediaType(String),

    #[error("search query is empty")]
    EmptyQuery,

    #[error("invalid storage name: {0}")]
    InvalidStorageName(String),

    #[error("text extraction failed: {0}")]
    Extraction(String),

    #[error("search index error: {0}")]
    Index(#[from] IndexError),
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index unavailable: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("index request failed: {0}")]
    Request(String),
}

pub type Result<T, E = ArchiveError> = std::result::Result<T, E>;
