use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf decode error: {0}")]
    Decode(String),

    #[error("no pdf decoder available")]
    DecoderUnavailable,

    #[error("page {page} extraction failed: {details}")]
    PageExtraction { page: usize, details: String },

    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl From<lopdf::Error> for ExtractError {
    fn from(error: lopdf::Error) -> Self {
        ExtractError::Decode(error.to_string())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store request failed: {0}")]
    Request(String),
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("extraction task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T, E = ExtractError> = std::result::Result<T, E>;
