use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("webdriver error during {action}: {details}")]
    WebDriver { action: String, details: String },

    #[error("timed out after {seconds}s waiting for `{selector}` on {url}")]
    RenderTimeout {
        url: String,
        selector: String,
        seconds: u64,
    },

    #[error("invalid css selector `{0}`")]
    Selector(String),

    #[error("no pagination markers found")]
    MissingPagination,
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no companies provided")]
    EmptyInput,

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("embedding provider failed: {0}")]
    Embedding(String),

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("collection not found: {0}")]
    MissingCollection(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = IndexError> = std::result::Result<T, E>;
