use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("ocr extraction failed: {0}")]
    OcrFailed(String),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("search request failed: {0}")]
    Request(String),

    #[error("invalid {parameter} {value:?}, allowed values: {allowed}")]
    InvalidParameter {
        parameter: &'static str,
        value: String,
        allowed: &'static str,
    },
}

impl SearchError {
    /// Client-class errors are rejected inputs; everything else is a
    /// store or transport failure.
    pub fn is_client_error(&self) -> bool {
        matches!(self, SearchError::InvalidParameter { .. })
    }
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
