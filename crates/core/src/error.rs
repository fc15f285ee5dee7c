use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf extraction failed: {0}")]
    Extraction(String),

    #[error("page {page} extraction failed: {details}")]
    PageExtraction { page: u32, details: String },

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid ingestion trigger: {0}")]
    InvalidTrigger(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("object not found: {0}")]
    ObjectNotFound(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store connection failed: {0}")]
    Connection(#[source] sqlx::Error),

    #[error("write rejected for {document_name} page {page_number}: {source}")]
    Write {
        document_name: String,
        page_number: u32,
        #[source]
        source: sqlx::Error,
    },

    #[error("store query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("stored row is invalid: {0}")]
    CorruptRow(String),
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("http error: {0}")]
    Http(#[source] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("model api returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("malformed model response: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        GenerationError::Http(err.without_url())
    }
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("query parameter is missing")]
    EmptyQuery,
}
