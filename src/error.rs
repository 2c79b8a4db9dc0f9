#[derive(Debug, thiserror::Error)]
pub enum CrawlerError {
    #[error("Database error")]
    DatabaseError(#[from] sqlx::error::Error),

    #[error("Request error: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("{url} responded with status {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Max retries exceeded for {url} after {attempts} attempts")]
    RetriesExhausted { url: String, attempts: u32 },

    #[error("Disallowed by robots.txt: {0}")]
    RobotsDisallowed(String),

    #[error("Selector `{selector}` did not appear on {url} within {timeout_ms}ms")]
    ReadinessTimeout {
        url: String,
        selector: String,
        timeout_ms: u64,
    },

    #[error("Invalid selector `{0}`")]
    InvalidSelector(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Unknown column `{0}`")]
    UnknownColumn(String),

    #[error("Task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl CrawlerError {
    /// Whether another attempt at the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            CrawlerError::RequestError(e) => !e.is_builder() && !e.is_redirect(),
            CrawlerError::HttpStatus { status, .. } => {
                *status >= 500 || *status == 429 || *status == 408
            }
            CrawlerError::ReadinessTimeout { .. } => true,
            _ => false,
        }
    }
}
