use thiserror::Error;

pub type Result<T> = std::result::Result<T, CrawlError>;

#[derive(Debug, Error)]
pub enum CrawlError {
    /// Every permitted attempt at one unit of work failed.
    #[error("retries exhausted for {target} after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        target: String,
        attempts: u32,
        last_error: String,
    },

    #[error("store error for {destination}: {message}")]
    Store { destination: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CrawlError {
    pub fn is_retries_exhausted(&self) -> bool {
        matches!(self, CrawlError::RetriesExhausted { .. })
    }
}
