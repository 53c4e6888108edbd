use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found")]
    NotFound,

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Failed to decode store response: {0}")]
    Decode(String),

    #[error("Store configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Whether the record addressed by the request does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
            || matches!(self, StoreError::Rejected { status: 404, .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
