use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("store index error: {0}")]
    Index(#[from] rusqlite::Error),
    #[error("invalid checkpoint: {0:?}")]
    InvalidCheckpoint(String),
}
