//! Error types for the CSV decoding engine
//!
//! Only configuration and sequencing mistakes are errors. Malformed CSV
//! content (stray quotes, ragged rows) is always recovered locally.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CsvError {
    /// Rejected at construction, before any fragment is fed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Session already finished")]
    AlreadyFinished,

    #[error("Fragment pushed after the session was finished")]
    FeedAfterFinish,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure reported by the byte source feeding the session
    #[error("Upstream error: {0}")]
    Upstream(Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = std::result::Result<T, CsvError>;
