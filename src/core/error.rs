//! Store errors
//!
//! Everything below the orchestrator reports failures through [`StoreError`];
//! the orchestrator decides which ones abort a call and which are skipped.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("storage lock poisoned: {0}")]
    Lock(String),

    #[error("invalid fact key: {0}")]
    InvalidKey(String),

    #[error("message identity unavailable: {0}")]
    Identity(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;
