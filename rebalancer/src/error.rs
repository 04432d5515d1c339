//! Error types for the rebalancer.

use std::path::PathBuf;

use driftbook::ValidationError;

use crate::store::StoreError;

/// All errors that can occur during rebalancer operation.
///
/// `RebalanceOrchestrator::execute` only ever returns `Validation` or
/// `ConcurrentExecution`; every other failure during execution is recorded
/// on the returned execution instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("book file error: {0}")]
    Book(String),

    #[error("failed to read book file {path}: {source}")]
    BookRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse book JSON: {0}")]
    BookParse(#[from] serde_json::Error),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("an execution is already running for portfolio '{0}'")]
    ConcurrentExecution(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("execution aborted: {0}")]
    Aborted(String),

    #[error("audit log error: {0}")]
    Audit(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
