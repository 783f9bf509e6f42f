//! Error types for the ledger

use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Record failed its kind's required-field rule
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Chain integrity check failed at the given height
    #[error("Chain corrupted at height {height}: {reason}")]
    ChainCorrupted {
        /// First height at which an invariant does not hold
        height: u64,
        /// Which invariant failed
        reason: String,
    },

    /// Block not found in the store
    #[error("Block not found: {0}")]
    BlockNotFound(u64),

    /// Lookup found nothing usable
    #[error("Not found: {0}")]
    NotFound(String),

    /// Persistence gateway error (RocksDB, duplicate height, ...)
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Metrics registry error
    #[error("Metrics error: {0}")]
    Metrics(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Persistence(err.to_string())
    }
}

impl From<prometheus::Error> for Error {
    fn from(err: prometheus::Error) -> Self {
        Error::Metrics(err.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}
