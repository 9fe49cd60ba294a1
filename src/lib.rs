//! # Timeseries - data point storage with streaming range reads
//!
//! A small data-access layer over a single `datapoints` table.
//!
//! Timeseries provides:
//! - Schema management (create/drop the four-column table)
//! - A validation gate applied to every record before it is written
//! - Inserts returning the persisted record with generated id and timestamp
//! - Filtered reads (asset equality, inclusive time bounds) streamed row by row
//!   with backpressure

pub mod datapoint;
pub mod validate;
pub mod storage;
pub mod query;
pub mod timeseries;
pub mod config;
pub mod ui;

// Re-exports for convenient access
pub use datapoint::{DataPoint, NewDataPoint};
pub use validate::{ValidRecord, ValidationError, Violation};
pub use storage::Database;
pub use query::{BuiltQuery, QueryBuilder, ReadOptions, ReadStream};
pub use timeseries::Timeseries;

/// Result type alias for Timeseries operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Timeseries operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Stream error: {0}")]
    Stream(#[source] rusqlite::Error),

    #[error("Worker error: {0}")]
    Worker(String),
}

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Storage,
    Stream,
    Worker,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::Storage(_) => ErrorKind::Storage,
            Error::Stream(_) => ErrorKind::Stream,
            Error::Worker(_) => ErrorKind::Worker,
        }
    }

    /// The validation failure, if this error came from the validator
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            Error::Validation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Error::Worker(e.to_string())
    }
}
