// csv_indexer/src/error.rs
// Defines custom error types for the csv_indexer crate.

use thiserror::Error;

#[derive(Debug, Error,)]
pub enum IngestError {
    #[error("Failed to connect to destination: {0}")]
    ConnectionError(String,),
    #[error("Failed to submit batch: {0}")]
    IngestionError(String,),
    #[error("Invalid configuration: {0}")]
    ConfigurationError(String,),
    #[error("Destination specific error: {0}")]
    DatabaseError(String,),
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error,),
    #[error("Other error: {0}")]
    Other(String,),
}

impl IngestError {
    /// Setup failures happen before any document has been submitted.
    pub fn is_setup(&self,) -> bool {
        matches!(
            self,
            IngestError::ConnectionError(_,)
                | IngestError::ConfigurationError(_,)
                | IngestError::DatabaseError(_,)
        )
    }
}

pub type Result<T,> = std::result::Result<T, IngestError,>;
