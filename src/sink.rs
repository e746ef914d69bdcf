// csv_indexer/src/sink.rs
// Destination stores and the trait every backend implements.

use async_trait::async_trait;

use crate::batch::Batch;
use crate::error::Result;

/// Configuration for a sink.
#[derive(Debug, Clone,)]
pub struct SinkConfig {
    pub destination_url: String,
    /// Index or collection name.
    pub index:           String,
    /// Document type tag, for backends whose model still has one.
    pub doc_type:        Option<String,>,
    pub database:        Option<String,>,
}

/// Trait for all destination stores.
#[async_trait]
pub trait SinkClient: Send + Sync {
    /// Creates a new sink with the given configuration.
    async fn new(config: SinkConfig,) -> Result<Self,>
    where
        Self: Sized;

    /// Makes sure the target index or collection exists.
    async fn ensure_destination(&self,) -> Result<(),>;

    /// Writes one batch and returns how many documents the store accepted.
    async fn submit(&self, batch: Batch,) -> Result<usize,>;

    /// Makes everything submitted so far visible to readers.
    async fn refresh(&self,) -> Result<(),>;
}
