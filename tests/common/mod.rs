// csv_indexer/tests/common/mod.rs
// In-memory sink shared by the integration tests.

use std::sync::Mutex;

use async_trait::async_trait;
use csv_indexer::batch::Batch;
use csv_indexer::error::{IngestError, Result};
use csv_indexer::sink::{SinkClient, SinkConfig};

/// Keeps every submitted batch in memory.
#[derive(Debug, Default,)]
pub struct MemorySink {
    state:       Mutex<MemoryState,>,
    /// Fail the submission with this 1-based sequence number.
    fail_on:     Option<u64,>,
    fail_create: bool,
}

#[derive(Debug, Default,)]
struct MemoryState {
    created:   bool,
    refreshed: bool,
    batches:   Vec<Batch,>,
}

impl MemorySink {
    pub fn failing_on(sequence: u64,) -> Self {
        Self {
            fail_on: Some(sequence,),
            ..Self::default()
        }
    }

    pub fn failing_create() -> Self {
        Self {
            fail_create: true,
            ..Self::default()
        }
    }

    pub fn batches(&self,) -> Vec<Batch,> {
        self.lock().batches.clone()
    }

    pub fn created(&self,) -> bool {
        self.lock().created
    }

    pub fn refreshed(&self,) -> bool {
        self.lock().refreshed
    }

    fn lock(&self,) -> std::sync::MutexGuard<'_, MemoryState,> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner(),)
    }
}

#[async_trait]
impl SinkClient for MemorySink {
    async fn new(_config: SinkConfig,) -> Result<Self,> {
        Ok(Self::default(),)
    }

    async fn ensure_destination(&self,) -> Result<(),> {
        if self.fail_create {
            return Err(IngestError::DatabaseError(
                "memory sink refused to create destination".to_string(),
            ),);
        }
        self.lock().created = true;
        Ok((),)
    }

    async fn submit(&self, batch: Batch,) -> Result<usize,> {
        if self.fail_on == Some(batch.sequence,) {
            return Err(IngestError::IngestionError(format!(
                "memory sink rejected batch {}",
                batch.sequence
            ),),);
        }
        let count = batch.len();
        self.lock().batches.push(batch,);
        Ok(count,)
    }

    async fn refresh(&self,) -> Result<(),> {
        self.lock().refreshed = true;
        Ok((),)
    }
}
