// csv_indexer/src/batch.rs
// Bounded buffering of documents between the mapper and the sink.

use crate::error::{IngestError, Result};
use crate::mapper::Document;

pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Documents handed to a sink in one submission.
#[derive(Debug, Clone, PartialEq, Eq,)]
pub struct Batch {
    /// 1-based, in drain order.
    pub sequence:  u64,
    pub documents: Vec<Document,>,
}

impl Batch {
    pub fn len(&self,) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self,) -> bool {
        self.documents.is_empty()
    }
}

#[derive(Debug,)]
pub struct BatchAccumulator {
    batch_size: usize,
    documents:  Vec<Document,>,
    drained:    u64,
}

impl BatchAccumulator {
    pub fn new(batch_size: usize,) -> Result<Self,> {
        if batch_size == 0 {
            return Err(IngestError::ConfigurationError(
                "batch size must be at least 1".to_string(),
            ),);
        }
        Ok(Self {
            batch_size,
            documents: Vec::with_capacity(batch_size.min(DEFAULT_BATCH_SIZE,),),
            drained: 0,
        },)
    }

    /// Changes the flush threshold for subsequent adds. Documents already
    /// buffered stay put.
    pub fn set_batch_size(&mut self, batch_size: usize,) -> Result<(),> {
        if batch_size == 0 {
            return Err(IngestError::ConfigurationError(
                "batch size must be at least 1".to_string(),
            ),);
        }
        self.batch_size = batch_size;
        Ok((),)
    }

    pub fn add(&mut self, doc: Document,) {
        self.documents.push(doc,);
    }

    /// True exactly when the buffered count equals the batch size.
    pub fn should_flush(&self,) -> bool {
        self.documents.len() == self.batch_size
    }

    pub fn drain(&mut self,) -> Batch {
        self.drained += 1;
        let documents = std::mem::replace(
            &mut self.documents,
            Vec::with_capacity(self.batch_size.min(DEFAULT_BATCH_SIZE,),),
        );
        Batch {
            sequence: self.drained,
            documents,
        }
    }

    pub fn remaining_count(&self,) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self,) -> bool {
        self.documents.is_empty()
    }
}
