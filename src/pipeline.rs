// csv_indexer/src/pipeline.rs
// Drives rows from a source through mapping and batching into a sink.

use serde::Serialize;
use tracing::{debug, info};

use crate::batch::{BatchAccumulator, DEFAULT_BATCH_SIZE};
use crate::error::Result;
use crate::mapper::RecordMapper;
use crate::schema::{Schema, SchemaResolver};
use crate::sink::SinkClient;
use crate::source::{RecordSource, SourceRow};

#[derive(Debug, Clone,)]
pub struct PipelineConfig {
    pub batch_size:      usize,
    /// `None` infers the field names from the first row.
    pub explicit_fields: Option<Vec<String,>,>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size:      DEFAULT_BATCH_SIZE,
            explicit_fields: None,
        }
    }
}

/// Running tallies for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize,)]
pub struct IngestStats {
    /// Documents queued into a batch. Counted when queued, not when written.
    pub sent:      u64,
    /// Documents the sink acknowledged.
    pub written:   u64,
    /// Rows that broke the format rules, header included.
    pub malformed: u64,
    /// Well-formed rows whose width differed from the schema.
    pub dropped:   u64,
    pub batches:   u64,
}

/// Notifications raised while the pipeline runs.
#[derive(Debug,)]
pub enum PipelineEvent<'e,> {
    SchemaResolved {
        schema:   &'e Schema,
        inferred: bool,
    },
    BatchSubmitted {
        sequence:    u64,
        size:        usize,
        /// The end-of-input flush of a partial batch.
        final_batch: bool,
        stats:       &'e IngestStats,
    },
}

/// The stdout progress line for an event, if it gets one. The end-of-input
/// flush is left to the summary.
pub fn progress_line(event: &PipelineEvent<'_,>,) -> Option<String,> {
    match event {
        PipelineEvent::SchemaResolved {
            schema,
            inferred: true,
        } => Some(format!("Column names:  {}", schema),),
        PipelineEvent::SchemaResolved { .. } => None,
        PipelineEvent::BatchSubmitted {
            final_batch: false,
            stats,
            ..
        } => Some(format!("Sent {} docs", stats.sent),),
        PipelineEvent::BatchSubmitted { .. } => None,
    }
}

/// The two closing stdout lines.
pub fn summary_lines(stats: &IngestStats,) -> [String; 2] {
    [
        format!("Sent {} docs", stats.sent),
        format!("{} docs malformed", stats.malformed),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq,)]
enum Stage {
    Init,
    ResolvingSchema,
    Streaming,
    Flushing,
    FinalFlush,
    Reporting,
    Done,
}

pub struct IngestionPipeline<'a, S, K: ?Sized,> {
    source:   S,
    sink:     &'a K,
    config:   PipelineConfig,
    listener: Option<Box<dyn FnMut(PipelineEvent<'_,>,) + Send + 'a,>,>,
}

impl<'a, S, K,> IngestionPipeline<'a, S, K,>
where
    S: RecordSource + Send,
    K: SinkClient + ?Sized,
{
    pub fn new(source: S, sink: &'a K, config: PipelineConfig,) -> Self {
        Self {
            source,
            sink,
            config,
            listener: None,
        }
    }

    pub fn on_event(mut self, listener: impl FnMut(PipelineEvent<'_,>,) + Send + 'a,) -> Self {
        self.listener = Some(Box::new(listener,),);
        self
    }

    /// Runs to completion. Any error aborts the run; batches submitted
    /// before the failure stay in the destination.
    pub async fn run(mut self,) -> Result<IngestStats,> {
        let mut accumulator = BatchAccumulator::new(self.config.batch_size,)?;
        let mut stats = IngestStats::default();
        let mut schema = Schema::default();
        let mut stage = Stage::Init;

        while stage != Stage::Done {
            debug!(?stage, "pipeline stage");
            stage = match stage {
                Stage::Init => {
                    self.sink.ensure_destination().await?;
                    Stage::ResolvingSchema
                },
                Stage::ResolvingSchema => {
                    let resolution =
                        SchemaResolver::resolve(self.config.explicit_fields.take(), &mut self.source,)?;
                    if resolution.malformed_header {
                        stats.malformed += 1;
                    }
                    schema = resolution.schema;
                    info!(fields = %schema, inferred = resolution.inferred, "Resolved schema");
                    self.emit(PipelineEvent::SchemaResolved {
                        schema:   &schema,
                        inferred: resolution.inferred,
                    },);
                    Stage::Streaming
                },
                Stage::Streaming => self.stream(&schema, &mut accumulator, &mut stats,)?,
                Stage::Flushing => {
                    self.flush(&mut accumulator, &mut stats, false,).await?;
                    Stage::Streaming
                },
                Stage::FinalFlush => {
                    if !accumulator.is_empty() {
                        self.flush(&mut accumulator, &mut stats, true,).await?;
                    }
                    Stage::Reporting
                },
                Stage::Reporting => {
                    self.sink.refresh().await?;
                    info!(
                        sent = stats.sent,
                        written = stats.written,
                        malformed = stats.malformed,
                        dropped = stats.dropped,
                        batches = stats.batches,
                        "Ingestion finished"
                    );
                    Stage::Done
                },
                Stage::Done => Stage::Done,
            };
        }

        Ok(stats,)
    }

    /// Pulls rows until the batch is full or the source ends.
    fn stream(
        &mut self,
        schema: &Schema,
        accumulator: &mut BatchAccumulator,
        stats: &mut IngestStats,
    ) -> Result<Stage,> {
        let mapper = RecordMapper::new(schema,);
        loop {
            match self.source.next_row()? {
                SourceRow::End => return Ok(Stage::FinalFlush,),
                SourceRow::Malformed { reason, .. } => {
                    debug!(%reason, "Skipping malformed row");
                    stats.malformed += 1;
                },
                SourceRow::Record(raw,) => match mapper.map(raw,) {
                    None => stats.dropped += 1,
                    Some(doc,) => {
                        accumulator.add(doc,);
                        stats.sent += 1;
                        if accumulator.should_flush() {
                            return Ok(Stage::Flushing,);
                        }
                    },
                },
            }
        }
    }

    async fn flush(
        &mut self,
        accumulator: &mut BatchAccumulator,
        stats: &mut IngestStats,
        final_batch: bool,
    ) -> Result<(),> {
        let batch = accumulator.drain();
        let sequence = batch.sequence;
        let size = batch.len();
        let written = self.sink.submit(batch,).await?;
        stats.written += written as u64;
        stats.batches += 1;
        info!(sequence, size, total = stats.sent, "Submitted batch");
        self.emit(PipelineEvent::BatchSubmitted {
            sequence,
            size,
            final_batch,
            stats: &*stats,
        },);
        Ok((),)
    }

    fn emit(&mut self, event: PipelineEvent<'_,>,) {
        if let Some(listener,) = self.listener.as_mut() {
            listener(event,);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::batch::Batch;
    use crate::sink::SinkConfig;
    use crate::source::{CsvOptions, CsvRecordSource};

    #[derive(Default,)]
    struct MemorySink {
        created:   Mutex<bool,>,
        refreshed: Mutex<bool,>,
        batches:   Mutex<Vec<Batch,>,>,
    }

    impl MemorySink {
        fn batches(&self,) -> Vec<Batch,> {
            self.batches.lock().unwrap().clone()
        }

        fn created(&self,) -> bool {
            *self.created.lock().unwrap()
        }

        fn refreshed(&self,) -> bool {
            *self.refreshed.lock().unwrap()
        }
    }

    #[async_trait]
    impl SinkClient for MemorySink {
        async fn new(_config: SinkConfig,) -> Result<Self,> {
            Ok(Self::default(),)
        }

        async fn ensure_destination(&self,) -> Result<(),> {
            *self.created.lock().unwrap() = true;
            Ok((),)
        }

        async fn submit(&self, batch: Batch,) -> Result<usize,> {
            let count = batch.len();
            self.batches.lock().unwrap().push(batch,);
            Ok(count,)
        }

        async fn refresh(&self,) -> Result<(),> {
            *self.refreshed.lock().unwrap() = true;
            Ok((),)
        }
    }

    fn source(data: &str,) -> CsvRecordSource<std::io::Cursor<Vec<u8,>,>,> {
        CsvRecordSource::from_reader(
            std::io::Cursor::new(data.as_bytes().to_vec(),),
            CsvOptions::default(),
        )
    }

    #[tokio::test]
    async fn header_is_not_a_document() {
        let sink = MemorySink::default();
        let stats = IngestionPipeline::new(
            source("a,b\n1,2\n3,4\n5,6\n",),
            &sink,
            PipelineConfig {
                batch_size:      10,
                explicit_fields: None,
            },
        )
        .run()
        .await
        .unwrap();

        assert_eq!(stats.sent, 3);
        assert_eq!(stats.malformed, 0);
        assert_eq!(stats.batches, 1);
        let batches = sink.batches();
        assert_eq!(batches[0].documents[0].get("a"), Some("1"));
        assert!(sink.created());
        assert!(sink.refreshed());
    }

    #[tokio::test]
    async fn events_follow_stage_order() {
        let sink = MemorySink::default();
        let mut seen = Vec::new();
        IngestionPipeline::new(
            source("a\n1\n2\n3\n",),
            &sink,
            PipelineConfig {
                batch_size:      2,
                explicit_fields: None,
            },
        )
        .on_event(|event| match event {
            PipelineEvent::SchemaResolved { inferred, .. } => seen.push(format!("schema:{}", inferred),),
            PipelineEvent::BatchSubmitted {
                stats, final_batch, ..
            } => seen.push(format!("sent:{}:{}", stats.sent, final_batch),),
        },)
        .run()
        .await
        .unwrap();

        assert_eq!(seen, vec!["schema:true", "sent:2:false", "sent:3:true"]);
    }

    #[tokio::test]
    async fn final_flush_has_no_progress_line() {
        let sink = MemorySink::default();
        let mut lines = Vec::new();
        let stats = IngestionPipeline::new(
            source("a\n1\n2\n3\n",),
            &sink,
            PipelineConfig {
                batch_size:      2,
                explicit_fields: None,
            },
        )
        .on_event(|event| lines.extend(progress_line(&event,),),)
        .run()
        .await
        .unwrap();
        lines.extend(summary_lines(&stats,),);

        assert_eq!(lines, vec![
            "Column names:  [a]",
            "Sent 2 docs",
            "Sent 3 docs",
            "0 docs malformed",
        ]);
    }

    #[test]
    fn explicit_schema_is_not_printed() {
        let schema = Schema::new(vec!["a".to_string()],);
        let event = PipelineEvent::SchemaResolved {
            schema:   &schema,
            inferred: false,
        };
        assert_eq!(progress_line(&event,), None);
    }

    #[tokio::test]
    async fn zero_batch_size_fails_before_touching_sink() {
        let sink = MemorySink::default();
        let res = IngestionPipeline::new(
            source("a\n1\n",),
            &sink,
            PipelineConfig {
                batch_size:      0,
                explicit_fields: None,
            },
        )
        .run()
        .await;
        assert!(res.is_err());
        assert!(!sink.created());
    }
}
