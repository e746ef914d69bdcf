// csv_indexer/src/main.rs
// Main entry point for the csv_indexer CLI application.

use std::future::Future;
use std::path::Path;

use clap::Parser;
use csv_indexer::cli::{Cli, Commands, ElasticArgs, MongoArgs, SourceArgs};
use csv_indexer::elastic::ElasticSink;
use csv_indexer::error::{IngestError, Result};
use csv_indexer::mongo::MongoSink;
use csv_indexer::pipeline::{
    IngestStats, IngestionPipeline, PipelineConfig, progress_line, summary_lines,
};
use csv_indexer::schema::parse_fields;
use csv_indexer::sink::{SinkClient, SinkConfig};
use csv_indexer::source::{CsvOptions, CsvRecordSource};
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Serialize,)]
struct Report<'a,> {
    input_path:  &'a Path,
    destination: String,
    #[serde(flatten)]
    stats:       &'a IngestStats,
}

impl Report<'_,> {
    fn save(&self,) -> Result<(),> {
        let json = serde_json::to_string_pretty(self,).map_err(|e| {
            IngestError::Other(format!("Failed to serialize ingestion report: {}", e),)
        },)?;
        std::fs::write(csv_indexer::REPORT_FILE_NAME, json,).map_err(|e| {
            IngestError::Other(format!(
                "Failed to write {}: {}",
                csv_indexer::REPORT_FILE_NAME,
                e
            ),)
        },)?;
        info!("Ingestion report saved to {}", csv_indexer::REPORT_FILE_NAME);
        Ok((),)
    }
}

#[tokio::main]
async fn main() -> Result<(),> {
    // Initialize tracing
    let file_appender = tracing_appender::rolling::never(".", csv_indexer::LOG_FILE_NAME,);
    let (non_blocking, _guard,) = tracing_appender::non_blocking(file_appender,);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info",),),)
        .with(fmt::layer().with_writer(std::io::stderr,),)
        .with(fmt::layer().with_writer(non_blocking,).with_ansi(false,),)
        .init();

    let cli = Cli::parse();

    let res = match &cli.command {
        Commands::Elastic(args,) => handle_ingestion(args, ElasticSink::new, cli.report,).await,
        Commands::Mongo(args,) => handle_ingestion(args, MongoSink::new, cli.report,).await,
    };

    if let Err(e,) = &res {
        if e.is_setup() {
            error!("Setup failed, nothing was ingested: {}", e);
        } else {
            error!("Ingestion aborted: {}", e);
        }
    }
    res
}

async fn handle_ingestion<T: SinkClient, F,>(
    args: &impl IngestionArgs,
    sink_factory: impl FnOnce(SinkConfig,) -> F,
    report: bool,
) -> Result<(),>
where
    F: Future<Output = Result<T,>,>,
{
    let source_args = args.source();
    let options = CsvOptions {
        delimiter: u8::try_from(source_args.delimiter,).map_err(|_| {
            IngestError::ConfigurationError(format!(
                "delimiter `{}` is not a single byte",
                source_args.delimiter
            ),)
        },)?,
        flexible:  source_args.flexible,
    };
    let source = CsvRecordSource::open(&source_args.input_path, options,)?;

    let config = args.sink_config();
    let destination = format!("{}/{}", config.destination_url, config.index);
    let sink = sink_factory(config,).await?;

    info!(
        "Ingesting {} into {} in batches of {}",
        source_args.input_path.display(),
        destination,
        source_args.batch_size
    );

    let pipeline_config = PipelineConfig {
        batch_size:      source_args.batch_size,
        explicit_fields: parse_fields(&source_args.fields,),
    };

    let stats = IngestionPipeline::new(source, &sink, pipeline_config,)
        .on_event(|event| {
            if let Some(line,) = progress_line(&event,) {
                println!("{}", line);
            }
        },)
        .run()
        .await?;

    for line in summary_lines(&stats,) {
        println!("{}", line);
    }

    if report {
        Report {
            input_path: &source_args.input_path,
            destination,
            stats: &stats,
        }
        .save()?;
    }

    Ok((),)
}

// Trait to generalize over different destination argument types
trait IngestionArgs {
    fn source(&self,) -> &SourceArgs;
    fn sink_config(&self,) -> SinkConfig;
}

impl IngestionArgs for ElasticArgs {
    fn source(&self,) -> &SourceArgs {
        &self.source
    }

    fn sink_config(&self,) -> SinkConfig {
        SinkConfig {
            destination_url: self.source_url.clone(),
            index:           self.index.clone(),
            doc_type:        Some(self.doc_type.clone(),).filter(|t| !t.is_empty(),),
            database:        None,
        }
    }
}

impl IngestionArgs for MongoArgs {
    fn source(&self,) -> &SourceArgs {
        &self.source
    }

    fn sink_config(&self,) -> SinkConfig {
        SinkConfig {
            destination_url: self.uri.clone(),
            index:           self.collection.clone(),
            doc_type:        None,
            database:        Some(self.database.clone(),),
        }
    }
}
