// csv_indexer/src/cli.rs
// Command Line Interface (CLI) specific logic for csv_indexer.

use std::path::PathBuf;

use clap::Parser;

use crate::batch::DEFAULT_BATCH_SIZE;
use crate::elastic::DEFAULT_ES_URL;
use crate::mongo::DEFAULT_DATABASE_NAME;

/// Command Line Interface for the csv_indexer crate.
#[derive(Parser, Debug,)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    /// The destination store to ingest documents into.
    #[clap(subcommand)]
    pub command: Commands,

    /// Write a summary of the run to ingestion_report.json at the end.
    #[clap(long)]
    pub report: bool,
}

#[derive(Parser, Debug,)]
pub enum Commands {
    /// Ingest data into Elasticsearch
    Elastic(ElasticArgs,),
    /// Ingest data into MongoDB
    Mongo(MongoArgs,),
}

#[derive(Parser, Debug,)]
pub struct SourceArgs {
    /// Path to the delimited input file
    #[clap(short, long)]
    pub input_path: PathBuf,

    /// Comma-separated list of column names. If not specified column names
    /// are inferred from the first row.
    #[clap(long, default_value = "")]
    pub fields: String,

    /// Number of documents per batch
    #[clap(long, default_value_t = DEFAULT_BATCH_SIZE, value_parser = parse_batch_size)]
    pub batch_size: usize,

    /// Field delimiter, a single ASCII character
    #[clap(long, default_value_t = ',', value_parser = parse_delimiter)]
    pub delimiter: char,

    /// Accept rows whose width differs from the first row instead of
    /// counting them as malformed
    #[clap(long)]
    pub flexible: bool,
}

fn parse_batch_size(s: &str,) -> Result<usize, String,> {
    let n: usize = s.parse().map_err(|e| format!("invalid batch size `{}`: {}", s, e),)?;
    if n == 0 {
        return Err("batch size must be at least 1".to_string(),);
    }
    Ok(n,)
}

fn parse_delimiter(s: &str,) -> Result<char, String,> {
    let mut chars = s.chars();
    match (chars.next(), chars.next(),) {
        (Some(c,), None,) if c.is_ascii() => Ok(c,),
        (Some('\\',), Some('t',),) if s.len() == 2 => Ok('\t',),
        _ => Err(format!("delimiter must be a single ASCII character, got `{}`", s),),
    }
}

#[derive(Parser, Debug,)]
pub struct ElasticArgs {
    /// Elasticsearch URL
    #[clap(long, env = "ES_URL", default_value = DEFAULT_ES_URL)]
    pub source_url: String,
    /// Elasticsearch index name
    #[clap(long)]
    pub index:      String,
    /// Elasticsearch document type
    #[clap(long, default_value = "")]
    pub doc_type:   String,

    #[clap(flatten)]
    pub source: SourceArgs,
}

#[derive(Parser, Debug,)]
pub struct MongoArgs {
    /// Connection string for MongoDB
    #[clap(long, env = "MONGO_URI")]
    pub uri:        String,
    /// Database holding the collection
    #[clap(long, default_value = DEFAULT_DATABASE_NAME)]
    pub database:   String,
    /// Collection name
    #[clap(long)]
    pub collection: String,

    #[clap(flatten)]
    pub source: SourceArgs,
}
