// csv_indexer/src/lib.rs
// Public API of the csv_indexer crate: a batched pipeline that republishes
// delimited records as documents into a search or document store.

pub mod batch;
pub mod cli;
pub mod elastic;
pub mod error;
pub mod mapper;
pub mod mongo;
pub mod pipeline;
pub mod schema;
pub mod sink;
pub mod source;

pub const REPORT_FILE_NAME: &str = "ingestion_report.json";
pub const LOG_FILE_NAME: &str = "indexer.log";
