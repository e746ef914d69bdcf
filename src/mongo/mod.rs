// csv_indexer/src/mongo/mod.rs
// MongoDB specific sink logic.

use async_trait::async_trait;
use mongodb::bson::{self, doc};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, Database};
use tracing::info;

use crate::batch::Batch;
use crate::error::{IngestError, Result};
use crate::sink::{SinkClient, SinkConfig};

pub const DEFAULT_DATABASE_NAME: &str = "csv_indexer";

pub struct MongoSink {
    config: SinkConfig,
    client: Client,
}

#[async_trait]
impl SinkClient for MongoSink {
    async fn new(config: SinkConfig,) -> Result<Self,> {
        if config.index.is_empty() {
            return Err(IngestError::ConfigurationError(
                "a collection name is required".to_string(),
            ),);
        }
        let client_options = ClientOptions::parse(&config.destination_url,)
            .await
            .map_err(|e| {
                IngestError::ConfigurationError(format!("Failed to parse MongoDB URI: {}", e),)
            },)?;
        let client = Client::with_options(client_options,).map_err(|e| {
            IngestError::ConnectionError(format!("Failed to create MongoDB client: {}", e),)
        },)?;

        client
            .database("admin",)
            .run_command(doc! {"ping": 1}, None,)
            .await
            .map_err(|e| {
                IngestError::ConnectionError(format!("Failed to connect to MongoDB: {}", e),)
            },)?;

        Ok(MongoSink { config, client, },)
    }

    async fn ensure_destination(&self,) -> Result<(),> {
        let database = self.database();
        let names = database.list_collection_names(None,).await.map_err(|e| {
            IngestError::DatabaseError(format!("Failed to list MongoDB collections: {}", e),)
        },)?;
        if names.iter().any(|n| n == &self.config.index,) {
            return Ok((),);
        }

        database
            .create_collection(&self.config.index, None,)
            .await
            .map_err(|e| {
                IngestError::DatabaseError(format!(
                    "Failed to create MongoDB collection '{}': {}",
                    self.config.index, e
                ),)
            },)?;
        info!(
            "Created MongoDB collection '{}' in database '{}'.",
            self.config.index,
            database.name()
        );
        Ok((),)
    }

    async fn submit(&self, batch: Batch,) -> Result<usize,> {
        // `insert_many` refuses an empty document list.
        if batch.is_empty() {
            return Ok(0,);
        }
        let documents = batch
            .documents
            .iter()
            .map(|d| {
                bson::to_document(d,).map_err(|e| {
                    IngestError::IngestionError(format!(
                        "Failed to serialize document to BSON: {}",
                        e
                    ),)
                },)
            },)
            .collect::<Result<Vec<_,>,>>()?;

        let result = self
            .collection()
            .insert_many(documents, None,)
            .await
            .map_err(|e| {
                IngestError::IngestionError(format!(
                    "Failed to insert batch {} into MongoDB: {}",
                    batch.sequence, e
                ),)
            },)?;
        Ok(result.inserted_ids.len(),)
    }

    async fn refresh(&self,) -> Result<(),> {
        // Acknowledged writes are already visible.
        Ok((),)
    }
}

impl MongoSink {
    fn database(&self,) -> Database {
        self.client.database(
            self.config
                .database
                .as_deref()
                .unwrap_or(DEFAULT_DATABASE_NAME,),
        )
    }

    fn collection(&self,) -> Collection<bson::Document,> {
        self.database().collection(&self.config.index,)
    }
}
