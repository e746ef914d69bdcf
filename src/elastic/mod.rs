// csv_indexer/src/elastic/mod.rs
// Elasticsearch specific sink logic, spoken over the REST API.

use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};
use url::Url;

use crate::batch::Batch;
use crate::error::{IngestError, Result};
use crate::sink::{SinkClient, SinkConfig};

pub const DEFAULT_ES_URL: &str = "http://localhost:9200";

pub struct ElasticSink {
    config: SinkConfig,
    client: Client,
    base:   Url,
}

#[derive(Deserialize,)]
struct BulkResponse {
    errors: bool,
    #[serde(default)]
    items:  Vec<Value,>,
}

#[async_trait]
impl SinkClient for ElasticSink {
    async fn new(config: SinkConfig,) -> Result<Self,> {
        if config.index.is_empty() {
            return Err(IngestError::ConfigurationError(
                "an index name is required".to_string(),
            ),);
        }
        let base = Url::parse(&config.destination_url,).map_err(|e| {
            IngestError::ConfigurationError(format!(
                "Invalid Elasticsearch URL '{}': {}",
                config.destination_url, e
            ),)
        },)?;
        if base.cannot_be_a_base() {
            return Err(IngestError::ConfigurationError(format!(
                "Elasticsearch URL '{}' cannot carry a path",
                config.destination_url
            ),),);
        }

        let client = Client::new();
        let response = client.get(base.clone(),).send().await.map_err(|e| {
            IngestError::ConnectionError(format!("Failed to connect to Elasticsearch: {}", e),)
        },)?;
        if !response.status().is_success() {
            return Err(IngestError::ConnectionError(format!(
                "Elasticsearch at {} answered {}",
                base,
                response.status()
            ),),);
        }

        Ok(ElasticSink {
            config,
            client,
            base,
        },)
    }

    async fn ensure_destination(&self,) -> Result<(),> {
        let url = self.endpoint(&[self.config.index.as_str()],);
        let exists = self.client.head(url.clone(),).send().await.map_err(|e| {
            IngestError::ConnectionError(format!("Failed to query index: {}", e),)
        },)?;

        match exists.status() {
            s if s.is_success() => {
                debug!("Index '{}' already exists", self.config.index);
                return Ok((),);
            },
            StatusCode::NOT_FOUND => {},
            other => {
                return Err(IngestError::DatabaseError(format!(
                    "Unexpected status {} checking index '{}'",
                    other, self.config.index
                ),),);
            },
        }

        let response = self.client.put(url,).send().await.map_err(|e| {
            IngestError::ConnectionError(format!("Failed to create index: {}", e),)
        },)?;
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(IngestError::DatabaseError(format!(
                "Failed to create index '{}': {} - {}",
                self.config.index, status, error_text
            ),),);
        }
        info!("Created Elasticsearch index: {}", self.config.index);
        Ok((),)
    }

    async fn submit(&self, batch: Batch,) -> Result<usize,> {
        // `_bulk` rejects an empty body.
        if batch.is_empty() {
            return Ok(0,);
        }
        let body = self.bulk_body(&batch,)?;
        let response = self
            .client
            .post(self.endpoint(&["_bulk"],),)
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson",)
            .body(body,)
            .send()
            .await
            .map_err(|e| IngestError::IngestionError(format!("Bulk request failed: {}", e),),)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(IngestError::IngestionError(format!(
                "Bulk request for batch {} failed: {} - {}",
                batch.sequence, status, error_text
            ),),);
        }

        let result: BulkResponse = response.json().await.map_err(|e| {
            IngestError::IngestionError(format!("Failed to parse bulk response: {}", e),)
        },)?;

        if result.errors {
            let reason = result
                .items
                .iter()
                .find_map(item_error,)
                .unwrap_or_else(|| "unknown item failure".to_string(),);
            return Err(IngestError::IngestionError(format!(
                "Bulk request for batch {} rejected documents: {}",
                batch.sequence, reason
            ),),);
        }

        Ok(if result.items.is_empty() { batch.len() } else { result.items.len() },)
    }

    async fn refresh(&self,) -> Result<(),> {
        let response = self
            .client
            .post(self.endpoint(&[self.config.index.as_str(), "_refresh"],),)
            .send()
            .await
            .map_err(|e| IngestError::DatabaseError(format!("Refresh failed: {}", e),),)?;
        if !response.status().is_success() {
            return Err(IngestError::DatabaseError(format!(
                "Refresh of '{}' failed: {}",
                self.config.index,
                response.status()
            ),),);
        }
        Ok((),)
    }
}

impl ElasticSink {
    fn endpoint(&self, segments: &[&str],) -> Url {
        let mut url = self.base.clone();
        // Checked in `new`.
        if let Ok(mut path,) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments,);
        }
        url
    }

    fn bulk_body(&self, batch: &Batch,) -> Result<bytes::Bytes,> {
        let mut target = json!({ "_index": self.config.index });
        if let Some(doc_type,) = self.config.doc_type.as_deref().filter(|t| !t.is_empty(),) {
            target["_type"] = json!(doc_type);
        }
        let action = serde_json::to_vec(&json!({ "index": target }),)
            .map_err(|e| IngestError::Other(e.to_string(),),)?;

        let mut body = BytesMut::new();
        for doc in &batch.documents {
            body.put_slice(&action,);
            body.put_u8(b'\n',);
            let source = serde_json::to_vec(doc,).map_err(|e| {
                IngestError::IngestionError(format!("Failed to serialize document: {}", e),)
            },)?;
            body.put_slice(&source,);
            body.put_u8(b'\n',);
        }
        Ok(body.freeze(),)
    }
}

fn item_error(item: &Value,) -> Option<String,> {
    let result = item.as_object()?.values().next()?;
    let error = result.get("error",)?;
    Some(
        error
            .get("reason",)
            .and_then(Value::as_str,)
            .map(str::to_string,)
            .unwrap_or_else(|| error.to_string(),),
    )
}
