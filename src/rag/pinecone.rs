//! Pinecone REST backend.
//!
//! Index management goes through the control plane (`/indexes`); vectors go
//! to the index host returned by `describe_index`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::OnceCell;

use super::store::{IndexRecord, RecordMetadata, ScoredRecord, VectorStore, VectorStoreError};
use crate::core::config::VectorStoreConfig;
use crate::core::http::send_json_with_retry;

const READY_POLL_ATTEMPTS: usize = 60;
const READY_POLL_INTERVAL: Duration = Duration::from_secs(1);

pub struct PineconeStore {
    client: Client,
    api_key: String,
    api_version: String,
    control_plane_url: String,
    index_name: String,
    region: String,
    cloud: String,
    metric: String,
    namespace: Option<String>,
    max_retries: usize,
    host: OnceCell<String>,
}

#[derive(Deserialize)]
struct IndexList {
    #[serde(default)]
    indexes: Vec<IndexDescription>,
}

#[derive(Deserialize)]
struct IndexDescription {
    name: String,
    #[serde(default)]
    dimension: Option<usize>,
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    status: Option<IndexStatus>,
}

#[derive(Deserialize)]
struct IndexStatus {
    #[serde(default)]
    ready: bool,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    values: Vec<f32>,
    metadata: Option<RecordMetadata>,
}

impl PineconeStore {
    pub fn new(config: &VectorStoreConfig) -> Result<Self, VectorStoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| VectorStoreError::Transport(err.to_string()))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone().unwrap_or_default(),
            api_version: config.api_version.clone(),
            control_plane_url: config.control_plane_url.trim_end_matches('/').to_string(),
            index_name: config.index_name.clone().unwrap_or_default(),
            region: config.environment.clone().unwrap_or_default(),
            cloud: config.cloud.clone(),
            metric: config.metric.clone(),
            namespace: config.namespace.clone().filter(|ns| !ns.is_empty()),
            max_retries: config.max_retries,
            host: OnceCell::new(),
        })
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", &self.api_version)
    }

    async fn control_get(&self, path: &str) -> Result<Value, VectorStoreError> {
        let url = format!("{}{}", self.control_plane_url, path);
        Ok(send_json_with_retry(self.max_retries, || self.authorized(self.client.get(&url))).await?)
    }

    async fn describe_index(&self) -> Result<IndexDescription, VectorStoreError> {
        let payload = self
            .control_get(&format!("/indexes/{}", self.index_name))
            .await?;
        serde_json::from_value(payload).map_err(|err| VectorStoreError::Malformed(err.to_string()))
    }

    async fn index_host(&self) -> Result<&str, VectorStoreError> {
        let host = self
            .host
            .get_or_try_init(|| async {
                let description = self.describe_index().await?;
                let host = description.host.filter(|h| !h.is_empty()).ok_or_else(|| {
                    VectorStoreError::IndexNotReady(format!("index '{}' has no host yet", self.index_name))
                })?;
                Ok::<String, VectorStoreError>(data_plane_url(&host))
            })
            .await?;
        Ok(host.as_str())
    }

    async fn data_post(&self, path: &str, body: &Value) -> Result<Value, VectorStoreError> {
        let url = format!("{}{}", self.index_host().await?, path);
        Ok(send_json_with_retry(self.max_retries, || {
            self.authorized(self.client.post(&url)).json(body)
        })
        .await?)
    }

    fn with_namespace(&self, mut body: Value) -> Value {
        if let (Some(ns), Some(obj)) = (&self.namespace, body.as_object_mut()) {
            obj.insert("namespace".to_string(), json!(ns));
        }
        body
    }

    async fn wait_until_ready(&self) -> Result<(), VectorStoreError> {
        for attempt in 0..READY_POLL_ATTEMPTS {
            let description = self.describe_index().await?;
            if description.status.map(|s| s.ready).unwrap_or(false) {
                return Ok(());
            }
            tracing::debug!(index = %self.index_name, attempt, "waiting for index to become ready");
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
        Err(VectorStoreError::IndexNotReady(format!(
            "index '{}' did not become ready",
            self.index_name
        )))
    }
}

fn data_plane_url(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

#[async_trait]
impl VectorStore for PineconeStore {
    fn name(&self) -> &str {
        "pinecone"
    }

    async fn ensure_index(&self, dimension: usize) -> Result<(), VectorStoreError> {
        let payload = self.control_get("/indexes").await?;
        let list: IndexList = serde_json::from_value(payload)
            .map_err(|err| VectorStoreError::Malformed(err.to_string()))?;

        match list.indexes.iter().find(|index| index.name == self.index_name) {
            Some(existing) => {
                if let Some(expected) = existing.dimension {
                    if expected != dimension {
                        return Err(VectorStoreError::DimensionMismatch {
                            expected,
                            actual: dimension,
                        });
                    }
                }
                Ok(())
            }
            None => {
                tracing::info!(
                    index = %self.index_name,
                    dimension,
                    metric = %self.metric,
                    "creating Pinecone index"
                );
                let url = format!("{}/indexes", self.control_plane_url);
                let body = json!({
                    "name": self.index_name,
                    "dimension": dimension,
                    "metric": self.metric,
                    "spec": { "serverless": { "cloud": self.cloud, "region": self.region } },
                });
                send_json_with_retry(self.max_retries, || {
                    self.authorized(self.client.post(&url)).json(&body)
                })
                .await?;
                self.wait_until_ready().await
            }
        }
    }

    async fn upsert(&self, records: &[IndexRecord]) -> Result<usize, VectorStoreError> {
        if records.is_empty() {
            return Ok(0);
        }
        let vectors: Vec<Value> = records
            .iter()
            .map(|r| json!({ "id": r.id, "values": r.values, "metadata": r.metadata }))
            .collect();
        let body = self.with_namespace(json!({ "vectors": vectors }));
        let payload = self.data_post("/vectors/upsert", &body).await?;

        Ok(payload["upsertedCount"]
            .as_u64()
            .map(|n| n as usize)
            .unwrap_or(records.len()))
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredRecord>, VectorStoreError> {
        let body = self.with_namespace(json!({
            "vector": vector,
            "topK": top_k,
            "includeMetadata": true,
            "includeValues": false,
        }));
        let payload = self.data_post("/query", &body).await?;
        let response: QueryResponse = serde_json::from_value(payload)
            .map_err(|err| VectorStoreError::Malformed(err.to_string()))?;

        response
            .matches
            .into_iter()
            .map(|m| {
                let metadata = m.metadata.ok_or_else(|| {
                    VectorStoreError::Malformed(format!("match '{}' has no metadata", m.id))
                })?;
                Ok(ScoredRecord {
                    record: IndexRecord {
                        id: m.id,
                        values: m.values,
                        metadata,
                    },
                    score: m.score,
                })
            })
            .collect()
    }

    async fn count(&self) -> Result<u64, VectorStoreError> {
        let payload = self.data_post("/describe_index_stats", &json!({})).await?;
        let count = match &self.namespace {
            Some(ns) => payload["namespaces"][ns]["vectorCount"].as_u64().unwrap_or(0),
            None => payload["totalVectorCount"].as_u64().ok_or_else(|| {
                VectorStoreError::Malformed("missing totalVectorCount".to_string())
            })?,
        };
        Ok(count)
    }

    async fn clear(&self) -> Result<(), VectorStoreError> {
        let body = self.with_namespace(json!({ "deleteAll": true }));
        match self.data_post("/vectors/delete", &body).await {
            Ok(_) => Ok(()),
            // Deleting from a namespace that was never written is reported as 404.
            Err(VectorStoreError::Upstream { status: 404, .. }) => Ok(()),
            Err(err) => Err(err),
        }
    }
}
