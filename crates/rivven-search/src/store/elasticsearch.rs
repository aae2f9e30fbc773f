//! Elasticsearch REST store
//!
//! Speaks the plain REST API over `reqwest`, so it works against
//! Elasticsearch 7+/8 and OpenSearch without a vendor client.

use super::{
    BulkDocument, BulkItem, BulkResponse, CreateIndexResponse, SearchStore, StorageKind,
    WriteResponse, STATUS_NOT_FOUND,
};
use crate::config::{ElasticsearchConfig, IndexSettings, SensitiveString};
use crate::error::{Result, SyncError};
use crate::mapping::SchemaDocument;
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Url};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// Maximum error body bytes kept in error messages
const MAX_ERROR_BODY_BYTES: usize = 4096;

#[derive(Debug, Deserialize)]
struct AcknowledgedResponse {
    #[serde(default)]
    acknowledged: bool,
}

#[derive(Debug, Default, Deserialize)]
struct ShardsInfo {
    #[serde(default)]
    successful: u32,
}

#[derive(Debug, Default, Deserialize)]
struct DocumentResponse {
    #[serde(rename = "_shards", default)]
    shards: ShardsInfo,
}

#[derive(Debug, Deserialize)]
struct BulkApiResponse {
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct BulkApiItem {
    #[serde(rename = "_id", default)]
    id: String,
    #[serde(default)]
    status: u16,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    count: u64,
}

/// Elasticsearch store
pub struct ElasticsearchStore {
    base_url: Url,
    username: Option<String>,
    password: Option<SensitiveString>,
    client: reqwest::Client,
}

impl std::fmt::Debug for ElasticsearchStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElasticsearchStore")
            .field("base_url", &self.base_url.as_str())
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl ElasticsearchStore {
    /// Create a store from connection settings
    pub fn new(config: &ElasticsearchConfig) -> Result<Self> {
        let base_url = Url::parse(config.uri.trim_end_matches('/'))
            .map_err(|e| SyncError::config(format!("invalid Elasticsearch uri '{}': {}", config.uri, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(SyncError::config(format!(
                "invalid Elasticsearch uri '{}'",
                config.uri
            )));
        }

        if base_url.scheme() == "http" && config.password.is_some() {
            let host = base_url.host_str().unwrap_or_default();
            if host != "localhost" && host != "127.0.0.1" {
                warn!("Elasticsearch uri uses plain HTTP; credentials will be sent in cleartext");
            }
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SyncError::config(format!("failed to build HTTP client: {e}")))?;

        debug!(uri = %base_url, "Elasticsearch store initialized");

        Ok(Self {
            base_url,
            username: config.username.clone(),
            password: config.password.clone(),
            client,
        })
    }

    /// Build a URL from path segments (each segment is percent-encoded)
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SyncError::config("Elasticsearch uri cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        let builder = self.client.request(method, self.url(segments)?);
        Ok(match &self.username {
            Some(user) => builder.basic_auth(
                user,
                self.password.as_ref().map(|p| p.expose_secret()),
            ),
            None => builder,
        })
    }

    /// Turn an error response into a `Rejected` error
    async fn rejected(response: reqwest::Response) -> SyncError {
        let status = response.status().as_u16();
        let body = match response.bytes().await {
            Ok(b) => {
                let end = b.len().min(MAX_ERROR_BODY_BYTES);
                String::from_utf8_lossy(&b[..end]).to_string()
            }
            Err(_) => String::new(),
        };
        SyncError::rejected(status, body)
    }

    /// Read a single-document write response.
    ///
    /// Error statuses are not errors here: the status is passed through and
    /// the executor treats it as a soft failure.
    async fn write_response(response: reqwest::Response) -> Result<WriteResponse> {
        let status = response.status().as_u16();
        let bytes = response.bytes().await?;
        let parsed: DocumentResponse = serde_json::from_slice(&bytes).unwrap_or_default();
        Ok(WriteResponse::new(status, parsed.shards.successful))
    }
}

fn bulk_item(entry: &Map<String, Value>) -> BulkItem {
    let item = entry
        .values()
        .next()
        .cloned()
        .and_then(|v| serde_json::from_value::<BulkApiItem>(v).ok());
    match item {
        Some(item) => BulkItem {
            id: item.id,
            status: item.status,
            error: item.error.map(|e| match e {
                Value::String(s) => s,
                other => other
                    .get("type")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| other.to_string()),
            }),
        },
        None => BulkItem {
            id: String::new(),
            status: 0,
            error: Some("unparseable bulk item".to_string()),
        },
    }
}

/// Encode documents as a `_bulk` NDJSON body
fn bulk_body(index: &str, documents: &[BulkDocument<'_>]) -> Result<String> {
    let mut body = String::new();
    for doc in documents {
        let action = json!({ "index": { "_index": index, "_id": doc.id } });
        body.push_str(&serde_json::to_string(&action)?);
        body.push('\n');
        body.push_str(&serde_json::to_string(doc.body)?);
        body.push('\n');
    }
    Ok(body)
}

#[async_trait]
impl SearchStore for ElasticsearchStore {
    fn kind(&self) -> StorageKind {
        StorageKind::Elasticsearch
    }

    async fn index_exists(&self, index: &str) -> Result<bool> {
        let resp = self.request(Method::HEAD, &[index])?.send().await?;
        match resp.status().as_u16() {
            200..=299 => Ok(true),
            STATUS_NOT_FOUND => Ok(false),
            _ => Err(Self::rejected(resp).await),
        }
    }

    async fn create_index(
        &self,
        index: &str,
        settings: &IndexSettings,
        schema: &SchemaDocument,
    ) -> Result<CreateIndexResponse> {
        let body = json!({
            "settings": {
                "index": {
                    "number_of_shards": settings.number_of_shards,
                    "number_of_replicas": settings.number_of_replicas,
                }
            },
            "mappings": schema,
        });

        let resp = self
            .request(Method::PUT, &[index])?
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Self::rejected(resp).await);
        }

        let ack: AcknowledgedResponse = resp.json().await?;
        Ok(CreateIndexResponse {
            acknowledged: ack.acknowledged,
        })
    }

    async fn index_document(
        &self,
        index: &str,
        id: &str,
        body: &Map<String, Value>,
    ) -> Result<WriteResponse> {
        let resp = self
            .request(Method::PUT, &[index, "_doc", id])?
            .json(body)
            .send()
            .await?;
        Self::write_response(resp).await
    }

    async fn update_document(
        &self,
        index: &str,
        id: &str,
        body: &Map<String, Value>,
    ) -> Result<WriteResponse> {
        let resp = self
            .request(Method::POST, &[index, "_update", id])?
            .json(&json!({ "doc": body, "doc_as_upsert": true }))
            .send()
            .await?;
        Self::write_response(resp).await
    }

    async fn delete_document(&self, index: &str, id: &str) -> Result<WriteResponse> {
        let resp = self
            .request(Method::DELETE, &[index, "_doc", id])?
            .send()
            .await?;
        Self::write_response(resp).await
    }

    async fn bulk(&self, index: &str, documents: &[BulkDocument<'_>]) -> Result<BulkResponse> {
        let resp = self
            .request(Method::POST, &["_bulk"])?
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(bulk_body(index, documents)?)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Self::rejected(resp).await);
        }

        let api: BulkApiResponse = resp.json().await?;
        let items: Vec<BulkItem> = api.items.iter().map(bulk_item).collect();
        let has_failures = api.errors || items.iter().any(BulkItem::is_failure);
        Ok(BulkResponse {
            items,
            has_failures,
        })
    }

    async fn count(&self, index: &str) -> Result<u64> {
        let resp = self
            .request(Method::POST, &[index, "_count"])?
            .json(&json!({ "query": { "match_all": {} } }))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Self::rejected(resp).await);
        }

        let count: CountResponse = resp.json().await?;
        Ok(count.count)
    }
}
