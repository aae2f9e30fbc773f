//! In-memory search store for testing and development
//!
//! Behaves like a single-node cluster with one shard per write. Responses can
//! be scripted to exercise failure paths: unacknowledged index creation,
//! forced write statuses, per-id bulk failures and external index deletion.

use super::{
    BulkDocument, BulkItem, BulkResponse, CreateIndexResponse, SearchStore, StorageKind,
    WriteResponse, STATUS_CREATED, STATUS_NOT_FOUND, STATUS_OK,
};
use crate::config::IndexSettings;
use crate::error::{Result, SyncError};
use crate::mapping::SchemaDocument;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Clone)]
struct MemoryIndex {
    settings: IndexSettings,
    schema: SchemaDocument,
    documents: HashMap<String, Map<String, Value>>,
}

impl MemoryIndex {
    fn new(settings: IndexSettings, schema: SchemaDocument) -> Self {
        Self {
            settings,
            schema,
            documents: HashMap::new(),
        }
    }
}

/// Call counters of a [`MemoryStore`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStoreStats {
    /// `index_exists` calls
    pub exists_calls: u64,
    /// `create_index` calls
    pub create_calls: u64,
    /// `index_document` calls
    pub index_calls: u64,
    /// `update_document` calls
    pub update_calls: u64,
    /// `delete_document` calls
    pub delete_calls: u64,
    /// `bulk` calls
    pub bulk_calls: u64,
    /// `count` calls
    pub count_calls: u64,
}

#[derive(Default)]
struct Counters {
    exists: AtomicU64,
    create: AtomicU64,
    index: AtomicU64,
    update: AtomicU64,
    delete: AtomicU64,
    bulk: AtomicU64,
    count: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// In-memory search store
pub struct MemoryStore {
    indices: RwLock<HashMap<String, MemoryIndex>>,
    counters: Counters,
    acknowledge_creates: AtomicBool,
    forced_write: Mutex<Option<WriteResponse>>,
    failing_ids: Mutex<HashSet<String>>,
    latency: Option<Duration>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            indices: RwLock::new(HashMap::new()),
            counters: Counters::default(),
            acknowledge_creates: AtomicBool::new(true),
            forced_write: Mutex::new(None),
            failing_ids: Mutex::new(HashSet::new()),
            latency: None,
        }
    }

    /// Delay every call (widens race windows in concurrency tests)
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Whether index creation is acknowledged (default true)
    pub fn set_acknowledge_creates(&self, acknowledge: bool) {
        self.acknowledge_creates.store(acknowledge, Ordering::SeqCst);
    }

    /// Answer every single-document write with this response, without applying it
    pub fn force_write_response(&self, response: Option<WriteResponse>) {
        *self.forced_write.lock() = response;
    }

    /// Fail bulk items with these document ids
    pub fn fail_bulk_ids<I, S>(&self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut failing = self.failing_ids.lock();
        failing.clear();
        failing.extend(ids.into_iter().map(Into::into));
    }

    /// Create an index directly, bypassing call counters
    pub fn add_index(&self, index: impl Into<String>) {
        self.indices
            .write()
            .entry(index.into())
            .or_insert_with(|| MemoryIndex::new(IndexSettings::default(), SchemaDocument::default()));
    }

    /// Insert a document directly, bypassing call counters
    pub fn put_document(&self, index: &str, id: impl Into<String>, body: Map<String, Value>) {
        self.indices
            .write()
            .entry(index.to_string())
            .or_insert_with(|| MemoryIndex::new(IndexSettings::default(), SchemaDocument::default()))
            .documents
            .insert(id.into(), body);
    }

    /// Remove an index as an external actor would
    pub fn drop_index(&self, index: &str) -> bool {
        self.indices.write().remove(index).is_some()
    }

    /// Whether an index exists
    pub fn has_index(&self, index: &str) -> bool {
        self.indices.read().contains_key(index)
    }

    /// Stored document
    pub fn document(&self, index: &str, id: &str) -> Option<Map<String, Value>> {
        self.indices
            .read()
            .get(index)
            .and_then(|i| i.documents.get(id).cloned())
    }

    /// Number of stored documents
    pub fn document_count(&self, index: &str) -> usize {
        self.indices
            .read()
            .get(index)
            .map(|i| i.documents.len())
            .unwrap_or(0)
    }

    /// Schema an index was created with
    pub fn schema(&self, index: &str) -> Option<SchemaDocument> {
        self.indices.read().get(index).map(|i| i.schema.clone())
    }

    /// Settings an index was created with
    pub fn settings(&self, index: &str) -> Option<IndexSettings> {
        self.indices.read().get(index).map(|i| i.settings)
    }

    /// Call counters
    pub fn stats(&self) -> MemoryStoreStats {
        let c = &self.counters;
        MemoryStoreStats {
            exists_calls: c.exists.load(Ordering::Relaxed),
            create_calls: c.create.load(Ordering::Relaxed),
            index_calls: c.index.load(Ordering::Relaxed),
            update_calls: c.update.load(Ordering::Relaxed),
            delete_calls: c.delete.load(Ordering::Relaxed),
            bulk_calls: c.bulk.load(Ordering::Relaxed),
            count_calls: c.count.load(Ordering::Relaxed),
        }
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn forced_write(&self) -> Option<WriteResponse> {
        *self.forced_write.lock()
    }

    /// Insert or replace, returning 201 for new documents and 200 otherwise
    fn store_document(&self, index: &str, id: &str, body: Map<String, Value>) -> u16 {
        let mut indices = self.indices.write();
        let idx = indices
            .entry(index.to_string())
            .or_insert_with(|| MemoryIndex::new(IndexSettings::default(), SchemaDocument::default()));
        match idx.documents.insert(id.to_string(), body) {
            Some(_) => STATUS_OK,
            None => STATUS_CREATED,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("indices", &self.indices.read().len())
            .field("stats", &self.stats())
            .finish()
    }
}

#[async_trait]
impl SearchStore for MemoryStore {
    fn kind(&self) -> StorageKind {
        StorageKind::Memory
    }

    async fn index_exists(&self, index: &str) -> Result<bool> {
        Counters::bump(&self.counters.exists);
        self.delay().await;
        Ok(self.has_index(index))
    }

    async fn create_index(
        &self,
        index: &str,
        settings: &IndexSettings,
        schema: &SchemaDocument,
    ) -> Result<CreateIndexResponse> {
        Counters::bump(&self.counters.create);
        self.delay().await;

        if !self.acknowledge_creates.load(Ordering::SeqCst) {
            return Ok(CreateIndexResponse {
                acknowledged: false,
            });
        }

        let mut indices = self.indices.write();
        if indices.contains_key(index) {
            return Err(SyncError::rejected(
                400,
                format!("resource_already_exists_exception: index [{}]", index),
            ));
        }
        indices.insert(
            index.to_string(),
            MemoryIndex::new(*settings, schema.clone()),
        );
        Ok(CreateIndexResponse { acknowledged: true })
    }

    async fn index_document(
        &self,
        index: &str,
        id: &str,
        body: &Map<String, Value>,
    ) -> Result<WriteResponse> {
        Counters::bump(&self.counters.index);
        self.delay().await;

        if let Some(forced) = self.forced_write() {
            return Ok(forced);
        }
        let status = self.store_document(index, id, body.clone());
        Ok(WriteResponse::new(status, 1))
    }

    async fn update_document(
        &self,
        index: &str,
        id: &str,
        body: &Map<String, Value>,
    ) -> Result<WriteResponse> {
        Counters::bump(&self.counters.update);
        self.delay().await;

        if let Some(forced) = self.forced_write() {
            return Ok(forced);
        }

        let mut indices = self.indices.write();
        let idx = indices
            .entry(index.to_string())
            .or_insert_with(|| MemoryIndex::new(IndexSettings::default(), SchemaDocument::default()));
        let status = match idx.documents.get_mut(id) {
            Some(existing) => {
                for (k, v) in body {
                    existing.insert(k.clone(), v.clone());
                }
                STATUS_OK
            }
            None => {
                idx.documents.insert(id.to_string(), body.clone());
                STATUS_CREATED
            }
        };
        Ok(WriteResponse::new(status, 1))
    }

    async fn delete_document(&self, index: &str, id: &str) -> Result<WriteResponse> {
        Counters::bump(&self.counters.delete);
        self.delay().await;

        if let Some(forced) = self.forced_write() {
            return Ok(forced);
        }

        let removed = self
            .indices
            .write()
            .get_mut(index)
            .and_then(|i| i.documents.remove(id))
            .is_some();
        Ok(if removed {
            WriteResponse::new(STATUS_OK, 1)
        } else {
            WriteResponse::new(STATUS_NOT_FOUND, 0)
        })
    }

    async fn bulk(&self, index: &str, documents: &[BulkDocument<'_>]) -> Result<BulkResponse> {
        Counters::bump(&self.counters.bulk);
        self.delay().await;

        let failing = self.failing_ids.lock().clone();
        let mut response = BulkResponse::default();
        for doc in documents {
            if failing.contains(doc.id) {
                response.has_failures = true;
                response.items.push(BulkItem {
                    id: doc.id.to_string(),
                    status: 400,
                    error: Some("mapper_parsing_exception".to_string()),
                });
                continue;
            }
            let status = self.store_document(index, doc.id, doc.body.clone());
            response.items.push(BulkItem {
                id: doc.id.to_string(),
                status,
                error: None,
            });
        }
        Ok(response)
    }

    async fn count(&self, index: &str) -> Result<u64> {
        Counters::bump(&self.counters.count);
        self.delay().await;

        self.indices
            .read()
            .get(index)
            .map(|i| i.documents.len() as u64)
            .ok_or_else(|| {
                SyncError::rejected(
                    STATUS_NOT_FOUND,
                    format!("index_not_found_exception: no such index [{}]", index),
                )
            })
    }
}
