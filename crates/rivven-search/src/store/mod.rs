//! Target search stores
//!
//! - **Memory**: in-process store for development and testing
//! - **Elasticsearch**: REST client (feature `elasticsearch`, enabled by default)
//!
//! The executor and provisioner only see the [`SearchStore`] trait, looked up
//! per target database id through [`TargetStores`].

mod memory;

#[cfg(feature = "elasticsearch")]
mod elasticsearch;

pub use memory::{MemoryStore, MemoryStoreStats};

#[cfg(feature = "elasticsearch")]
pub use elasticsearch::ElasticsearchStore;

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::config::{IndexSettings, TargetConfig};
use crate::error::{Result, SyncError};
use crate::mapping::SchemaDocument;

/// HTTP-style status: OK
pub const STATUS_OK: u16 = 200;
/// HTTP-style status: document created
pub const STATUS_CREATED: u16 = 201;
/// HTTP-style status: document or index not found
pub const STATUS_NOT_FOUND: u16 = 404;

/// Kind of target store, part of the provisioning key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKind {
    /// Elasticsearch / OpenSearch
    Elasticsearch,
    /// In-process store
    Memory,
}

impl StorageKind {
    /// Short tag
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Elasticsearch => "es",
            Self::Memory => "memory",
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of an index creation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateIndexResponse {
    /// Whether the cluster acknowledged the creation
    pub acknowledged: bool,
}

/// Result of a single-document write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteResponse {
    /// Response status
    pub status: u16,
    /// Number of shards that applied the write
    pub successful_shards: u32,
}

impl WriteResponse {
    /// Create a response
    pub const fn new(status: u16, successful_shards: u32) -> Self {
        Self {
            status,
            successful_shards,
        }
    }

    /// Status is OK (200 or 201) and at least one shard applied the write
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self.status, STATUS_OK | STATUS_CREATED) && self.successful_shards > 0
    }
}

/// Outcome of one bulk item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkItem {
    /// Document id
    pub id: String,
    /// Item status
    pub status: u16,
    /// Failure reason, if the item failed
    pub error: Option<String>,
}

impl BulkItem {
    /// Whether the item failed
    #[inline]
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// Result of a bulk request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkResponse {
    /// Per-item outcomes, in request order
    pub items: Vec<BulkItem>,
    /// Whether any item failed
    pub has_failures: bool,
}

impl BulkResponse {
    /// Number of failed items
    pub fn failed_count(&self) -> usize {
        self.items.iter().filter(|i| i.is_failure()).count()
    }
}

/// One document of a bulk index request
#[derive(Debug, Clone, Copy)]
pub struct BulkDocument<'a> {
    /// Document id
    pub id: &'a str,
    /// Document body
    pub body: &'a Map<String, Value>,
}

/// Search store operations used by the sync core
#[async_trait]
pub trait SearchStore: Send + Sync {
    /// Store kind
    fn kind(&self) -> StorageKind;

    /// Check whether an index exists
    async fn index_exists(&self, index: &str) -> Result<bool>;

    /// Create an index with settings and field mappings
    async fn create_index(
        &self,
        index: &str,
        settings: &IndexSettings,
        schema: &SchemaDocument,
    ) -> Result<CreateIndexResponse>;

    /// Write a document at an id, replacing any existing one
    async fn index_document(
        &self,
        index: &str,
        id: &str,
        body: &Map<String, Value>,
    ) -> Result<WriteResponse>;

    /// Merge fields into a document, creating it if absent
    async fn update_document(
        &self,
        index: &str,
        id: &str,
        body: &Map<String, Value>,
    ) -> Result<WriteResponse>;

    /// Remove a document
    async fn delete_document(&self, index: &str, id: &str) -> Result<WriteResponse>;

    /// Index many documents in one request
    async fn bulk(&self, index: &str, documents: &[BulkDocument<'_>]) -> Result<BulkResponse>;

    /// Count all documents of an index
    async fn count(&self, index: &str) -> Result<u64>;
}

/// Shared store handle
pub type Store = Arc<dyn SearchStore>;

/// Create a store from configuration
pub fn create_store(config: &TargetConfig) -> Result<Store> {
    match config {
        TargetConfig::Memory => Ok(Arc::new(MemoryStore::new())),
        #[cfg(feature = "elasticsearch")]
        TargetConfig::Elasticsearch(es) => Ok(Arc::new(ElasticsearchStore::new(es)?)),
        #[cfg(not(feature = "elasticsearch"))]
        TargetConfig::Elasticsearch(_) => Err(SyncError::config(
            "Elasticsearch targets require the 'elasticsearch' feature. Enable it in Cargo.toml.",
        )),
    }
}

/// Target stores keyed by target database id
#[derive(Clone, Default)]
pub struct TargetStores {
    stores: HashMap<String, Store>,
}

impl TargetStores {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every configured target
    pub fn from_config(targets: &HashMap<String, TargetConfig>) -> Result<Self> {
        let mut stores = Self::new();
        for (id, target) in targets {
            stores.insert(id.clone(), create_store(target)?);
        }
        Ok(stores)
    }

    /// Register a store (builder style)
    pub fn with_store(mut self, target_db_id: impl Into<String>, store: Store) -> Self {
        self.insert(target_db_id, store);
        self
    }

    /// Register or replace a store
    pub fn insert(&mut self, target_db_id: impl Into<String>, store: Store) {
        self.stores.insert(target_db_id.into(), store);
    }

    /// Store of a target database
    pub fn get(&self, target_db_id: &str) -> Result<&Store> {
        self.stores
            .get(target_db_id)
            .ok_or_else(|| SyncError::UnknownTarget {
                target_db_id: target_db_id.to_string(),
            })
    }

    /// Whether a target is registered
    pub fn contains(&self, target_db_id: &str) -> bool {
        self.stores.contains_key(target_db_id)
    }

    /// Number of registered targets
    pub fn len(&self) -> usize {
        self.stores.len()
    }

    /// Whether no targets are registered
    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}

impl fmt::Debug for TargetStores {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut targets: Vec<_> = self
            .stores
            .iter()
            .map(|(id, s)| format!("{}:{}", id, s.kind()))
            .collect();
        targets.sort();
        f.debug_struct("TargetStores")
            .field("targets", &targets)
            .finish()
    }
}
