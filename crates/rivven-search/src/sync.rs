//! Sync facade
//!
//! Owns one rule engine, provisioner, executor and count cache for the
//! lifetime of the process.

use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::info;

use crate::config::SyncConfig;
use crate::count::CountCache;
use crate::engine::RuleEngine;
use crate::error::{Result, SyncError};
use crate::executor::{SyncExecutor, SyncStats};
use crate::metadata::MetadataProvider;
use crate::provision::StorageProvisioner;
use crate::store::TargetStores;
use crate::types::{ChangeRequest, DmlKind, TableMeta};

/// Entry point for syncing row changes into search indices
///
/// ```rust,no_run
/// use rivven_search::prelude::*;
/// use std::sync::Arc;
///
/// # async fn example(metadata: Arc<dyn MetadataProvider>) -> rivven_search::Result<()> {
/// let config = SyncConfig::from_file("sync.yaml")?;
/// let sync = SearchSync::from_config(&config, metadata)?;
/// sync.initialize().await?;
///
/// let orders = sync.resolve_table("shop", "orders_01").await?;
/// let mut values = serde_json::Map::new();
/// values.insert("id".into(), 7.into());
/// let applied = sync.apply(&ChangeRequest::insert(orders, "7", values)).await?;
/// assert_eq!(applied, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SearchSync {
    datasources: Vec<String>,
    engine: RuleEngine,
    provisioner: Arc<StorageProvisioner>,
    executor: SyncExecutor,
    counts: CountCache,
}

impl SearchSync {
    /// Build from configuration, creating the configured target stores
    pub fn from_config(config: &SyncConfig, metadata: Arc<dyn MetadataProvider>) -> Result<Self> {
        let stores = TargetStores::from_config(&config.targets)?;
        Self::new(config, metadata, stores)
    }

    /// Build from configuration with explicitly provided target stores
    pub fn new(
        config: &SyncConfig,
        metadata: Arc<dyn MetadataProvider>,
        stores: TargetStores,
    ) -> Result<Self> {
        let rules = config.compile()?;
        for group in rules.groups() {
            if !stores.contains(group.target_db_id()) {
                return Err(SyncError::UnknownTarget {
                    target_db_id: group.target_db_id().to_string(),
                });
            }
        }

        let provisioner = Arc::new(StorageProvisioner::new(
            stores.clone(),
            config.index,
            config.mapping.clone(),
        ));

        info!(
            groups = rules.groups().len(),
            targets = stores.len(),
            "Search sync configured"
        );

        Ok(Self {
            datasources: config.datasources.clone(),
            engine: RuleEngine::new(rules, metadata),
            executor: SyncExecutor::new(provisioner.clone()),
            counts: CountCache::new(stores),
            provisioner,
        })
    }

    /// Resolve every covered table of the configured datasources
    pub async fn initialize(&self) -> Result<usize> {
        self.engine.initialize(&self.datasources).await
    }

    /// Resolve a table (cached after the first call)
    pub async fn resolve_table(&self, db_id: &str, table: &str) -> Result<Arc<TableMeta>> {
        self.engine.resolve_table(db_id, table).await
    }

    /// Ensure the table's target index exists
    pub async fn ensure(&self, table: &TableMeta) -> Result<()> {
        self.provisioner.ensure(table).await
    }

    /// Apply one change; returns the success count (0 or 1)
    pub async fn apply(&self, request: &ChangeRequest) -> Result<u64> {
        self.executor.apply(request).await
    }

    /// Apply a batch of inserts; returns the batch size or 0
    pub async fn apply_batch(&self, requests: &[ChangeRequest]) -> Result<u64> {
        self.executor.apply_batch(requests).await
    }

    /// Resolve, classify and apply a raw change event.
    ///
    /// An unrecognized `kind` is an invariant violation.
    pub async fn apply_change(
        &self,
        db_id: &str,
        table: &str,
        kind: &str,
        pk: impl Into<String>,
        values: Map<String, Value>,
    ) -> Result<u64> {
        let kind: DmlKind = kind.parse()?;
        let table = self.resolve_table(db_id, table).await?;
        let request = ChangeRequest::new(kind, table, pk, values);
        self.apply(&request).await
    }

    /// Document count of the table's index when first asked
    pub async fn count_existing(&self, table: &TableMeta) -> Result<u64> {
        self.counts.count_existing(table).await
    }

    /// Executor statistics
    pub fn stats(&self) -> SyncStats {
        self.executor.stats()
    }

    /// Rule engine
    pub fn engine(&self) -> &RuleEngine {
        &self.engine
    }

    /// Storage provisioner
    pub fn provisioner(&self) -> &StorageProvisioner {
        &self.provisioner
    }
}
