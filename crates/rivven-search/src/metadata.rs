//! Source metadata collaborator
//!
//! The rule engine never introspects the source database itself. It asks a
//! [`MetadataProvider`] for table names and raw column descriptions.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Result, SyncError};
use crate::types::SourceTable;

/// Source schema introspection
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// List table names of a source database
    async fn list_tables(&self, db_id: &str) -> Result<Vec<String>>;

    /// Describe a table (native column names and types, canonical order)
    async fn describe_table(&self, db_id: &str, table: &str) -> Result<Option<SourceTable>>;

    /// Describe a table, failing if it does not exist
    async fn require_table(&self, db_id: &str, table: &str) -> Result<SourceTable> {
        self.describe_table(db_id, table).await?.ok_or_else(|| {
            SyncError::metadata(format!("table {}.{} does not exist in source", db_id, table))
        })
    }
}

/// In-memory metadata, registered up front
///
/// Database ids are matched case-insensitively, table names exactly.
#[derive(Debug, Default)]
pub struct StaticMetadataProvider {
    tables: RwLock<BTreeMap<(String, String), SourceTable>>,
    describe_calls: AtomicU64,
}

impl StaticMetadataProvider {
    /// Create an empty provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table (builder style)
    pub fn with_table(self, table: SourceTable) -> Self {
        self.add_table(table);
        self
    }

    /// Register or replace a table
    pub fn add_table(&self, table: SourceTable) {
        let key = (table.db_id.to_lowercase(), table.name.clone());
        self.tables.write().insert(key, table);
    }

    /// Remove a table
    pub fn remove_table(&self, db_id: &str, table: &str) -> Option<SourceTable> {
        self.tables
            .write()
            .remove(&(db_id.to_lowercase(), table.to_string()))
    }

    /// Number of `describe_table` calls served
    pub fn describe_calls(&self) -> u64 {
        self.describe_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl MetadataProvider for StaticMetadataProvider {
    async fn list_tables(&self, db_id: &str) -> Result<Vec<String>> {
        let db_id = db_id.to_lowercase();
        Ok(self
            .tables
            .read()
            .keys()
            .filter(|(db, _)| *db == db_id)
            .map(|(_, table)| table.clone())
            .collect())
    }

    async fn describe_table(&self, db_id: &str, table: &str) -> Result<Option<SourceTable>> {
        self.describe_calls.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .tables
            .read()
            .get(&(db_id.to_lowercase(), table.to_string()))
            .cloned())
    }
}
