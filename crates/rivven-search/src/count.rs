//! Cached document counts
//!
//! Entries are keyed by the name of the counted index and are never
//! refreshed. Shard tables feeding one index all observe the count taken on
//! first use, even after a sibling has written to it. The source and target
//! database ids are not part of the key, so same-named tables of two
//! databases share one entry.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::Result;
use crate::store::TargetStores;
use crate::types::TableMeta;

/// First-observed document count per index
#[derive(Debug)]
pub struct CountCache {
    stores: TargetStores,
    counts: DashMap<String, Arc<OnceCell<u64>>>,
}

impl CountCache {
    /// Create a cache over the target stores
    pub fn new(stores: TargetStores) -> Self {
        Self {
            stores,
            counts: DashMap::new(),
        }
    }

    /// Documents in the table's index when first asked.
    ///
    /// An absent index counts as 0 and that 0 is cached too.
    pub async fn count_existing(&self, table: &TableMeta) -> Result<u64> {
        let cell = self
            .counts
            .entry(table.index_name().to_string())
            .or_default()
            .clone();
        if let Some(count) = cell.get() {
            return Ok(*count);
        }

        let count = cell.get_or_try_init(|| self.fetch(table)).await?;
        Ok(*count)
    }

    /// Cached count of an index, without querying
    pub fn cached(&self, index: &str) -> Option<u64> {
        self.counts
            .get(index)
            .and_then(|cell| cell.get().copied())
    }

    async fn fetch(&self, table: &TableMeta) -> Result<u64> {
        let store = self.stores.get(&table.target_db_id)?;
        let index = table.index_name();

        let count = if store.index_exists(index).await? {
            store.count(index).await?
        } else {
            0
        };

        debug!(table = %table.source_table, index, count, "Cached document count");
        Ok(count)
    }
}
