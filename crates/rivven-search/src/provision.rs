//! Index provisioning
//!
//! `ensure` makes sure a table's target index exists before any write. Each
//! [`ProvisionKey`] is provisioned at most once per process: after the first
//! successful `ensure` the store is never consulted again for that key, even
//! if the index is later deleted externally.

use dashmap::DashMap;
use metrics::counter;
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::config::{IndexSettings, MappingOptions};
use crate::error::{Result, SyncError};
use crate::mapping::generate_schema;
use crate::store::{StorageKind, Store, TargetStores};
use crate::types::TableMeta;

/// Identity of a provisioning entry: (store kind, target db, source table)
///
/// Several keys may share one physical index when tables fan in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProvisionKey {
    /// Store kind
    pub kind: StorageKind,
    /// Target database id
    pub target_db_id: String,
    /// Source table name
    pub source_table: String,
}

impl ProvisionKey {
    /// Create a key
    pub fn new(
        kind: StorageKind,
        target_db_id: impl Into<String>,
        source_table: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            target_db_id: target_db_id.into(),
            source_table: source_table.into(),
        }
    }
}

impl fmt::Display for ProvisionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}${}${}", self.kind, self.target_db_id, self.source_table)
    }
}

/// Ensures target indices exist
pub struct StorageProvisioner {
    stores: TargetStores,
    settings: IndexSettings,
    mapping: MappingOptions,
    provisioned: DashMap<ProvisionKey, Arc<OnceCell<()>>>,
}

impl StorageProvisioner {
    /// Create a provisioner
    pub fn new(stores: TargetStores, settings: IndexSettings, mapping: MappingOptions) -> Self {
        Self {
            stores,
            settings,
            mapping,
            provisioned: DashMap::new(),
        }
    }

    /// Target stores
    pub fn stores(&self) -> &TargetStores {
        &self.stores
    }

    /// Provisioning key of a table
    pub fn key_for(&self, table: &TableMeta) -> Result<ProvisionKey> {
        let store = self.stores.get(&table.target_db_id)?;
        Ok(ProvisionKey::new(
            store.kind(),
            &table.target_db_id,
            &table.source_table,
        ))
    }

    /// Ensure the table's target index exists.
    ///
    /// Concurrent callers for the same key share one check/create; a failure
    /// leaves the key unprovisioned so a later call retries.
    pub async fn ensure(&self, table: &TableMeta) -> Result<()> {
        let store = self.stores.get(&table.target_db_id)?;
        let key = ProvisionKey::new(store.kind(), &table.target_db_id, &table.source_table);

        let cell = self.provisioned.entry(key).or_default().clone();
        if cell.initialized() {
            return Ok(());
        }

        cell.get_or_try_init(|| self.provision(store, table)).await?;
        Ok(())
    }

    /// Whether a key has been provisioned
    pub fn is_provisioned(&self, key: &ProvisionKey) -> bool {
        self.provisioned
            .get(key)
            .map(|cell| cell.initialized())
            .unwrap_or(false)
    }

    /// Number of provisioned keys
    pub fn provisioned_count(&self) -> usize {
        self.provisioned
            .iter()
            .filter(|e| e.value().initialized())
            .count()
    }

    async fn provision(&self, store: &Store, table: &TableMeta) -> Result<()> {
        let index = table.index_name();

        if store.index_exists(index).await? {
            debug!(
                index,
                table = %table.source_table,
                target = %table.target_db_id,
                "Index already exists"
            );
            return Ok(());
        }

        let schema = generate_schema(table, &self.mapping);
        info!(
            index,
            table = %table.source_table,
            target = %table.target_db_id,
            fields = schema.len(),
            shards = self.settings.number_of_shards,
            replicas = self.settings.number_of_replicas,
            "Creating index"
        );

        let response = match store.create_index(index, &self.settings, &schema).await {
            Ok(response) => response,
            // another table of the same fan-in may have created it first
            Err(e @ SyncError::Rejected { status: 400, .. }) => {
                if !store.index_exists(index).await? {
                    return Err(e);
                }
                debug!(index, "Index created concurrently");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if !response.acknowledged {
            return Err(SyncError::IndexNotAcknowledged {
                index: index.to_string(),
            });
        }

        counter!("search.indices.created").increment(1);
        Ok(())
    }
}

impl fmt::Debug for StorageProvisioner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageProvisioner")
            .field("stores", &self.stores)
            .field("settings", &self.settings)
            .field("provisioned", &self.provisioned_count())
            .finish()
    }
}
