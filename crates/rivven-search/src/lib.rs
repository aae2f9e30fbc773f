//! # rivven-search
//!
//! Keeps search indices in sync with relational tables for the Rivven event
//! streaming platform.
//!
//! Row changes captured from a source database are resolved against
//! configured sync rules, the target index is provisioned on first use, and
//! inserts, upserts and deletes are applied as documents.
//!
//! ## Features
//!
//! - **Rule Resolution**: regex table groups, per-table index overrides and
//!   column rename/retype directives, resolved once per table
//! - **Index Provisioning**: schema generation (keyword + analyzed sub-field,
//!   multi-format dates) and at-most-once index creation
//! - **Change Application**: single-document writes and bulk inserts with
//!   success counts instead of exceptions for declined writes
//! - **Document Counts**: first-observed count per table, cached
//! - **Pluggable Stores**: Elasticsearch over REST, in-memory for tests
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rivven_search::prelude::*;
//! use std::sync::Arc;
//!
//! let metadata = Arc::new(
//!     StaticMetadataProvider::new().with_table(
//!         SourceTable::new("shop", "orders_01")
//!             .with_column("ID", SourceType::BigInt)
//!             .with_column("NAME", SourceType::Varchar),
//!     ),
//! );
//!
//! let config = SyncConfig::from_file("sync.yaml")?;
//! let sync = SearchSync::from_config(&config, metadata)?;
//!
//! let orders = sync.resolve_table("shop", "orders_01").await?;
//! sync.apply(&ChangeRequest::delete(orders, "7")).await?;
//! ```
//!
//! ## Feature Flags
//!
//! - `elasticsearch` (default) - Elasticsearch/OpenSearch REST store via reqwest

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod count;
pub mod engine;
pub mod error;
pub mod executor;
pub mod mapping;
pub mod metadata;
pub mod provision;
pub mod rules;
pub mod store;
pub mod sync;
pub mod type_map;
pub mod types;

/// Prelude module for convenient imports
pub mod prelude {
    // Error types
    pub use crate::error::{ErrorCategory, Result, SyncError};

    // Data model
    pub use crate::types::{
        ChangeRequest, ColumnMeta, DmlKind, FieldType, RuleMatch, SourceColumn, SourceTable,
        SourceType, TableKey, TableMeta,
    };

    // Configuration
    pub use crate::config::{
        ColumnMapSpec, ElasticsearchConfig, IndexSettings, MappingOptions, SensitiveString,
        SyncConfig, SyncGroupConfig, SyncRuleConfig, TargetConfig,
    };
    pub use crate::rules::{ColumnDirective, CompiledRules};

    // Resolution and schema
    pub use crate::engine::RuleEngine;
    pub use crate::mapping::{generate_schema, FieldMapping, SchemaDocument};
    pub use crate::metadata::{MetadataProvider, StaticMetadataProvider};
    pub use crate::type_map::infer_target_type;

    // Stores
    #[cfg(feature = "elasticsearch")]
    pub use crate::store::ElasticsearchStore;
    pub use crate::store::{
        BulkResponse, CreateIndexResponse, MemoryStore, SearchStore, StorageKind, Store,
        TargetStores, WriteResponse,
    };

    // Sync
    pub use crate::count::CountCache;
    pub use crate::executor::{AtomicSyncStats, SyncExecutor, SyncStats};
    pub use crate::provision::{ProvisionKey, StorageProvisioner};
    pub use crate::sync::SearchSync;
}

// Re-export commonly used items at crate root
pub use error::{Result, SyncError};
pub use sync::SearchSync;

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_prelude_imports() {
        let _settings = IndexSettings::default();
        let _options = MappingOptions::default();
        let _store = MemoryStore::new();
        let _kind = DmlKind::Insert;
    }

    #[test]
    fn test_error_types() {
        let err = SyncError::transport("connection refused");
        assert!(err.is_retriable());
        assert_eq!(err.category(), ErrorCategory::Transport);
    }

    #[test]
    fn test_default_settings() {
        let settings = IndexSettings::default();
        assert_eq!(settings.number_of_shards, 8);
        assert_eq!(settings.number_of_replicas, 2);

        let options = MappingOptions::default();
        assert_eq!(options.text_sub_field, "ser");
        assert_eq!(options.index_analyzer, "ik_max_word");
        assert_eq!(options.search_analyzer, "ik_smart");
        assert_eq!(options.date_formats.len(), 4);
    }

    #[test]
    fn test_type_inference() {
        assert_eq!(infer_target_type(&SourceType::BigInt), FieldType::Long);
        assert_eq!(
            infer_target_type(&SourceType::from_type_name("varchar(64)")),
            FieldType::Text
        );
    }

    #[test]
    fn test_storage_kind_tags() {
        assert_eq!(StorageKind::Elasticsearch.as_str(), "es");
        assert_eq!(StorageKind::Memory.to_string(), "memory");
    }
}
