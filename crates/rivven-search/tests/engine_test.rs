//! Tests for rule resolution

mod common;

use common::{fixture, orders_shard, shop_config, shop_metadata};
use rivven_search::prelude::*;
use std::sync::Arc;

fn group(db: &str, target: &str, sync_tables: &str, rules: Vec<SyncRuleConfig>) -> SyncGroupConfig {
    SyncGroupConfig {
        db_id: db.into(),
        target_db_id: target.into(),
        sync_tables: sync_tables.into(),
        rules,
    }
}

fn engine(groups: Vec<SyncGroupConfig>, metadata: Arc<StaticMetadataProvider>) -> RuleEngine {
    let config = SyncConfig {
        groups,
        ..Default::default()
    };
    RuleEngine::new(config.compile().unwrap(), metadata)
}

// ==================== Resolution ====================

#[tokio::test]
async fn test_rule_with_index_override_and_directives() {
    let f = fixture();
    let meta = f.sync.resolve_table("shop", "orders_01").await.unwrap();

    assert_eq!(meta.source_table, "orders_01");
    assert_eq!(meta.index_name(), "orders_all");
    assert_eq!(meta.index_override.as_deref(), Some("orders_all"));
    assert_eq!(
        meta.target_names(),
        vec!["id", "customer_name", "amount", "created"]
    );

    let name = meta.column("NAME").unwrap();
    assert_eq!(name.target_type, FieldType::Keyword);
    let created = meta.column("CREATED").unwrap();
    assert_eq!(created.target_name, "created");
    assert_eq!(created.target_type, FieldType::Date);
    assert_eq!(meta.column("AMOUNT").unwrap().target_type, FieldType::Double);

    match &meta.rule_match {
        RuleMatch::Rule { group, rule, pattern } => {
            assert_eq!(*group, 0);
            assert_eq!(*rule, 0);
            assert_eq!(pattern, "orders_\\d+");
        }
        other => panic!("unexpected rule match {:?}", other),
    }
}

#[tokio::test]
async fn test_bare_name_directive() {
    let f = fixture();
    let meta = f.sync.resolve_table("shop", "customers").await.unwrap();

    assert_eq!(meta.index_name(), "customers");
    let email = meta.column("EMAIL").unwrap();
    assert_eq!(email.target_name, "mail");
    assert_eq!(email.target_type, FieldType::Text);
}

#[tokio::test]
async fn test_separator_only_directive_keeps_defaults() {
    let metadata = Arc::new(shop_metadata());
    let engine = engine(
        vec![group(
            "shop",
            "search",
            "orders",
            vec![SyncRuleConfig::new("orders")
                .with_column("NAME", ",")
                .with_column("ID", "custom,keyword")],
        )],
        metadata,
    );

    let meta = engine.resolve_table("shop", "orders").await.unwrap();
    let name = meta.column("NAME").unwrap();
    assert_eq!(name.target_name, "name");
    assert_eq!(name.target_type, FieldType::Text);

    let id = meta.column("ID").unwrap();
    assert_eq!(id.target_name, "custom");
    assert_eq!(id.target_type, FieldType::Keyword);
}

#[tokio::test]
async fn test_first_matching_group_wins() {
    let metadata = Arc::new(shop_metadata());
    let engine = engine(
        vec![
            group("shop", "primary", "orders_\\d+", vec![]),
            group(
                "shop",
                "secondary",
                "orders_.*",
                vec![SyncRuleConfig::new("orders_.*").with_index("other")],
            ),
        ],
        metadata,
    );

    let meta = engine.resolve_table("shop", "orders_01").await.unwrap();
    assert_eq!(meta.target_db_id, "primary");
    assert_eq!(meta.index_name(), "orders_01");
    assert_eq!(meta.rule_match, RuleMatch::NoRuleMatched { group: 0 });
}

#[tokio::test]
async fn test_group_db_id_is_case_insensitive() {
    let metadata = Arc::new(shop_metadata());
    let engine = engine(vec![group("SHOP", "search", "orders", vec![])], metadata);

    let meta = engine.resolve_table("shop", "orders").await.unwrap();
    assert_eq!(meta.target_db_id, "search");
}

#[tokio::test]
async fn test_table_outside_every_group() {
    let f = fixture();
    let err = f.sync.resolve_table("shop", "audit_log").await.unwrap_err();
    assert!(matches!(err, SyncError::TableNotConfigured { .. }));
    assert_eq!(err.category(), ErrorCategory::Configuration);

    let err = f.sync.resolve_table("crm", "orders").await.unwrap_err();
    assert!(matches!(err, SyncError::TableNotConfigured { .. }));
}

// ==================== Caching ====================

#[tokio::test]
async fn test_resolution_happens_once() {
    let f = fixture();

    let first = f.sync.resolve_table("shop", "orders_01").await.unwrap();
    let second = f.sync.resolve_table("shop", "orders_01").await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(f.metadata.describe_calls(), 1);
}

#[tokio::test]
async fn test_cached_meta_survives_source_changes() {
    let f = fixture();
    let before = f.sync.resolve_table("shop", "orders_01").await.unwrap();

    f.metadata
        .add_table(orders_shard("orders_01").with_column("EXTRA", SourceType::Integer));
    let after = f.sync.resolve_table("shop", "orders_01").await.unwrap();

    assert_eq!(after.columns.len(), before.columns.len());
    assert!(f.sync.engine().get("shop", "orders_01").is_some());
}

#[tokio::test]
async fn test_failed_resolution_is_not_cached() {
    let metadata = Arc::new(StaticMetadataProvider::new());
    let engine = engine(vec![group("shop", "search", "orders_\\d+", vec![])], metadata.clone());

    let err = engine.resolve_table("shop", "orders_01").await.unwrap_err();
    assert!(matches!(err, SyncError::Metadata { .. }));
    assert!(engine.get("shop", "orders_01").is_none());
    assert_eq!(engine.cached_tables(), 0);

    metadata.add_table(orders_shard("orders_01"));
    let meta = engine.resolve_table("shop", "orders_01").await.unwrap();
    assert_eq!(meta.columns.len(), 4);
    assert_eq!(engine.cached_tables(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_resolution_yields_one_instance() {
    let f = fixture();
    let sync = Arc::new(f.sync);

    let mut handles = Vec::new();
    for _ in 0..32 {
        let sync = sync.clone();
        handles.push(tokio::spawn(async move {
            sync.resolve_table("shop", "orders_02").await.unwrap()
        }));
    }

    let mut metas = Vec::new();
    for handle in handles {
        metas.push(handle.await.unwrap());
    }

    assert!(metas.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    assert_eq!(f.metadata.describe_calls(), 1);
}

// ==================== Configuration errors ====================

#[tokio::test]
async fn test_unsupported_type_fails_before_any_resolution() {
    let mut config = shop_config();
    config.groups[0].rules[1] = SyncRuleConfig::new("customers").with_column("EMAIL", "mail,varchar");

    let err = SearchSync::new(
        &config,
        Arc::new(shop_metadata()),
        TargetStores::new().with_store("search", Arc::new(MemoryStore::new())),
    )
    .unwrap_err();

    assert!(matches!(err, SyncError::UnsupportedFieldType { .. }));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_malformed_column_map_fails() {
    let mut config = shop_config();
    config.groups[0].rules[0] = SyncRuleConfig::new("orders_\\d+").with_map_json("{not json");

    let err = config.compile().unwrap_err();
    assert!(matches!(err, SyncError::InvalidColumnMapping { .. }));
    assert!(err.is_fatal());
}

// ==================== Startup pass ====================

#[tokio::test]
async fn test_initialize_resolves_covered_tables() {
    let f = fixture();

    let resolved = f.sync.initialize().await.unwrap();
    // orders, orders_01, orders_02, customers; audit_log is not covered
    assert_eq!(resolved, 4);
    assert_eq!(f.sync.engine().cached_tables(), 4);
    assert!(f.sync.engine().get("shop", "audit_log").is_none());

    assert_eq!(f.sync.initialize().await.unwrap(), 0);
    assert_eq!(f.metadata.describe_calls(), 4);
}
