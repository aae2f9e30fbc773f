//! Shared fixtures for rivven-search integration tests

#![allow(dead_code)]

use rivven_search::prelude::*;
use serde_json::{Map, Value};
use std::sync::Arc;

pub const SHOP_YAML: &str = r#"
datasources: [shop]
groups:
  - db_id: shop
    target_db_id: search
    sync_tables: "orders_\\d+,customers,orders"
    rules:
      - table: "orders_\\d+"
        index: orders_all
        map: '{"NAME": "customer_name,keyword", "CREATED": ",date"}'
      - table: customers
        map:
          EMAIL: mail
targets:
  search:
    type: memory
"#;

/// Source tables of the `shop` database
pub fn shop_metadata() -> StaticMetadataProvider {
    StaticMetadataProvider::new()
        .with_table(orders_shard("orders_01"))
        .with_table(orders_shard("orders_02"))
        .with_table(
            SourceTable::new("shop", "orders")
                .with_column("ID", SourceType::Integer)
                .with_column("NAME", SourceType::Varchar)
                .with_column("CREATED", SourceType::Date),
        )
        .with_table(
            SourceTable::new("shop", "customers")
                .with_column("ID", SourceType::BigInt)
                .with_column("EMAIL", SourceType::Varchar),
        )
        .with_table(SourceTable::new("shop", "audit_log").with_column("ID", SourceType::BigInt))
}

pub fn orders_shard(name: &str) -> SourceTable {
    SourceTable::new("shop", name)
        .with_column("ID", SourceType::BigInt)
        .with_column("NAME", SourceType::Varchar)
        .with_column("AMOUNT", SourceType::Decimal)
        .with_column("CREATED", SourceType::Timestamp)
}

pub fn shop_config() -> SyncConfig {
    SyncConfig::from_yaml_str(SHOP_YAML).unwrap()
}

pub struct Fixture {
    pub sync: SearchSync,
    pub store: Arc<MemoryStore>,
    pub metadata: Arc<StaticMetadataProvider>,
}

pub fn fixture() -> Fixture {
    fixture_with_store(MemoryStore::new())
}

pub fn fixture_with_store(store: MemoryStore) -> Fixture {
    let store = Arc::new(store);
    let metadata = Arc::new(shop_metadata());
    let stores = TargetStores::new().with_store("search", store.clone());
    let sync = SearchSync::new(&shop_config(), metadata.clone(), stores).unwrap();
    Fixture {
        sync,
        store,
        metadata,
    }
}

/// Build a document body from a JSON object literal
pub fn row(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}
