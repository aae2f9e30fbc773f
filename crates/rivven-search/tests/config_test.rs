//! Tests for configuration loading

mod common;

use common::SHOP_YAML;
use rivven_search::prelude::*;
use std::io::Write;

#[test]
fn test_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(SHOP_YAML.as_bytes()).unwrap();

    let config = SyncConfig::from_file(file.path()).unwrap();
    assert_eq!(config.datasources, vec!["shop".to_string()]);
    assert!(matches!(config.targets["search"], TargetConfig::Memory));

    let rules = config.compile().unwrap();
    assert_eq!(rules.groups().len(), 1);
    assert!(rules.match_table("shop", "orders_17").is_some());
    assert!(rules.match_table("shop", "audit_log").is_none());
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = SyncConfig::from_file(dir.path().join("absent.yaml")).unwrap_err();
    assert!(matches!(err, SyncError::Config { .. }));
}

#[test]
fn test_json_config() {
    let json = r#"{
        "groups": [
            {
                "db_id": "shop",
                "target_db_id": "search",
                "sync_tables": "orders",
                "rules": [
                    { "table": "orders", "map": { "NAME": "title,keyword" } }
                ]
            }
        ],
        "index": { "number_of_shards": 3, "number_of_replicas": 0 }
    }"#;

    let config = SyncConfig::from_yaml_str(json).unwrap();
    assert_eq!(config.index.number_of_shards, 3);
    assert_eq!(config.index.number_of_replicas, 0);
    assert_eq!(config.mapping, MappingOptions::default());

    let rules = config.compile().unwrap();
    let (_, group) = rules.match_table("shop", "orders").unwrap();
    let (_, rule) = group.find_rule("orders").unwrap();
    assert_eq!(
        rule.directive("NAME"),
        Some(&ColumnDirective {
            target_name: Some("title".into()),
            target_type: Some(FieldType::Keyword),
        })
    );
}

#[test]
fn test_elasticsearch_target_with_env_password() {
    std::env::set_var("RIVVEN_SEARCH_IT_PASSWORD", "s3cret");
    let yaml = r#"
targets:
  search:
    type: elasticsearch
    uri: ${RIVVEN_SEARCH_IT_URI:-http://localhost:9200}
    username: elastic
    password: ${RIVVEN_SEARCH_IT_PASSWORD}
    timeout_secs: 5
"#;

    let config = SyncConfig::from_yaml_str(yaml).unwrap();
    match &config.targets["search"] {
        TargetConfig::Elasticsearch(es) => {
            assert_eq!(es.uri, "http://localhost:9200");
            assert_eq!(es.username.as_deref(), Some("elastic"));
            assert_eq!(es.password.as_ref().unwrap().expose_secret(), "s3cret");
            assert_eq!(es.timeout_secs, 5);
            assert!(!format!("{:?}", es).contains("s3cret"));
        }
        other => panic!("unexpected target {:?}", other),
    }
}

#[test]
fn test_invalid_timeout_rejected() {
    let yaml = r#"
targets:
  search:
    type: elasticsearch
    uri: http://localhost:9200
    timeout_secs: 0
"#;
    let err = SyncConfig::from_yaml_str(yaml).unwrap_err();
    assert!(matches!(err, SyncError::Config { .. }));
}

#[test]
fn test_unknown_target_type_rejected() {
    let yaml = r#"
targets:
  search:
    type: solr
"#;
    let err = SyncConfig::from_yaml_str(yaml).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Configuration);
}

#[test]
fn test_invalid_table_pattern_fails_compile() {
    let yaml = r#"
groups:
  - db_id: shop
    target_db_id: search
    sync_tables: "orders_[0-9"
"#;
    let config = SyncConfig::from_yaml_str(yaml).unwrap();
    let err = config.compile().unwrap_err();
    assert!(matches!(err, SyncError::InvalidPattern { .. }));
}

#[test]
fn test_search_sync_requires_registered_targets() {
    let config = SyncConfig::from_yaml_str(common::SHOP_YAML).unwrap();
    let err = SearchSync::new(
        &config,
        std::sync::Arc::new(StaticMetadataProvider::new()),
        TargetStores::new(),
    )
    .unwrap_err();
    assert!(matches!(err, SyncError::UnknownTarget { .. }));
}
