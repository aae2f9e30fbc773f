//! Tests for cached document counts

mod common;

use common::{fixture, row};
use rivven_search::prelude::*;
use serde_json::json;

#[tokio::test]
async fn test_absent_index_counts_zero_without_count_query() {
    let f = fixture();
    let meta = f.sync.resolve_table("shop", "customers").await.unwrap();

    assert_eq!(f.sync.count_existing(&meta).await.unwrap(), 0);
    assert_eq!(f.store.stats().count_calls, 0);

    // the zero is cached as well
    f.store.put_document("customers", "1", row(json!({"id": 1})));
    assert_eq!(f.sync.count_existing(&meta).await.unwrap(), 0);
    assert_eq!(f.store.stats().exists_calls, 1);
}

#[tokio::test]
async fn test_count_is_first_observed_value() {
    let f = fixture();
    f.store.put_document("customers", "1", row(json!({"id": 1})));
    f.store.put_document("customers", "2", row(json!({"id": 2})));
    let meta = f.sync.resolve_table("shop", "customers").await.unwrap();

    assert_eq!(f.sync.count_existing(&meta).await.unwrap(), 2);

    f.store.put_document("customers", "3", row(json!({"id": 3})));
    assert_eq!(f.sync.count_existing(&meta).await.unwrap(), 2);
    assert_eq!(f.store.stats().count_calls, 1);
}

#[tokio::test]
async fn test_count_queries_the_target_index() {
    let f = fixture();
    f.store.put_document("orders_all", "1", row(json!({"id": 1})));
    let meta = f.sync.resolve_table("shop", "orders_01").await.unwrap();

    assert_eq!(f.sync.count_existing(&meta).await.unwrap(), 1);
}

#[tokio::test]
async fn test_fan_in_tables_share_first_count() {
    let f = fixture();
    let first = f.sync.resolve_table("shop", "orders_01").await.unwrap();
    let second = f.sync.resolve_table("shop", "orders_02").await.unwrap();

    assert_eq!(f.sync.count_existing(&first).await.unwrap(), 0);

    let applied = f
        .sync
        .apply(&ChangeRequest::insert(first, "1", row(json!({"id": 1}))))
        .await
        .unwrap();
    assert_eq!(applied, 1);
    assert_eq!(f.store.document_count("orders_all"), 1);

    // the sibling shard sees the count taken before the write
    assert_eq!(f.sync.count_existing(&second).await.unwrap(), 0);
    assert_eq!(f.store.stats().count_calls, 0);
}

#[tokio::test]
async fn test_fan_in_tables_share_first_nonzero_count() {
    let f = fixture();
    f.store.put_document("orders_all", "1", row(json!({"id": 1})));
    let first = f.sync.resolve_table("shop", "orders_01").await.unwrap();
    let second = f.sync.resolve_table("shop", "orders_02").await.unwrap();

    assert_eq!(f.sync.count_existing(&first).await.unwrap(), 1);
    f.sync
        .apply(&ChangeRequest::insert(first, "2", row(json!({"id": 2}))))
        .await
        .unwrap();

    assert_eq!(f.sync.count_existing(&second).await.unwrap(), 1);
    assert_eq!(f.store.stats().count_calls, 1);
}
