//! End-to-end batch behavior against the in-memory backend.
//!
//! Record order across chunks depends on scheduling, so record sets are
//! compared after sorting unless the client resequences by chunk index.

use std::sync::Arc;
use std::time::Duration;

use dynabatch_core::{
    key, AttributeValue, BatchClient, BatchConfig, BatchError, ChunkErrorKind, Item, Operation,
    OutcomeOrder, StoreError,
};
use dynabatch_memory::InMemoryStore;
use serde::{Deserialize, Serialize};

const TABLE: &str = "ServerlessAWSCDKLocal";

// ─── Helpers ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
struct User {
    pk: String,
    sk: String,
    name: String,
    email: String,
}

fn users(n: usize) -> Vec<User> {
    (0..n)
        .map(|i| User {
            pk: format!("USER#{i:04}"),
            sk: "PROFILE".into(),
            name: format!("user {i}"),
            email: format!("user{i}@example.com"),
        })
        .collect()
}

fn user_key(i: usize) -> Item {
    key(format!("USER#{i:04}"), "PROFILE")
}

fn pk_of(item: &Item) -> Option<&str> {
    item.get("pk").and_then(AttributeValue::as_key_fragment)
}

fn setup() -> (Arc<InMemoryStore>, BatchClient) {
    let store = Arc::new(InMemoryStore::new());
    let client = BatchClient::new(store.clone(), TABLE);
    (store, client)
}

fn sorted(mut items: Vec<Item>) -> Vec<Item> {
    items.sort();
    items
}

// ─── Write path ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn thirty_items_second_chunk_fails() {
    let (store, client) = setup();
    store.set_fault(|op, items| {
        (op == Operation::Write && items.len() == 5)
            .then(|| StoreError::Throttled { message: "throughput exceeded".into() })
    });

    let outcome = client.write_serialized(users(30)).await.unwrap();

    assert_eq!(outcome.chunks, 2);
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors.failed_chunks(), vec![1]);
    assert_eq!(outcome.errors.failed_items(), 5);
    assert_eq!(outcome.written, 25);

    assert_eq!(store.len(TABLE), 25);
    for i in 0..25 {
        assert!(store.contains(TABLE, &user_key(i)), "item {i} missing");
    }
    for i in 25..30 {
        assert!(!store.contains(TABLE, &user_key(i)), "item {i} unexpectedly written");
    }
}

#[tokio::test]
async fn all_writes_succeed() {
    let (store, client) = setup();
    let outcome = client.write_serialized(users(101)).await.unwrap();

    assert!(outcome.is_success());
    assert_eq!(outcome.chunks, 5);
    assert_eq!(outcome.written, 101);
    assert_eq!(store.len(TABLE), 101);
    assert_eq!(store.call_count(), 5);
}

#[tokio::test]
async fn marshal_error_is_chunk_local() {
    let (store, client) = setup();
    let mut values: Vec<serde_json::Value> = users(50)
        .into_iter()
        .map(|u| serde_json::to_value(u).unwrap())
        .collect();
    values[3] = serde_json::json!(["not", "a", "map"]);

    let outcome = client.write_serialized(values).await.unwrap();

    assert_eq!(outcome.errors.len(), 1);
    let err = outcome.errors.iter().next().unwrap();
    assert_eq!(err.index, 0);
    assert!(matches!(err.kind, ChunkErrorKind::Marshal(_)));
    // the failed chunk never reached the store
    assert_eq!(store.call_count(), 1);
    assert_eq!(store.len(TABLE), 25);
    assert!(!store.contains(TABLE, &user_key(0)));
    assert!(store.contains(TABLE, &user_key(25)));
}

#[tokio::test]
async fn every_failed_chunk_is_chained() {
    let (store, client) = setup();
    store.set_fault(|_, items| {
        let first = items.first().and_then(pk_of)?;
        (first == "USER#0000" || first == "USER#0050")
            .then(|| StoreError::Http("connection reset".into()))
    });

    let err = client
        .write_serialized(users(100))
        .await
        .unwrap()
        .into_result()
        .unwrap_err();

    let chain = err.chain().expect("partial failure");
    let mut failed = chain.failed_chunks();
    failed.sort_unstable();
    assert_eq!(failed, vec![0, 2]);
    assert_eq!(store.len(TABLE), 50);
    assert_eq!(err.to_string().matches("connection reset").count(), 2);
}

// ─── Read path ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn two_hundred_fifty_keys_read_in_three_chunks() {
    let (store, client) = setup();
    client.write_serialized(users(250)).await.unwrap().into_result().unwrap();

    let keys: Vec<Item> = (0..250).map(user_key).collect();
    let outcome = client.read_many(keys).await.unwrap();

    assert!(outcome.is_success());
    assert_eq!(outcome.chunks, 3);
    assert_eq!(outcome.records.len(), 250);

    let expected: Vec<Item> = (0..250)
        .map(|i| store.get(TABLE, &user_key(i)).unwrap())
        .collect();
    assert_eq!(sorted(outcome.records.clone()), sorted(expected));

    let mut decoded: Vec<User> = outcome.decode().unwrap();
    decoded.sort();
    assert_eq!(decoded, users(250));
}

#[tokio::test]
async fn missing_keys_are_absent_not_errors() {
    let (store, client) = setup();
    store.seed(TABLE, users(10).iter().map(|u| dynabatch_core::marshal::to_item(u).unwrap())).unwrap();

    let keys: Vec<Item> = (0..120).map(user_key).collect();
    let outcome = client.read_many(keys).await.unwrap();

    assert!(outcome.is_success());
    assert_eq!(outcome.records.len(), 10);
}

#[tokio::test]
async fn failed_read_chunk_keeps_other_results() {
    let (store, client) = setup();
    client.write_serialized(users(250)).await.unwrap();
    store.set_fault(|op, items| {
        (op == Operation::Read && items.len() == 50)
            .then(|| StoreError::Validation("key schema mismatch".into()))
    });

    let outcome = client.read_many((0..250).map(user_key).collect()).await.unwrap();

    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors.failed_chunks(), vec![2]);
    assert_eq!(outcome.records.len(), 200);
    assert!(outcome
        .records
        .iter()
        .filter_map(pk_of)
        .all(|pk| pk < "USER#0200"));
}

#[tokio::test]
async fn empty_batches_complete_immediately() {
    let (store, client) = setup();
    let read = client.read_many(Vec::new()).await.unwrap();
    assert!(read.is_success());
    assert!(read.records.is_empty());
    assert_eq!(read.chunks, 0);

    let write = client.write_serialized(Vec::<User>::new()).await.unwrap();
    assert!(write.is_success());
    assert_eq!(store.call_count(), 0);
}

// ─── Configuration ────────────────────────────────────────────────────────────

#[tokio::test]
async fn resequenced_reads_follow_input_order() {
    let store = Arc::new(InMemoryStore::new().with_latency(Duration::from_millis(2)));
    let client = BatchClient::new(store.clone(), TABLE)
        .with_config(BatchConfig { ordering: OutcomeOrder::ChunkIndex, ..Default::default() })
        .unwrap();
    client.write_serialized(users(300)).await.unwrap();

    let outcome = client.read_many((0..300).map(user_key).collect()).await.unwrap();
    let pks: Vec<&str> = outcome.records.iter().filter_map(pk_of).collect();
    let expected: Vec<String> = (0..300).map(|i| format!("USER#{i:04}")).collect();
    assert_eq!(pks, expected.iter().map(String::as_str).collect::<Vec<_>>());
}

#[tokio::test]
async fn concurrency_cap_bounds_in_flight_calls() {
    let store = Arc::new(InMemoryStore::new().with_latency(Duration::from_millis(10)));
    let client = BatchClient::new(store.clone(), TABLE)
        .with_config(BatchConfig { max_concurrency: Some(2), ..Default::default() })
        .unwrap();

    let outcome = client.write_serialized(users(200)).await.unwrap();

    assert!(outcome.is_success());
    assert_eq!(store.len(TABLE), 200);
    assert!(store.peak_in_flight() <= 2, "peak was {}", store.peak_in_flight());
}

#[tokio::test]
async fn unbounded_fan_out_overlaps_chunks() {
    let store = Arc::new(InMemoryStore::new().with_latency(Duration::from_millis(50)));
    let client = BatchClient::new(store.clone(), TABLE);

    client.write_serialized(users(100)).await.unwrap().into_result().unwrap();

    assert!(store.peak_in_flight() > 1, "chunks ran one at a time");
}

#[tokio::test]
async fn chunk_timeout_fails_slow_chunks() {
    let store = Arc::new(InMemoryStore::new().with_latency(Duration::from_millis(200)));
    let client = BatchClient::new(store.clone(), TABLE)
        .with_config(BatchConfig { chunk_timeout_ms: Some(20), ..Default::default() })
        .unwrap();

    let outcome = client.write_serialized(users(30)).await.unwrap();

    assert_eq!(outcome.errors.len(), 2);
    assert!(outcome
        .errors
        .iter()
        .all(|e| e.kind == ChunkErrorKind::Timeout { ms: 20 }));
    assert!(matches!(outcome.into_result(), Err(BatchError::Partial(_))));
}
