//! Store contract against the in-memory backend

use super::store_contract;
use reactive_actions::store::{ActionCall, InMemoryTrackingSessionStore};
use reactive_actions::{StoreError, TrackingSessionStore};
use std::sync::Arc;

#[tokio::test]
async fn test_stores_and_reads_back() {
    store_contract::stores_and_reads_back(&InMemoryTrackingSessionStore::new()).await;
}

#[tokio::test]
async fn test_merges_references_of_different_calls() {
    store_contract::merges_references_of_different_calls(&InMemoryTrackingSessionStore::new()).await;
}

#[tokio::test]
async fn test_concurrent_stores_keep_both_references() {
    store_contract::concurrent_stores_keep_both_references(&InMemoryTrackingSessionStore::new()).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_stores_on_shared_store_keep_every_reference() {
    let store = Arc::new(InMemoryTrackingSessionStore::new());
    let tasks: Vec<_> = (0..8)
        .map(|n| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                let action = format!("A{}", n);
                let id = format!("{}:%", action);
                let shared = store_contract::query("S1", "Foo", "ById", 1, &[(id.as_str(), true)]);
                store
                    .store_tracked_action_call("S1", &ActionCall::new("S1", &action, None), &[shared])
                    .await
                    .unwrap();
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    let shared = store.get_data_query("S1", "Foo:ById:1").await.unwrap().unwrap();
    assert_eq!(shared.affected_action_calls.len(), 8);
}

#[tokio::test]
async fn test_ids_ending_in_a_suffix_stay_distinct() {
    store_contract::ids_ending_in_a_suffix_stay_distinct(&InMemoryTrackingSessionStore::new()).await;
}

#[tokio::test]
async fn test_restoring_a_call_replaces_its_queries() {
    store_contract::restoring_a_call_replaces_its_queries(&InMemoryTrackingSessionStore::new()).await;
}

#[tokio::test]
async fn test_storing_without_queries_drops_all_references() {
    store_contract::storing_without_queries_drops_all_references(&InMemoryTrackingSessionStore::new())
        .await;
}

#[tokio::test]
async fn test_global_queries_span_sessions() {
    store_contract::global_queries_span_sessions(&InMemoryTrackingSessionStore::new()).await;
}

#[tokio::test]
async fn test_unregister_session_removes_only_that_session() {
    let store = InMemoryTrackingSessionStore::new();
    store_contract::unregister_session_removes_only_that_session(&store).await;
    assert_eq!(store.session_count(), 1);
}

#[tokio::test]
async fn test_rejects_session_with_separator() {
    let store = InMemoryTrackingSessionStore::new();
    let result = store
        .store_tracked_action_call("a:b", &ActionCall::new("a:b", "A", None), &[])
        .await;
    assert!(matches!(result, Err(StoreError::InvalidKey(_))));
}
