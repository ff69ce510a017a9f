//! Behavior every `TrackingSessionStore` must show, run against each backend

use futures::future::join;
use reactive_actions::filter::FilterParam;
use reactive_actions::store::{ActionCall, ActionCallReference, DataQuery};
use reactive_actions::TrackingSessionStore;
use std::collections::BTreeSet;

pub fn query(session: &str, model: &str, filter: &str, id: i64, refs: &[(&str, bool)]) -> DataQuery {
    DataQuery {
        tracking_session: session.to_string(),
        id: format!("{}:{}:{}", model, filter, id),
        model_type_name: model.to_string(),
        filter_name: filter.to_string(),
        filter_params: vec![FilterParam::Int(id)],
        affected_action_calls: refs
            .iter()
            .map(|(call, direct)| ActionCallReference::new(*call, *direct))
            .collect(),
    }
}

pub fn call(session: &str, action: &str) -> ActionCall {
    ActionCall::new(session, action, None)
}

fn references(query: &DataQuery) -> BTreeSet<(String, bool)> {
    query
        .affected_action_calls
        .iter()
        .map(|r| (r.action_call_id.clone(), r.direct))
        .collect()
}

pub async fn stores_and_reads_back(store: &dyn TrackingSessionStore) {
    let call = call("S1", "GetFoo");
    let foo = query("S1", "Foo", "ById", 1, &[("GetFoo:%", true)]);
    let bar = query("S1", "Bar", "ById", 7, &[("GetFoo:%", false)]);
    store
        .store_tracked_action_call("S1", &call, &[foo.clone(), bar])
        .await
        .unwrap();

    assert_eq!(store.get_action_call("S1", "GetFoo:%").await.unwrap(), Some(call.clone()));
    assert_eq!(store.get_action_call("S2", "GetFoo:%").await.unwrap(), None);
    assert_eq!(
        store.get_action_calls_for_action("S1", "GetFoo").await.unwrap(),
        vec![call]
    );
    assert!(store
        .get_action_calls_for_action("S1", "GetFo")
        .await
        .unwrap()
        .is_empty());

    assert_eq!(store.get_data_query("S1", "Foo:ById:1").await.unwrap(), Some(foo.clone()));
    assert_eq!(store.get_data_queries_for_model("S1", "Foo").await.unwrap(), vec![foo]);
    let bars = store.get_data_queries_for_model("S1", "Bar").await.unwrap();
    assert_eq!(bars.len(), 1);
    assert_eq!(
        references(&bars[0]),
        BTreeSet::from([("GetFoo:%".to_string(), false)])
    );
}

pub async fn merges_references_of_different_calls(store: &dyn TrackingSessionStore) {
    store
        .store_tracked_action_call("S1", &call("S1", "A"), &[query("S1", "Foo", "ById", 1, &[("A:%", true)])])
        .await
        .unwrap();
    store
        .store_tracked_action_call("S1", &call("S1", "B"), &[query("S1", "Foo", "ById", 1, &[("B:%", false)])])
        .await
        .unwrap();

    let merged = store.get_data_query("S1", "Foo:ById:1").await.unwrap().unwrap();
    assert_eq!(
        references(&merged),
        BTreeSet::from([("A:%".to_string(), true), ("B:%".to_string(), false)])
    );
}

pub async fn concurrent_stores_keep_both_references(store: &dyn TrackingSessionStore) {
    let (a, b) = (call("S1", "A"), call("S1", "B"));
    for id in 1..=10 {
        let from_a = [query("S1", "Foo", "ById", id, &[("A:%", true)])];
        let from_b = [query("S1", "Foo", "ById", id, &[("B:%", false)])];
        let (stored_a, stored_b) = join(
            store.store_tracked_action_call("S1", &a, &from_a),
            store.store_tracked_action_call("S1", &b, &from_b),
        )
        .await;
        stored_a.unwrap();
        stored_b.unwrap();

        // Each round restores A and B, so only the latest id keeps references
        let shared = store
            .get_data_query("S1", &format!("Foo:ById:{}", id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            references(&shared),
            BTreeSet::from([("A:%".to_string(), true), ("B:%".to_string(), false)])
        );
    }
    assert_eq!(store.get_data_queries_for_model("S1", "Foo").await.unwrap().len(), 1);
}

fn by_name(session: &str, name: &str, refs: &[(&str, bool)]) -> DataQuery {
    DataQuery {
        filter_name: "ByName".to_string(),
        filter_params: vec![FilterParam::from(name)],
        id: format!("Foo:ByName:{}", name),
        ..query(session, "Foo", "ByName", 0, refs)
    }
}

pub async fn ids_ending_in_a_suffix_stay_distinct(store: &dyn TrackingSessionStore) {
    store
        .store_tracked_action_call("S1", &call("S1", "A"), &[by_name("S1", "x", &[("A:%", true)])])
        .await
        .unwrap();
    store
        .store_tracked_action_call(
            "S1",
            &call("S1", "B"),
            &[by_name("S1", "x:refs", &[("B:%", true)])],
        )
        .await
        .unwrap();

    let x = store.get_data_query("S1", "Foo:ByName:x").await.unwrap().unwrap();
    assert_eq!(references(&x), BTreeSet::from([("A:%".to_string(), true)]));
    let x_refs = store.get_data_query("S1", "Foo:ByName:x:refs").await.unwrap().unwrap();
    assert_eq!(references(&x_refs), BTreeSet::from([("B:%".to_string(), true)]));
    assert_eq!(store.get_global_data_queries_for_model("Foo").await.unwrap().len(), 2);

    // Restoring A only touches its own query
    store
        .store_tracked_action_call("S1", &call("S1", "A"), &[])
        .await
        .unwrap();
    assert_eq!(store.get_data_query("S1", "Foo:ByName:x").await.unwrap(), None);
    assert!(store.get_data_query("S1", "Foo:ByName:x:refs").await.unwrap().is_some());

    store.unregister_session("S1").await.unwrap();
    assert!(store
        .get_global_data_queries_for_model("Foo")
        .await
        .unwrap()
        .is_empty());
}

pub async fn restoring_a_call_replaces_its_queries(store: &dyn TrackingSessionStore) {
    store
        .store_tracked_action_call(
            "S1",
            &call("S1", "A"),
            &[
                query("S1", "Foo", "ById", 1, &[("A:%", true)]),
                query("S1", "Foo", "ById", 2, &[("A:%", true)]),
            ],
        )
        .await
        .unwrap();
    store
        .store_tracked_action_call("S1", &call("S1", "B"), &[query("S1", "Foo", "ById", 2, &[("B:%", true)])])
        .await
        .unwrap();

    // A now only reads Foo 3
    store
        .store_tracked_action_call("S1", &call("S1", "A"), &[query("S1", "Foo", "ById", 3, &[("A:%", true)])])
        .await
        .unwrap();

    assert_eq!(store.get_data_query("S1", "Foo:ById:1").await.unwrap(), None);
    let shared = store.get_data_query("S1", "Foo:ById:2").await.unwrap().unwrap();
    assert_eq!(references(&shared), BTreeSet::from([("B:%".to_string(), true)]));
    assert!(store.get_data_query("S1", "Foo:ById:3").await.unwrap().is_some());

    let mut ids: Vec<String> = store
        .get_data_queries_for_model("S1", "Foo")
        .await
        .unwrap()
        .into_iter()
        .map(|q| q.id)
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["Foo:ById:2", "Foo:ById:3"]);
}

pub async fn storing_without_queries_drops_all_references(store: &dyn TrackingSessionStore) {
    store
        .store_tracked_action_call("S1", &call("S1", "A"), &[query("S1", "Foo", "ById", 1, &[("A:%", true)])])
        .await
        .unwrap();
    store
        .store_tracked_action_call("S1", &call("S1", "A"), &[])
        .await
        .unwrap();

    assert!(store.get_action_call("S1", "A:%").await.unwrap().is_some());
    assert!(store
        .get_global_data_queries_for_model("Foo")
        .await
        .unwrap()
        .is_empty());
}

pub async fn global_queries_span_sessions(store: &dyn TrackingSessionStore) {
    for session in ["S1", "S2"] {
        store
            .store_tracked_action_call(
                session,
                &call(session, "A"),
                &[query(session, "Foo", "ById", 1, &[("A:%", true)])],
            )
            .await
            .unwrap();
    }
    store
        .store_tracked_action_call("S1", &call("S1", "B"), &[query("S1", "Bar", "ById", 1, &[("B:%", true)])])
        .await
        .unwrap();

    let mut sessions: Vec<String> = store
        .get_global_data_queries_for_model("Foo")
        .await
        .unwrap()
        .into_iter()
        .map(|q| q.tracking_session)
        .collect();
    sessions.sort();
    assert_eq!(sessions, vec!["S1", "S2"]);
    assert!(store
        .get_global_data_queries_for_model("Baz")
        .await
        .unwrap()
        .is_empty());
}

pub async fn unregister_session_removes_only_that_session(store: &dyn TrackingSessionStore) {
    for session in ["S1", "S2"] {
        store
            .store_tracked_action_call(
                session,
                &call(session, "A"),
                &[query(session, "Foo", "ById", 1, &[("A:%", true)])],
            )
            .await
            .unwrap();
    }

    store.unregister_session("S1").await.unwrap();
    // Unknown sessions are fine
    store.unregister_session("S3").await.unwrap();

    assert_eq!(store.get_action_call("S1", "A:%").await.unwrap(), None);
    assert_eq!(store.get_data_query("S1", "Foo:ById:1").await.unwrap(), None);
    assert!(store.get_action_call("S2", "A:%").await.unwrap().is_some());

    let global = store.get_global_data_queries_for_model("Foo").await.unwrap();
    assert_eq!(global.len(), 1);
    assert_eq!(global[0].tracking_session, "S2");
}
