//! Execution context trees: nesting, query registration and sealing

use super::test_utils::{Bar, Foo};
use parking_lot::Mutex;
use reactive_actions::{
    filter_params, Action, ActionBroker, ActionError, ActionExecutor, ExecutionContext,
    FilterError, ModelFilter,
};
use std::sync::Arc;

fn broker(verify: bool, actions: Vec<Action>) -> ActionBroker {
    let mut builder = ActionExecutor::builder();
    builder
        .verify_tracked_results(verify)
        .add_model_filter(ModelFilter::new("ById", |foo: &Foo, id: i32| foo.id == id))
        .unwrap();
    for action in actions {
        builder.add_action(action).unwrap();
    }
    ActionBroker::new(builder.build())
}

/// Returns Foo 2 while claiming to have read Foo 1
fn buggy_get() -> Action {
    Action::reactive::<Foo, _, _, _>("BuggyGet", |ctx: ExecutionContext, _| async move {
        let foo = Some(Foo::new(2, "two", "red"));
        ctx.track_entity_query(foo, "ById", filter_params![1])
    })
    .unwrap()
}

#[tokio::test]
async fn test_verification_catches_mismatching_filter() {
    let checked = broker(true, vec![buggy_get()]);
    assert!(matches!(
        checked.invoke_and_track_action("S1", "BuggyGet", None).await,
        Err(ActionError::FilterMismatch { .. })
    ));

    let unchecked = broker(false, vec![buggy_get()]);
    let foo: Option<Foo> = unchecked
        .invoke_and_track_action_as("S1", "BuggyGet", None)
        .await
        .unwrap();
    assert_eq!(foo.unwrap().id, 2);
}

#[tokio::test]
async fn test_registration_checks_filter_and_parameters() {
    let broker = broker(
        true,
        vec![
            Action::reactive::<Foo, _, _, _>("WrongParams", |ctx: ExecutionContext, _| async move {
                ctx.track_data_query::<Foo>("ById", filter_params!["one"])
            })
            .unwrap(),
            Action::reactive::<Foo, _, _, _>("WrongModel", |ctx: ExecutionContext, _| async move {
                ctx.track_data_query::<Bar>("ById", filter_params![1])
            })
            .unwrap(),
            Action::reactive::<Foo, _, _, _>("UnknownFilter", |ctx: ExecutionContext, _| async move {
                ctx.track_data_query::<Foo>("ByName", filter_params!["one"])
            })
            .unwrap(),
        ],
    );

    assert!(matches!(
        broker.invoke_and_track_action("S1", "WrongParams", None).await,
        Err(ActionError::ParametersRejected { .. })
    ));
    assert!(matches!(
        broker.invoke_and_track_action("S1", "WrongModel", None).await,
        Err(ActionError::Filter(FilterError::IncompatibleModel { .. }))
    ));
    assert!(matches!(
        broker.invoke_and_track_action("S1", "UnknownFilter", None).await,
        Err(ActionError::FilterNotFound(_))
    ));
}

#[tokio::test]
async fn test_sub_contexts_share_the_session() {
    let broker = broker(
        true,
        vec![
            Action::reactive::<Foo, _, _, _>("Outer", |ctx: ExecutionContext, _| async move {
                let inner: (bool, Option<String>) = ctx.invoke_action_as("Inner", None).await?;
                Ok((ctx.is_root(), ctx.tracking_session(), inner))
            })
            .unwrap(),
            Action::reactive::<Foo, _, _, _>("Inner", |ctx: ExecutionContext, _| async move {
                Ok((ctx.is_root(), ctx.tracking_session()))
            })
            .unwrap(),
        ],
    );

    let tracked: (bool, Option<String>, (bool, Option<String>)) = broker
        .invoke_and_track_action_as("S1", "Outer", None)
        .await
        .unwrap();
    assert_eq!(
        tracked,
        (true, Some("S1".to_string()), (false, Some("S1".to_string())))
    );

    let untracked: (bool, Option<String>, (bool, Option<String>)) =
        broker.invoke_action_as("Outer", None).await.unwrap();
    assert_eq!(untracked, (true, None, (false, None)));
}

#[tokio::test]
async fn test_repeated_queries_collapse_to_indirect_reference() {
    let broker = broker(
        true,
        vec![
            Action::reactive::<Foo, _, _, _>("Twice", |ctx: ExecutionContext, _| async move {
                ctx.track_data_query::<Foo>("ById", filter_params![1])?;
                ctx.track_data_query::<Foo>("ById", filter_params![1])?;
                assert_eq!(ctx.data_query_count(), 2);
                ctx.invoke_action_as::<()>("Nested", None).await
            })
            .unwrap(),
            Action::reactive::<Foo, _, _, _>("Nested", |ctx: ExecutionContext, _| async move {
                ctx.track_data_query::<Foo>("ById", filter_params![1i64])
            })
            .unwrap(),
        ],
    );
    broker
        .invoke_and_track_action("S1", "Twice", None)
        .await
        .unwrap();

    let queries = broker
        .executor()
        .store()
        .get_data_queries_for_model("S1", "Foo")
        .await
        .unwrap();
    assert_eq!(queries.len(), 1);
    let references: Vec<_> = queries[0].affected_action_calls.iter().collect();
    assert_eq!(references.len(), 1);
    assert_eq!(references[0].action_call_id, "Twice:%");
    assert!(!references[0].direct);
}

#[tokio::test]
async fn test_finished_tree_is_sealed() {
    let escaped: Arc<Mutex<Option<ExecutionContext>>> = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&escaped);
    let broker = broker(
        true,
        vec![Action::reactive::<Foo, _, _, _>("Leaky", move |ctx: ExecutionContext, _| {
            let slot = Arc::clone(&slot);
            async move {
                *slot.lock() = Some(ctx);
                Ok(())
            }
        })
        .unwrap()],
    );
    broker
        .invoke_and_track_action("S1", "Leaky", None)
        .await
        .unwrap();

    let ctx = escaped.lock().take().unwrap();
    assert!(matches!(
        ctx.track_data_query::<Foo>("ById", filter_params![1]),
        Err(ActionError::ContextSealed(_))
    ));
    assert!(matches!(
        ctx.invoke_action("Leaky", None).await,
        Err(ActionError::ContextSealed(_))
    ));
}
