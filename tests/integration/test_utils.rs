//! Shared fixtures for integration tests
//!
//! A small Foo/Bar domain with an in-process table, the actions reading and writing it,
//! and an update handler that records every notification it receives.

use async_trait::async_trait;
use parking_lot::Mutex;
use reactive_actions::{
    filter_params, Action, ActionBroker, ActionDescriptor, ActionError, ActionExecutor,
    ActionResultUpdateHandler, DescriptorValue, ExecutionContext, InMemoryTrackingSessionStore,
    Model, ModelChange, ModelFilter, TrackingSessionStore,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Foo {
    pub id: i32,
    pub name: String,
    pub group: String,
}

impl Foo {
    pub fn new(id: i32, name: &str, group: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            group: group.to_string(),
        }
    }
}

impl Model for Foo {
    const MODEL_TYPE: &'static str = "Foo";
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub id: i32,
    pub foo_id: i32,
}

impl Model for Bar {
    const MODEL_TYPE: &'static str = "Bar";
}

#[derive(Serialize, Deserialize)]
pub struct ById {
    pub id: i32,
}

impl ActionDescriptor for ById {
    const TYPE_NAME: &'static str = "ById";

    fn combined_identifier(&self) -> String {
        self.id.to_string()
    }
}

#[derive(Serialize, Deserialize)]
pub struct ByGroup {
    pub group: String,
}

impl ActionDescriptor for ByGroup {
    const TYPE_NAME: &'static str = "ByGroup";

    fn combined_identifier(&self) -> String {
        self.group.clone()
    }
}

#[derive(Serialize, Deserialize)]
pub struct SetFooName {
    pub id: i32,
    pub name: String,
}

impl ActionDescriptor for SetFooName {
    const TYPE_NAME: &'static str = "SetFooName";

    fn combined_identifier(&self) -> String {
        format!("{}:{}", self.id, self.name)
    }
}

pub fn by_id(id: i32) -> Option<DescriptorValue> {
    Some(DescriptorValue::encode(&ById { id }).unwrap())
}

pub fn by_group(group: &str) -> Option<DescriptorValue> {
    Some(
        DescriptorValue::encode(&ByGroup {
            group: group.to_string(),
        })
        .unwrap(),
    )
}

/// One notification received by [`RecordingHandler`]
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    ResultChanged {
        session: String,
        action: String,
        descriptor: Option<String>,
    },
    ItemChanged {
        session: String,
        action: String,
        before: Option<Foo>,
        after: Option<Foo>,
    },
}

impl Notification {
    pub fn session(&self) -> &str {
        match self {
            Notification::ResultChanged { session, .. } | Notification::ItemChanged { session, .. } => session,
        }
    }

    pub fn action(&self) -> &str {
        match self {
            Notification::ResultChanged { action, .. } | Notification::ItemChanged { action, .. } => action,
        }
    }
}

#[derive(Default)]
pub struct RecordingHandler {
    received: Mutex<Vec<Notification>>,
    fail: bool,
}

impl RecordingHandler {
    pub fn failing() -> Self {
        Self {
            received: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Take everything received so far, sorted by (session, action)
    pub fn take(&self) -> Vec<Notification> {
        let mut received = std::mem::take(&mut *self.received.lock());
        received.sort_by(|a, b| (a.session(), a.action()).cmp(&(b.session(), b.action())));
        received
    }

    fn result(&self) -> Result<(), ActionError> {
        if self.fail {
            Err(ActionError::Handler("client gone".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ActionResultUpdateHandler for RecordingHandler {
    async fn on_result_changed(
        &self,
        tracking_session: &str,
        action: &Action,
        descriptor: Option<&DescriptorValue>,
    ) -> Result<(), ActionError> {
        self.received.lock().push(Notification::ResultChanged {
            session: tracking_session.to_string(),
            action: action.name().to_string(),
            descriptor: descriptor.map(|d| d.combined_identifier().to_string()),
        });
        self.result()
    }

    async fn on_result_item_changed(
        &self,
        tracking_session: &str,
        action: &Action,
        _descriptor: Option<&DescriptorValue>,
        change: &ModelChange<'_>,
    ) -> Result<(), ActionError> {
        self.received.lock().push(Notification::ItemChanged {
            session: tracking_session.to_string(),
            action: action.name().to_string(),
            before: change.before::<Foo>().cloned(),
            after: change.after::<Foo>().cloned(),
        });
        self.result()
    }
}

pub type FooTable = Arc<Mutex<BTreeMap<i32, Foo>>>;

pub struct Fixture {
    pub broker: ActionBroker,
    pub table: FooTable,
    pub handler: Arc<RecordingHandler>,
    pub store: Arc<dyn TrackingSessionStore>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_store(Arc::new(InMemoryTrackingSessionStore::new()))
    }

    pub fn with_store(store: Arc<dyn TrackingSessionStore>) -> Self {
        Self::build(store, Arc::new(RecordingHandler::default()))
    }

    pub fn build(store: Arc<dyn TrackingSessionStore>, handler: Arc<RecordingHandler>) -> Self {
        let table: FooTable = Arc::new(Mutex::new(BTreeMap::from([
            (1, Foo::new(1, "one", "red")),
            (2, Foo::new(2, "two", "red")),
            (3, Foo::new(3, "three", "blue")),
        ])));
        let executor = build_executor(Arc::clone(&table), Arc::clone(&store), Arc::clone(&handler));
        let broker = ActionBroker::new(executor);
        Self {
            broker,
            table,
            handler,
            store,
        }
    }

    pub fn executor(&self) -> &ActionExecutor {
        self.broker.executor()
    }

    /// Rename a Foo through the `SetFooName` action
    pub async fn rename(&self, id: i32, name: &str) -> Result<(), ActionError> {
        let descriptor = DescriptorValue::encode(&SetFooName {
            id,
            name: name.to_string(),
        })?;
        self.broker
            .invoke_action_as::<()>("SetFooName", Some(descriptor))
            .await
    }
}

fn descriptor<D: ActionDescriptor>(descriptor: Option<DescriptorValue>) -> Result<D, ActionError> {
    descriptor
        .ok_or_else(|| ActionError::InvalidDescriptor("missing descriptor".to_string()))?
        .decode()
}

fn build_executor(
    table: FooTable,
    store: Arc<dyn TrackingSessionStore>,
    handler: Arc<RecordingHandler>,
) -> ActionExecutor {
    let get_table = Arc::clone(&table);
    let group_table = Arc::clone(&table);
    let set_table = table;

    let mut builder = ActionExecutor::builder();
    builder
        .store(store)
        .verify_tracked_results(true)
        .add_model_filter(ModelFilter::new("ById", |foo: &Foo, id: i32| foo.id == id))
        .unwrap()
        .add_model_filter(ModelFilter::new("InGroup", |foo: &Foo, group: String| {
            foo.group == group
        }))
        .unwrap()
        .add_model_filter(ModelFilter::new("BarById", |bar: &Bar, id: i32| bar.id == id))
        .unwrap()
        .add_action(
            Action::reactive::<Foo, _, _, _>("GetFooById", move |ctx: ExecutionContext, d| {
                let table = Arc::clone(&get_table);
                async move {
                    let ById { id } = descriptor(d)?;
                    let foo = table.lock().get(&id).cloned();
                    ctx.track_entity_query(foo, "ById", filter_params![id])
                }
            })
            .unwrap(),
        )
        .unwrap()
        .add_action(
            Action::reactive_collection::<Foo, _, _, _>("GetFoosInGroup", move |ctx: ExecutionContext, d| {
                let table = Arc::clone(&group_table);
                async move {
                    let ByGroup { group } = descriptor(d)?;
                    let foos: Vec<Foo> = table
                        .lock()
                        .values()
                        .filter(|foo| foo.group == group)
                        .cloned()
                        .collect();
                    ctx.track_collection_query::<Foo, _>(foos, "InGroup", filter_params![group])
                }
            })
            .unwrap(),
        )
        .unwrap()
        // Bar 10 points at Foo 1; the Foo is read through a nested call
        .add_action(
            Action::reactive::<Bar, _, _, _>("GetBarWithFoo", |ctx: ExecutionContext, d| async move {
                let ById { id } = descriptor(d)?;
                let bar = Bar { id, foo_id: 1 };
                ctx.track_data_query::<Bar>("BarById", filter_params![id])?;
                let foo: Option<Foo> = ctx.invoke_action_as("GetFooById", by_id(bar.foo_id)).await?;
                Ok((bar, foo))
            })
            .unwrap(),
        )
        .unwrap()
        // A collection whose items all come from a nested call
        .add_action(
            Action::reactive_collection::<Foo, _, _, _>("GetRedFoos", |ctx: ExecutionContext, _| async move {
                let foos: Vec<Foo> = ctx.invoke_action_as("GetFoosInGroup", by_group("red")).await?;
                Ok(foos)
            })
            .unwrap(),
        )
        .unwrap()
        .add_action(
            Action::new("SetFooName", move |ctx: ExecutionContext, d| {
                let table = Arc::clone(&set_table);
                async move {
                    let SetFooName { id, name } = descriptor(d)?;
                    let (old, updated) = {
                        let mut table = table.lock();
                        let entry = table
                            .get_mut(&id)
                            .ok_or_else(|| ActionError::Execution(format!("no Foo {}", id)))?;
                        let old = entry.clone();
                        entry.name = name;
                        (old, entry.clone())
                    };
                    ctx.track_entity_changed(&updated, &old).await
                }
            })
            .unwrap(),
        )
        .unwrap()
        .add_action(Action::new("Ping", |_, _| async { Ok("pong") }).unwrap())
        .unwrap()
        // Plain action trying to register a query
        .add_action(
            Action::new("SneakyRead", |ctx: ExecutionContext, _| async move {
                ctx.track_data_query::<Foo>("ById", filter_params![1])
            })
            .unwrap(),
        )
        .unwrap()
        // Reactive action calling the plain one
        .add_action(
            Action::reactive::<Foo, _, _, _>("CallsSneakyRead", |ctx: ExecutionContext, _| async move {
                ctx.invoke_action_as::<()>("SneakyRead", None).await
            })
            .unwrap(),
        )
        .unwrap()
        .add_update_handler("recording", handler)
        .unwrap();
    builder.build()
}
