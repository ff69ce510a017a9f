//! Reactive Actions: Query Invalidation for Server-Side Actions
//!
//! Actions register the data queries their results depend on while they run.
//! When a model changes, every stored query whose filter matches the change is
//! found and the update handlers of the affected action calls are notified.

pub mod action;
pub mod broker;
pub mod config;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod executor;
pub mod filter;
pub mod handler;
pub mod logging;
pub mod model;
pub mod store;

pub use action::{Action, ActionType, ActionValue, TypeTag};
pub use broker::ActionBroker;
pub use config::{ConfigLoader, ReactiveConfig};
pub use context::ExecutionContext;
pub use descriptor::{ActionDescriptor, DescriptorValue};
pub use error::{ActionError, FilterError, StoreError};
pub use executor::{ActionExecutor, ActionExecutorBuilder};
pub use filter::{FilterParam, ModelFilter, ParameterizedModelFilter};
pub use handler::ActionResultUpdateHandler;
pub use model::{Model, ModelChange};
pub use store::{InMemoryTrackingSessionStore, RedisTrackingSessionStore, TrackingSessionStore};
