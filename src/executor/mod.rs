//! Action Executor
//!
//! Resolves actions by name, runs them inside execution context trees, persists tracked
//! invocations and propagates model updates to the calls they affect (see
//! [`propagation`]).

mod propagation;

use crate::action::{downcast_result, Action, ActionValue};
use crate::config::ExecutorConfig;
use crate::context::ExecutionContext;
use crate::descriptor::DescriptorValue;
use crate::error::{ActionError, FilterError};
use crate::filter::ModelFilter;
use crate::handler::ActionResultUpdateHandler;
use crate::model::Model;
use crate::store::{validate_session, ActionCall, InMemoryTrackingSessionStore, TrackingSessionStore};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Collects actions, model filters and update handlers before the executor is built
pub struct ActionExecutorBuilder {
    actions: HashMap<String, Arc<Action>>,
    filters: HashMap<String, Arc<ModelFilter>>,
    handlers: Vec<(String, Arc<dyn ActionResultUpdateHandler>)>,
    store: Option<Arc<dyn TrackingSessionStore>>,
    verify_tracked_results: bool,
}

impl Default for ActionExecutorBuilder {
    fn default() -> Self {
        Self {
            actions: HashMap::new(),
            filters: HashMap::new(),
            handlers: Vec::new(),
            store: None,
            verify_tracked_results: ExecutorConfig::default().verify_tracked_results,
        }
    }
}

impl ActionExecutorBuilder {
    pub fn add_action(&mut self, action: Action) -> Result<&mut Self, ActionError> {
        if self.actions.contains_key(action.name()) {
            return Err(ActionError::DuplicateRegistration {
                kind: "action",
                name: action.name().to_string(),
            });
        }
        self.actions
            .insert(action.name().to_string(), Arc::new(action));
        Ok(self)
    }

    pub fn add_model_filter(&mut self, filter: ModelFilter) -> Result<&mut Self, ActionError> {
        let name = filter.name().to_string();
        if name.is_empty() || name.contains(':') {
            return Err(ActionError::InvalidAction {
                name,
                reason: "model filter names must be non-empty and must not contain ':'".to_string(),
            });
        }
        if self.filters.contains_key(&name) {
            return Err(ActionError::DuplicateRegistration {
                kind: "model filter",
                name,
            });
        }
        self.filters.insert(name, Arc::new(filter));
        Ok(self)
    }

    pub fn add_update_handler(
        &mut self,
        name: impl Into<String>,
        handler: Arc<dyn ActionResultUpdateHandler>,
    ) -> Result<&mut Self, ActionError> {
        let name = name.into();
        if self.handlers.iter().any(|(existing, _)| *existing == name) {
            return Err(ActionError::DuplicateRegistration {
                kind: "update handler",
                name,
            });
        }
        self.handlers.push((name, handler));
        Ok(self)
    }

    /// Store used for tracked calls, an in-memory store when unset
    pub fn store(&mut self, store: Arc<dyn TrackingSessionStore>) -> &mut Self {
        self.store = Some(store);
        self
    }

    /// Check that tracked filters actually match the results they are registered for
    pub fn verify_tracked_results(&mut self, verify: bool) -> &mut Self {
        self.verify_tracked_results = verify;
        self
    }

    pub fn apply_config(&mut self, config: &ExecutorConfig) -> &mut Self {
        self.verify_tracked_results(config.verify_tracked_results)
    }

    pub fn build(self) -> ActionExecutor {
        info!(
            actions = self.actions.len(),
            model_filters = self.filters.len(),
            update_handlers = self.handlers.len(),
            "Built action executor"
        );
        ActionExecutor {
            inner: Arc::new(ExecutorInner {
                actions: self.actions,
                filters: self.filters,
                handlers: self.handlers.into_iter().map(|(_, h)| h).collect(),
                store: self
                    .store
                    .unwrap_or_else(|| Arc::new(InMemoryTrackingSessionStore::new())),
                verify_tracked_results: self.verify_tracked_results,
            }),
        }
    }
}

struct ExecutorInner {
    actions: HashMap<String, Arc<Action>>,
    filters: HashMap<String, Arc<ModelFilter>>,
    handlers: Vec<Arc<dyn ActionResultUpdateHandler>>,
    store: Arc<dyn TrackingSessionStore>,
    verify_tracked_results: bool,
}

/// Shared handle to the registered actions, filters, handlers and the store
#[derive(Clone)]
pub struct ActionExecutor {
    inner: Arc<ExecutorInner>,
}

impl ActionExecutor {
    pub fn builder() -> ActionExecutorBuilder {
        ActionExecutorBuilder::default()
    }

    pub fn store(&self) -> &Arc<dyn TrackingSessionStore> {
        &self.inner.store
    }

    pub fn verifies_tracked_results(&self) -> bool {
        self.inner.verify_tracked_results
    }

    pub fn get_action(&self, name: &str) -> Result<Arc<Action>, ActionError> {
        self.inner
            .actions
            .get(name)
            .cloned()
            .ok_or_else(|| ActionError::ActionNotFound(name.to_string()))
    }

    pub fn get_model_filter(&self, name: &str) -> Result<Arc<ModelFilter>, ActionError> {
        self.inner
            .filters
            .get(name)
            .cloned()
            .ok_or_else(|| ActionError::FilterNotFound(name.to_string()))
    }

    /// Look up a filter that can be applied to `M`
    pub fn get_model_filter_for<M: Model>(&self, name: &str) -> Result<Arc<ModelFilter>, ActionError> {
        let filter = self.get_model_filter(name)?;
        if !filter.can_filter_model_type::<M>() {
            return Err(FilterError::IncompatibleModel {
                filter: name.to_string(),
                expected: filter.model_type(),
                actual: M::MODEL_TYPE,
            }
            .into());
        }
        Ok(filter)
    }

    /// Run an action as the root of a new invocation tree
    ///
    /// With a tracking session the flattened tree is stored before the result is
    /// returned; a failed store fails the call.
    pub async fn invoke_root_action(
        &self,
        name: &str,
        descriptor: Option<DescriptorValue>,
        tracking_session: Option<&str>,
    ) -> Result<ActionValue, ActionError> {
        let action = self.get_action(name)?;
        if let Some(session) = tracking_session {
            validate_session(session).map_err(|_| ActionError::InvalidSession(session.to_string()))?;
            if !action.is_reactive() {
                return Err(ActionError::NotReactive(name.to_string()));
            }
        }

        let ctx = ExecutionContext::root(
            self.clone(),
            Arc::clone(&action),
            tracking_session.map(str::to_string),
        );
        let call_descriptor = if tracking_session.is_some() {
            descriptor.clone()
        } else {
            None
        };
        let result = action.invoke(ctx.clone(), descriptor).await?;

        if let Some(session) = tracking_session {
            self.store_execution(&ctx, session, &action, call_descriptor)
                .await?;
        }
        Ok(result)
    }

    pub async fn invoke_root_action_as<T: Any>(
        &self,
        name: &str,
        descriptor: Option<DescriptorValue>,
        tracking_session: Option<&str>,
    ) -> Result<T, ActionError> {
        let value = self
            .invoke_root_action(name, descriptor, tracking_session)
            .await?;
        downcast_result(name, value)
    }

    /// Run an action as a nested call of `parent`
    pub async fn invoke_sub_action(
        &self,
        parent: &ExecutionContext,
        name: &str,
        descriptor: Option<DescriptorValue>,
    ) -> Result<ActionValue, ActionError> {
        let action = self.get_action(name)?;
        let ctx = parent.create_sub_context(Arc::clone(&action))?;
        debug!(parent = %parent.action().name(), action = name, "Invoking sub action");
        action.invoke(ctx, descriptor).await
    }

    /// Flatten a finished tree and store it as one action call
    async fn store_execution(
        &self,
        ctx: &ExecutionContext,
        tracking_session: &str,
        action: &Action,
        descriptor: Option<DescriptorValue>,
    ) -> Result<(), ActionError> {
        let call = ActionCall::new(tracking_session, action.name(), descriptor);
        let data_queries = ctx.seal_and_flatten(tracking_session, &call.id)?;

        self.inner
            .store
            .store_tracked_action_call(tracking_session, &call, &data_queries)
            .await
            .map_err(|source| ActionError::Tracking {
                action: action.name().to_string(),
                session: tracking_session.to_string(),
                source,
            })?;

        debug!(
            action = action.name(),
            session = tracking_session,
            action_call = %call.id,
            data_queries = data_queries.len(),
            "Tracked action call"
        );
        Ok(())
    }
}

impl fmt::Debug for ActionExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut actions: Vec<_> = self.inner.actions.keys().collect();
        actions.sort();
        let mut filters: Vec<_> = self.inner.filters.keys().collect();
        filters.sort();
        f.debug_struct("ActionExecutor")
            .field("actions", &actions)
            .field("model_filters", &filters)
            .field("update_handlers", &self.inner.handlers.len())
            .field("verify_tracked_results", &self.inner.verify_tracked_results)
            .finish()
    }
}
