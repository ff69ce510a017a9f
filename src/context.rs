//! Execution context tree
//!
//! Every root invocation gets its own tree. Nested action invocations append child nodes,
//! and reactive actions record the data queries they read on their node. When the root
//! invocation finishes the tree is flattened into the data queries of one action call
//! and sealed.
//!
//! The tree is an arena: nodes live in one `Vec` and reference their children by index.
//! Every [`ExecutionContext`] is a cheap handle `(tree, node index)`; the arena lock is
//! only taken for short synchronous sections and never across an await.

use crate::action::{downcast_result, Action, ActionValue};
use crate::descriptor::DescriptorValue;
use crate::error::ActionError;
use crate::executor::ActionExecutor;
use crate::filter::{FilterParam, ModelFilter, ParameterizedModelFilter};
use crate::model::Model;
use crate::store::{ActionCallReference, DataQuery};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

const ROOT: usize = 0;

struct ContextNode {
    action: Arc<Action>,
    data_queries: Vec<ParameterizedModelFilter>,
    children: Vec<usize>,
}

struct ContextTree {
    tracking_session: Option<String>,
    sealed: bool,
    nodes: Vec<ContextNode>,
}

/// Handle to one node of an invocation tree
#[derive(Clone)]
pub struct ExecutionContext {
    executor: ActionExecutor,
    tree: Arc<Mutex<ContextTree>>,
    node: usize,
}

impl ExecutionContext {
    /// Start a new tree for a root invocation of `action`
    pub(crate) fn root(
        executor: ActionExecutor,
        action: Arc<Action>,
        tracking_session: Option<String>,
    ) -> Self {
        let tree = ContextTree {
            tracking_session,
            sealed: false,
            nodes: vec![ContextNode {
                action,
                data_queries: Vec::new(),
                children: Vec::new(),
            }],
        };
        Self {
            executor,
            tree: Arc::new(Mutex::new(tree)),
            node: ROOT,
        }
    }

    /// Append a child node for a nested invocation of `action`
    pub(crate) fn create_sub_context(&self, action: Arc<Action>) -> Result<Self, ActionError> {
        let mut tree = self.tree.lock();
        if tree.sealed {
            return Err(ActionError::ContextSealed(action.name().to_string()));
        }
        let child = tree.nodes.len();
        tree.nodes.push(ContextNode {
            action,
            data_queries: Vec::new(),
            children: Vec::new(),
        });
        tree.nodes[self.node].children.push(child);

        Ok(Self {
            executor: self.executor.clone(),
            tree: Arc::clone(&self.tree),
            node: child,
        })
    }

    pub fn executor(&self) -> &ActionExecutor {
        &self.executor
    }

    /// The action executing in this node
    pub fn action(&self) -> Arc<Action> {
        Arc::clone(&self.tree.lock().nodes[self.node].action)
    }

    /// Session shared by the whole tree, `None` when tracking is disabled
    pub fn tracking_session(&self) -> Option<String> {
        self.tree.lock().tracking_session.clone()
    }

    pub fn is_tracking(&self) -> bool {
        self.tree.lock().tracking_session.is_some()
    }

    pub fn is_root(&self) -> bool {
        self.node == ROOT
    }

    /// Number of data queries registered directly on this node
    pub fn data_query_count(&self) -> usize {
        self.tree.lock().nodes[self.node].data_queries.len()
    }

    /// Record that this node's result depends on entities matching `filter(params)`
    ///
    /// Does nothing when the tree is not tracked.
    pub fn register_data_query(
        &self,
        filter: Arc<ModelFilter>,
        params: Vec<FilterParam>,
    ) -> Result<(), ActionError> {
        let mut tree = self.tree.lock();
        let node_action = tree.nodes[self.node].action.name().to_string();
        if tree.sealed {
            return Err(ActionError::ContextSealed(node_action));
        }
        if tree.tracking_session.is_none() {
            return Ok(());
        }
        if !tree.nodes[self.node].action.is_reactive() {
            return Err(ActionError::RegistrationNotAllowed { action: node_action });
        }
        if !filter.accepts_parameters(&params) {
            return Err(ActionError::ParametersRejected {
                filter: filter.name().to_string(),
                params: params
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }

        let query = ParameterizedModelFilter::new(filter, params);
        debug!(action = %node_action, query = %query.identifier(), "Registered data query");
        tree.nodes[self.node].data_queries.push(query);
        Ok(())
    }

    /// Seal the tree and collect every registered query as a data query of `call_id`
    ///
    /// Queries registered on the root node reference the call directly, all others
    /// indirectly. A query registered several times appears once; if it was registered
    /// both on the root and on a nested node the indirect reference is kept.
    pub(crate) fn seal_and_flatten(
        &self,
        tracking_session: &str,
        call_id: &str,
    ) -> Result<Vec<DataQuery>, ActionError> {
        let mut tree = self.tree.lock();
        if tree.sealed {
            return Err(ActionError::ContextSealed(
                tree.nodes[ROOT].action.name().to_string(),
            ));
        }
        tree.sealed = true;

        let mut queries: BTreeMap<String, DataQuery> = BTreeMap::new();
        let mut pending = vec![ROOT];
        while let Some(index) = pending.pop() {
            let node = &tree.nodes[index];
            let direct = index == ROOT;
            for query in &node.data_queries {
                let reference = ActionCallReference::new(call_id, direct);
                match queries.get_mut(&query.identifier()) {
                    Some(existing) => existing.merge_reference(reference),
                    None => {
                        let data_query = DataQuery::from_filter(tracking_session, query, reference);
                        queries.insert(data_query.id.clone(), data_query);
                    }
                }
            }
            pending.extend(node.children.iter().copied());
        }

        Ok(queries.into_values().collect())
    }

    /// Invoke another action as a nested call of this one
    pub async fn invoke_action(
        &self,
        name: &str,
        descriptor: Option<DescriptorValue>,
    ) -> Result<ActionValue, ActionError> {
        self.executor.invoke_sub_action(self, name, descriptor).await
    }

    /// [`invoke_action`](Self::invoke_action) with the result downcast to `T`
    pub async fn invoke_action_as<T: Any>(
        &self,
        name: &str,
        descriptor: Option<DescriptorValue>,
    ) -> Result<T, ActionError> {
        let value = self.invoke_action(name, descriptor).await?;
        downcast_result(name, value)
    }

    /// Register a query by filter name
    pub fn track_data_query<M: Model>(
        &self,
        filter_name: &str,
        params: Vec<FilterParam>,
    ) -> Result<(), ActionError> {
        let filter = self.executor.get_model_filter_for::<M>(filter_name)?;
        self.register_data_query(filter, params)
    }

    /// Register the query that produced `result` and hand the result back
    ///
    /// With result verification enabled the filter must match a present result.
    pub fn track_entity_query<M: Model>(
        &self,
        result: Option<M>,
        filter_name: &str,
        params: Vec<FilterParam>,
    ) -> Result<Option<M>, ActionError> {
        let filter = self.executor.get_model_filter_for::<M>(filter_name)?;
        if self.executor.verifies_tracked_results() {
            if let Some(entity) = &result {
                if !filter.matches(entity, &params)? {
                    return Err(ActionError::FilterMismatch {
                        filter: filter_name.to_string(),
                    });
                }
            }
        }
        self.register_data_query(filter, params)?;
        Ok(result)
    }

    /// Register the query that produced the collection `result` and hand it back
    ///
    /// With result verification enabled the filter must match every item.
    pub fn track_collection_query<M, C>(
        &self,
        result: C,
        filter_name: &str,
        params: Vec<FilterParam>,
    ) -> Result<C, ActionError>
    where
        M: Model,
        for<'a> &'a C: IntoIterator<Item = &'a M>,
    {
        let filter = self.executor.get_model_filter_for::<M>(filter_name)?;
        if self.executor.verifies_tracked_results() {
            for item in &result {
                if !filter.matches(item, &params)? {
                    return Err(ActionError::FilterMismatch {
                        filter: filter_name.to_string(),
                    });
                }
            }
        }
        self.register_data_query(filter, params)?;
        Ok(result)
    }

    pub async fn track_entity_created<M: Model>(&self, created: &M) -> Result<(), ActionError> {
        self.executor.publish_model_update(Some(created), None).await
    }

    pub async fn track_entity_changed<M: Model>(&self, updated: &M, old: &M) -> Result<(), ActionError> {
        self.executor.publish_model_update(Some(updated), Some(old)).await
    }

    pub async fn track_entity_deleted<M: Model>(&self, old: &M) -> Result<(), ActionError> {
        self.executor.publish_model_update(None, Some(old)).await
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tree = self.tree.lock();
        f.debug_struct("ExecutionContext")
            .field("action", &tree.nodes[self.node].action.name())
            .field("node", &self.node)
            .field("tracking_session", &tree.tracking_session)
            .field("sealed", &tree.sealed)
            .finish()
    }
}
