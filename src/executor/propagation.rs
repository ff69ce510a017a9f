//! Model update propagation
//!
//! A published update is matched against every stored data query of the model type,
//! across all sessions. The references of matching queries are grouped per session and
//! deduplicated per action call, and every update handler is notified for every
//! affected call. All notifications run concurrently and are awaited before returning.

use super::ActionExecutor;
use crate::error::ActionError;
use crate::model::{Model, ModelChange};
use crate::store::DataQuery;
use futures::future::join_all;
use std::any::TypeId;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Affected action calls per session, mapped to whether every reference was direct
pub(crate) type AffectedCalls = BTreeMap<String, BTreeMap<String, bool>>;

/// Group references by session and action call
///
/// A call referenced both directly and indirectly is treated as indirect.
pub(crate) fn group_references(queries: impl IntoIterator<Item = DataQuery>) -> AffectedCalls {
    let mut sessions: AffectedCalls = BTreeMap::new();
    for query in queries {
        let calls = sessions.entry(query.tracking_session).or_default();
        for reference in query.affected_action_calls {
            calls
                .entry(reference.action_call_id)
                .and_modify(|direct| *direct &= reference.direct)
                .or_insert(reference.direct);
        }
    }
    sessions
}

impl ActionExecutor {
    /// Notify the calls whose results depend on an updated `M`
    ///
    /// `updated` is absent for deletions and `old` for creations; at least one of them is
    /// required. Stored queries whose filter is unknown or fails to evaluate against the
    /// models are treated as non-matching.
    pub async fn publish_model_update<M: Model>(
        &self,
        updated: Option<&M>,
        old: Option<&M>,
    ) -> Result<(), ActionError> {
        if updated.is_none() && old.is_none() {
            return Err(ActionError::MissingModel);
        }

        let queries = self
            .inner
            .store
            .get_global_data_queries_for_model(M::MODEL_TYPE)
            .await?;
        let scanned = queries.len();
        let affected: Vec<DataQuery> = queries
            .into_iter()
            .filter(|query| self.query_matches(query, updated, old))
            .collect();
        let sessions = group_references(affected);

        info!(
            model_type = M::MODEL_TYPE,
            scanned,
            sessions = sessions.len(),
            "Publishing model update"
        );

        let change = ModelChange::new(old, updated);
        let notifications = sessions.iter().flat_map(|(session, calls)| {
            calls.iter().map(move |(call_id, direct)| {
                self.notify_action_call(session, call_id, *direct, TypeId::of::<M>(), change)
            })
        });
        let failures: Vec<ActionError> = join_all(notifications).await.into_iter().flatten().collect();

        let failed = failures.len();
        match failures.into_iter().next() {
            None => Ok(()),
            Some(first) => {
                warn!(model_type = M::MODEL_TYPE, failed, error = %first, "Update notifications failed");
                Err(ActionError::Notification {
                    failed,
                    first: Box::new(first),
                })
            }
        }
    }

    fn query_matches<M: Model>(&self, query: &DataQuery, updated: Option<&M>, old: Option<&M>) -> bool {
        let Some(filter) = self.inner.filters.get(&query.filter_name) else {
            debug!(filter = %query.filter_name, query = %query.id, "Skipping query of unknown filter");
            return false;
        };

        [updated, old].into_iter().flatten().any(|entity| {
            match filter.matches(entity, &query.filter_params) {
                Ok(matched) => matched,
                Err(err) => {
                    debug!(filter = %query.filter_name, query = %query.id, error = %err, "Filter failed, treating as no match");
                    false
                }
            }
        })
    }

    /// Notify every handler about one affected call, returning the handler failures
    async fn notify_action_call(
        &self,
        session: &str,
        call_id: &str,
        direct: bool,
        model: TypeId,
        change: ModelChange<'_>,
    ) -> Vec<ActionError> {
        let call = match self.inner.store.get_action_call(session, call_id).await {
            Ok(Some(call)) => call,
            Ok(None) => {
                debug!(session, action_call = call_id, "Referenced action call no longer stored");
                return Vec::new();
            }
            Err(err) => return vec![err.into()],
        };
        let Some(action) = self.inner.actions.get(&call.action_name).cloned() else {
            warn!(session, action = %call.action_name, "Stored action call references an unregistered action");
            return Vec::new();
        };
        if !action.is_reactive() {
            return Vec::new();
        }

        let item_changed = action.action_type().is_collection()
            && direct
            && action.result_model().map(|m| m.type_id()) == Some(model);
        let descriptor = call.descriptor.as_ref();

        debug!(
            session,
            action = action.name(),
            action_call = call_id,
            item_changed,
            "Notifying update handlers"
        );

        let notifications = self.inner.handlers.iter().map(|handler| {
            let action = &action;
            let change = &change;
            async move {
                if item_changed {
                    handler
                        .on_result_item_changed(session, action, descriptor, change)
                        .await
                } else {
                    handler.on_result_changed(session, action, descriptor).await
                }
            }
        });
        join_all(notifications)
            .await
            .into_iter()
            .filter_map(Result::err)
            .collect()
    }
}
