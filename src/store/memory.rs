//! In-process tracking session store
//!
//! One mutex guards the whole session map, so every operation is trivially atomic.

use crate::error::StoreError;
use crate::store::{validate_session, ActionCall, DataQuery, TrackingSessionStore};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::debug;

#[derive(Default)]
struct SessionEntry {
    action_calls: HashMap<String, ActionCall>,
    data_queries: HashMap<String, DataQuery>,
}

/// Tracking session store kept in process memory
#[derive(Default)]
pub struct InMemoryTrackingSessionStore {
    sessions: Mutex<HashMap<String, SessionEntry>>,
}

impl InMemoryTrackingSessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions holding at least one record
    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }
}

#[async_trait]
impl TrackingSessionStore for InMemoryTrackingSessionStore {
    async fn store_tracked_action_call(
        &self,
        tracking_session: &str,
        action_call: &ActionCall,
        data_queries: &[DataQuery],
    ) -> Result<(), StoreError> {
        validate_session(tracking_session)?;

        let mut sessions = self.sessions.lock();
        let entry = sessions.entry(tracking_session.to_string()).or_default();

        for query in entry.data_queries.values_mut() {
            query.remove_references_to(&action_call.id);
        }
        entry
            .data_queries
            .retain(|_, query| !query.affected_action_calls.is_empty());

        entry
            .action_calls
            .insert(action_call.id.clone(), action_call.clone());

        for query in data_queries {
            match entry.data_queries.get_mut(&query.id) {
                Some(existing) => existing
                    .affected_action_calls
                    .extend(query.affected_action_calls.iter().cloned()),
                None => {
                    entry.data_queries.insert(query.id.clone(), query.clone());
                }
            }
        }

        debug!(
            session = tracking_session,
            action_call = %action_call.id,
            data_queries = data_queries.len(),
            "Stored tracked action call"
        );
        Ok(())
    }

    async fn get_data_query(
        &self,
        tracking_session: &str,
        id: &str,
    ) -> Result<Option<DataQuery>, StoreError> {
        let sessions = self.sessions.lock();
        Ok(sessions
            .get(tracking_session)
            .and_then(|entry| entry.data_queries.get(id).cloned()))
    }

    async fn get_data_queries_for_model(
        &self,
        tracking_session: &str,
        model_type_name: &str,
    ) -> Result<Vec<DataQuery>, StoreError> {
        let sessions = self.sessions.lock();
        Ok(sessions
            .get(tracking_session)
            .map(|entry| {
                entry
                    .data_queries
                    .values()
                    .filter(|q| q.model_type_name == model_type_name)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_global_data_queries_for_model(
        &self,
        model_type_name: &str,
    ) -> Result<Vec<DataQuery>, StoreError> {
        let sessions = self.sessions.lock();
        Ok(sessions
            .values()
            .flat_map(|entry| entry.data_queries.values())
            .filter(|q| q.model_type_name == model_type_name)
            .cloned()
            .collect())
    }

    async fn get_action_call(
        &self,
        tracking_session: &str,
        id: &str,
    ) -> Result<Option<ActionCall>, StoreError> {
        let sessions = self.sessions.lock();
        Ok(sessions
            .get(tracking_session)
            .and_then(|entry| entry.action_calls.get(id).cloned()))
    }

    async fn get_action_calls_for_action(
        &self,
        tracking_session: &str,
        action_name: &str,
    ) -> Result<Vec<ActionCall>, StoreError> {
        let sessions = self.sessions.lock();
        Ok(sessions
            .get(tracking_session)
            .map(|entry| {
                entry
                    .action_calls
                    .values()
                    .filter(|c| c.action_name == action_name)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn unregister_session(&self, tracking_session: &str) -> Result<(), StoreError> {
        let removed = self.sessions.lock().remove(tracking_session);
        if let Some(entry) = removed {
            debug!(
                session = tracking_session,
                action_calls = entry.action_calls.len(),
                data_queries = entry.data_queries.len(),
                "Unregistered session"
            );
        }
        Ok(())
    }
}
