//! Tracking Session Store
//!
//! Persists which action calls of a tracking session read which data queries, so that a
//! model update can be matched back to the calls whose results it may have changed.
//! Two backends share the contract: an in-process map and a Redis-backed store whose
//! mutations run as server-side scripts.

pub mod memory;
pub mod records;
pub mod redis;

pub use memory::InMemoryTrackingSessionStore;
pub use records::{ActionCall, ActionCallReference, DataQuery, NO_DESCRIPTOR};
pub use self::redis::{RedisStoreOptions, RedisTrackingSessionStore};

use crate::error::StoreError;
use async_trait::async_trait;

/// Tracking session store interface
///
/// Storing an action call is indivisible for concurrent callers: the call's previous
/// references are stripped from every data query, the call is upserted and the new
/// data queries are merged into the existing ones, never dropping references held by
/// other calls. Data queries left without references are removed.
#[async_trait]
pub trait TrackingSessionStore: Send + Sync {
    async fn store_tracked_action_call(
        &self,
        tracking_session: &str,
        action_call: &ActionCall,
        data_queries: &[DataQuery],
    ) -> Result<(), StoreError>;

    async fn get_data_query(
        &self,
        tracking_session: &str,
        id: &str,
    ) -> Result<Option<DataQuery>, StoreError>;

    async fn get_data_queries_for_model(
        &self,
        tracking_session: &str,
        model_type_name: &str,
    ) -> Result<Vec<DataQuery>, StoreError>;

    /// Data queries of a model type across all sessions
    async fn get_global_data_queries_for_model(
        &self,
        model_type_name: &str,
    ) -> Result<Vec<DataQuery>, StoreError>;

    async fn get_action_call(
        &self,
        tracking_session: &str,
        id: &str,
    ) -> Result<Option<ActionCall>, StoreError>;

    async fn get_action_calls_for_action(
        &self,
        tracking_session: &str,
        action_name: &str,
    ) -> Result<Vec<ActionCall>, StoreError>;

    /// Delete every action call and data query of a session
    async fn unregister_session(&self, tracking_session: &str) -> Result<(), StoreError>;
}

/// Reject key components that would break the `:`-separated key layout
pub fn validate_session(tracking_session: &str) -> Result<(), StoreError> {
    if tracking_session.is_empty() || tracking_session.contains(':') {
        return Err(StoreError::InvalidKey(format!(
            "tracking session '{}' must be non-empty and must not contain ':'",
            tracking_session
        )));
    }
    Ok(())
}
