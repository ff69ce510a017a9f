//! Redis-backed tracking session store
//!
//! All mutations go through three Lua scripts so that each one is applied atomically by
//! the server. Storing an action call runs as a single MULTI/EXEC transaction made of
//! the remove script, the action call SET/SADD and one register script per reference.
//! The protocol needs a single serialization point, so replicas and cluster mode are
//! refused when connecting.

pub mod keys;
pub mod scripts;

pub use keys::RedisKeys;

use crate::error::StoreError;
use crate::store::{
    validate_session, ActionCall, ActionCallReference, DataQuery, TrackingSessionStore,
};
use ::redis::aio::ConnectionManager;
use ::redis::{Client, ErrorKind, RedisResult};
use async_trait::async_trait;
use scripts::{Script, ScriptCache};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Connection options
#[derive(Debug, Clone)]
pub struct RedisStoreOptions {
    /// Namespace of every key written by the store
    pub prefix: String,
    pub connection_timeout: Duration,
    /// Upper bound for each store operation
    pub command_timeout: Duration,
}

impl Default for RedisStoreOptions {
    fn default() -> Self {
        Self {
            prefix: "reactive-actions".to_string(),
            connection_timeout: Duration::from_secs(5),
            command_timeout: Duration::from_secs(2),
        }
    }
}

/// One data query registration inside a store transaction
struct Registration {
    call_refs_key: String,
    model_type_key: String,
    query_key: String,
    query_refs_key: String,
    query_json: String,
    reference_json: String,
}

pub struct RedisTrackingSessionStore {
    connection: ConnectionManager,
    keys: RedisKeys,
    scripts: ScriptCache,
    command_timeout: Duration,
}

impl RedisTrackingSessionStore {
    /// Connect and check that the server is a standalone master
    pub async fn connect(url: &str, options: RedisStoreOptions) -> Result<Self, StoreError> {
        if options.prefix.is_empty() {
            return Err(StoreError::InvalidKey("key prefix must not be empty".to_string()));
        }

        let client = Client::open(url)?;
        let connection = bounded(options.connection_timeout, ConnectionManager::new(client)).await?;

        let store = Self {
            connection,
            keys: RedisKeys::new(options.prefix),
            scripts: ScriptCache::default(),
            command_timeout: options.command_timeout,
        };
        store.ensure_single_master().await?;

        info!(prefix = %store.keys.action_calls_set(), "Connected Redis tracking session store");
        Ok(store)
    }

    pub fn keys(&self) -> &RedisKeys {
        &self.keys
    }

    async fn ensure_single_master(&self) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();

        let replication: String = self
            .bounded(::redis::cmd("INFO").arg("replication").query_async(&mut conn))
            .await?;
        match info_field(&replication, "role") {
            Some("master") => {}
            role => {
                return Err(StoreError::UnsupportedTopology(format!(
                    "server role is '{}', a master is required",
                    role.unwrap_or("unknown")
                )))
            }
        }

        let cluster: String = self
            .bounded(::redis::cmd("INFO").arg("cluster").query_async(&mut conn))
            .await?;
        if info_field(&cluster, "cluster_enabled") == Some("1") {
            return Err(StoreError::UnsupportedTopology(
                "cluster mode is enabled".to_string(),
            ));
        }
        Ok(())
    }

    async fn bounded<T, F>(&self, operation: F) -> Result<T, StoreError>
    where
        F: Future<Output = RedisResult<T>>,
    {
        bounded(self.command_timeout, operation).await
    }

    async fn script_sha(&self, script: Script, conn: &mut ConnectionManager) -> Result<String, StoreError> {
        self.scripts.sha(script, conn, self.command_timeout).await
    }

    /// Run `operation`, reloading scripts and retrying once if the server lost them
    async fn with_script_reload<T, F, Fut>(&self, operation: F) -> Result<T, StoreError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        match operation().await {
            Err(StoreError::Redis(err)) if err.kind() == ErrorKind::NoScriptError => {
                warn!("Redis script cache is stale, reloading scripts");
                self.scripts.invalidate().await;
                operation().await
            }
            other => other,
        }
    }

    async fn try_store(
        &self,
        call_refs_key: &str,
        call_key: &str,
        call_json: &str,
        stale_references: &[String; 2],
        registrations: &[Registration],
    ) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let remove = self
            .script_sha(Script::RemoveActionCallReferences, &mut conn)
            .await?;
        let register = self
            .script_sha(Script::RegisterDataQueryReference, &mut conn)
            .await?;

        let mut pipe = ::redis::pipe();
        pipe.atomic();
        pipe.cmd("EVALSHA")
            .arg(&remove)
            .arg(2)
            .arg(call_refs_key)
            .arg(self.keys.data_queries_set())
            .arg(&stale_references[0])
            .arg(&stale_references[1])
            .arg(self.keys.model_types_base())
            .arg(self.keys.data_queries_base())
            .arg(self.keys.data_query_refs_base())
            .ignore();
        pipe.cmd("SET").arg(call_key).arg(call_json).ignore();
        pipe.cmd("SADD")
            .arg(self.keys.action_calls_set())
            .arg(call_key)
            .ignore();
        for registration in registrations {
            pipe.cmd("EVALSHA")
                .arg(&register)
                .arg(5)
                .arg(&registration.call_refs_key)
                .arg(self.keys.data_queries_set())
                .arg(&registration.model_type_key)
                .arg(&registration.query_key)
                .arg(&registration.query_refs_key)
                .arg(&registration.query_json)
                .arg(&registration.reference_json)
                .ignore();
        }

        self.bounded(pipe.query_async::<()>(&mut conn)).await
    }

    async fn read_data_query(&self, key: &str) -> Result<Option<DataQuery>, StoreError> {
        let refs_key = self
            .keys
            .data_query_refs_of(key)
            .ok_or_else(|| StoreError::InvalidKey(format!("not a data query key: {}", key)))?;
        let mut conn = self.connection.clone();
        let mut pipe = ::redis::pipe();
        pipe.atomic().get(key).smembers(refs_key);
        let (json, refs): (Option<String>, Vec<String>) =
            self.bounded(pipe.query_async(&mut conn)).await?;

        let Some(json) = json else {
            return Ok(None);
        };
        let mut query: DataQuery = serde_json::from_str(&json)?;
        for reference in refs {
            query
                .affected_action_calls
                .insert(serde_json::from_str::<ActionCallReference>(&reference)?);
        }
        Ok(Some(query))
    }

    async fn read_action_call(&self, key: &str) -> Result<Option<ActionCall>, StoreError> {
        let mut conn = self.connection.clone();
        let json: Option<String> = self
            .bounded(::redis::cmd("GET").arg(key).query_async(&mut conn))
            .await?;
        json.map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(StoreError::from)
    }

    /// Members of `set_key` starting with `prefix`
    async fn members_with_prefix(
        &self,
        set_key: &str,
        prefix: Option<&str>,
    ) -> Result<Vec<String>, StoreError> {
        let mut conn = self.connection.clone();
        let members: Vec<String> = self
            .bounded(::redis::cmd("SMEMBERS").arg(set_key).query_async(&mut conn))
            .await?;
        Ok(match prefix {
            Some(prefix) => members
                .into_iter()
                .filter(|key| key.starts_with(prefix))
                .collect(),
            None => members,
        })
    }

    async fn read_data_queries(&self, keys: Vec<String>) -> Result<Vec<DataQuery>, StoreError> {
        let mut queries = Vec::with_capacity(keys.len());
        for key in keys {
            // Index entries are not locked, the query may be gone by now
            if let Some(query) = self.read_data_query(&key).await? {
                queries.push(query);
            }
        }
        Ok(queries)
    }
}

#[async_trait]
impl TrackingSessionStore for RedisTrackingSessionStore {
    async fn store_tracked_action_call(
        &self,
        tracking_session: &str,
        action_call: &ActionCall,
        data_queries: &[DataQuery],
    ) -> Result<(), StoreError> {
        validate_session(tracking_session)?;

        let call_key = self.keys.action_call(tracking_session, &action_call.id);
        let call_refs_key = self.keys.action_call_refs(tracking_session, &action_call.id);
        let call_json = serde_json::to_string(action_call)?;
        let stale_references = [
            serde_json::to_string(&ActionCallReference::new(action_call.id.clone(), true))?,
            serde_json::to_string(&ActionCallReference::new(action_call.id.clone(), false))?,
        ];

        let mut registrations = Vec::new();
        for query in data_queries {
            let query_key = self.keys.data_query(tracking_session, &query.id);
            let query_refs_key = self.keys.data_query_refs(tracking_session, &query.id);
            let query_json = serde_json::to_string(&query.without_references())?;
            for reference in &query.affected_action_calls {
                registrations.push(Registration {
                    call_refs_key: self
                        .keys
                        .action_call_refs(tracking_session, &reference.action_call_id),
                    model_type_key: self.keys.model_type(&query.model_type_name),
                    query_key: query_key.clone(),
                    query_refs_key: query_refs_key.clone(),
                    query_json: query_json.clone(),
                    reference_json: serde_json::to_string(reference)?,
                });
            }
        }

        let (refs_key, key, json) = (&call_refs_key, &call_key, &call_json);
        let (stale, registrations) = (&stale_references, &registrations);
        self.with_script_reload(move || self.try_store(refs_key, key, json, stale, registrations))
            .await?;

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
        self.read_data_query(&self.keys.data_query(tracking_session, id))
            .await
    }

    async fn get_data_queries_for_model(
        &self,
        tracking_session: &str,
        model_type_name: &str,
    ) -> Result<Vec<DataQuery>, StoreError> {
        let prefix = self
            .keys
            .data_queries_for_model_prefix(tracking_session, model_type_name);
        let keys = self
            .members_with_prefix(&self.keys.model_type(model_type_name), Some(&prefix))
            .await?;
        self.read_data_queries(keys).await
    }

    async fn get_global_data_queries_for_model(
        &self,
        model_type_name: &str,
    ) -> Result<Vec<DataQuery>, StoreError> {
        let keys = self
            .members_with_prefix(&self.keys.model_type(model_type_name), None)
            .await?;
        self.read_data_queries(keys).await
    }

    async fn get_action_call(
        &self,
        tracking_session: &str,
        id: &str,
    ) -> Result<Option<ActionCall>, StoreError> {
        self.read_action_call(&self.keys.action_call(tracking_session, id))
            .await
    }

    async fn get_action_calls_for_action(
        &self,
        tracking_session: &str,
        action_name: &str,
    ) -> Result<Vec<ActionCall>, StoreError> {
        let prefix = self
            .keys
            .action_calls_for_action_prefix(tracking_session, action_name);
        let keys = self
            .members_with_prefix(&self.keys.action_calls_set(), Some(&prefix))
            .await?;

        let mut calls = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(call) = self.read_action_call(&key).await? {
                calls.push(call);
            }
        }
        Ok(calls)
    }

    async fn unregister_session(&self, tracking_session: &str) -> Result<(), StoreError> {
        validate_session(tracking_session)?;

        let removed: i64 = self
            .with_script_reload(move || async move {
                let mut conn = self.connection.clone();
                let sha = self.script_sha(Script::UnregisterSession, &mut conn).await?;
                self.bounded(
                    ::redis::cmd("EVALSHA")
                        .arg(&sha)
                        .arg(2)
                        .arg(self.keys.action_calls_set())
                        .arg(self.keys.data_queries_set())
                        .arg(self.keys.model_types_base())
                        .arg(self.keys.action_call_session_prefix(tracking_session))
                        .arg(self.keys.data_query_session_prefix(tracking_session))
                        .arg(self.keys.action_call_refs_session_prefix(tracking_session))
                        .arg(self.keys.data_query_refs_session_prefix(tracking_session))
                        .query_async(&mut conn),
                )
                .await
            })
            .await?;

        debug!(session = tracking_session, removed, "Unregistered session");
        Ok(())
    }
}

/// Run one Redis operation under `limit`
pub(crate) async fn bounded<T, F>(limit: Duration, operation: F) -> Result<T, StoreError>
where
    F: Future<Output = RedisResult<T>>,
{
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result.map_err(|err| StoreError::from_redis(err, limit)),
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}

/// Value of `field` in an `INFO` reply
fn info_field<'a>(info: &'a str, field: &str) -> Option<&'a str> {
    info.lines()
        .filter_map(|line| line.trim().split_once(':'))
        .find(|(key, _)| *key == field)
        .map(|(_, value)| value.trim())
}
