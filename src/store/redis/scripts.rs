//! Server-side scripts and their per-connection SHA cache

use super::bounded;
use crate::error::StoreError;
use ::redis::aio::ConnectionLike;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Script {
    RemoveActionCallReferences,
    RegisterDataQueryReference,
    UnregisterSession,
}

impl Script {
    pub fn name(self) -> &'static str {
        match self {
            Script::RemoveActionCallReferences => "remove_action_call_references",
            Script::RegisterDataQueryReference => "register_data_query_reference",
            Script::UnregisterSession => "unregister_session",
        }
    }

    pub fn source(self) -> &'static str {
        match self {
            Script::RemoveActionCallReferences => {
                include_str!("scripts/remove_action_call_references.lua")
            }
            Script::RegisterDataQueryReference => {
                include_str!("scripts/register_data_query_reference.lua")
            }
            Script::UnregisterSession => include_str!("scripts/unregister_session.lua"),
        }
    }
}

/// SHA1 digests of loaded scripts, keyed by script
///
/// Loading is serialized so concurrent first uses issue a single `SCRIPT LOAD`. The load
/// is bounded by the command timeout, so a stalled server cannot hold the cache lock.
#[derive(Default)]
pub struct ScriptCache {
    shas: Mutex<HashMap<Script, String>>,
}

impl ScriptCache {
    pub async fn sha<C>(&self, script: Script, conn: &mut C, limit: Duration) -> Result<String, StoreError>
    where
        C: ConnectionLike + Send,
    {
        let mut shas = self.shas.lock().await;
        if let Some(sha) = shas.get(&script) {
            return Ok(sha.clone());
        }

        let sha: String = bounded(
            limit,
            ::redis::cmd("SCRIPT")
                .arg("LOAD")
                .arg(script.source())
                .query_async(conn),
        )
        .await?;
        debug!(script = script.name(), sha = %sha, "Loaded script");
        shas.insert(script, sha.clone());
        Ok(sha)
    }

    /// Forget all digests, used after the server reports an unknown script
    pub async fn invalidate(&self) {
        self.shas.lock().await.clear();
    }
}
