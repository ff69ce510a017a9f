//! Configuration System
//!
//! Layered configuration: built-in defaults, then an optional TOML file, then
//! `REACTIVE_ACTIONS__*` environment variables (`__` separates nested keys, e.g.
//! `REACTIVE_ACTIONS__STORE__BACKEND=redis`).

use crate::error::StoreError;
use crate::logging::LoggingConfig;
use crate::store::{
    InMemoryTrackingSessionStore, RedisStoreOptions, RedisTrackingSessionStore,
    TrackingSessionStore,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReactiveConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub executor: ExecutorConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which tracking session store to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Only read when `backend = "redis"`
    #[serde(default)]
    pub redis: RedisConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Namespace of all keys written by the store
    #[serde(default = "default_redis_prefix")]
    pub prefix: String,

    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,

    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
}

pub(crate) fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

pub(crate) fn default_redis_prefix() -> String {
    "reactive-actions".to_string()
}

pub(crate) fn default_connection_timeout_ms() -> u64 {
    5_000
}

pub(crate) fn default_command_timeout_ms() -> u64 {
    2_000
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            prefix: default_redis_prefix(),
            connection_timeout_ms: default_connection_timeout_ms(),
            command_timeout_ms: default_command_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Check that tracked filters match the query results they are registered for
    #[serde(default = "default_verify_tracked_results")]
    pub verify_tracked_results: bool,
}

pub(crate) fn default_verify_tracked_results() -> bool {
    cfg!(debug_assertions)
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            verify_tracked_results: default_verify_tracked_results(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Store(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Store(msg) => write!(f, "Store: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl RedisConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.url.starts_with("redis://")
            || self.url.starts_with("rediss://")
            || self.url.starts_with("redis+unix://")
            || self.url.starts_with("unix://"))
        {
            return Err(format!("Invalid Redis URL: {}", self.url));
        }
        if self.prefix.is_empty() {
            return Err("Key prefix cannot be empty".to_string());
        }
        if self.connection_timeout_ms == 0 || self.command_timeout_ms == 0 {
            return Err("Timeouts must be greater than zero".to_string());
        }
        Ok(())
    }

    pub fn options(&self) -> RedisStoreOptions {
        RedisStoreOptions {
            prefix: self.prefix.clone(),
            connection_timeout: Duration::from_millis(self.connection_timeout_ms),
            command_timeout: Duration::from_millis(self.command_timeout_ms),
        }
    }
}

impl StoreConfig {
    /// Open the configured store
    pub async fn open(&self) -> Result<Arc<dyn TrackingSessionStore>, StoreError> {
        match self.backend {
            StoreBackend::Memory => {
                info!("Using in-memory tracking session store");
                Ok(Arc::new(InMemoryTrackingSessionStore::new()))
            }
            StoreBackend::Redis => {
                let store =
                    RedisTrackingSessionStore::connect(&self.redis.url, self.redis.options()).await?;
                Ok(Arc::new(store))
            }
        }
    }
}

impl ReactiveConfig {
    /// Validate the entire configuration, reporting every problem
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.store.backend == StoreBackend::Redis {
            if let Err(e) = self.store.redis.validate() {
                errors.push(ValidationError::Store(e));
            }
        }
        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
