//! Error types for the reactive action engine.

use crate::filter::ParamKind;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while checking or evaluating a model filter
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FilterError {
    #[error("Model filter '{filter}' filters {expected} and cannot be applied to {actual}")]
    IncompatibleModel {
        filter: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Model filter '{filter}' expects {expected} parameters, got {actual}")]
    ParameterCount {
        filter: String,
        expected: usize,
        actual: usize,
    },

    #[error("Model filter '{filter}' expects {expected} for parameter {index}, got {actual}")]
    ParameterKind {
        filter: String,
        index: usize,
        expected: ParamKind,
        actual: &'static str,
    },
}

/// Tracking session store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Unsupported store topology: {0}")]
    UnsupportedTopology(String),

    #[error("Invalid key component: {0}")]
    InvalidKey(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Redis error: {0}")]
    Redis(redis::RedisError),
}

impl StoreError {
    /// Classify an error of a Redis operation bounded by `limit`
    pub(crate) fn from_redis(err: redis::RedisError, limit: Duration) -> Self {
        if err.is_timeout() {
            StoreError::Timeout(limit)
        } else {
            StoreError::from(err)
        }
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
            StoreError::Unavailable(err.to_string())
        } else {
            StoreError::Redis(err)
        }
    }
}

/// Errors surfaced by action invocation, registration and update propagation
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("Action not found: {0}")]
    ActionNotFound(String),

    #[error("Model filter not found: {0}")]
    FilterNotFound(String),

    #[error("Action '{0}' is not reactive and cannot be tracked")]
    NotReactive(String),

    #[error("Action '{action}' cannot register data queries: only reactive actions may")]
    RegistrationNotAllowed { action: String },

    #[error("Model filter '{filter}' does not accept parameters [{params}]")]
    ParametersRejected { filter: String, params: String },

    #[error("Model filter '{filter}' does not match the query result")]
    FilterMismatch { filter: String },

    #[error("Invalid descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("Invalid action '{name}': {reason}")]
    InvalidAction { name: String, reason: String },

    #[error("A {kind} with the name '{name}' is already registered")]
    DuplicateRegistration { kind: &'static str, name: String },

    #[error("Invalid tracking session '{0}': must be non-empty and must not contain ':'")]
    InvalidSession(String),

    #[error("Execution tree of action '{0}' has already been persisted")]
    ContextSealed(String),

    #[error("Action '{action}' did not return a {expected}")]
    ResultType {
        action: String,
        expected: &'static str,
    },

    #[error("A model update requires an updated or an old model")]
    MissingModel,

    #[error("Filter error: {0}")]
    Filter(#[from] FilterError),

    #[error("Storing tracked call of action '{action}' in session '{session}' failed: {source}")]
    Tracking {
        action: String,
        session: String,
        #[source]
        source: StoreError,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("{failed} update notification(s) failed, first: {first}")]
    Notification {
        failed: usize,
        first: Box<ActionError>,
    },

    #[error("Update handler failed: {0}")]
    Handler(String),

    #[error("Action execution failed: {0}")]
    Execution(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<config::ConfigError> for ActionError {
    fn from(err: config::ConfigError) -> Self {
        ActionError::ConfigError(err.to_string())
    }
}
