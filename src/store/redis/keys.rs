//! Redis key layout
//!
//! ```text
//! {prefix}:action-calls                         set of all action call keys
//! {prefix}:action-calls:{session}:{id}          action call JSON
//! {prefix}:action-call-refs:{session}:{id}      data query keys referencing the call
//! {prefix}:data-queries                         set of all data query keys
//! {prefix}:data-queries:{session}:{id}          data query JSON without references
//! {prefix}:data-query-refs:{session}:{id}       serialized action call references
//! {prefix}:model-types:{model}                  data query keys of one model type
//! ```
//!
//! Ids may contain ':' (string filter parameters, descriptor identifiers), so reference
//! sets live in namespaces of their own rather than under a suffix of their owner's key.

#[derive(Debug, Clone)]
pub struct RedisKeys {
    prefix: String,
}

impl RedisKeys {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn action_calls_set(&self) -> String {
        format!("{}:action-calls", self.prefix)
    }

    pub fn action_call(&self, session: &str, id: &str) -> String {
        format!("{}:action-calls:{}:{}", self.prefix, session, id)
    }

    pub fn action_call_session_prefix(&self, session: &str) -> String {
        format!("{}:action-calls:{}:", self.prefix, session)
    }

    /// Prefix shared by all call keys of one action, action names never contain ':'
    pub fn action_calls_for_action_prefix(&self, session: &str, action_name: &str) -> String {
        format!("{}:action-calls:{}:{}:", self.prefix, session, action_name)
    }

    pub fn action_call_refs(&self, session: &str, id: &str) -> String {
        format!("{}:action-call-refs:{}:{}", self.prefix, session, id)
    }

    pub fn action_call_refs_session_prefix(&self, session: &str) -> String {
        format!("{}:action-call-refs:{}:", self.prefix, session)
    }

    pub fn data_queries_set(&self) -> String {
        format!("{}:data-queries", self.prefix)
    }

    pub fn data_queries_base(&self) -> String {
        format!("{}:data-queries:", self.prefix)
    }

    pub fn data_query(&self, session: &str, id: &str) -> String {
        format!("{}{}:{}", self.data_queries_base(), session, id)
    }

    pub fn data_query_session_prefix(&self, session: &str) -> String {
        format!("{}{}:", self.data_queries_base(), session)
    }

    /// Data query ids start with `{model}:`
    pub fn data_queries_for_model_prefix(&self, session: &str, model_type_name: &str) -> String {
        format!("{}{}:{}:", self.data_queries_base(), session, model_type_name)
    }

    pub fn data_query_refs_base(&self) -> String {
        format!("{}:data-query-refs:", self.prefix)
    }

    pub fn data_query_refs(&self, session: &str, id: &str) -> String {
        format!("{}{}:{}", self.data_query_refs_base(), session, id)
    }

    pub fn data_query_refs_session_prefix(&self, session: &str) -> String {
        format!("{}{}:", self.data_query_refs_base(), session)
    }

    /// Reference set of a data query given its full key
    pub fn data_query_refs_of(&self, query_key: &str) -> Option<String> {
        query_key
            .strip_prefix(&self.data_queries_base())
            .map(|rest| format!("{}{}", self.data_query_refs_base(), rest))
    }

    pub fn model_types_base(&self) -> String {
        format!("{}:model-types", self.prefix)
    }

    pub fn model_type(&self, model_type_name: &str) -> String {
        format!("{}:model-types:{}", self.prefix, model_type_name)
    }
}
