//! A model filter bound to concrete parameter values

use crate::filter::model_filter::ModelFilter;
use crate::filter::param::FilterParam;
use crate::model::Model;
use crate::error::FilterError;
use std::sync::Arc;

/// A model filter together with the parameters it will be evaluated with
///
/// The [`identifier`](Self::identifier) names the data query this pair represents inside a
/// tracking session.
#[derive(Debug, Clone)]
pub struct ParameterizedModelFilter {
    filter: Arc<ModelFilter>,
    params: Vec<FilterParam>,
}

impl ParameterizedModelFilter {
    pub fn new(filter: Arc<ModelFilter>, params: Vec<FilterParam>) -> Self {
        Self { filter, params }
    }

    pub fn filter(&self) -> &Arc<ModelFilter> {
        &self.filter
    }

    pub fn params(&self) -> &[FilterParam] {
        &self.params
    }

    /// `{modelType}:{filterName}` followed by `:{param}` for every parameter
    pub fn identifier(&self) -> String {
        let mut id = format!("{}:{}", self.filter.model_type(), self.filter.name());
        for param in &self.params {
            id.push(':');
            id.push_str(&param.to_string());
        }
        id
    }

    pub fn accepts_parameters(&self) -> bool {
        self.filter.accepts_parameters(&self.params)
    }

    pub fn matches<T: Model>(&self, entity: &T) -> Result<bool, FilterError> {
        self.filter.matches(entity, &self.params)
    }
}
