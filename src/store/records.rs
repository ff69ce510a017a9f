//! Persisted tracking records

use crate::descriptor::DescriptorValue;
use crate::filter::{FilterParam, ParameterizedModelFilter};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Suffix of action-call ids for calls without a descriptor
pub const NO_DESCRIPTOR: &str = "%";

/// One tracked (session, action, descriptor) invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionCall {
    pub tracking_session: String,
    pub id: String,
    pub action_name: String,
    pub descriptor_type_name: Option<String>,
    pub descriptor: Option<DescriptorValue>,
}

impl ActionCall {
    pub fn new(
        tracking_session: impl Into<String>,
        action_name: impl Into<String>,
        descriptor: Option<DescriptorValue>,
    ) -> Self {
        let action_name = action_name.into();
        Self {
            tracking_session: tracking_session.into(),
            id: Self::id_for(&action_name, descriptor.as_ref()),
            action_name,
            descriptor_type_name: descriptor.as_ref().map(|d| d.type_name().to_string()),
            descriptor,
        }
    }

    /// `{action}:{descriptorType}:{combinedIdentifier}`, or `{action}:%` without descriptor
    pub fn id_for(action_name: &str, descriptor: Option<&DescriptorValue>) -> String {
        match descriptor {
            Some(d) => format!("{}:{}:{}", action_name, d.type_name(), d.combined_identifier()),
            None => format!("{}:{}", action_name, NO_DESCRIPTOR),
        }
    }
}

/// Link from a data query to an action call that depends on it
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActionCallReference {
    pub action_call_id: String,
    /// Registered on the call's root node rather than in a nested call
    pub direct: bool,
}

impl ActionCallReference {
    pub fn new(action_call_id: impl Into<String>, direct: bool) -> Self {
        Self {
            action_call_id: action_call_id.into(),
            direct,
        }
    }
}

/// A tracked (filter, parameters) pair and the calls that read it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQuery {
    pub tracking_session: String,
    pub id: String,
    pub model_type_name: String,
    pub filter_name: String,
    pub filter_params: Vec<FilterParam>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub affected_action_calls: BTreeSet<ActionCallReference>,
}

impl DataQuery {
    pub fn from_filter(
        tracking_session: &str,
        query: &ParameterizedModelFilter,
        reference: ActionCallReference,
    ) -> Self {
        Self {
            tracking_session: tracking_session.to_string(),
            id: query.identifier(),
            model_type_name: query.filter().model_type().to_string(),
            filter_name: query.filter().name().to_string(),
            filter_params: query.params().to_vec(),
            affected_action_calls: BTreeSet::from([reference]),
        }
    }

    /// Add a reference produced by the same flattening pass
    ///
    /// Direct and indirect references to one call collapse into the indirect one.
    pub fn merge_reference(&mut self, reference: ActionCallReference) {
        let counterpart = ActionCallReference::new(reference.action_call_id.clone(), !reference.direct);
        if self.affected_action_calls.contains(&counterpart) {
            if reference.direct {
                return;
            }
            self.affected_action_calls.remove(&counterpart);
        }
        self.affected_action_calls.insert(reference);
    }

    /// Drop every reference to `action_call_id`
    pub fn remove_references_to(&mut self, action_call_id: &str) {
        self.affected_action_calls
            .retain(|r| r.action_call_id != action_call_id);
    }

    /// Same record without references
    pub fn without_references(&self) -> Self {
        Self {
            affected_action_calls: BTreeSet::new(),
            ..self.clone()
        }
    }
}
