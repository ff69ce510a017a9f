//! Action descriptors
//!
//! A descriptor carries the parameters that distinguish one call of an action from
//! another. The engine never looks inside it: it only needs the type name and the
//! combined identifier to derive the action-call id, and the serialized fields so the
//! handler can later tell the caller which call to refresh.

use crate::error::ActionError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A typed descriptor
pub trait ActionDescriptor: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Stable type name, part of every action-call id
    const TYPE_NAME: &'static str;

    /// Deterministic identifier of this descriptor's values
    fn combined_identifier(&self) -> String;
}

/// A descriptor with its concrete type erased
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptorValue {
    type_name: String,
    combined_identifier: String,
    fields: serde_json::Value,
}

impl DescriptorValue {
    pub fn encode<D: ActionDescriptor>(descriptor: &D) -> Result<Self, ActionError> {
        Ok(Self {
            type_name: D::TYPE_NAME.to_string(),
            combined_identifier: descriptor.combined_identifier(),
            fields: serde_json::to_value(descriptor)?,
        })
    }

    /// Decode back into `D`, failing when this value was encoded from another type
    pub fn decode<D: ActionDescriptor>(&self) -> Result<D, ActionError> {
        if self.type_name != D::TYPE_NAME {
            return Err(ActionError::InvalidDescriptor(format!(
                "expected descriptor type '{}', got '{}'",
                D::TYPE_NAME,
                self.type_name
            )));
        }
        serde_json::from_value(self.fields.clone())
            .map_err(|e| ActionError::InvalidDescriptor(format!("{}: {}", self.type_name, e)))
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn combined_identifier(&self) -> &str {
        &self.combined_identifier
    }

    pub fn fields(&self) -> &serde_json::Value {
        &self.fields
    }
}
