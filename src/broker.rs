//! Application entry point for invoking actions

use crate::action::{downcast_result, ActionValue};
use crate::descriptor::DescriptorValue;
use crate::error::ActionError;
use crate::executor::ActionExecutor;
use crate::store::validate_session;
use std::any::Any;
use tracing::info;

/// Invokes actions on behalf of callers, optionally tracking them in a session
#[derive(Debug, Clone)]
pub struct ActionBroker {
    executor: ActionExecutor,
}

impl ActionBroker {
    pub fn new(executor: ActionExecutor) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &ActionExecutor {
        &self.executor
    }

    /// Invoke without tracking
    pub async fn invoke_action(
        &self,
        name: &str,
        descriptor: Option<DescriptorValue>,
    ) -> Result<ActionValue, ActionError> {
        self.executor.invoke_root_action(name, descriptor, None).await
    }

    pub async fn invoke_action_as<T: Any>(
        &self,
        name: &str,
        descriptor: Option<DescriptorValue>,
    ) -> Result<T, ActionError> {
        let value = self.invoke_action(name, descriptor).await?;
        downcast_result(name, value)
    }

    /// Invoke and record the call under `tracking_session`
    pub async fn invoke_and_track_action(
        &self,
        tracking_session: &str,
        name: &str,
        descriptor: Option<DescriptorValue>,
    ) -> Result<ActionValue, ActionError> {
        self.executor
            .invoke_root_action(name, descriptor, Some(tracking_session))
            .await
    }

    pub async fn invoke_and_track_action_as<T: Any>(
        &self,
        tracking_session: &str,
        name: &str,
        descriptor: Option<DescriptorValue>,
    ) -> Result<T, ActionError> {
        let value = self
            .invoke_and_track_action(tracking_session, name, descriptor)
            .await?;
        downcast_result(name, value)
    }

    /// Forget every tracked call of a session, e.g. when its client disconnects
    pub async fn unregister_session(&self, tracking_session: &str) -> Result<(), ActionError> {
        validate_session(tracking_session)
            .map_err(|_| ActionError::InvalidSession(tracking_session.to_string()))?;
        self.executor
            .store()
            .unregister_session(tracking_session)
            .await?;
        info!(session = tracking_session, "Unregistered tracking session");
        Ok(())
    }
}
