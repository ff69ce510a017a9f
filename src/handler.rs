//! Sinks for "this tracked result may have changed" notifications

use crate::action::Action;
use crate::descriptor::DescriptorValue;
use crate::error::ActionError;
use crate::model::ModelChange;
use async_trait::async_trait;

/// Receives invalidations for tracked action calls
///
/// Delivery is per tracking session; forwarding the notification to whoever owns the
/// session is up to the implementation.
#[async_trait]
pub trait ActionResultUpdateHandler: Send + Sync {
    /// The whole result of a tracked call may have changed
    async fn on_result_changed(
        &self,
        tracking_session: &str,
        action: &Action,
        descriptor: Option<&DescriptorValue>,
    ) -> Result<(), ActionError>;

    /// One item of a tracked collection result was created, changed or deleted
    async fn on_result_item_changed(
        &self,
        tracking_session: &str,
        action: &Action,
        descriptor: Option<&DescriptorValue>,
        change: &ModelChange<'_>,
    ) -> Result<(), ActionError>;
}
