//! Model types the engine can track
//!
//! A model is any application entity whose reads are tracked through model filters and
//! whose writes are reported through `publish_model_update`. The engine only borrows
//! model values for the duration of one call; it never stores them.

use std::any::{Any, TypeId};

/// An application entity that can be filtered and published
///
/// `MODEL_TYPE` is the stable name under which data queries for this type are indexed
/// in the tracking store, so it must not change between deployments sharing a store.
///
/// A model that embeds another model and wants filters declared on the embedded type to
/// apply to it overrides both [`Model::extends`] and [`Model::view_as`].
pub trait Model: Any + Send + Sync + Sized {
    const MODEL_TYPE: &'static str;

    /// Whether values of this type can be viewed as the model identified by `model`
    fn extends(model: TypeId) -> bool {
        model == TypeId::of::<Self>()
    }

    /// This value viewed as the model identified by `model`
    fn view_as(&self, model: TypeId) -> Option<&dyn Any> {
        if model == TypeId::of::<Self>() {
            Some(self)
        } else {
            None
        }
    }
}

/// Before/after snapshots handed to item-changed notifications
///
/// Both sides are optional: a created entity has no `before`, a deleted one no `after`.
#[derive(Clone, Copy)]
pub struct ModelChange<'a> {
    model_type: &'static str,
    before: Option<&'a (dyn Any + Send + Sync)>,
    after: Option<&'a (dyn Any + Send + Sync)>,
}

impl<'a> ModelChange<'a> {
    pub fn new<M: Model>(before: Option<&'a M>, after: Option<&'a M>) -> Self {
        Self {
            model_type: M::MODEL_TYPE,
            before: before.map(|m| m as &(dyn Any + Send + Sync)),
            after: after.map(|m| m as &(dyn Any + Send + Sync)),
        }
    }

    pub fn model_type(&self) -> &'static str {
        self.model_type
    }

    /// The entity before the update, if it existed and is an `M`
    pub fn before<M: Model>(&self) -> Option<&'a M> {
        self.before.and_then(|m| m.downcast_ref::<M>())
    }

    /// The entity after the update, if it still exists and is an `M`
    pub fn after<M: Model>(&self) -> Option<&'a M> {
        self.after.and_then(|m| m.downcast_ref::<M>())
    }
}

impl std::fmt::Debug for ModelChange<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelChange")
            .field("model_type", &self.model_type)
            .field("has_before", &self.before.is_some())
            .field("has_after", &self.after.is_some())
            .finish()
    }
}
