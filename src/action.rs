//! Registered actions
//!
//! An action is a named async body `(ExecutionContext, Option<DescriptorValue>) -> T`.
//! Its invocation type decides whether it may register data queries and how update
//! notifications for its tracked calls are routed.

use crate::context::ExecutionContext;
use crate::descriptor::DescriptorValue;
use crate::error::ActionError;
use crate::model::Model;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::any::{Any, TypeId};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Type-erased action result
pub type ActionValue = Box<dyn Any + Send>;

type ActionBody = Arc<
    dyn Fn(ExecutionContext, Option<DescriptorValue>) -> BoxFuture<'static, Result<ActionValue, ActionError>>
        + Send
        + Sync,
>;

/// How an action takes part in reactivity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionType {
    /// Plain action, cannot be tracked
    Default,
    /// Result depends on tracked data
    Reactive,
    /// Result is a collection of models; single items can be updated in place
    ReactiveCollection,
}

impl ActionType {
    pub fn is_reactive(self) -> bool {
        matches!(self, ActionType::Reactive | ActionType::ReactiveCollection)
    }

    pub fn is_collection(self) -> bool {
        self == ActionType::ReactiveCollection
    }
}

/// Runtime identity of a Rust type plus a readable name for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeTag {
    name: &'static str,
    type_id: TypeId,
}

impl TypeTag {
    pub fn of<T: Any>() -> Self {
        Self {
            name: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }
}

/// A registered action
#[derive(Clone)]
pub struct Action {
    name: String,
    action_type: ActionType,
    result_type: TypeTag,
    result_model: Option<TypeTag>,
    body: ActionBody,
}

impl Action {
    /// A non-reactive action
    pub fn new<T, F, Fut>(name: impl Into<String>, body: F) -> Result<Self, ActionError>
    where
        T: Send + 'static,
        F: Fn(ExecutionContext, Option<DescriptorValue>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ActionError>> + Send + 'static,
    {
        Self::with_type(name, ActionType::Default, None, body)
    }

    /// A reactive action whose result is about a single `M`
    pub fn reactive<M, T, F, Fut>(name: impl Into<String>, body: F) -> Result<Self, ActionError>
    where
        M: Model,
        T: Send + 'static,
        F: Fn(ExecutionContext, Option<DescriptorValue>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ActionError>> + Send + 'static,
    {
        Self::with_type(name, ActionType::Reactive, Some(TypeTag::of::<M>()), body)
    }

    /// A reactive action returning a collection of `M`
    pub fn reactive_collection<M, T, F, Fut>(name: impl Into<String>, body: F) -> Result<Self, ActionError>
    where
        M: Model,
        T: Send + 'static,
        F: Fn(ExecutionContext, Option<DescriptorValue>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ActionError>> + Send + 'static,
    {
        Self::with_type(
            name,
            ActionType::ReactiveCollection,
            Some(TypeTag::of::<M>()),
            body,
        )
    }

    /// Build and validate an action definition
    pub fn with_type<T, F, Fut>(
        name: impl Into<String>,
        action_type: ActionType,
        result_model: Option<TypeTag>,
        body: F,
    ) -> Result<Self, ActionError>
    where
        T: Send + 'static,
        F: Fn(ExecutionContext, Option<DescriptorValue>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ActionError>> + Send + 'static,
    {
        let name = name.into();
        let result_type = TypeTag::of::<T>();
        let invalid = |reason: &str| ActionError::InvalidAction {
            name: name.clone(),
            reason: reason.to_string(),
        };

        if name.is_empty() || name.contains(':') {
            return Err(invalid("name must be non-empty and must not contain ':'"));
        }
        match (action_type, result_model) {
            (ActionType::Default, Some(_)) => {
                return Err(invalid("only reactive actions declare a result model type"));
            }
            (ActionType::Reactive | ActionType::ReactiveCollection, None) => {
                return Err(invalid("reactive actions must declare a result model type"));
            }
            (ActionType::ReactiveCollection, Some(model)) if model == result_type => {
                return Err(invalid(
                    "reactive collection actions must return a collection, not the model itself",
                ));
            }
            _ => {}
        }

        let body: ActionBody = Arc::new(move |ctx, descriptor| {
            let fut = body(ctx, descriptor);
            async move { fut.await.map(|value| Box::new(value) as ActionValue) }.boxed()
        });

        Ok(Self {
            name,
            action_type,
            result_type,
            result_model,
            body,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn action_type(&self) -> ActionType {
        self.action_type
    }

    pub fn is_reactive(&self) -> bool {
        self.action_type.is_reactive()
    }

    pub fn result_type(&self) -> TypeTag {
        self.result_type
    }

    /// Model type the result is about, element type for collections
    pub fn result_model(&self) -> Option<TypeTag> {
        self.result_model
    }

    pub(crate) fn invoke(
        &self,
        ctx: ExecutionContext,
        descriptor: Option<DescriptorValue>,
    ) -> BoxFuture<'static, Result<ActionValue, ActionError>> {
        (self.body)(ctx, descriptor)
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.name)
            .field("action_type", &self.action_type)
            .field("result_type", &self.result_type.name())
            .field("result_model", &self.result_model.map(|m| m.name()))
            .finish()
    }
}

/// Downcast an erased result
pub(crate) fn downcast_result<T: Any>(action: &str, value: ActionValue) -> Result<T, ActionError> {
    value
        .downcast::<T>()
        .map(|value| *value)
        .map_err(|_| ActionError::ResultType {
            action: action.to_string(),
            expected: std::any::type_name::<T>(),
        })
}
