//! Named, dynamically invokable model predicates

use crate::error::FilterError;
use crate::filter::param::{accepts_kind, FilterArg, FilterParam, ParamKind};
use crate::model::Model;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// A predicate over a model plus a fixed list of typed parameters
///
/// Implemented for every `Fn(&M, A1, .., An) -> bool` with up to six parameters whose
/// types implement [`FilterArg`]. `Args` only disambiguates the arities.
pub trait FilterFn<M, Args>: Send + Sync + 'static {
    /// Declared kinds of the parameters after the entity
    fn param_kinds() -> Vec<ParamKind>;

    /// Convert `params` and invoke the predicate
    fn call(&self, filter: &str, entity: &M, params: &[FilterParam]) -> Result<bool, FilterError>;
}

macro_rules! impl_filter_fn {
    ($($arg:ident),*) => {
        impl<M, F, $($arg,)*> FilterFn<M, ($($arg,)*)> for F
        where
            M: 'static,
            F: Fn(&M, $($arg),*) -> bool + Send + Sync + 'static,
            $($arg: FilterArg,)*
        {
            fn param_kinds() -> Vec<ParamKind> {
                vec![$($arg::KIND),*]
            }

            #[allow(non_snake_case, unused_variables, unused_mut)]
            fn call(&self, filter: &str, entity: &M, params: &[FilterParam]) -> Result<bool, FilterError> {
                let expected = Self::param_kinds().len();
                if params.len() != expected {
                    return Err(FilterError::ParameterCount {
                        filter: filter.to_string(),
                        expected,
                        actual: params.len(),
                    });
                }
                let mut values = params.iter().enumerate();
                $(
                    let $arg = {
                        let (index, value) = values.next().ok_or(FilterError::ParameterCount {
                            filter: filter.to_string(),
                            expected,
                            actual: params.len(),
                        })?;
                        $arg::from_param(value).ok_or_else(|| FilterError::ParameterKind {
                            filter: filter.to_string(),
                            index,
                            expected: $arg::KIND,
                            actual: value.kind_name(),
                        })?
                    };
                )*
                Ok(self(entity, $($arg),*))
            }
        }
    };
}

impl_filter_fn!();
impl_filter_fn!(A1);
impl_filter_fn!(A1, A2);
impl_filter_fn!(A1, A2, A3);
impl_filter_fn!(A1, A2, A3, A4);
impl_filter_fn!(A1, A2, A3, A4, A5);
impl_filter_fn!(A1, A2, A3, A4, A5, A6);

type Predicate =
    Arc<dyn Fn(&str, &dyn Any, &[FilterParam]) -> Result<bool, FilterError> + Send + Sync>;

/// A named predicate bound to one model type
///
/// The name is the durable identity of the filter: it is persisted with every data query
/// and used to look the filter up again when a model update is published, possibly by a
/// different process.
#[derive(Clone)]
pub struct ModelFilter {
    name: String,
    model_type: &'static str,
    model_type_id: TypeId,
    param_kinds: Vec<ParamKind>,
    predicate: Predicate,
}

impl ModelFilter {
    /// Wrap a typed predicate under `name`
    pub fn new<M, Args, F>(name: impl Into<String>, filter: F) -> Self
    where
        M: Model,
        F: FilterFn<M, Args>,
    {
        let predicate: Predicate = Arc::new(move |name: &str, entity: &dyn Any, params: &[FilterParam]| {
            let entity = entity
                .downcast_ref::<M>()
                .ok_or_else(|| FilterError::IncompatibleModel {
                    filter: name.to_string(),
                    expected: M::MODEL_TYPE,
                    actual: "a value of another type",
                })?;
            filter.call(name, entity, params)
        });

        Self {
            name: name.into(),
            model_type: M::MODEL_TYPE,
            model_type_id: TypeId::of::<M>(),
            param_kinds: F::param_kinds(),
            predicate,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stable name of the model type this filter was declared for
    pub fn model_type(&self) -> &'static str {
        self.model_type
    }

    pub fn param_kinds(&self) -> &[ParamKind] {
        &self.param_kinds
    }

    /// Whether entities of type `T` can be passed to [`ModelFilter::matches`]
    pub fn can_filter_model_type<T: Model>(&self) -> bool {
        T::extends(self.model_type_id)
    }

    /// Whether `params` can be converted to this filter's parameter list
    pub fn accepts_parameters(&self, params: &[FilterParam]) -> bool {
        params.len() == self.param_kinds.len()
            && self
                .param_kinds
                .iter()
                .zip(params)
                .all(|(kind, param)| accepts_kind(*kind, param))
    }

    /// Evaluate the filter against `entity`
    pub fn matches<T: Model>(&self, entity: &T, params: &[FilterParam]) -> Result<bool, FilterError> {
        let view = entity
            .view_as(self.model_type_id)
            .filter(|_| self.can_filter_model_type::<T>())
            .ok_or_else(|| FilterError::IncompatibleModel {
                filter: self.name.clone(),
                expected: self.model_type,
                actual: T::MODEL_TYPE,
            })?;
        (self.predicate)(&self.name, view, params)
    }
}

impl fmt::Debug for ModelFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelFilter")
            .field("name", &self.name)
            .field("model_type", &self.model_type)
            .field("param_kinds", &self.param_kinds)
            .finish()
    }
}
