//! Model filters: named predicates that describe which entities a reactive action read

pub mod model_filter;
pub mod parameterized;
pub mod param;

pub use model_filter::{FilterFn, ModelFilter};
pub use param::{accepts_kind, FilterArg, FilterParam, ParamKind};
pub use parameterized::ParameterizedModelFilter;
