//! Filter parameter values and the coercion rules applied to them.
//!
//! Parameters are a closed set of scalar kinds so they serialize as plain JSON values.
//! A value read back from a store may use a different numeric encoding than the one it
//! was registered with (`42` vs `42.0`), so every numeric conversion goes through
//! [`FilterArg::from_param`], which accepts any encoding that represents the value exactly
//! in the target type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single filter parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterParam {
    Int(i64),
    /// Unsigned values above `i64::MAX`
    UInt(u64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl FilterParam {
    /// Name of the stored variant, used in error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            FilterParam::Int(_) => "integer",
            FilterParam::UInt(_) => "unsigned integer",
            FilterParam::Float(_) => "float",
            FilterParam::Bool(_) => "bool",
            FilterParam::Str(_) => "string",
        }
    }
}

impl fmt::Display for FilterParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterParam::Int(v) => write!(f, "{}", v),
            FilterParam::UInt(v) => write!(f, "{}", v),
            FilterParam::Float(v) => write!(f, "{}", v),
            FilterParam::Bool(v) => write!(f, "{}", v),
            FilterParam::Str(v) => f.write_str(v),
        }
    }
}

/// Declared type of a filter parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Bool,
    String,
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamKind::I8 => "i8",
            ParamKind::I16 => "i16",
            ParamKind::I32 => "i32",
            ParamKind::I64 => "i64",
            ParamKind::U8 => "u8",
            ParamKind::U16 => "u16",
            ParamKind::U32 => "u32",
            ParamKind::U64 => "u64",
            ParamKind::F32 => "f32",
            ParamKind::F64 => "f64",
            ParamKind::Bool => "bool",
            ParamKind::String => "string",
        };
        f.write_str(name)
    }
}

/// A Rust type usable as a filter parameter
pub trait FilterArg: Sized + 'static {
    const KIND: ParamKind;

    /// Convert a stored value into this type, `None` if it cannot be represented exactly
    fn from_param(param: &FilterParam) -> Option<Self>;
}

/// Smallest power of two above `$ty::MAX`
///
/// `MAX as f64` rounds up to this value for 64-bit types, so it cannot be an inclusive bound.
macro_rules! exclusive_max {
    ($ty:ty) => {
        2f64.powi((<$ty>::BITS - (<$ty>::MIN != 0) as u32) as i32)
    };
}

macro_rules! integer_arg {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl FilterArg for $ty {
                const KIND: ParamKind = ParamKind::$kind;

                fn from_param(param: &FilterParam) -> Option<Self> {
                    match param {
                        FilterParam::Int(v) => <$ty>::try_from(*v).ok(),
                        FilterParam::UInt(v) => <$ty>::try_from(*v).ok(),
                        FilterParam::Float(v) => integral_float(*v, <$ty>::MIN as f64, exclusive_max!($ty))
                            .map(|v| v as $ty),
                        _ => None,
                    }
                }
            }

            impl From<$ty> for FilterParam {
                fn from(value: $ty) -> Self {
                    match i64::try_from(value) {
                        Ok(v) => FilterParam::Int(v),
                        #[allow(unreachable_patterns)]
                        Err(_) => FilterParam::UInt(value as u64),
                    }
                }
            }
        )*
    };
}

integer_arg! {
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
}

/// Accept a float for an integer parameter only when it is finite, integral and in range
fn integral_float(value: f64, min: f64, max_exclusive: f64) -> Option<f64> {
    if value.is_finite() && value.fract() == 0.0 && value >= min && value < max_exclusive {
        Some(value)
    } else {
        None
    }
}

impl FilterArg for f64 {
    const KIND: ParamKind = ParamKind::F64;

    fn from_param(param: &FilterParam) -> Option<Self> {
        match param {
            FilterParam::Int(v) => Some(*v as f64),
            FilterParam::UInt(v) => Some(*v as f64),
            FilterParam::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl FilterArg for f32 {
    const KIND: ParamKind = ParamKind::F32;

    fn from_param(param: &FilterParam) -> Option<Self> {
        match param {
            FilterParam::Int(v) => Some(*v as f32),
            FilterParam::UInt(v) => Some(*v as f32),
            FilterParam::Float(v) if v.is_nan() || v.abs() <= f32::MAX as f64 => Some(*v as f32),
            _ => None,
        }
    }
}

impl FilterArg for bool {
    const KIND: ParamKind = ParamKind::Bool;

    fn from_param(param: &FilterParam) -> Option<Self> {
        match param {
            FilterParam::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl FilterArg for String {
    const KIND: ParamKind = ParamKind::String;

    fn from_param(param: &FilterParam) -> Option<Self> {
        match param {
            FilterParam::Str(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl From<f64> for FilterParam {
    fn from(value: f64) -> Self {
        FilterParam::Float(value)
    }
}

impl From<f32> for FilterParam {
    fn from(value: f32) -> Self {
        FilterParam::Float(value as f64)
    }
}

impl From<bool> for FilterParam {
    fn from(value: bool) -> Self {
        FilterParam::Bool(value)
    }
}

impl From<String> for FilterParam {
    fn from(value: String) -> Self {
        FilterParam::Str(value)
    }
}

impl From<&str> for FilterParam {
    fn from(value: &str) -> Self {
        FilterParam::Str(value.to_string())
    }
}

impl From<&String> for FilterParam {
    fn from(value: &String) -> Self {
        FilterParam::Str(value.clone())
    }
}

/// Check a value against a declared kind without converting it
pub fn accepts_kind(kind: ParamKind, param: &FilterParam) -> bool {
    match kind {
        ParamKind::I8 => i8::from_param(param).is_some(),
        ParamKind::I16 => i16::from_param(param).is_some(),
        ParamKind::I32 => i32::from_param(param).is_some(),
        ParamKind::I64 => i64::from_param(param).is_some(),
        ParamKind::U8 => u8::from_param(param).is_some(),
        ParamKind::U16 => u16::from_param(param).is_some(),
        ParamKind::U32 => u32::from_param(param).is_some(),
        ParamKind::U64 => u64::from_param(param).is_some(),
        ParamKind::F32 => f32::from_param(param).is_some(),
        ParamKind::F64 => f64::from_param(param).is_some(),
        ParamKind::Bool => matches!(param, FilterParam::Bool(_)),
        ParamKind::String => matches!(param, FilterParam::Str(_)),
    }
}

/// Build a `Vec<FilterParam>` from heterogeneous values
///
/// ```
/// use reactive_actions::{filter_params, filter::FilterParam};
/// let params = filter_params![42, "cookie", true];
/// assert_eq!(params[1], FilterParam::Str("cookie".to_string()));
/// ```
#[macro_export]
macro_rules! filter_params {
    () => {
        ::std::vec::Vec::<$crate::filter::FilterParam>::new()
    };
    ($($value:expr),+ $(,)?) => {
        ::std::vec![$($crate::filter::FilterParam::from($value)),+]
    };
}
