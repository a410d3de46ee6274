//! Conversions between host values and runtime values.
//!
//! - [`FromValue`]: the `is`/`to` pair for a host type
//! - [`IntoValue`]: the `from` direction
//!
//! ## Supported types
//!
//! - Integers: `i8`, `i16`, `i32`, `i64`, `u8`, `u16`, `u32`, `u64`, `usize`
//! - Reals: `f32`, `f64` (integers are accepted wherever a real is)
//! - `bool`, `char`, `String` (and `&str` on the way out)
//! - Vectors: `Vec<Value>`, `Vec<i64>`, `Vec<i32>`, `Vec<f64>`, `Vec<f32>`, `Vec<u8>`
//! - `Value` itself, `()` for "no value", `BindResult<T>` for fallible returns
//! - Opaque types through [`UserType`](crate::UserType) and [`Obj`](crate::Obj)
//!
//! Narrowing conversions check their range and report `OutOfRange` instead
//! of truncating.
//!
//! ## Example
//!
//! ```
//! use schemebind::{FromValue, IntoValue, Runtime};
//!
//! let rt = Runtime::new();
//! let v = 42i32.into_value(&rt).unwrap();
//! assert!(i32::is(&rt, v));
//! assert_eq!(i32::to(&rt, v).unwrap(), 42);
//!
//! let big = rt.make_integer(300);
//! assert!(u8::to(&rt, big).is_err());
//! ```

use schemebind_runtime::{Kind, Runtime, Value};

use crate::error::{BindError, BindResult};
use crate::signature::TypeDesc;

/// A host type that can be read out of a runtime value.
pub trait FromValue: Sized {
    /// The type's description in signatures and diagnostics.
    fn param_type() -> TypeDesc;

    /// Whether `value` has the runtime kind this type maps to. Total over
    /// every value.
    fn is(rt: &Runtime, value: Value) -> bool;

    /// Extracts the host value.
    ///
    /// Returns `WrongType` when [`FromValue::is`] does not hold and
    /// `OutOfRange` when a narrowing conversion loses the value.
    fn to(rt: &Runtime, value: Value) -> BindResult<Self>;
}

/// A host type that can be turned into a runtime value.
pub trait IntoValue {
    fn return_type() -> TypeDesc;

    fn into_value(self, rt: &Runtime) -> BindResult<Value>;
}

/// A host integer too wide for the runtime. The offending value is carried
/// as its decimal text, since no runtime integer can hold it.
fn overflow(rt: &Runtime, value: impl std::fmt::Display) -> BindError {
    BindError::out_of_range(
        rt.make_string(&value.to_string()),
        format!("an integer between {} and {}", i64::MIN, i64::MAX),
    )
}

// ============================================================================
// Runtime values
// ============================================================================

impl FromValue for Value {
    fn param_type() -> TypeDesc {
        TypeDesc::Any
    }

    fn is(_rt: &Runtime, _value: Value) -> bool {
        true
    }

    fn to(_rt: &Runtime, value: Value) -> BindResult<Self> {
        Ok(value)
    }
}

impl IntoValue for Value {
    fn return_type() -> TypeDesc {
        TypeDesc::Any
    }

    fn into_value(self, _rt: &Runtime) -> BindResult<Value> {
        Ok(self)
    }
}

impl IntoValue for () {
    fn return_type() -> TypeDesc {
        TypeDesc::Unspecified
    }

    fn into_value(self, rt: &Runtime) -> BindResult<Value> {
        Ok(rt.unspecified())
    }
}

impl<T: IntoValue> IntoValue for BindResult<T> {
    fn return_type() -> TypeDesc {
        T::return_type()
    }

    fn into_value(self, rt: &Runtime) -> BindResult<Value> {
        self?.into_value(rt)
    }
}

// ============================================================================
// Integers
// ============================================================================

macro_rules! impl_integer {
    ($($ty:ty),*) => {
        $(
            impl FromValue for $ty {
                fn param_type() -> TypeDesc {
                    TypeDesc::Kind(Kind::Integer)
                }

                fn is(rt: &Runtime, value: Value) -> bool {
                    rt.is_integer(value)
                }

                fn to(rt: &Runtime, value: Value) -> BindResult<Self> {
                    let n = rt
                        .integer(value)
                        .ok_or_else(|| BindError::wrong_type(rt, value, "integer"))?;
                    <$ty>::try_from(n).map_err(|_| {
                        BindError::out_of_range(
                            value,
                            format!(
                                "an integer between {} and {}",
                                <$ty>::MIN,
                                <$ty>::MAX
                            ),
                        )
                    })
                }
            }

            impl IntoValue for $ty {
                fn return_type() -> TypeDesc {
                    TypeDesc::Kind(Kind::Integer)
                }

                #[allow(clippy::unnecessary_fallible_conversions)]
                fn into_value(self, rt: &Runtime) -> BindResult<Value> {
                    let n = i64::try_from(self).map_err(|_| overflow(rt, self))?;
                    Ok(rt.make_integer(n))
                }
            }
        )*
    };
}

impl_integer!(i8, i16, i32, i64, u8, u16, u32, u64, usize);

// ============================================================================
// Reals
// ============================================================================

impl FromValue for f64 {
    fn param_type() -> TypeDesc {
        TypeDesc::Kind(Kind::Real)
    }

    fn is(rt: &Runtime, value: Value) -> bool {
        rt.is_real(value)
    }

    fn to(rt: &Runtime, value: Value) -> BindResult<Self> {
        rt.real(value)
            .ok_or_else(|| BindError::wrong_type(rt, value, "real"))
    }
}

impl IntoValue for f64 {
    fn return_type() -> TypeDesc {
        TypeDesc::Kind(Kind::Real)
    }

    fn into_value(self, rt: &Runtime) -> BindResult<Value> {
        Ok(rt.make_real(self))
    }
}

impl FromValue for f32 {
    fn param_type() -> TypeDesc {
        TypeDesc::Kind(Kind::Real)
    }

    fn is(rt: &Runtime, value: Value) -> bool {
        rt.is_real(value)
    }

    fn to(rt: &Runtime, value: Value) -> BindResult<Self> {
        let x = f64::to(rt, value)?;
        let narrowed = x as f32;
        if x.is_finite() && narrowed.is_infinite() {
            return Err(BindError::out_of_range(value, "a real within f32 range"));
        }
        Ok(narrowed)
    }
}

impl IntoValue for f32 {
    fn return_type() -> TypeDesc {
        TypeDesc::Kind(Kind::Real)
    }

    fn into_value(self, rt: &Runtime) -> BindResult<Value> {
        Ok(rt.make_real(f64::from(self)))
    }
}

// ============================================================================
// Booleans, characters and strings
// ============================================================================

impl FromValue for bool {
    fn param_type() -> TypeDesc {
        TypeDesc::Kind(Kind::Boolean)
    }

    fn is(rt: &Runtime, value: Value) -> bool {
        rt.is_boolean(value)
    }

    fn to(rt: &Runtime, value: Value) -> BindResult<Self> {
        if !rt.is_boolean(value) {
            return Err(BindError::wrong_type(rt, value, "boolean"));
        }
        Ok(rt.boolean(value))
    }
}

impl IntoValue for bool {
    fn return_type() -> TypeDesc {
        TypeDesc::Kind(Kind::Boolean)
    }

    fn into_value(self, rt: &Runtime) -> BindResult<Value> {
        Ok(rt.make_boolean(self))
    }
}

impl FromValue for char {
    fn param_type() -> TypeDesc {
        TypeDesc::Kind(Kind::Character)
    }

    fn is(rt: &Runtime, value: Value) -> bool {
        rt.is_character(value)
    }

    fn to(rt: &Runtime, value: Value) -> BindResult<Self> {
        rt.character(value)
            .ok_or_else(|| BindError::wrong_type(rt, value, "character"))
    }
}

impl IntoValue for char {
    fn return_type() -> TypeDesc {
        TypeDesc::Kind(Kind::Character)
    }

    fn into_value(self, rt: &Runtime) -> BindResult<Value> {
        Ok(rt.make_character(self))
    }
}

impl FromValue for String {
    fn param_type() -> TypeDesc {
        TypeDesc::Kind(Kind::String)
    }

    fn is(rt: &Runtime, value: Value) -> bool {
        rt.is_string(value)
    }

    fn to(rt: &Runtime, value: Value) -> BindResult<Self> {
        rt.string(value)
            .map(|s| s.to_string())
            .ok_or_else(|| BindError::wrong_type(rt, value, "string"))
    }
}

impl IntoValue for String {
    fn return_type() -> TypeDesc {
        TypeDesc::Kind(Kind::String)
    }

    fn into_value(self, rt: &Runtime) -> BindResult<Value> {
        Ok(rt.make_string(&self))
    }
}

impl IntoValue for &str {
    fn return_type() -> TypeDesc {
        TypeDesc::Kind(Kind::String)
    }

    fn into_value(self, rt: &Runtime) -> BindResult<Value> {
        Ok(rt.make_string(self))
    }
}

// ============================================================================
// Vectors
// ============================================================================

impl FromValue for Vec<Value> {
    fn param_type() -> TypeDesc {
        TypeDesc::Kind(Kind::Vector)
    }

    fn is(rt: &Runtime, value: Value) -> bool {
        rt.is_vector(value)
    }

    fn to(rt: &Runtime, value: Value) -> BindResult<Self> {
        rt.vector_elements(value)
            .ok_or_else(|| BindError::wrong_type(rt, value, "vector"))
    }
}

impl IntoValue for Vec<Value> {
    fn return_type() -> TypeDesc {
        TypeDesc::Kind(Kind::Vector)
    }

    fn into_value(self, rt: &Runtime) -> BindResult<Value> {
        Ok(rt.make_vector(self))
    }
}

macro_rules! impl_homogeneous_vector {
    ($elem:ty, $kind:expr, $name:literal, $is:ident, $get:ident, $make:ident, $wide:ty) => {
        impl FromValue for Vec<$elem> {
            fn param_type() -> TypeDesc {
                TypeDesc::Kind($kind)
            }

            fn is(rt: &Runtime, value: Value) -> bool {
                rt.$is(value)
            }

            fn to(rt: &Runtime, value: Value) -> BindResult<Self> {
                let items = rt
                    .$get(value)
                    .ok_or_else(|| BindError::wrong_type(rt, value, $name))?;
                items
                    .into_iter()
                    .map(|item| {
                        narrow::<$wide, $elem>(item).ok_or_else(|| {
                            BindError::out_of_range(
                                value,
                                concat!("elements that fit in ", stringify!($elem)),
                            )
                        })
                    })
                    .collect()
            }
        }

        impl IntoValue for Vec<$elem> {
            fn return_type() -> TypeDesc {
                TypeDesc::Kind($kind)
            }

            fn into_value(self, rt: &Runtime) -> BindResult<Value> {
                Ok(rt.$make(self.into_iter().map(<$wide>::from).collect()))
            }
        }
    };
}

/// Element conversion for homogeneous vectors.
trait Narrow<T> {
    fn narrow(self) -> Option<T>;
}

impl Narrow<i64> for i64 {
    fn narrow(self) -> Option<i64> {
        Some(self)
    }
}

impl Narrow<i32> for i64 {
    fn narrow(self) -> Option<i32> {
        i32::try_from(self).ok()
    }
}

impl Narrow<f64> for f64 {
    fn narrow(self) -> Option<f64> {
        Some(self)
    }
}

impl Narrow<f32> for f64 {
    fn narrow(self) -> Option<f32> {
        let narrowed = self as f32;
        (!self.is_finite() || narrowed.is_finite()).then_some(narrowed)
    }
}

impl Narrow<u8> for u8 {
    fn narrow(self) -> Option<u8> {
        Some(self)
    }
}

fn narrow<W: Narrow<T>, T>(wide: W) -> Option<T> {
    wide.narrow()
}

impl_homogeneous_vector!(i64, Kind::IntVector, "int-vector", is_int_vector, int_vector_elements, make_int_vector, i64);
impl_homogeneous_vector!(i32, Kind::IntVector, "int-vector", is_int_vector, int_vector_elements, make_int_vector, i64);
impl_homogeneous_vector!(f64, Kind::FloatVector, "float-vector", is_float_vector, float_vector_elements, make_float_vector, f64);
impl_homogeneous_vector!(f32, Kind::FloatVector, "float-vector", is_float_vector, float_vector_elements, make_float_vector, f64);
impl_homogeneous_vector!(u8, Kind::ByteVector, "byte-vector", is_byte_vector, byte_vector_elements, make_byte_vector, u8);
