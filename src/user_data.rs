//! Opaque host types stored inside runtime values.
//!
//! A type implementing [`UserType`] can be registered with
//! [`Scheme::make_usertype`](crate::Scheme::make_usertype) and then crosses
//! the boundary like any primitive:
//!
//! - `T::into_value` boxes the value in a new c-object of T's type tag
//! - `T::to` clones the boxed value back out (requires `T: Clone`)
//! - [`Obj<T>`] borrows the boxed value in place, for methods that mutate it
//!
//! # Ownership
//!
//! The boxed value lives in an `Rc<RefCell<T>>` owned by the runtime
//! collector. When the collector finds the object unreachable, T's free
//! hook drops the runtime's reference. An [`Obj<T>`] held by host code keeps
//! the host value alive past that point, but not the runtime object: hold a
//! protected root for that.
//!
//! # Example
//!
//! ```
//! # use schemebind::prelude::*;
//! # fn main() -> BindResult<()> {
//! #[derive(Clone, PartialEq)]
//! struct Point { x: f64, y: f64 }
//! impl UserType for Point {}
//!
//! let scheme = Scheme::new();
//! scheme.make_usertype::<Point>("point").equality().build()?;
//! let v = scheme.from(Point { x: 1.0, y: 2.0 })?;
//! let p: Obj<Point> = scheme.to(v)?;
//! p.borrow_mut().x = 3.0;
//! assert_eq!(scheme.to::<Point>(v)?.x, 3.0);
//! # Ok(())
//! # }
//! ```

use std::any::type_name;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use schemebind_runtime::{Runtime, Value};

use crate::convert::{FromValue, IntoValue};
use crate::error::{BindError, BindResult};
use crate::registry::BindState;
use crate::signature::TypeDesc;

/// Marker for host types exposed to the runtime as opaque values.
pub trait UserType: 'static {}

/// Storage of a boxed host value inside a c-object.
pub(crate) type Payload<T> = Rc<RefCell<T>>;

/// Condition kind for a boxed value already borrowed mutably.
pub const BORROW_ERROR: &str = "borrow-error";

/// A handle to a boxed host value, borrowed in place.
pub struct Obj<T> {
    value: Value,
    cell: Payload<T>,
}

impl<T: UserType> Obj<T> {
    /// The runtime object wrapping the value.
    pub fn value(&self) -> Value {
        self.value
    }

    /// Borrows the boxed value.
    ///
    /// # Panics
    ///
    /// Panics if the value is currently borrowed mutably.
    pub fn borrow(&self) -> Ref<'_, T> {
        self.cell.borrow()
    }

    /// Mutably borrows the boxed value.
    ///
    /// # Panics
    ///
    /// Panics if the value is currently borrowed.
    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.cell.borrow_mut()
    }

    pub fn try_borrow(&self) -> BindResult<Ref<'_, T>> {
        self.cell.try_borrow().map_err(|_| borrow_error::<T>())
    }

    pub fn try_borrow_mut(&self) -> BindResult<RefMut<'_, T>> {
        self.cell.try_borrow_mut().map_err(|_| borrow_error::<T>())
    }

    /// Whether both handles box the same host value.
    pub fn ptr_eq(&self, other: &Obj<T>) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }
}

impl<T> Clone for Obj<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value,
            cell: self.cell.clone(),
        }
    }
}

impl<T> fmt::Debug for Obj<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Obj")
            .field("type", &type_name::<T>())
            .field("value", &self.value)
            .finish()
    }
}

pub(crate) fn borrow_error<T>() -> BindError {
    BindError::custom(
        BORROW_ERROR,
        format!("{} is already borrowed mutably", type_name::<T>()),
    )
}

// ============================================================================
// Boxing
// ============================================================================

/// Whether `value` is a c-object of T's registered tag.
pub(crate) fn is_instance<T: UserType>(rt: &Runtime, value: Value) -> bool {
    let Some(tag) = rt.c_object_type(value) else {
        return false;
    };
    BindState::of(rt).tag::<T>().is_ok_and(|expected| expected == tag)
}

/// The boxed payload of `value`, checked against T's tag.
pub(crate) fn payload<T: UserType>(rt: &Runtime, value: Value) -> BindResult<Payload<T>> {
    let expected = BindState::of(rt).tag::<T>()?;
    if rt.c_object_type(value) != Some(expected) {
        let name = TypeDesc::opaque::<T>().name(rt);
        return Err(BindError::wrong_type(rt, value, name));
    }
    rt.with_c_object(value, |any| any.downcast_ref::<Payload<T>>().cloned())
        .flatten()
        .ok_or_else(|| BindError::wrong_type(rt, value, type_name::<T>()))
}

/// Boxes `host` in a new c-object and attaches T's capability environment.
pub(crate) fn box_value<T: UserType>(rt: &Runtime, host: T) -> BindResult<Value> {
    let entry = BindState::of(rt).entry::<T>()?;
    let payload: Payload<T> = Rc::new(RefCell::new(host));
    let object = rt.make_c_object(entry.tag, Box::new(payload));
    rt.c_object_set_let(object, entry.env);
    Ok(object)
}

impl<T: UserType + Clone> FromValue for T {
    fn param_type() -> TypeDesc {
        TypeDesc::opaque::<T>()
    }

    fn is(rt: &Runtime, value: Value) -> bool {
        is_instance::<T>(rt, value)
    }

    fn to(rt: &Runtime, value: Value) -> BindResult<Self> {
        let cell = payload::<T>(rt, value)?;
        let host = cell.try_borrow().map_err(|_| borrow_error::<T>())?.clone();
        Ok(host)
    }
}

impl<T: UserType> IntoValue for T {
    fn return_type() -> TypeDesc {
        TypeDesc::opaque::<T>()
    }

    fn into_value(self, rt: &Runtime) -> BindResult<Value> {
        box_value(rt, self)
    }
}

impl<T: UserType> FromValue for Obj<T> {
    fn param_type() -> TypeDesc {
        TypeDesc::opaque::<T>()
    }

    fn is(rt: &Runtime, value: Value) -> bool {
        is_instance::<T>(rt, value)
    }

    fn to(rt: &Runtime, value: Value) -> BindResult<Self> {
        Ok(Obj {
            value,
            cell: payload::<T>(rt, value)?,
        })
    }
}

impl<T: UserType> IntoValue for Obj<T> {
    fn return_type() -> TypeDesc {
        TypeDesc::opaque::<T>()
    }

    fn into_value(self, _rt: &Runtime) -> BindResult<Value> {
        Ok(self.value)
    }
}
