//! Per-type behaviour of boxed host values: equality, copying, sequence
//! operations, indexed access, display and collector marking.
//!
//! A [`TypeOp`] describes one such behaviour for a host type `T`. It is
//! turned into a runtime hook either while a type is built
//! ([`UserTypeBuilder::op`](crate::UserTypeBuilder::op)) or afterwards with
//! [`add_op`](crate::usertype::add_op), which replaces any earlier hook for
//! the same [`Op`].
//!
//! ```
//! # use schemebind::prelude::*;
//! # fn main() -> BindResult<()> {
//! #[derive(Clone, Default, PartialEq)]
//! struct Bag(Vec<i64>);
//! impl UserType for Bag {}
//!
//! let scheme = Scheme::new();
//! scheme.make_usertype::<Bag>("bag").default_constructor().build()?;
//! scheme.add_op::<Bag>(TypeOp::length(|b: &Bag| b.0.len()))?;
//! scheme.add_op::<Bag>(TypeOp::copy())?;
//! # Ok(())
//! # }
//! ```

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use schemebind_runtime::ctype::TransformHook;
use schemebind_runtime::{Hook, Marker, Runtime, Signal, Value};

use crate::convert::{FromValue, IntoValue};
use crate::error::{BindError, BindResult};
use crate::user_data::{Payload, UserType, borrow_error, box_value, is_instance, payload};

/// The behaviour a [`TypeOp`] installs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    /// `equal?`
    Equal,
    /// `equivalent?`
    Equivalent,
    /// `copy`
    Copy,
    /// `fill!`
    Fill,
    /// `reverse`
    Reverse,
    /// `length`
    Length,
    /// `object->string`
    ToString,
    /// `object->list`
    ToList,
    /// Applying an instance to an index.
    Ref,
    /// `object-set!`
    Set,
    /// Reporting held runtime values to the collector.
    Mark,
}

impl Op {
    pub fn name(self) -> &'static str {
        match self {
            Op::Equal => "equal",
            Op::Equivalent => "equivalent",
            Op::Copy => "copy",
            Op::Fill => "fill",
            Op::Reverse => "reverse",
            Op::Length => "length",
            Op::ToString => "to-string",
            Op::ToList => "to-list",
            Op::Ref => "ref",
            Op::Set => "set",
            Op::Mark => "mark",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

type MakeHook = Box<dyn FnOnce(&str) -> Hook>;

/// One behaviour of host type `T`, not yet bound to a runtime.
///
/// Errors raised inside the hook name the registered type, e.g.
/// `"matrix ref"`, as their caller.
#[must_use = "a type op does nothing until it is added to a type"]
pub struct TypeOp<T> {
    op: Op,
    make: MakeHook,
    _marker: PhantomData<fn(T)>,
}

impl<T> fmt::Debug for TypeOp<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeOp").field("op", &self.op).finish_non_exhaustive()
    }
}

impl<T: UserType> TypeOp<T> {
    fn new(op: Op, make: impl FnOnce(&str) -> Hook + 'static) -> Self {
        Self {
            op,
            make: Box::new(make),
            _marker: PhantomData,
        }
    }

    pub fn op(&self) -> Op {
        self.op
    }

    pub(crate) fn into_hook(self, type_name: &str) -> Hook {
        (self.make)(type_name)
    }

    /// `equal?` compares instances with `T::eq`.
    ///
    /// Identical objects are equal without borrowing; a right-hand value of
    /// another type is unequal.
    pub fn equal() -> Self
    where
        T: PartialEq,
    {
        Self::new(Op::Equal, |_| {
            Hook::Equal(Rc::new(|rt: &Runtime, a: Value, b: Value| {
                compare_with::<T>(rt, a, b, &|x: &T, y: &T| x == y)
            }))
        })
    }

    /// `equivalent?` compares instances with `eq`, which may be looser than
    /// `T::eq`.
    pub fn equivalent(eq: impl Fn(&T, &T) -> bool + 'static) -> Self {
        Self::new(Op::Equivalent, move |_| {
            Hook::Equivalent(Rc::new(move |rt: &Runtime, a: Value, b: Value| {
                compare_with::<T>(rt, a, b, &eq)
            }))
        })
    }

    /// `copy` boxes a clone of the instance.
    pub fn copy() -> Self
    where
        T: Clone,
    {
        Self::transform(Op::Copy, T::clone)
    }

    /// `reverse` boxes the instance produced by `rev`.
    pub fn reverse(rev: impl Fn(&T) -> T + 'static) -> Self {
        Self::transform(Op::Reverse, rev)
    }

    fn transform(op: Op, f: impl Fn(&T) -> T + 'static) -> Self {
        Self::new(op, move |name| {
            let caller = format!("{name} {}", op.name());
            let hook: TransformHook = Rc::new(move |rt: &Runtime, object: Value| {
                with_host::<T, _>(rt, object, |host| f(host))
                    .and_then(|made| box_value(rt, made))
                    .map_err(|err| err.with_caller(&caller).into_signal(rt))
            });
            match op {
                Op::Reverse => Hook::Reverse(hook),
                _ => Hook::Copy(hook),
            }
        })
    }

    /// `fill!` stores a converted value into every slot of the instance.
    /// The fill value is argument 2 in `WrongType` reports.
    pub fn fill<V, F>(fill: F) -> Self
    where
        V: FromValue + 'static,
        F: Fn(&mut T, V) -> BindResult<()> + 'static,
    {
        Self::new(Op::Fill, move |name| {
            let caller = format!("{name} fill");
            Hook::Fill(Rc::new(move |rt: &Runtime, object: Value, item: Value| {
                fill_host::<T, V>(rt, object, item, &fill)
                    .map_err(|err| err.with_caller(&caller).into_signal(rt))
            }))
        })
    }

    /// `length` reports `len(&T)`.
    pub fn length(len: impl Fn(&T) -> usize + 'static) -> Self {
        Self::new(Op::Length, move |name| {
            let caller = format!("{name} length");
            Hook::Length(Rc::new(move |rt: &Runtime, object: Value| {
                with_host::<T, _>(rt, object, |host| len(host))
                    .and_then(|n| n.into_value(rt))
                    .map_err(|err| err.with_caller(&caller).into_signal(rt))
            }))
        })
    }

    /// Rendering used by `object->string`.
    pub fn display(show: impl Fn(&T) -> String + 'static) -> Self {
        Self::new(Op::ToString, move |_| {
            Hook::ToString(Rc::new(move |rt: &Runtime, object: Value| {
                with_host::<T, _>(rt, object, |host| show(host)).map_err(|err| err.into_signal(rt))
            }))
        })
    }

    /// `object->list` converts each element produced by `items`.
    pub fn to_list<V, F>(items: F) -> Self
    where
        V: IntoValue + 'static,
        F: Fn(&T) -> Vec<V> + 'static,
    {
        Self::new(Op::ToList, move |name| {
            let caller = format!("{name} to-list");
            Hook::ToList(Rc::new(move |rt: &Runtime, object: Value| {
                with_host::<T, _>(rt, object, |host| items(host))
                    .and_then(|items| {
                        let values = items
                            .into_iter()
                            .map(|item| item.into_value(rt))
                            .collect::<BindResult<Vec<_>>>()?;
                        Ok(rt.list(&values))
                    })
                    .map_err(|err| err.with_caller(&caller).into_signal(rt))
            }))
        })
    }

    /// Applying an instance to one index calls `get`. The index is
    /// argument 1 in `WrongType` reports.
    pub fn index_ref<I, V, G>(get: G) -> Self
    where
        I: FromValue + 'static,
        V: IntoValue + 'static,
        G: Fn(&T, I) -> BindResult<V> + 'static,
    {
        Self::new(Op::Ref, move |name| {
            let caller = format!("{name} ref");
            Hook::Ref(Rc::new(move |rt: &Runtime, object: Value, args: Value| {
                index_get::<T, I, V>(rt, object, args, &get)
                    .map_err(|err| err.with_caller(&caller).into_signal(rt))
            }))
        })
    }

    /// `object-set!` with one index calls `set`. The index is argument 1
    /// and the new value argument 2 in `WrongType` reports.
    pub fn index_set<I, V, S>(set: S) -> Self
    where
        I: FromValue + 'static,
        V: FromValue + 'static,
        S: Fn(&mut T, I, V) -> BindResult<()> + 'static,
    {
        Self::new(Op::Set, move |name| {
            let caller = format!("{name} set");
            Hook::Set(Rc::new(move |rt: &Runtime, object: Value, args: Value| {
                index_set::<T, I, V>(rt, object, args, &set)
                    .map_err(|err| err.with_caller(&caller).into_signal(rt))
            }))
        })
    }

    /// Reports the runtime values a boxed `T` holds, so the collector keeps
    /// them alive while the object is reachable.
    pub fn mark(mark: impl Fn(&T, &mut Marker) + 'static) -> Self {
        let mark: MarkFn<T> = Rc::new(mark);
        Self::new(Op::Mark, move |_| mark_hook(Some(mark)))
    }
}

// ============================================================================
// Hook bodies
// ============================================================================

pub(crate) type MarkFn<T> = Rc<dyn Fn(&T, &mut Marker)>;

pub(crate) fn mark_hook<T: UserType>(mark: Option<MarkFn<T>>) -> Hook {
    Hook::GcMark(Rc::new(move |boxed: &dyn Any, marker: &mut Marker| {
        let (Some(mark), Some(payload)) = (&mark, boxed.downcast_ref::<Payload<T>>()) else {
            return;
        };
        // Skipped while a method holds the value mutably.
        if let Ok(host) = payload.try_borrow() {
            mark(&host, marker);
        }
    }))
}

fn with_host<T: UserType, R>(rt: &Runtime, object: Value, f: impl FnOnce(&T) -> R) -> BindResult<R> {
    let cell = payload::<T>(rt, object)?;
    let host = cell.try_borrow().map_err(|_| borrow_error::<T>())?;
    Ok(f(&host))
}

fn compare_with<T: UserType>(
    rt: &Runtime,
    a: Value,
    b: Value,
    eq: &dyn Fn(&T, &T) -> bool,
) -> Result<bool, Signal> {
    if a == b {
        return Ok(true);
    }
    if !is_instance::<T>(rt, b) {
        return Ok(false);
    }
    instances_match::<T>(rt, a, b, eq).map_err(|err| err.into_signal(rt))
}

fn instances_match<T: UserType>(
    rt: &Runtime,
    a: Value,
    b: Value,
    eq: &dyn Fn(&T, &T) -> bool,
) -> BindResult<bool> {
    let lhs = payload::<T>(rt, a)?;
    let rhs = payload::<T>(rt, b)?;
    if Rc::ptr_eq(&lhs, &rhs) {
        return Ok(true);
    }
    let lhs = lhs.try_borrow().map_err(|_| borrow_error::<T>())?;
    let rhs = rhs.try_borrow().map_err(|_| borrow_error::<T>())?;
    Ok(eq(&lhs, &rhs))
}

fn checked_arg<A: FromValue>(rt: &Runtime, value: Value, position: usize) -> BindResult<A> {
    if !A::is(rt, value) {
        return Err(BindError::wrong_type(rt, value, A::param_type().name(rt)).at(position));
    }
    A::to(rt, value).map_err(|err| err.at(position))
}

fn fill_host<T, V>(
    rt: &Runtime,
    object: Value,
    item: Value,
    fill: &impl Fn(&mut T, V) -> BindResult<()>,
) -> BindResult<Value>
where
    T: UserType,
    V: FromValue,
{
    let converted = checked_arg::<V>(rt, item, 2)?;
    let cell = payload::<T>(rt, object)?;
    let mut host = cell.try_borrow_mut().map_err(|_| borrow_error::<T>())?;
    fill(&mut host, converted)?;
    Ok(item)
}

fn index_get<T, I, V>(
    rt: &Runtime,
    object: Value,
    args: Value,
    get: &impl Fn(&T, I) -> BindResult<V>,
) -> BindResult<Value>
where
    T: UserType,
    I: FromValue,
    V: IntoValue,
{
    let values = rt.list_to_vec(args);
    let &[index] = values.as_slice() else {
        return Err(BindError::WrongArgsNumber {
            args,
            count: values.len(),
            caller: String::new(),
        });
    };
    let index = checked_arg::<I>(rt, index, 1)?;
    let cell = payload::<T>(rt, object)?;
    let result = {
        let host = cell.try_borrow().map_err(|_| borrow_error::<T>())?;
        get(&host, index)?
    };
    result.into_value(rt)
}

fn index_set<T, I, V>(
    rt: &Runtime,
    object: Value,
    args: Value,
    set: &impl Fn(&mut T, I, V) -> BindResult<()>,
) -> BindResult<Value>
where
    T: UserType,
    I: FromValue,
    V: FromValue,
{
    let values = rt.list_to_vec(args);
    let &[index, value] = values.as_slice() else {
        return Err(BindError::WrongArgsNumber {
            args,
            count: values.len(),
            caller: String::new(),
        });
    };
    let index = checked_arg::<I>(rt, index, 1)?;
    let new_value = checked_arg::<V>(rt, value, 2)?;
    let cell = payload::<T>(rt, object)?;
    let mut host = cell.try_borrow_mut().map_err(|_| borrow_error::<T>())?;
    set(&mut host, index, new_value)?;
    Ok(value)
}
