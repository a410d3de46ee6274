//! Lazily checked variadic tails.
//!
//! A host function whose last parameter is `VarArgs<T>` accepts any number
//! of trailing arguments. Elements are type-checked only when read, so an
//! ill-typed element the function never looks at never raises an error.
//!
//! ```
//! # use schemebind::prelude::*;
//! let scheme = Scheme::new();
//! scheme.define_function("sum", "(sum n ...) adds integers", |rest: VarArgs<i64>| {
//!     rest.iter().sum::<BindResult<i64>>()
//! });
//! assert_eq!(scheme.call_as::<i64>("sum", (1, 2, 3)).unwrap(), 6);
//! // "x" is never read, so it is never checked
//! let first = scheme.make_function("first", "", |rest: VarArgs<i64>| rest.get(0));
//! assert_eq!(scheme.to::<i64>(scheme.call_fn(first, (4, "x")).unwrap()).unwrap(), 4);
//! ```

use std::fmt;
use std::marker::PhantomData;

use schemebind_runtime::{Runtime, Value};

use crate::convert::FromValue;
use crate::error::{BindError, BindResult};
use crate::signature::TypeDesc;

/// Cursor over the trailing arguments of a call.
pub struct VarArgs<'rt, T> {
    rt: &'rt Runtime,
    list: Value,
    caller: &'rt str,
    /// 1-based call position of the cursor's first element.
    position: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for VarArgs<'_, T> {
    fn clone(&self) -> Self {
        Self { ..*self }
    }
}

impl<T> Copy for VarArgs<'_, T> {}

impl<'rt, T: FromValue> VarArgs<'rt, T> {
    /// Wraps `list`, whose first element sits at call position `position`.
    pub fn new(rt: &'rt Runtime, list: Value, caller: &'rt str, position: usize) -> Self {
        Self {
            rt,
            list,
            caller,
            position,
            _marker: PhantomData,
        }
    }

    pub fn element_type() -> TypeDesc {
        T::param_type()
    }

    /// Remaining element count.
    pub fn len(&self) -> usize {
        self.rt.list_length(self.list).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        !self.rt.is_pair(self.list)
    }

    /// Same as [`VarArgs::is_empty`].
    pub fn at_end(&self) -> bool {
        self.is_empty()
    }

    /// The first element, type-checked.
    pub fn car(&self) -> BindResult<T> {
        self.get(0)
    }

    /// Element `index`, type-checked. Only that element is inspected.
    pub fn get(&self, index: usize) -> BindResult<T> {
        let value = self.rt.list_ref(self.list, index).ok_or_else(|| {
            BindError::out_of_range(self.list, format!("at least {} trailing arguments", index + 1))
                .at(self.position + index)
                .with_caller(self.caller)
        })?;
        self.check(value, self.position + index)
    }

    /// The cursor without its first element.
    pub fn cdr(&self) -> Self {
        Self {
            list: self.rt.cdr(self.list).unwrap_or(self.list),
            position: self.position + 1,
            ..*self
        }
    }

    /// Reads the first element and moves past it. An ill-typed element
    /// leaves the cursor where it was.
    pub fn advance(&mut self) -> BindResult<T> {
        let item = self.car()?;
        *self = self.cdr();
        Ok(item)
    }

    /// The untyped remaining elements.
    pub fn raw(&self) -> Vec<Value> {
        self.rt.list_to_vec(self.list)
    }

    /// The remaining elements as a runtime list.
    pub fn list(&self) -> Value {
        self.list
    }

    pub fn iter(&self) -> Iter<'rt, T> {
        Iter { cursor: *self }
    }

    fn check(&self, value: Value, position: usize) -> BindResult<T> {
        if !T::is(self.rt, value) {
            let expected = T::param_type().name(self.rt);
            return Err(BindError::wrong_type(self.rt, value, expected)
                .at(position)
                .with_caller(self.caller));
        }
        T::to(self.rt, value).map_err(|err| err.at(position).with_caller(self.caller))
    }
}

impl<T> fmt::Debug for VarArgs<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VarArgs")
            .field("caller", &self.caller)
            .field("position", &self.position)
            .field("list", &self.list)
            .finish()
    }
}

/// Iterator over a variadic tail, checking each element as it is reached.
pub struct Iter<'rt, T> {
    cursor: VarArgs<'rt, T>,
}

impl<T: FromValue> Iterator for Iter<'_, T> {
    type Item = BindResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor.at_end() {
            return None;
        }
        let head = self.cursor;
        self.cursor = head.cdr();
        Some(head.car())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.cursor.len();
        (len, Some(len))
    }
}

impl<'rt, T: FromValue> IntoIterator for VarArgs<'rt, T> {
    type Item = BindResult<T>;
    type IntoIter = Iter<'rt, T>;

    fn into_iter(self) -> Self::IntoIter {
        Iter { cursor: self }
    }
}
