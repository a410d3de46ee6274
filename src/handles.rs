//! Typed handles over runtime lists, procedures, environments and values.
//!
//! Handles are thin wrappers around a [`Value`]. They do not root the value:
//! protect it if it must survive a collection.

use schemebind_runtime::{Arity, Kind, Runtime, Value};

use crate::convert::{FromValue, IntoValue};
use crate::error::{BindError, BindResult};
use crate::signature::TypeDesc;

macro_rules! impl_handle {
    ($handle:ident, $kind:expr, $name:literal, $is:ident) => {
        impl $handle {
            /// Wraps `value` without checking its kind.
            pub fn from_raw(value: Value) -> Self {
                Self(value)
            }

            pub fn value(self) -> Value {
                self.0
            }
        }

        impl FromValue for $handle {
            fn param_type() -> TypeDesc {
                TypeDesc::Kind($kind)
            }

            fn is(rt: &Runtime, value: Value) -> bool {
                rt.$is(value)
            }

            fn to(rt: &Runtime, value: Value) -> BindResult<Self> {
                if rt.$is(value) {
                    Ok(Self(value))
                } else {
                    Err(BindError::wrong_type(rt, value, $name))
                }
            }
        }

        impl IntoValue for $handle {
            fn return_type() -> TypeDesc {
                TypeDesc::Kind($kind)
            }

            fn into_value(self, _rt: &Runtime) -> BindResult<Value> {
                Ok(self.0)
            }
        }
    };
}

// ============================================================================
// Arguments
// ============================================================================

/// Host values usable as an argument list.
pub trait IntoArgs {
    fn into_args(self, rt: &Runtime) -> BindResult<Vec<Value>>;
}

impl IntoArgs for Vec<Value> {
    fn into_args(self, _rt: &Runtime) -> BindResult<Vec<Value>> {
        Ok(self)
    }
}

impl IntoArgs for &[Value] {
    fn into_args(self, _rt: &Runtime) -> BindResult<Vec<Value>> {
        Ok(self.to_vec())
    }
}

impl<const N: usize> IntoArgs for [Value; N] {
    fn into_args(self, _rt: &Runtime) -> BindResult<Vec<Value>> {
        Ok(self.to_vec())
    }
}

impl IntoArgs for List {
    fn into_args(self, rt: &Runtime) -> BindResult<Vec<Value>> {
        Ok(rt.list_to_vec(self.0))
    }
}

macro_rules! impl_into_args_tuple {
    ($($arg:ident),*) => {
        impl<$($arg: IntoValue),*> IntoArgs for ($($arg,)*) {
            #[allow(non_snake_case, unused_variables)]
            fn into_args(self, rt: &Runtime) -> BindResult<Vec<Value>> {
                let ($($arg,)*) = self;
                Ok(vec![$($arg.into_value(rt)?),*])
            }
        }
    };
}

impl_into_args_tuple!();
impl_into_args_tuple!(A);
impl_into_args_tuple!(A, B);
impl_into_args_tuple!(A, B, C);
impl_into_args_tuple!(A, B, C, D);
impl_into_args_tuple!(A, B, C, D, E);
impl_into_args_tuple!(A, B, C, D, E, F);
impl_into_args_tuple!(A, B, C, D, E, F, G);
impl_into_args_tuple!(A, B, C, D, E, F, G, H);

// ============================================================================
// List
// ============================================================================

/// A proper list (nil or a chain of pairs).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct List(Value);

impl_handle!(List, Kind::Pair, "list", is_list);

impl List {
    pub fn new(rt: &Runtime, items: &[Value]) -> Self {
        Self(rt.list(items))
    }

    pub fn car(self, rt: &Runtime) -> Option<Value> {
        rt.car(self.0)
    }

    /// The rest of the list; nil stays nil.
    pub fn cdr(self, rt: &Runtime) -> List {
        List(rt.cdr(self.0).unwrap_or_else(|| rt.nil()))
    }

    pub fn get(self, rt: &Runtime, index: usize) -> Option<Value> {
        rt.list_ref(self.0, index)
    }

    /// Element `index` converted to `T`.
    pub fn get_as<T: FromValue>(self, rt: &Runtime, index: usize) -> BindResult<T> {
        let value = self
            .get(rt, index)
            .ok_or_else(|| BindError::out_of_range(self.0, format!("a list with more than {index} elements")))?;
        T::to(rt, value).map_err(|err| err.at(index + 1))
    }

    pub fn len(self, rt: &Runtime) -> usize {
        rt.list_length(self.0).unwrap_or(0)
    }

    pub fn is_empty(self, rt: &Runtime) -> bool {
        rt.is_null(self.0)
    }

    /// Pops the first element.
    pub fn advance(&mut self, rt: &Runtime) -> Option<Value> {
        let car = rt.car(self.0)?;
        self.0 = rt.cdr(self.0)?;
        Some(car)
    }

    pub fn iter(self, rt: &Runtime) -> ListIter<'_> {
        ListIter { rt, cursor: self }
    }

    pub fn to_vec(self, rt: &Runtime) -> Vec<Value> {
        rt.list_to_vec(self.0)
    }
}

pub struct ListIter<'rt> {
    rt: &'rt Runtime,
    cursor: List,
}

impl Iterator for ListIter<'_> {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        self.cursor.advance(self.rt)
    }
}

// ============================================================================
// Function
// ============================================================================

/// A runtime procedure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Function(Value);

impl_handle!(Function, Kind::Procedure, "procedure", is_procedure);

impl Function {
    pub fn call(self, rt: &Runtime, args: impl IntoArgs) -> BindResult<Value> {
        let args = args.into_args(rt)?;
        Ok(rt.call(self.0, &args)?)
    }

    pub fn apply(self, rt: &Runtime, args: List) -> BindResult<Value> {
        Ok(rt.apply(self.0, args.value())?)
    }

    pub fn name(self, rt: &Runtime) -> Option<String> {
        rt.procedure_name(self.0).map(|name| name.to_string())
    }

    pub fn arity(self, rt: &Runtime) -> Option<Arity> {
        rt.procedure_arity(self.0)
    }

    pub fn signature(self, rt: &Runtime) -> Option<Value> {
        rt.procedure_signature(self.0)
    }

    pub fn documentation(self, rt: &Runtime) -> Option<String> {
        rt.documentation(self.0).map(|doc| doc.to_string())
    }

    /// The setter attached by a property binding.
    pub fn setter(self, rt: &Runtime) -> Option<Function> {
        rt.setter(self.0).map(Function)
    }
}

// ============================================================================
// Let
// ============================================================================

/// A runtime environment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Let(Value);

impl_handle!(Let, Kind::Let, "let", is_let);

impl Let {
    pub fn new(rt: &Runtime) -> Self {
        Self(rt.inlet())
    }

    pub fn root(rt: &Runtime) -> Self {
        Self(rt.rootlet())
    }

    pub fn define(self, rt: &Runtime, name: &str, value: impl IntoValue, doc: &str) -> BindResult<()> {
        let sym = rt.make_symbol(name);
        let value = value.into_value(rt)?;
        rt.define(self.0, sym, value)?;
        rt.set_documentation(sym, doc);
        Ok(())
    }

    /// Defines `name` and forbids later assignment.
    pub fn define_const(self, rt: &Runtime, name: &str, value: impl IntoValue, doc: &str) -> BindResult<()> {
        self.define(rt, name, value, doc)?;
        rt.set_immutable(self.0, rt.make_symbol(name));
        Ok(())
    }

    /// The binding of `name`, or `None` when it is unbound.
    pub fn get_raw(self, rt: &Runtime, name: &str) -> Option<Value> {
        let value = rt.let_ref(self.0, rt.make_symbol(name));
        (value != rt.undefined()).then_some(value)
    }

    pub fn get<T: FromValue>(self, rt: &Runtime, name: &str) -> BindResult<T> {
        let value = rt.let_ref(self.0, rt.make_symbol(name));
        T::to(rt, value).map_err(|err| err.with_caller(name))
    }

    pub fn get_opt<T: FromValue>(self, rt: &Runtime, name: &str) -> Option<T> {
        let value = self.get_raw(rt, name)?;
        if T::is(rt, value) { T::to(rt, value).ok() } else { None }
    }

    pub fn set(self, rt: &Runtime, name: &str, value: impl IntoValue) -> BindResult<()> {
        let value = value.into_value(rt)?;
        rt.let_set(self.0, rt.make_symbol(name), value)?;
        Ok(())
    }

    /// A handle on `name`, defining it as nil first if it is unbound.
    pub fn var<'rt>(self, rt: &'rt Runtime, name: &str) -> BindResult<Variable<'rt>> {
        let sym = rt.make_symbol(name);
        if rt.let_ref(self.0, sym) == rt.undefined() {
            rt.define(self.0, sym, rt.nil())?;
        }
        Ok(Variable { rt, env: self.0, sym })
    }

    /// Own bindings as `(symbol . value)` pairs.
    pub fn to_list(self, rt: &Runtime) -> List {
        List(rt.let_to_list(self.0))
    }
}

/// A named binding in an environment.
pub struct Variable<'rt> {
    rt: &'rt Runtime,
    env: Value,
    sym: Value,
}

impl Variable<'_> {
    pub fn raw(&self) -> Value {
        self.rt.let_ref(self.env, self.sym)
    }

    pub fn get<T: FromValue>(&self) -> BindResult<T> {
        T::to(self.rt, self.raw())
    }

    pub fn get_opt<T: FromValue>(&self) -> Option<T> {
        let value = self.raw();
        if T::is(self.rt, value) { T::to(self.rt, value).ok() } else { None }
    }

    pub fn set(&self, value: impl IntoValue) -> BindResult<()> {
        let value = value.into_value(self.rt)?;
        self.rt.let_set(self.env, self.sym, value)?;
        Ok(())
    }

    pub fn name(&self) -> String {
        self.rt
            .symbol_name(self.sym)
            .map(|name| name.to_string())
            .unwrap_or_default()
    }
}

// ============================================================================
// Values
// ============================================================================

/// Multiple return values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Values(Value);

impl_handle!(Values, Kind::Values, "values", is_values);

impl Values {
    pub fn new(rt: &Runtime, args: impl IntoArgs) -> BindResult<Self> {
        Ok(Self(rt.make_values(args.into_args(rt)?)))
    }

    pub fn to_vec(self, rt: &Runtime) -> Vec<Value> {
        rt.values_elements(self.0).unwrap_or_default()
    }
}
