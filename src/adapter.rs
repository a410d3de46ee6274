//! Function adapters: host callables exposed as runtime procedures.
//!
//! Any `Fn` whose parameters implement [`FromValue`] and whose return type
//! implements [`IntoValue`] can be bound. Three shapes are recognised:
//!
//! - fixed: `Fn(A1, .., An) -> R`
//! - variadic: `Fn(A1, .., An, VarArgs<V>) -> R`, accepting any number of
//!   trailing `V`s
//! - runtime-aware: `Fn(&Runtime, A1, .., An) -> R`, for functions that call
//!   back into the runtime
//!
//! # Call sequence
//!
//! 1. Arity: a fixed adapter needs exactly `n` arguments (at least `n` when
//!    `strict_arity` is off), a variadic one at least `n`.
//! 2. Every fixed position is tested with its `is` predicate, left to right.
//!    The first failure is reported as `WrongType` with its 1-based position.
//! 3. Arguments are converted, the callable runs, the result is converted.
//!
//! Nothing reaches the callable unless steps 1 and 2 succeed, so a rejected
//! call has no side effects.
//!
//! # Example
//!
//! ```
//! use schemebind::{Adapter, Runtime};
//!
//! let rt = Runtime::new();
//! let add = Adapter::new("add", |a: i64, b: i64| a + b);
//! let args = rt.list(&[rt.make_integer(1), rt.make_integer(2)]);
//! let result = add.call(&rt, args).unwrap();
//! assert_eq!(rt.integer(result), Some(3));
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use schemebind_runtime::{Arity, FunctionFlags, FunctionSpec, Runtime, Value, signal};

use crate::config::FunctionOpts;
use crate::convert::{FromValue, IntoValue};
use crate::error::{BindError, BindResult};
use crate::registry::BindState;
use crate::signature::Signature;
use crate::star::StarParams;
use crate::varargs::VarArgs;

/// Kind check for one declared parameter.
pub type Predicate = fn(&Runtime, Value) -> bool;

/// Converts checked arguments, runs the callable, converts its result.
/// Receives the caller name, the fixed arguments and the variadic tail.
pub type Invoke = Rc<dyn Fn(&Runtime, &str, &[Value], Value) -> BindResult<Value>>;

/// A host callable with statically known parameter and return types.
///
/// `Marker` distinguishes the callable shapes; it is inferred and never
/// named by callers.
pub trait HostFn<Marker>: 'static {
    fn signature() -> Signature;

    fn predicates() -> Vec<Predicate>;

    fn into_invoke(self) -> Invoke;
}

/// Marker for `Fn(A1, .., An) -> R`.
pub struct Fixed<Args, Ret>(PhantomData<fn(Args) -> Ret>);

/// Marker for `Fn(A1, .., An, VarArgs<Rest>) -> R`.
pub struct Variadic<Args, Rest, Ret>(PhantomData<fn(Args, Rest) -> Ret>);

/// Marker for `Fn(&Runtime, A1, .., An) -> R`.
pub struct WithRuntime<Args, Ret>(PhantomData<fn(Args) -> Ret>);

fn missing_argument(position: usize) -> BindError {
    BindError::custom(
        signal::WRONG_NUMBER_OF_ARGS,
        format!("argument {position} was not supplied"),
    )
}

macro_rules! impl_host_fn {
    ($($arg:ident $var:ident),*) => {
        impl<Func, Ret, $($arg,)*> HostFn<Fixed<($($arg,)*), Ret>> for Func
        where
            Func: Fn($($arg),*) -> Ret + 'static,
            Ret: IntoValue,
            $($arg: FromValue,)*
        {
            fn signature() -> Signature {
                Signature::fixed(vec![$($arg::param_type()),*], Ret::return_type())
            }

            fn predicates() -> Vec<Predicate> {
                vec![$($arg::is as Predicate),*]
            }

            #[allow(unused_variables, unused_mut)]
            fn into_invoke(self) -> Invoke {
                Rc::new(move |rt, _caller, args, _tail| {
                    let mut args = args.iter().copied().enumerate();
                    $(
                        let $var = match args.next() {
                            Some((i, value)) => $arg::to(rt, value).map_err(|err| err.at(i + 1))?,
                            None => return Err(missing_argument(0)),
                        };
                    )*
                    (self)($($var),*).into_value(rt)
                })
            }
        }

        impl<Func, Ret, $($arg,)*> HostFn<WithRuntime<($($arg,)*), Ret>> for Func
        where
            Func: Fn(&Runtime, $($arg),*) -> Ret + 'static,
            Ret: IntoValue,
            $($arg: FromValue,)*
        {
            fn signature() -> Signature {
                Signature::fixed(vec![$($arg::param_type()),*], Ret::return_type())
            }

            fn predicates() -> Vec<Predicate> {
                vec![$($arg::is as Predicate),*]
            }

            #[allow(unused_variables, unused_mut)]
            fn into_invoke(self) -> Invoke {
                Rc::new(move |rt, _caller, args, _tail| {
                    let mut args = args.iter().copied().enumerate();
                    $(
                        let $var = match args.next() {
                            Some((i, value)) => $arg::to(rt, value).map_err(|err| err.at(i + 1))?,
                            None => return Err(missing_argument(0)),
                        };
                    )*
                    (self)(rt, $($var),*).into_value(rt)
                })
            }
        }

        impl<Func, Ret, Rest, $($arg,)*> HostFn<Variadic<($($arg,)*), Rest, Ret>> for Func
        where
            Func: for<'a> Fn($($arg,)* VarArgs<'a, Rest>) -> Ret + 'static,
            Ret: IntoValue,
            Rest: FromValue,
            $($arg: FromValue,)*
        {
            fn signature() -> Signature {
                Signature::variadic(
                    vec![$($arg::param_type()),*],
                    Rest::param_type(),
                    Ret::return_type(),
                )
            }

            fn predicates() -> Vec<Predicate> {
                vec![$($arg::is as Predicate),*]
            }

            #[allow(unused_variables, unused_mut)]
            fn into_invoke(self) -> Invoke {
                Rc::new(move |rt, caller, args, tail| {
                    let rest_position = args.len() + 1;
                    let mut args = args.iter().copied().enumerate();
                    $(
                        let $var = match args.next() {
                            Some((i, value)) => $arg::to(rt, value).map_err(|err| err.at(i + 1))?,
                            None => return Err(missing_argument(0)),
                        };
                    )*
                    let rest = VarArgs::new(rt, tail, caller, rest_position);
                    (self)($($var,)* rest).into_value(rt)
                })
            }
        }
    };
}

impl_host_fn!();
impl_host_fn!(A1 a1);
impl_host_fn!(A1 a1, A2 a2);
impl_host_fn!(A1 a1, A2 a2, A3 a3);
impl_host_fn!(A1 a1, A2 a2, A3 a3, A4 a4);
impl_host_fn!(A1 a1, A2 a2, A3 a3, A4 a4, A5 a5);
impl_host_fn!(A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6);
impl_host_fn!(A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6, A7 a7);
impl_host_fn!(A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6, A7 a7, A8 a8);

// ============================================================================
// Adapter
// ============================================================================

/// A bound host callable plus the metadata captured when it was bound.
#[derive(Clone)]
pub struct Adapter {
    name: Rc<str>,
    signature: Signature,
    predicates: Rc<[Predicate]>,
    invoke: Invoke,
}

impl Adapter {
    pub fn new<M, F: HostFn<M>>(name: &str, f: F) -> Self {
        Self {
            name: name.into(),
            signature: F::signature(),
            predicates: F::predicates().into(),
            invoke: f.into_invoke(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn arity(&self) -> Arity {
        self.signature.arity()
    }

    pub fn is_variadic(&self) -> bool {
        self.signature.is_variadic()
    }

    pub(crate) fn renamed(mut self, name: &str) -> Self {
        self.name = name.into();
        self
    }

    /// 1-based position of the first fixed argument failing its predicate.
    pub fn first_mismatch(&self, rt: &Runtime, args: &[Value]) -> Option<usize> {
        self.predicates
            .iter()
            .zip(args)
            .position(|(is, value)| !is(rt, *value))
            .map(|i| i + 1)
    }

    /// Whether `count` arguments satisfy the adapter's arity.
    pub fn accepts_count(&self, count: usize, strict: bool) -> bool {
        let fixed = self.predicates.len();
        if self.is_variadic() || !strict {
            count >= fixed
        } else {
            count == fixed
        }
    }

    /// Checks, converts and invokes with the argument list `args`.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn call(&self, rt: &Runtime, args: Value) -> BindResult<Value> {
        let values = rt.list_to_vec(args);
        let strict = BindState::of(rt).config.strict_arity;

        if !self.accepts_count(values.len(), strict) {
            tracing::trace!(name = &*self.name, count = values.len(), "arity mismatch");
            return Err(BindError::WrongArgsNumber {
                args,
                count: values.len(),
                caller: self.name.to_string(),
            });
        }

        let fixed = self.predicates.len();
        if let Some(position) = self.first_mismatch(rt, &values[..fixed]) {
            let expected = self.signature.params[position - 1].name(rt);
            tracing::trace!(name = &*self.name, position, %expected, "argument type mismatch");
            return Err(BindError::wrong_type(rt, values[position - 1], expected)
                .at(position)
                .with_caller(&self.name));
        }

        let tail = if self.is_variadic() {
            rt.list_tail(args, fixed).unwrap_or_else(|| rt.nil())
        } else {
            rt.nil()
        };
        self.invoke(rt, &values[..fixed], tail)
    }

    /// Runs the conversion and the callable on already checked arguments.
    pub(crate) fn invoke(&self, rt: &Runtime, fixed: &[Value], tail: Value) -> BindResult<Value> {
        (self.invoke)(rt, &self.name, fixed, tail).map_err(|err| err.with_caller(&self.name))
    }

    /// Arity announced to the runtime.
    pub(crate) fn runtime_arity(&self, strict: bool) -> Arity {
        if strict || self.is_variadic() {
            self.arity()
        } else {
            Arity::variadic(self.predicates.len())
        }
    }

    /// Wraps the adapter in a runtime procedure. Errors become conditions
    /// here and nowhere earlier.
    pub fn into_procedure(self, rt: &Runtime, doc: &str, opts: FunctionOpts) -> Value {
        let arity = self.runtime_arity(BindState::of(rt).config.strict_arity);
        self.wrap(rt, doc, arity, opts.to_flags(), |adapter, rt, args| adapter.call(rt, args))
    }

    /// Like [`Adapter::into_procedure`], but arguments are first arranged by
    /// `params`: by position, by `:name` keyword, or from defaults.
    pub fn into_star_procedure(
        self,
        rt: &Runtime,
        doc: &str,
        opts: FunctionOpts,
        params: StarParams,
    ) -> Value {
        self.wrap(rt, doc, Arity::variadic(0), opts.to_flags(), move |adapter, rt, args| {
            let filled = params.bind(rt, args).map_err(|err| err.with_caller(adapter.name()))?;
            adapter.call(rt, filled)
        })
    }

    /// A macro: the callable receives the operands of a call form
    /// unevaluated and returns its expansion.
    pub fn into_macro(self, rt: &Runtime, doc: &str, opts: FunctionOpts) -> Value {
        let arity = self.runtime_arity(BindState::of(rt).config.strict_arity);
        let flags = opts.to_flags() | FunctionFlags::MACRO;
        self.wrap(rt, doc, arity, flags, |adapter, rt, args| adapter.call(rt, args))
    }

    fn wrap(
        self,
        rt: &Runtime,
        doc: &str,
        arity: Arity,
        flags: FunctionFlags,
        run: impl Fn(&Adapter, &Runtime, Value) -> BindResult<Value> + 'static,
    ) -> Value {
        let signature = self.signature.to_value(rt);
        let adapter = Rc::new(self);
        let spec = FunctionSpec::new(&adapter.name, arity)
            .doc(doc)
            .flags(flags)
            .signature(Some(signature));
        let body = adapter.clone();
        rt.make_function(
            spec,
            Rc::new(move |rt, args| run(&body, rt, args).map_err(|err| err.into_signal(rt))),
        )
    }
}

impl fmt::Debug for Adapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Adapter")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish()
    }
}
