//! The embedding API.
//!
//! A [`Scheme`] owns one runtime instance together with its binding state
//! and exposes:
//!
//! - a binding API: values, functions (single or overloaded), properties and
//!   opaque types declared under string names with documentation strings
//! - a call-in API: runtime procedures invoked by name or handle with host
//!   typed arguments
//! - a type-query API: `is`, `to`, `from` and tag lookup
//!
//! # Example
//!
//! ```
//! use schemebind::{BindResult, Overload, Scheme};
//!
//! # fn main() -> BindResult<()> {
//! let scheme = Scheme::new();
//! scheme.define_function("add", "(add a b) sums two integers", |a: i64, b: i64| a + b);
//! scheme.define_overload(
//!     "describe",
//!     "(describe x) names x's kind",
//!     Overload::new()
//!         .with(|_: i64| "an integer")
//!         .with(|_: String| "a string"),
//! );
//!
//! let sum: i64 = scheme.call_as("add", (1, 2))?;
//! assert_eq!(sum, 3);
//! let kind: String = scheme.call_as("describe", ("x",))?;
//! assert_eq!(kind, "a string");
//! # Ok(())
//! # }
//! ```

use std::rc::Rc;

use schemebind_runtime::{
    Arity, FunctionSpec, GcStats, Kind, ProtectId, Rooted, Runtime, TypeTag, Value, signal,
};

use crate::adapter::{Adapter, HostFn};
use crate::config::{BindConfig, FunctionOpts};
use crate::convert::{FromValue, IntoValue};
use crate::error::{BindError, BindResult};
use crate::handles::{Function, IntoArgs, Let, List, Values, Variable};
use crate::ops::MethodOp;
use crate::overload::{Overload, OverloadSet};
use crate::registry::BindState;
use crate::star::StarParams;
use crate::type_ops::TypeOp;
use crate::usertype::{self, UserTypeBuilder};
use crate::user_data::UserType;
use crate::value_key::ValueKey;

/// A runtime instance with its binding layer.
///
/// Bindings are per instance: two `Scheme`s never share type tags, adapters
/// or operator patches.
pub struct Scheme {
    rt: Runtime,
    state: Rc<BindState>,
}

impl Scheme {
    /// A fresh runtime with the default configuration.
    pub fn new() -> Self {
        Self::with_config(BindConfig::default())
    }

    pub fn with_config(config: BindConfig) -> Self {
        let rt = Runtime::new();
        let state = BindState::install(&rt, config);
        Self { rt, state }
    }

    /// The underlying runtime, for primitives the binding layer does not wrap.
    pub fn runtime(&self) -> &Runtime {
        &self.rt
    }

    pub fn config(&self) -> &BindConfig {
        &self.state.config
    }

    pub fn nil(&self) -> Value {
        self.rt.nil()
    }

    pub fn unspecified(&self) -> Value {
        self.rt.unspecified()
    }

    // ========================================================================
    // Collector
    // ========================================================================

    /// Roots `value` until [`Scheme::unprotect`] releases it.
    pub fn protect(&self, value: Value) -> ProtectId {
        self.rt.protect(value)
    }

    pub fn unprotect(&self, id: ProtectId) -> bool {
        self.rt.unprotect(id)
    }

    /// Roots `value` for the lifetime of the returned guard, error paths
    /// included.
    pub fn root(&self, value: Value) -> Rooted<'_> {
        self.rt.root(value)
    }

    pub fn collect(&self) -> GcStats {
        self.rt.collect()
    }

    // ========================================================================
    // Type queries
    // ========================================================================

    /// Whether `value` maps to host type `T`.
    pub fn is<T: FromValue>(&self, value: Value) -> bool {
        T::is(&self.rt, value)
    }

    /// Converts `value` to `T`.
    ///
    /// # Errors
    ///
    /// `WrongType` when `is::<T>` does not hold, `OutOfRange` when a
    /// narrowing conversion would lose the value.
    pub fn to<T: FromValue>(&self, value: Value) -> BindResult<T> {
        T::to(&self.rt, value)
    }

    /// Like [`Scheme::to`], with `None` instead of an error.
    pub fn to_opt<T: FromValue>(&self, value: Value) -> Option<T> {
        if T::is(&self.rt, value) {
            T::to(&self.rt, value).ok()
        } else {
            None
        }
    }

    /// Converts a host value into a runtime value.
    pub fn from<T: IntoValue>(&self, value: T) -> BindResult<Value> {
        value.into_value(&self.rt)
    }

    /// The written representation of `value`.
    pub fn to_string(&self, value: Value) -> String {
        self.rt.object_to_string(value)
    }

    pub fn type_of(&self, value: Value) -> Kind {
        self.rt.type_of(value)
    }

    pub fn type_tag<T: UserType>(&self) -> BindResult<TypeTag> {
        self.state.tag::<T>()
    }

    /// The capability environment shared by instances of `T`.
    pub fn type_env<T: UserType>(&self) -> BindResult<Let> {
        Ok(Let::from_raw(self.state.entry::<T>()?.env))
    }

    pub fn type_name<T: UserType>(&self) -> BindResult<String> {
        Ok(self.state.entry::<T>()?.name)
    }

    /// The method `name` an opaque instance exposes through its environment.
    pub fn find_method(&self, object: Value, name: &str) -> Option<Function> {
        self.rt
            .find_method(object, name)
            .filter(|method| self.rt.is_procedure(*method))
            .map(Function::from_raw)
    }

    /// Runtime signature `(ret-pred arg-pred ...)` of a host callable.
    pub fn make_signature<M, F: HostFn<M>>(&self, _f: &F) -> Value {
        F::signature().to_value(&self.rt)
    }

    /// An `equal?`-keyed wrapper for host hash maps.
    pub fn key(&self, value: Value) -> ValueKey<'_> {
        ValueKey::new(&self.rt, value)
    }

    // ========================================================================
    // Values and variables
    // ========================================================================

    pub fn sym(&self, name: &str) -> Value {
        self.rt.make_symbol(name)
    }

    pub fn list(&self, items: impl IntoArgs) -> BindResult<List> {
        let items = items.into_args(&self.rt)?;
        Ok(List::new(&self.rt, &items))
    }

    pub fn values(&self, items: impl IntoArgs) -> BindResult<Values> {
        Values::new(&self.rt, items)
    }

    /// A host-defined condition, for returning from bound functions.
    pub fn error(&self, kind: &str, message: &str, info: &[Value]) -> BindError {
        BindError::Custom {
            kind: kind.to_string(),
            message: message.to_string(),
            info: info.to_vec(),
        }
    }

    /// Binds `name` in the root environment.
    pub fn define(&self, name: &str, value: impl IntoValue, doc: &str) -> BindResult<Value> {
        let value = value.into_value(&self.rt)?;
        self.rt.define_variable_with_documentation(name, value, doc);
        Ok(value)
    }

    /// Binds `name` immutably; later assignments fail.
    pub fn define_const(&self, name: &str, value: impl IntoValue, doc: &str) -> BindResult<Value> {
        let value = value.into_value(&self.rt)?;
        self.rt.define_constant_with_documentation(name, value, doc);
        Ok(value)
    }

    /// A handle on the root binding `name`, defined as nil when missing.
    pub fn var(&self, name: &str) -> BindResult<Variable<'_>> {
        Let::root(&self.rt).var(&self.rt, name)
    }

    pub fn get<T: FromValue>(&self, name: &str) -> BindResult<T> {
        Let::root(&self.rt).get(&self.rt, name)
    }

    pub fn get_opt<T: FromValue>(&self, name: &str) -> Option<T> {
        Let::root(&self.rt).get_opt(&self.rt, name)
    }

    pub fn set(&self, name: &str, value: impl IntoValue) -> BindResult<()> {
        Let::root(&self.rt).set(&self.rt, name, value)
    }

    pub fn root_let(&self) -> Let {
        Let::root(&self.rt)
    }

    /// A new empty environment.
    pub fn make_let(&self) -> Let {
        Let::new(&self.rt)
    }

    // ========================================================================
    // Call-in
    // ========================================================================

    /// Calls the procedure bound to `name`.
    ///
    /// # Errors
    ///
    /// Conditions raised by the callee arrive as [`BindError::Signal`].
    pub fn call(&self, name: &str, args: impl IntoArgs) -> BindResult<Value> {
        let args = args.into_args(&self.rt)?;
        Ok(self.rt.call_by_name(name, &args)?)
    }

    /// Like [`Scheme::call`], converting the result.
    pub fn call_as<R: FromValue>(&self, name: &str, args: impl IntoArgs) -> BindResult<R> {
        let result = self.call(name, args)?;
        R::to(&self.rt, result)
    }

    pub fn call_fn(&self, f: Function, args: impl IntoArgs) -> BindResult<Value> {
        f.call(&self.rt, args)
    }

    pub fn apply(&self, f: Value, args: List) -> BindResult<Value> {
        Ok(self.rt.apply(f, args.value())?)
    }

    // ========================================================================
    // Functions
    // ========================================================================

    /// Binds a host function under `name`.
    ///
    /// ```
    /// # let scheme = schemebind::Scheme::new();
    /// scheme.define_function("square", "(square x)", |x: f64| x * x);
    /// assert_eq!(scheme.call_as::<f64>("square", (3,)).unwrap(), 9.0);
    /// ```
    pub fn define_function<M, F: HostFn<M>>(&self, name: &str, doc: &str, f: F) -> Function {
        self.define_function_with(name, doc, self.state.config.default_opts, f)
    }

    pub fn define_function_with<M, F: HostFn<M>>(
        &self,
        name: &str,
        doc: &str,
        opts: FunctionOpts,
        f: F,
    ) -> Function {
        let adapter = Adapter::new(name, f);
        tracing::debug!(name, arity = %adapter.arity(), "binding function");
        let proc = adapter.into_procedure(&self.rt, doc, opts);
        self.rt.define_variable_with_documentation(name, proc, doc);
        Function::from_raw(proc)
    }

    /// An anonymous procedure that is not bound to any name.
    pub fn make_function<M, F: HostFn<M>>(&self, name: &str, doc: &str, f: F) -> Function {
        let proc = Adapter::new(name, f).into_procedure(&self.rt, doc, self.state.config.default_opts);
        Function::from_raw(proc)
    }

    /// Binds an ordered candidate list resolved first-match at call time.
    pub fn define_overload(&self, name: &str, doc: &str, overload: Overload) -> Function {
        let proc = OverloadSet::new(name, overload).into_procedure(
            &self.rt,
            doc,
            self.state.config.default_opts,
        );
        self.rt.define_variable_with_documentation(name, proc, doc);
        Function::from_raw(proc)
    }

    /// Binds a host function whose parameters may be passed by name.
    ///
    /// `arglist` names one parameter per fixed parameter of `f`, with
    /// optional defaults, and ends in `:rest name` exactly when `f` takes
    /// [`VarArgs`](crate::VarArgs). See [`crate::star`] for the syntax.
    pub fn define_star_function<M, F: HostFn<M>>(
        &self,
        name: &str,
        arglist: &str,
        doc: &str,
        f: F,
    ) -> BindResult<Function> {
        let f = self.make_star_function(name, arglist, doc, f)?;
        self.rt.define_variable_with_documentation(name, f.value(), doc);
        Ok(f)
    }

    /// Like [`Scheme::define_star_function`], without binding a name.
    pub fn make_star_function<M, F: HostFn<M>>(
        &self,
        name: &str,
        arglist: &str,
        doc: &str,
        f: F,
    ) -> BindResult<Function> {
        let params = StarParams::parse(arglist)?;
        let adapter = Adapter::new(name, f);
        let arity = adapter.arity();
        if arity.required != params.len() || arity.rest != params.rest().is_some() {
            return Err(BindError::custom(
                signal::SYNTAX_ERROR,
                format!("{name}: parameter list ({params}) does not fit a function of arity {arity}"),
            ));
        }
        tracing::debug!(name, %params, "binding star function");
        let proc = adapter.into_star_procedure(&self.rt, doc, self.state.config.default_opts, params);
        Ok(Function::from_raw(proc))
    }

    /// Binds a macro. `f` receives the operands of a call form unevaluated,
    /// as runtime values, and returns the expansion.
    pub fn define_macro<M, F: HostFn<M>>(&self, name: &str, doc: &str, f: F) -> Function {
        let adapter = Adapter::new(name, f);
        tracing::debug!(name, arity = %adapter.arity(), "binding macro");
        let proc = adapter.into_macro(&self.rt, doc, self.state.config.default_opts);
        self.rt.define_variable_with_documentation(name, proc, doc);
        Function::from_raw(proc)
    }

    /// Expands `form` once if its head names a macro; returns it unchanged
    /// otherwise.
    pub fn macroexpand(&self, form: Value) -> BindResult<Value> {
        Ok(self.rt.macroexpand(form)?)
    }

    /// Binds a procedure that receives its argument list unconverted.
    pub fn define_raw(
        &self,
        name: &str,
        doc: &str,
        arity: Arity,
        f: impl Fn(&Runtime, List) -> BindResult<Value> + 'static,
    ) -> Function {
        let caller: Rc<str> = name.into();
        let spec = FunctionSpec::new(name, arity)
            .doc(doc)
            .flags(self.state.config.default_opts.to_flags());
        let proc = self.rt.make_function(
            spec,
            Rc::new(move |rt, args| {
                f(rt, List::from_raw(args)).map_err(|err| err.with_caller(&caller).into_signal(rt))
            }),
        );
        tracing::debug!(name, %arity, "binding raw procedure");
        self.rt.define_variable_with_documentation(name, proc, doc);
        Function::from_raw(proc)
    }

    /// Binds `name` to a getter procedure carrying `setter` as its setter.
    pub fn define_property<GM, SM, G, S>(&self, name: &str, doc: &str, getter: G, setter: S) -> Function
    where
        G: HostFn<GM>,
        S: HostFn<SM>,
    {
        let opts = self.state.config.default_opts;
        let get = Adapter::new(name, getter).into_procedure(&self.rt, doc, opts);
        let set = Adapter::new(&format!("set-{name}"), setter).into_procedure(&self.rt, doc, opts);
        self.rt.set_setter(get, set);
        self.rt.define_variable_with_documentation(name, get, doc);
        Function::from_raw(get)
    }

    // ========================================================================
    // User types
    // ========================================================================

    /// Starts registering `T` as an opaque type called `name`.
    pub fn make_usertype<T: UserType>(&self, name: &str) -> UserTypeBuilder<'_, T> {
        UserTypeBuilder::new(&self.rt, name)
    }

    /// Adds a named method to a registered type.
    pub fn add_method<T: UserType, M, F: HostFn<M>>(&self, name: &str, f: F) -> BindResult<()> {
        usertype::add_method::<T>(&self.rt, name, Overload::new().with(f))
    }

    /// Adds an arithmetic operator method to a registered type.
    pub fn add_method_op<T: UserType, M, F: HostFn<M>>(&self, op: MethodOp, f: F) -> BindResult<()> {
        usertype::add_operator::<T>(&self.rt, op, Overload::new().with(f))
    }

    /// Installs a [`TypeOp`] on a registered type, replacing any earlier
    /// one of the same [`Op`](crate::Op).
    pub fn add_op<T: UserType>(&self, op: TypeOp<T>) -> BindResult<()> {
        usertype::add_op::<T>(&self.rt, op)
    }
}

impl Default for Scheme {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheme")
            .field("runtime", &self.rt)
            .field("state", &self.state)
            .finish()
    }
}
