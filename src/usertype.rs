//! Registration of opaque host types as runtime value kinds.
//!
//! [`UserTypeBuilder`] collects the pieces of a registration and installs
//! them all in [`UserTypeBuilder::build`]:
//!
//! - a type tag and a capability environment shared by every instance
//! - free and mark hooks for the collector
//! - a predicate `<name>?`
//! - optionally a constructor, named methods, arithmetic operator methods
//!   and any [`TypeOp`] (equality, copying, sequence operations, indexed
//!   access, display)
//!
//! Hooks are installed before the type is entered in the registry, so a
//! failed build leaves an earlier registration of the same type in place.
//!
//! # Example
//!
//! ```
//! # use schemebind::prelude::*;
//! # fn main() -> BindResult<()> {
//! #[derive(Clone, Debug, Default, PartialEq)]
//! struct Counter(i64);
//! impl UserType for Counter {}
//!
//! let scheme = Scheme::new();
//! scheme
//!     .make_usertype::<Counter>("counter")
//!     .doc("a mutable counter")
//!     .default_constructor()
//!     .method("counter-bump", |c: Obj<Counter>| c.borrow_mut().0 += 1)
//!     .operator(MethodOp::Add, |a: Counter, b: Counter| Counter(a.0 + b.0))
//!     .equality()
//!     .build()?;
//!
//! let c = scheme.call("make-counter", ())?;
//! let sum: Counter = scheme.call_as("+", (c, c))?;
//! assert_eq!(sum, Counter(0));
//! # Ok(())
//! # }
//! ```

use std::any::{Any, type_name};
use std::marker::PhantomData;
use std::rc::Rc;

use schemebind_runtime::{Hook, Marker, Runtime, TypeTag, Value};

use crate::adapter::{Adapter, HostFn};
use crate::config::FunctionOpts;
use crate::convert::{FromValue, IntoValue};
use crate::error::BindResult;
use crate::ops::{self, MethodOp};
use crate::overload::{Overload, OverloadSet};
use crate::registry::{BindState, TypeEntry};
use crate::type_ops::{MarkFn, TypeOp, mark_hook};
use crate::user_data::{Payload, UserType, is_instance};

/// Builder for one opaque type registration.
///
/// Created by [`Scheme::make_usertype`](crate::Scheme::make_usertype).
/// Nothing reaches the runtime until [`build`](Self::build) is called.
#[must_use = "a user type is only registered by calling build()"]
pub struct UserTypeBuilder<'rt, T: UserType> {
    rt: &'rt Runtime,
    name: String,
    doc: String,
    opts: FunctionOpts,
    env: Option<Value>,
    constructor: Option<(String, Overload)>,
    mark: Option<MarkFn<T>>,
    type_ops: Vec<TypeOp<T>>,
    methods: Vec<(String, Overload)>,
    operators: Vec<(MethodOp, Overload)>,
    _marker: PhantomData<T>,
}

impl<'rt, T: UserType> UserTypeBuilder<'rt, T> {
    pub fn new(rt: &'rt Runtime, name: &str) -> Self {
        Self {
            rt,
            name: name.to_string(),
            doc: String::new(),
            opts: BindState::of(rt).config.default_opts,
            env: None,
            constructor: None,
            mark: None,
            type_ops: Vec::new(),
            methods: Vec::new(),
            operators: Vec::new(),
            _marker: PhantomData,
        }
    }

    pub fn doc(mut self, doc: &str) -> Self {
        self.doc = doc.to_string();
        self
    }

    /// Options for every procedure this registration defines.
    pub fn opts(mut self, opts: FunctionOpts) -> Self {
        self.opts = opts;
        self
    }

    /// Uses `env` as the capability environment instead of a fresh one.
    /// It is opened for method lookup and protected until the type is
    /// registered again.
    pub fn with_env(mut self, env: Value) -> Self {
        self.env = Some(env);
        self
    }

    /// Constructor `make-<name>` resolved over `overload`.
    pub fn constructor(self, overload: Overload) -> Self {
        let name = format!("make-{}", self.name);
        self.named_constructor(&name, overload)
    }

    pub fn named_constructor(mut self, name: &str, overload: Overload) -> Self {
        self.constructor = Some((name.to_string(), overload));
        self
    }

    /// Zero-argument constructor `make-<name>` calling `T::default`.
    pub fn default_constructor(self) -> Self
    where
        T: Default,
    {
        self.constructor(Overload::new().with(T::default))
    }

    /// Reports the runtime values a boxed `T` holds, so the collector keeps
    /// them alive while the object is reachable.
    pub fn mark(mut self, mark: impl Fn(&T, &mut Marker) + 'static) -> Self {
        self.mark = Some(Rc::new(mark));
        self
    }

    /// Installs `op` with the type. A later op of the same [`Op`](crate::Op)
    /// wins.
    pub fn op(mut self, op: TypeOp<T>) -> Self {
        self.type_ops.push(op);
        self
    }

    /// Shorthand for [`TypeOp::equal`].
    pub fn equality(self) -> Self
    where
        T: PartialEq,
    {
        self.op(TypeOp::equal())
    }

    /// Shorthand for [`TypeOp::length`].
    pub fn length(self, len: impl Fn(&T) -> usize + 'static) -> Self {
        self.op(TypeOp::length(len))
    }

    /// Indexed access: applying an instance to an index calls `get`,
    /// `object-set!` calls `set`.
    pub fn indexer<I, V, G, S>(self, get: G, set: S) -> Self
    where
        I: FromValue + 'static,
        V: FromValue + IntoValue + 'static,
        G: Fn(&T, I) -> BindResult<V> + 'static,
        S: Fn(&mut T, I, V) -> BindResult<()> + 'static,
    {
        self.op(TypeOp::index_ref(get)).op(TypeOp::index_set(set))
    }

    /// Shorthand for [`TypeOp::display`].
    pub fn display(self, show: impl Fn(&T) -> String + 'static) -> Self {
        self.op(TypeOp::display(show))
    }

    /// A method found by `find_method` on instances of the type.
    pub fn method<M, F: HostFn<M>>(self, name: &str, f: F) -> Self {
        self.method_overload(name, Overload::new().with(f))
    }

    pub fn method_overload(mut self, name: &str, overload: Overload) -> Self {
        self.methods.push((name.to_string(), overload));
        self
    }

    /// Implements an arithmetic operator for the type.
    pub fn operator<M, F: HostFn<M>>(self, op: MethodOp, f: F) -> Self {
        self.operator_overload(op, Overload::new().with(f))
    }

    pub fn operator_overload(mut self, op: MethodOp, overload: Overload) -> Self {
        self.operators.push((op, overload));
        self
    }

    /// Registers the type and installs everything collected so far.
    ///
    /// On error the registry is left as it was before the call.
    pub fn build(self) -> BindResult<TypeTag> {
        let Self {
            rt,
            name,
            doc,
            opts,
            env,
            constructor,
            mark,
            type_ops,
            methods,
            operators,
            ..
        } = self;

        let tag = rt.make_c_type(&name);
        rt.set_c_type_hook(tag, free_hook::<T>(&name))?;
        rt.set_c_type_hook(tag, mark_hook(mark))?;
        for op in type_ops {
            rt.set_c_type_hook(tag, op.into_hook(&name))?;
        }

        let env = env.unwrap_or_else(|| rt.inlet());
        rt.openlet(env);
        let env_root = rt.protect(env);

        // Method signatures name the type, so it is registered first.
        let state = BindState::of(rt);
        let previous = state.types.borrow_mut().register::<T>(TypeEntry {
            tag,
            name: name.clone(),
            env,
            env_root: Some(env_root),
        });

        if let Err(err) = install_methods(rt, env, opts, methods, operators) {
            let mut types = state.types.borrow_mut();
            types.remove::<T>();
            if let Some(previous) = previous {
                types.register::<T>(previous);
            }
            rt.unprotect(env_root);
            return Err(err);
        }
        if let Some(root) = previous.and_then(|entry| entry.env_root) {
            rt.unprotect(root);
        }

        let predicate_name = format!("{name}?");
        let predicate = Adapter::new(&predicate_name, |rt: &Runtime, value: Value| {
            is_instance::<T>(rt, value)
        });
        let predicate_doc = format!("({predicate_name} obj) returns #t if obj is a {name}");
        let predicate = predicate.into_procedure(rt, &predicate_doc, opts);
        rt.define_variable_with_documentation(&predicate_name, predicate, &predicate_doc);

        if let Some((ctor_name, overload)) = constructor {
            let proc = OverloadSet::new(&ctor_name, overload).into_procedure(rt, &doc, opts);
            rt.define_variable_with_documentation(&ctor_name, proc, &doc);
        }

        tracing::debug!(%name, %tag, rust_type = type_name::<T>(), "registered user type");
        Ok(tag)
    }
}

fn install_methods(
    rt: &Runtime,
    env: Value,
    opts: FunctionOpts,
    methods: Vec<(String, Overload)>,
    operators: Vec<(MethodOp, Overload)>,
) -> BindResult<()> {
    for (name, overload) in methods {
        let proc = OverloadSet::new(&name, overload).into_procedure(rt, "", opts);
        rt.define(env, rt.make_symbol(&name), proc)?;
    }
    for (op, overload) in operators {
        let proc = OverloadSet::new(op.symbol(), overload).into_procedure(rt, "", opts);
        ops::install_method(rt, env, op, proc)?;
    }
    Ok(())
}

/// Adds a method to an already registered type.
pub fn add_method<T: UserType>(rt: &Runtime, name: &str, overload: Overload) -> BindResult<()> {
    let entry = BindState::of(rt).entry::<T>()?;
    let opts = BindState::of(rt).config.default_opts;
    let proc = OverloadSet::new(name, overload).into_procedure(rt, "", opts);
    rt.define(entry.env, rt.make_symbol(name), proc)?;
    Ok(())
}

/// Adds an arithmetic operator method to an already registered type.
pub fn add_operator<T: UserType>(rt: &Runtime, op: MethodOp, overload: Overload) -> BindResult<()> {
    let entry = BindState::of(rt).entry::<T>()?;
    let opts = BindState::of(rt).config.default_opts;
    let proc = OverloadSet::new(op.symbol(), overload).into_procedure(rt, "", opts);
    ops::install_method(rt, entry.env, op, proc)
}

/// Installs `op` on an already registered type, replacing the hook an
/// earlier op of the same kind installed.
pub fn add_op<T: UserType>(rt: &Runtime, op: TypeOp<T>) -> BindResult<()> {
    let entry = BindState::of(rt).entry::<T>()?;
    tracing::debug!(name = %entry.name, op = %op.op(), "adding type op");
    rt.set_c_type_hook(entry.tag, op.into_hook(&entry.name))?;
    Ok(())
}

fn free_hook<T: UserType>(name: &str) -> Hook {
    let name: Rc<str> = name.into();
    Hook::GcFree(Rc::new(move |boxed: Box<dyn Any>| {
        match boxed.downcast::<Payload<T>>() {
            Ok(payload) => {
                tracing::trace!(name = &*name, "freeing user object");
                drop(payload);
            }
            Err(_) => tracing::warn!(name = &*name, "free hook received a foreign payload"),
        }
    }))
}
